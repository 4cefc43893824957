use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    rabbit::logging::init().context("init logging")?;

    let cli = rabbit::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        rabbit::cli::Command::Render(args) => {
            rabbit::markdown::run(args).context("render")?;
        }
        rabbit::cli::Command::Books(args) => {
            let fetcher = content_fetcher(&cli.source)?;
            rabbit::library::run(&fetcher, args)
                .await
                .context("books")?;
        }
        rabbit::cli::Command::Chapters(args) => {
            let fetcher = content_fetcher(&cli.source)?;
            rabbit::reader::run_chapters(&fetcher, args)
                .await
                .context("chapters")?;
        }
        rabbit::cli::Command::Read(args) => {
            let fetcher = content_fetcher(&cli.source)?;
            rabbit::reader::run_read(&fetcher, args)
                .await
                .context("read")?;
        }
        rabbit::cli::Command::Export(args) => {
            let fetcher = content_fetcher(&cli.source)?;
            rabbit::export::run(&fetcher, args)
                .await
                .context("export")?;
        }
    }

    Ok(())
}

fn content_fetcher(
    source: &rabbit::cli::SourceArgs,
) -> anyhow::Result<rabbit::fetch::ContentFetcher> {
    rabbit::fetch::ContentFetcher::from_args(source).context("configure content fetcher")
}
