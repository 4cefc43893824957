use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{DEFAULT_REMOTE_BASE_URL, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Books(BooksArgs),
    Chapters(ChaptersArgs),
    Read(ReadArgs),
    Render(RenderArgs),
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Book registry YAML (default: built-in book list).
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Base URL of the remote document store.
    #[arg(long, global = true, default_value = DEFAULT_REMOTE_BASE_URL)]
    pub remote_base_url: String,

    /// Directory or http(s) base URL holding the bundled local snapshots.
    #[arg(long, global = true, default_value = ".")]
    pub local_root: String,

    /// Per-request timeout in seconds (0 disables it).
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Html,
    Pdf,
}

#[derive(Debug, Args)]
pub struct BooksArgs {
    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    pub format: ListFormat,
}

#[derive(Debug, Args)]
pub struct ChaptersArgs {
    /// Book key from the registry (unknown keys use the fallback book).
    #[arg(long)]
    pub book: String,

    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    pub format: ListFormat,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Book key from the registry (unknown keys use the fallback book).
    #[arg(long)]
    pub book: String,

    /// Chapter number (default: 1).
    #[arg(long, conflicts_with = "slug")]
    pub chapter: Option<u32>,

    /// Chapter name slug, e.g. `the_long_night`.
    #[arg(long)]
    pub slug: Option<String>,

    /// Output HTML file (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Markdown file to render.
    #[arg(long)]
    pub input: String,

    /// Output HTML file (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Book key from the registry (unknown keys use the fallback book).
    #[arg(long)]
    pub book: String,

    /// Output file path.
    #[arg(long)]
    pub out: String,

    #[arg(long, value_enum, default_value_t = ExportFormat::Html)]
    pub format: ExportFormat,

    /// Maximum chapters fetched at once.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Overwrite the output file if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Pandoc executable used for PDF output.
    #[arg(long, default_value = "pandoc")]
    pub pandoc: String,

    /// PDF engine passed to pandoc (default: try weasyprint, then wkhtmltopdf).
    #[arg(long)]
    pub pdf_engine: Option<String>,
}
