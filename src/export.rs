use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::Context as _;
use serde::Serialize;

use crate::cli::{ExportArgs, ExportFormat};
use crate::fetch::{ContentFetcher, FetchError};
use crate::formats::RenderedChapter;
use crate::html::escape_html;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedBook {
    pub book_key: String,
    pub title: String,
    pub completed: bool,
    /// Rendered chapters in manifest order.
    pub chapters: Vec<RenderedChapter>,
    /// Chapter numbers whose body could not be fetched.
    pub omitted: Vec<u32>,
}

/// Fetches and renders every chapter of a book.
///
/// Up to `concurrency` chapters are in flight at once. A chapter that fails is
/// logged and left out; only a manifest failure fails the export.
pub async fn collect_book(
    fetcher: &ContentFetcher,
    book_key: &str,
    concurrency: usize,
) -> Result<ExportedBook, FetchError> {
    let manifest = fetcher.fetch_manifest(book_key).await?;
    let total = manifest.chapters.len();
    let concurrency = concurrency.max(1).min(total.max(1));

    tracing::info!(
        book = book_key,
        chapters = total,
        concurrency = concurrency,
        "export: fetch chapters"
    );

    let mut join_set = tokio::task::JoinSet::new();
    let mut next_idx = 0usize;
    let mut results: Vec<Option<RenderedChapter>> = vec![None; total];

    while next_idx < total || !join_set.is_empty() {
        while next_idx < total && join_set.len() < concurrency {
            let chapter_index = next_idx;
            let chapter = manifest.chapters[chapter_index].clone();
            let fetcher = fetcher.clone();
            let book_key = book_key.to_owned();

            join_set.spawn(async move {
                let body = fetcher
                    .fetch_chapter_body(&chapter.remote_url, &chapter.filename, &book_key)
                    .await;
                let outcome = body.map(|body| crate::reader::render_chapter(&chapter, &body));
                (chapter_index, outcome)
            });

            next_idx += 1;
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok((chapter_index, Ok(rendered))) => {
                results[chapter_index] = Some(rendered);
            }
            Ok((chapter_index, Err(err))) => {
                tracing::warn!(
                    book = book_key,
                    chapter = manifest.chapters[chapter_index].chapter_number,
                    error = %format!("{:#}", anyhow::Error::from(err)),
                    "export: chapter unavailable; omitting"
                );
            }
            Err(err) => {
                tracing::warn!(book = book_key, ?err, "export: chapter task failed");
            }
        }
    }

    let mut chapters = Vec::with_capacity(total);
    let mut omitted = Vec::new();
    for (chapter, rendered) in manifest.chapters.iter().zip(results) {
        match rendered {
            Some(rendered) => chapters.push(rendered),
            None => omitted.push(chapter.chapter_number),
        }
    }

    if !omitted.is_empty() {
        tracing::warn!(
            book = book_key,
            omitted = ?omitted,
            total = total,
            "export: completed with missing chapters"
        );
    }

    Ok(ExportedBook {
        book_key: book_key.to_owned(),
        title: manifest.book_title,
        completed: manifest.completed,
        chapters,
        omitted,
    })
}

/// Single HTML document holding every exported chapter.
pub fn render_html_document(book: &ExportedBook) -> String {
    let title = escape_html(&book.title);
    let mut html = String::new();
    html.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n"));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1 class=\"book-title\">{title}</h1>\n"));

    for chapter in &book.chapters {
        html.push_str("<section class=\"chapter\">\n");
        html.push_str(&format!("<h2>{}</h2>\n", escape_html(&chapter.title)));
        if let Some(published) = &chapter.published_date {
            html.push_str(&format!(
                "<p class=\"chapter-published\">{}</p>\n",
                escape_html(&published.display_date())
            ));
        }
        if !chapter.html_body.is_empty() {
            html.push_str(&chapter.html_body);
            html.push('\n');
        }
        html.push_str("</section>\n");
    }

    if book.completed && book.omitted.is_empty() {
        html.push_str("<div class=\"chapter-end-indicator\"><p>— The End —</p></div>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

pub async fn run(fetcher: &ContentFetcher, args: ExportArgs) -> anyhow::Result<()> {
    if Path::new(&args.out).exists() && !args.force {
        anyhow::bail!("export output already exists: {}", args.out);
    }

    let book = collect_book(fetcher, &args.book, args.concurrency)
        .await
        .context("collect chapters")?;
    if book.chapters.is_empty() {
        anyhow::bail!("no chapters available to export for {}", args.book);
    }
    let document = render_html_document(&book);

    let format = args.format;
    match format {
        ExportFormat::Html => {
            crate::output::write_output(Some(&args.out), &document, args.force)?;
        }
        ExportFormat::Pdf => {
            let title = book.title.clone();
            tokio::task::spawn_blocking(move || export_pdf_via_pandoc(&args, &title, &document))
                .await
                .context("join pandoc task")??;
        }
    }

    tracing::info!(
        book = %book.book_key,
        chapters = book.chapters.len(),
        omitted = book.omitted.len(),
        "export: done"
    );
    Ok(())
}

fn export_pdf_via_pandoc(args: &ExportArgs, title: &str, document: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(&args.out).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export output dir: {}", parent.display()))?;
    }

    let input = tempfile::Builder::new()
        .prefix("rabbit-export-")
        .suffix(".html")
        .tempfile()
        .context("create temporary html file")?;
    std::fs::write(input.path(), document).context("write temporary html file")?;

    let engines = match args.pdf_engine.as_deref() {
        Some(engine) => vec![engine],
        None => vec!["weasyprint", "wkhtmltopdf"],
    };

    let mut last_failure: Option<anyhow::Error> = None;
    for engine in engines {
        tracing::info!(
            format = "pdf",
            pdf_engine = engine,
            pandoc = %args.pandoc,
            out = %args.out,
            "export via pandoc"
        );

        let pandoc_args = build_pandoc_args(input.path(), &args.out, engine, title);
        let output = match Command::new(&args.pandoc).args(&pandoc_args).output() {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                anyhow::bail!(
                    "pandoc not found ({}); install pandoc or pass `--pandoc <PATH>`",
                    args.pandoc
                );
            }
            Err(err) => return Err(err).with_context(|| format!("run pandoc: {}", args.pandoc)),
        };
        if output.status.success() {
            return Ok(());
        }

        last_failure = Some(anyhow::anyhow!(
            "pandoc failed with pdf_engine={engine} ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    match last_failure {
        Some(err) => Err(err),
        None => anyhow::bail!("export pdf failed: no pdf engine candidates"),
    }
}

fn build_pandoc_args(input: &Path, out: &str, pdf_engine: &str, title: &str) -> Vec<OsString> {
    vec![
        input.as_os_str().to_owned(),
        OsString::from("--from"),
        OsString::from("html"),
        OsString::from("-o"),
        OsString::from(out),
        OsString::from("--to"),
        OsString::from("pdf"),
        OsString::from("--pdf-engine"),
        OsString::from(pdf_engine),
        OsString::from("--metadata"),
        OsString::from(format!("title={title}")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Timestamp;

    fn book(completed: bool, omitted: Vec<u32>) -> ExportedBook {
        ExportedBook {
            book_key: "x".to_owned(),
            title: "Salt & Sea".to_owned(),
            completed,
            chapters: vec![
                RenderedChapter {
                    title: "Chapter 1".to_owned(),
                    html_body: "<p>\nfirst\n</p>".to_owned(),
                    published_date: Some(Timestamp::new("2025-10-01")),
                },
                RenderedChapter {
                    title: "<Two>".to_owned(),
                    html_body: "<p>\nsecond\n</p>".to_owned(),
                    published_date: None,
                },
            ],
            omitted,
        }
    }

    #[test]
    fn html_document_keeps_chapter_order_and_escapes_titles() {
        let html = render_html_document(&book(false, Vec::new()));

        assert!(html.contains("<title>Salt &amp; Sea</title>"));
        assert!(html.contains("<h2>&lt;Two&gt;</h2>"));
        let first = html.find("first").unwrap();
        let second = html.find("second").unwrap();
        assert!(first < second);
        assert!(html.contains("2025-10-01"));
        assert!(!html.contains("The End"));
    }

    #[test]
    fn end_marker_needs_complete_book_without_gaps() {
        assert!(render_html_document(&book(true, Vec::new())).contains("The End"));
        assert!(!render_html_document(&book(true, vec![3])).contains("The End"));
    }

    #[test]
    fn pandoc_args_read_html_and_write_pdf() {
        let args = build_pandoc_args(Path::new("/tmp/in.html"), "book", "weasyprint", "T");
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "/tmp/in.html",
                "--from",
                "html",
                "-o",
                "book",
                "--to",
                "pdf",
                "--pdf-engine",
                "weasyprint",
                "--metadata",
                "title=T",
            ]
        );
    }
}
