use anyhow::Context as _;
use serde::Serialize;

use crate::cli::{BooksArgs, ListFormat};
use crate::config::BookKind;
use crate::fetch::ContentFetcher;
use crate::formats::{ChapterManifest, Timestamp};

/// One entry of the book list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub key: String,
    pub title: String,
    pub kind: BookKind,
    pub total_chapters: u32,
    pub last_updated: Timestamp,
    pub completed: bool,
    pub content_label: String,
}

impl BookSummary {
    pub fn new(key: &str, kind: BookKind, manifest: &ChapterManifest) -> Self {
        Self {
            key: key.to_owned(),
            title: manifest.book_title.clone(),
            kind,
            total_chapters: manifest.total_chapters,
            last_updated: manifest.last_updated.clone(),
            completed: manifest.completed,
            content_label: kind.content_label(manifest.total_chapters),
        }
    }
}

/// Loads a summary for every registry book, one manifest at a time.
///
/// Books whose manifest cannot be fetched are skipped; it is an error only when none load.
pub async fn load_library(fetcher: &ContentFetcher) -> anyhow::Result<Vec<BookSummary>> {
    let mut summaries = Vec::new();

    for book in fetcher.registry().books() {
        match fetcher.fetch_manifest(&book.key).await {
            Ok(manifest) => {
                summaries.push(BookSummary::new(&book.key, book.config.kind, &manifest));
            }
            Err(err) => {
                tracing::warn!(
                    book = %book.key,
                    title = %book.config.title,
                    error = %format!("{:#}", anyhow::Error::from(err)),
                    "skipping book; manifest unavailable"
                );
            }
        }
    }

    if summaries.is_empty() {
        anyhow::bail!("no books could be loaded");
    }
    Ok(summaries)
}

/// Groups summaries by kind, keeping first-seen group order and registry order within a group.
pub fn group_by_kind(summaries: &[BookSummary]) -> Vec<(BookKind, Vec<&BookSummary>)> {
    let mut groups: Vec<(BookKind, Vec<&BookSummary>)> = Vec::new();
    for summary in summaries {
        match groups.iter_mut().find(|(kind, _)| *kind == summary.kind) {
            Some((_, members)) => members.push(summary),
            None => groups.push((summary.kind, vec![summary])),
        }
    }
    groups
}

pub async fn run(fetcher: &ContentFetcher, args: BooksArgs) -> anyhow::Result<()> {
    let summaries = load_library(fetcher).await?;
    tracing::info!(
        loaded = summaries.len(),
        registered = fetcher.registry().books().len(),
        "loaded book list"
    );

    let listing = match args.format {
        ListFormat::Json => serde_json::to_string_pretty(&summaries).context("serialize books")?,
        ListFormat::Text => format_library(&summaries),
    };
    crate::output::write_output(None, &listing, false)
}

fn format_library(summaries: &[BookSummary]) -> String {
    let mut text = String::new();
    for (idx, (kind, books)) in group_by_kind(summaries).into_iter().enumerate() {
        if idx != 0 {
            text.push('\n');
        }
        text.push_str(&format!("{}\n", kind.group_title()));
        for book in books {
            let status = if book.completed { "Completed" } else { "Ongoing" };
            text.push_str(&format!(
                "  {:<24} {} | {} | {} | updated {}\n",
                book.key,
                book.title,
                book.content_label,
                status,
                book.last_updated.display_date()
            ));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(key: &str, kind: BookKind) -> BookSummary {
        let manifest = ChapterManifest {
            book_title: key.to_uppercase(),
            total_chapters: 2,
            last_updated: Timestamp::new("2025-10-14"),
            completed: false,
            chapters: Vec::new(),
        };
        BookSummary::new(key, kind, &manifest)
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let summaries = vec![
            summary("a", BookKind::Novel),
            summary("b", BookKind::Poems),
            summary("c", BookKind::Novel),
            summary("d", BookKind::Drama),
        ];

        let groups = group_by_kind(&summaries);
        let shape: Vec<(BookKind, Vec<&str>)> = groups
            .iter()
            .map(|(kind, books)| (*kind, books.iter().map(|b| b.key.as_str()).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (BookKind::Novel, vec!["a", "c"]),
                (BookKind::Poems, vec!["b"]),
                (BookKind::Drama, vec!["d"]),
            ]
        );
    }

    #[test]
    fn text_listing_has_group_titles_and_labels() {
        let summaries = vec![summary("verses", BookKind::Poems)];
        let text = format_library(&summaries);
        assert!(text.starts_with("Poetry Collections\n"));
        assert!(text.contains("2 Poems Available"));
        assert!(text.contains("Ongoing"));
    }
}
