use anyhow::Context as _;
use serde::Serialize;

use crate::cli::{ChaptersArgs, ListFormat, ReadArgs};
use crate::fetch::{ContentFetcher, FetchError};
use crate::formats::{ChapterManifest, ChapterRef, RenderedChapter};
use crate::html::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterSelector {
    Number(u32),
    Slug(String),
}

impl ChapterSelector {
    pub fn from_args(chapter: Option<u32>, slug: Option<&str>) -> Self {
        match (chapter, slug) {
            (_, Some(slug)) => Self::Slug(slug.to_owned()),
            (Some(number), None) => Self::Number(number),
            (None, None) => Self::Number(1),
        }
    }

    pub fn select<'m>(&self, manifest: &'m ChapterManifest) -> Result<&'m ChapterRef, FetchError> {
        match self {
            Self::Number(number) => manifest
                .find(*number)
                .ok_or(FetchError::ChapterNotFound { chapter: *number }),
            Self::Slug(slug) => crate::slug::find_chapter_by_slug(&manifest.chapters, slug)
                .ok_or_else(|| FetchError::SlugNotFound { slug: slug.clone() }),
        }
    }
}

/// Position of a chapter within the manifest's reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub index: usize,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub is_last: bool,
}

impl Navigation {
    pub fn locate(manifest: &ChapterManifest, chapter_number: u32) -> Option<Self> {
        let index = manifest.position(chapter_number)?;
        let previous = index
            .checked_sub(1)
            .map(|prev| manifest.chapters[prev].chapter_number);
        let next = manifest
            .chapters
            .get(index + 1)
            .map(|chapter| chapter.chapter_number);

        Some(Self {
            index,
            previous,
            next,
            is_last: next.is_none(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterView {
    pub book_title: String,
    pub chapter_number: u32,
    pub chapter: RenderedChapter,
    pub navigation: Navigation,
    /// The book is finished and this is its last chapter.
    pub show_end_marker: bool,
}

pub fn render_chapter(chapter: &ChapterRef, body: &str) -> RenderedChapter {
    RenderedChapter {
        title: chapter.display_title(),
        html_body: crate::markdown::render(body),
        published_date: chapter.published_date.clone(),
    }
}

/// Fetches and renders the selected chapter of an already loaded manifest.
pub async fn open_chapter(
    fetcher: &ContentFetcher,
    book_key: &str,
    manifest: &ChapterManifest,
    selector: &ChapterSelector,
) -> Result<ChapterView, FetchError> {
    let chapter_number = selector.select(manifest)?.chapter_number;
    let (chapter, body) = fetcher
        .fetch_chapter(manifest, chapter_number, book_key)
        .await?;
    let navigation = Navigation::locate(manifest, chapter_number)
        .ok_or(FetchError::ChapterNotFound {
            chapter: chapter_number,
        })?;

    Ok(ChapterView {
        book_title: manifest.book_title.clone(),
        chapter_number: chapter.chapter_number,
        chapter: render_chapter(chapter, &body),
        navigation,
        show_end_marker: navigation.is_last && manifest.completed,
    })
}

/// Standalone HTML page for one chapter.
pub fn render_page(view: &ChapterView) -> String {
    let mut html = String::new();
    html.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>{} - {}</title>\n",
        escape_html(&view.chapter.title),
        escape_html(&view.book_title)
    ));
    html.push_str("</head>\n<body>\n<main class=\"chapter-content\">\n");
    html.push_str(&format!(
        "<h1 class=\"chapter-content-title\">{}</h1>\n",
        escape_html(&view.chapter.title)
    ));
    if let Some(published) = &view.chapter.published_date {
        html.push_str(&format!(
            "<p class=\"chapter-published\">{}</p>\n",
            escape_html(&published.display_date())
        ));
    }
    html.push_str("<div class=\"chapter-content-body\">\n");
    html.push_str(&view.chapter.html_body);
    html.push_str("\n</div>\n");
    if view.show_end_marker {
        html.push_str("<div class=\"chapter-end-indicator\"><p>— The End —</p></div>\n");
    }

    html.push_str("<nav class=\"chapter-navigation\">\n");
    if let Some(previous) = view.navigation.previous {
        html.push_str(&format!(
            "<span class=\"chapter-previous\">Previous: chapter {previous}</span>\n"
        ));
    }
    if let Some(next) = view.navigation.next {
        html.push_str(&format!(
            "<span class=\"chapter-next\">Next: chapter {next}</span>\n"
        ));
    }
    html.push_str("</nav>\n</main>\n</body>\n</html>\n");
    html
}

pub async fn run_read(fetcher: &ContentFetcher, args: ReadArgs) -> anyhow::Result<()> {
    let manifest = fetcher
        .fetch_manifest(&args.book)
        .await
        .context("load chapters manifest")?;
    let selector = ChapterSelector::from_args(args.chapter, args.slug.as_deref());

    let view = open_chapter(fetcher, &args.book, &manifest, &selector)
        .await
        .context("open chapter")?;
    tracing::info!(
        book = %args.book,
        chapter = view.chapter_number,
        is_last = view.navigation.is_last,
        "rendered chapter"
    );

    crate::output::write_output(args.out.as_deref(), &render_page(&view), args.force)
}

pub async fn run_chapters(fetcher: &ContentFetcher, args: ChaptersArgs) -> anyhow::Result<()> {
    let manifest = fetcher
        .fetch_manifest(&args.book)
        .await
        .context("load chapters manifest")?;

    let listing = match args.format {
        ListFormat::Json => {
            serde_json::to_string_pretty(&manifest).context("serialize chapters manifest")?
        }
        ListFormat::Text => format_chapter_list(&manifest),
    };
    crate::output::write_output(None, &listing, false)
}

fn format_chapter_list(manifest: &ChapterManifest) -> String {
    let status = if manifest.completed {
        "Completed"
    } else {
        "Ongoing"
    };
    let mut text = format!(
        "{} ({} chapters, {status}, last updated {})\n",
        manifest.book_title,
        manifest.total_chapters,
        manifest.last_updated.display_date()
    );
    for chapter in &manifest.chapters {
        text.push_str(&format!(
            "Ch. {:>3}  {}",
            chapter.chapter_number,
            chapter.display_title()
        ));
        if let Some(published) = &chapter.published_date {
            text.push_str(&format!("  ({})", published.display_date()));
        }
        text.push('\n');
    }
    text
}
