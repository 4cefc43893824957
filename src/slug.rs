use crate::formats::ChapterRef;

/// URL-friendly form of a chapter name: `"The Long Night!"` -> `"the_long_night"`.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for ch in text.trim().to_lowercase().chars() {
        if ch.is_whitespace() || ch == '_' {
            pending_separator = true;
        } else if ch.is_ascii_alphanumeric() || ch == '-' {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch);
        }
    }

    slug
}

/// First chapter whose name slugifies to `slug`. Unnamed chapters never match.
pub fn find_chapter_by_slug<'a>(chapters: &'a [ChapterRef], slug: &str) -> Option<&'a ChapterRef> {
    if slug.is_empty() {
        return None;
    }
    chapters.iter().find(|chapter| {
        chapter
            .chapter_name
            .as_deref()
            .is_some_and(|name| slugify(name) == slug)
    })
}
