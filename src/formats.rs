use std::collections::HashSet;
use std::fmt;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp as written by the publishing scripts.
///
/// Manifests mix RFC 3339, `2025-01-02 03:04:05 UTC` and bare dates, so the raw
/// string is kept and parsed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S UTC", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(parsed.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Calendar date for display, falling back to the raw text.
    pub fn display_date(&self) -> String {
        match self.to_utc() {
            Some(parsed) => parsed.format("%Y-%m-%d").to_string(),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `chapters.json` of a single book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterManifest {
    #[serde(rename = "novel_title")]
    pub book_title: String,
    pub total_chapters: u32,
    pub last_updated: Timestamp,
    #[serde(default, deserialize_with = "null_as_false")]
    pub completed: bool,
    pub chapters: Vec<ChapterRef>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChapterManifest {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let manifest: Self = serde_json::from_str(text).context("parse chapters manifest json")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::with_capacity(self.chapters.len());
        for chapter in &self.chapters {
            if !seen.insert(chapter.chapter_number) {
                anyhow::bail!(
                    "duplicate chapter number in manifest: {}",
                    chapter.chapter_number
                );
            }
        }
        Ok(())
    }

    pub fn find(&self, chapter_number: u32) -> Option<&ChapterRef> {
        self.chapters
            .iter()
            .find(|chapter| chapter.chapter_number == chapter_number)
    }

    /// Index of the chapter in reading order.
    pub fn position(&self, chapter_number: u32) -> Option<usize> {
        self.chapters
            .iter()
            .position(|chapter| chapter.chapter_number == chapter_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    #[serde(rename = "chapter")]
    pub chapter_number: u32,
    #[serde(rename = "url")]
    pub remote_url: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<Timestamp>,
}

impl ChapterRef {
    pub fn display_title(&self) -> String {
        match self.chapter_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("Chapter {}", self.chapter_number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedChapter {
    pub title: String,
    pub html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "novel_title": "X",
        "total_chapters": 2,
        "last_updated": "2025-10-14 06:00:12 UTC",
        "chapters": [
            {"chapter": 2, "url": "u2", "filename": "c2.md", "chapter_name": "The Second"},
            {"chapter": 1, "url": "u1", "filename": "c1.md", "published_date": "2025-10-01"}
        ]
    }"#;

    #[test]
    fn manifest_keeps_reading_order_and_defaults_completed() -> anyhow::Result<()> {
        let manifest = ChapterManifest::from_json(MANIFEST)?;

        assert_eq!(manifest.book_title, "X");
        assert!(!manifest.completed);
        let numbers: Vec<u32> = manifest.chapters.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![2, 1]);
        assert_eq!(manifest.position(1), Some(1));
        assert_eq!(manifest.find(2).map(|c| c.filename.as_str()), Some("c2.md"));
        assert!(manifest.find(3).is_none());
        Ok(())
    }

    #[test]
    fn manifest_treats_null_completed_as_ongoing() -> anyhow::Result<()> {
        let json = r#"{
            "novel_title": "X",
            "total_chapters": 0,
            "last_updated": "2025-01-01",
            "completed": null,
            "chapters": []
        }"#;
        assert!(!ChapterManifest::from_json(json)?.completed);

        let done = json.replace("null", "true");
        assert!(ChapterManifest::from_json(&done)?.completed);
        Ok(())
    }

    #[test]
    fn manifest_rejects_duplicate_chapter_numbers() {
        let json = r#"{
            "novel_title": "X",
            "total_chapters": 2,
            "last_updated": "2025-01-01",
            "chapters": [
                {"chapter": 1, "url": "u1", "filename": "c1.md"},
                {"chapter": 1, "url": "u2", "filename": "c2.md"}
            ]
        }"#;

        let err = ChapterManifest::from_json(json).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate chapter number"));
    }

    #[test]
    fn timestamp_parses_script_formats() {
        let utc_suffix = Timestamp::new("2025-10-14 06:00:12 UTC");
        let rfc3339 = Timestamp::new("2025-10-14T08:00:12+02:00");
        let date_only = Timestamp::new("2025-10-14");
        let garbage = Timestamp::new("yesterday");

        assert_eq!(utc_suffix.to_utc(), rfc3339.to_utc());
        assert_eq!(date_only.display_date(), "2025-10-14");
        assert!(garbage.to_utc().is_none());
        assert_eq!(garbage.display_date(), "yesterday");
    }

    #[test]
    fn display_title_falls_back_to_chapter_number() {
        let mut chapter = ChapterRef {
            chapter_number: 7,
            remote_url: "u".to_owned(),
            filename: "c7.md".to_owned(),
            chapter_name: None,
            published_date: None,
        };
        assert_eq!(chapter.display_title(), "Chapter 7");

        chapter.chapter_name = Some("  ".to_owned());
        assert_eq!(chapter.display_title(), "Chapter 7");

        chapter.chapter_name = Some("Ashes".to_owned());
        assert_eq!(chapter.display_title(), "Ashes");
    }
}
