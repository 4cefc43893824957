use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::SourceArgs;

pub const DEFAULT_REMOTE_BASE_URL: &str = "https://gist.githubusercontent.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookKind {
    #[default]
    Novel,
    Poems,
    ShortStories,
    Drama,
}

impl BookKind {
    pub fn group_title(self) -> &'static str {
        match self {
            Self::Novel => "Novels",
            Self::Poems => "Poetry Collections",
            Self::ShortStories => "Short Stories",
            Self::Drama => "Drama",
        }
    }

    /// "3 Poems Available", "1 Short Story Available", ...
    pub fn content_label(self, count: u32) -> String {
        let unit = match (self, count == 1) {
            (Self::Novel, true) => "Chapter",
            (Self::Novel, false) => "Chapters",
            (Self::Poems, true) => "Poem",
            (Self::Poems, false) => "Poems",
            (Self::ShortStories, true) => "Short Story",
            (Self::ShortStories, false) => "Short Stories",
            (Self::Drama, true) => "Scene",
            (Self::Drama, false) => "Scenes",
        };
        format!("{count} {unit} Available")
    }
}

/// Where the remote copy of a book lives: `{base}/{owner}/{id}/raw/...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub owner: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    pub title: String,
    pub remote: RemoteLocation,
    pub local_path: String,
    #[serde(default)]
    pub kind: BookKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredBook {
    pub key: String,
    #[serde(flatten)]
    pub config: BookConfig,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    fallback: Option<BookConfig>,
    books: Vec<RegisteredBook>,
}

/// Read-only table of known books.
#[derive(Debug, Clone)]
pub struct Registry {
    books: Vec<RegisteredBook>,
    fallback: BookConfig,
}

const BUILTIN_BOOKS: &[(&str, &str, &str, &str, BookKind)] = &[
    (
        "weight_of_promises",
        "The Weight of Promises",
        "51893c25959355bda1884804375ec3d8",
        "docs/novel-gist",
        BookKind::Novel,
    ),
    (
        "indifferent_shore",
        "The Indifferent Shore",
        "b12ff3b5ea6e9f42a7becfc2cc1aeece",
        "docs/stranger-novel",
        BookKind::Novel,
    ),
    (
        "moonbound_devotion",
        "Moonbound Devotion",
        "af676da598e2040a0cdd2cb4b9ca48e3",
        "docs/werewolf-novel",
        BookKind::Novel,
    ),
    (
        "flying_banana",
        "Flying Banana",
        "efc9cfe56f7bc265ec0043f0ffbd533c",
        "docs/flying-banana",
        BookKind::ShortStories,
    ),
    (
        "hydrogen_jukebox",
        "Hydrogen Jukebox",
        "f80e0314b03be59d97a32e27f1fce44c",
        "docs/hydrogen-jukebox",
        BookKind::Poems,
    ),
    (
        "of_old_man",
        "Of Old Man",
        "9fa4af8eb29c0097cc525f2d38503c2e",
        "docs/of-old-man",
        BookKind::Poems,
    ),
    (
        "sun_also_rises_again",
        "The Sun Also Rises Again",
        "a438cb90b4c76029c58cf54d66b22135",
        "docs/hemingway-novel",
        BookKind::Novel,
    ),
    (
        "clueless_mind",
        "Clueless Mind",
        "3a3f09a5c44889a6f40419f080b15437",
        "docs/clueless-mind",
        BookKind::Novel,
    ),
    (
        "absurd_ascent",
        "The Absurd Ascent",
        "e8e6f2e6c00d3abcf9a407e2d014d8bd",
        "docs/farce-drama",
        BookKind::Drama,
    ),
    (
        "bureaucratic_odyssey",
        "The Bureaucratic Odyssey",
        "",
        "docs/satire-novel",
        BookKind::Novel,
    ),
];

const BUILTIN_OWNER: &str = "pappater";

impl Registry {
    pub fn new(books: Vec<RegisteredBook>, fallback: BookConfig) -> anyhow::Result<Self> {
        let mut seen = HashSet::with_capacity(books.len());
        for book in &books {
            if book.key.trim().is_empty() {
                anyhow::bail!("registry book key must not be empty ({})", book.config.title);
            }
            if !seen.insert(book.key.as_str()) {
                anyhow::bail!("duplicate registry book key: {}", book.key);
            }
        }
        Ok(Self { books, fallback })
    }

    /// The books published by the upstream project.
    pub fn builtin() -> Self {
        let books = BUILTIN_BOOKS
            .iter()
            .map(|&(key, title, id, local_path, kind)| RegisteredBook {
                key: key.to_owned(),
                config: BookConfig {
                    title: title.to_owned(),
                    remote: RemoteLocation {
                        owner: BUILTIN_OWNER.to_owned(),
                        id: id.to_owned(),
                    },
                    local_path: local_path.to_owned(),
                    kind,
                },
            })
            .collect();

        Self {
            books,
            fallback: builtin_fallback(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(yaml).context("parse registry yaml")?;
        let fallback = file.fallback.unwrap_or_else(builtin_fallback);
        Self::new(file.books, fallback)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read registry: {}", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("load registry: {}", path.display()))
    }

    pub fn from_args(args: &SourceArgs) -> anyhow::Result<Self> {
        match args.registry.as_deref() {
            Some(path) => Self::load(Path::new(path)),
            None => Ok(Self::builtin()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&BookConfig> {
        self.books
            .iter()
            .find(|book| book.key == key)
            .map(|book| &book.config)
    }

    /// Config for `key`, or the fallback book when the key is unknown.
    pub fn resolve(&self, key: &str) -> &BookConfig {
        self.get(key).unwrap_or(&self.fallback)
    }

    pub fn books(&self) -> &[RegisteredBook] {
        &self.books
    }

    pub fn fallback(&self) -> &BookConfig {
        &self.fallback
    }
}

fn builtin_fallback() -> BookConfig {
    BookConfig {
        title: "The Weight of Promises".to_owned(),
        remote: RemoteLocation {
            owner: BUILTIN_OWNER.to_owned(),
            id: "51893c25959355bda1884804375ec3d8".to_owned(),
        },
        local_path: "docs/novel-gist".to_owned(),
        kind: BookKind::Novel,
    }
}

/// Root under which each book's `local_path` snapshot is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalRoot {
    Dir(PathBuf),
    Http(Url),
}

impl LocalRoot {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let mut url = Url::parse(trimmed).context("parse local root url")?;
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            return Ok(Self::Http(url));
        }
        Ok(Self::Dir(PathBuf::from(trimmed)))
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub remote_base_url: Url,
    pub local_root: LocalRoot,
    /// Per-attempt request timeout; `None` leaves the client default.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl FetchSettings {
    pub fn new(remote_base_url: Url, local_root: LocalRoot) -> Self {
        Self {
            remote_base_url,
            local_root,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            user_agent: format!("rabbit/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn from_args(args: &SourceArgs) -> anyhow::Result<Self> {
        let remote_base_url =
            Url::parse(&args.remote_base_url).context("parse --remote-base-url")?;
        if remote_base_url.cannot_be_a_base() {
            anyhow::bail!("--remote-base-url must be a base url: {remote_base_url}");
        }
        let local_root = LocalRoot::parse(&args.local_root).context("parse --local-root")?;

        let mut settings = Self::new(remote_base_url, local_root);
        settings.timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
        Ok(settings)
    }
}
