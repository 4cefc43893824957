//! Two-tier retrieval of manifests and chapter bodies.
//!
//! Every resource is tried at its remote location first and at the bundled
//! local snapshot second. A remote failure is only logged; an error reaches the
//! caller only when the local copy fails too.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use reqwest::header::USER_AGENT;
use thiserror::Error;
use url::Url;

use crate::cli::SourceArgs;
use crate::config::{BookConfig, FetchSettings, LocalRoot, Registry};
use crate::formats::{ChapterManifest, ChapterRef};

const MANIFEST_FILENAME: &str = "chapters.json";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("chapters manifest for `{book}` is unavailable")]
    ManifestUnavailable {
        book: String,
        #[source]
        source: TierError,
    },
    #[error("chapter file `{filename}` of `{book}` is unavailable")]
    ChapterUnavailable {
        book: String,
        filename: String,
        #[source]
        source: TierError,
    },
    #[error("chapter {chapter} is not in the manifest")]
    ChapterNotFound { chapter: u32 },
    #[error("no chapter named `{slug}` in the manifest")]
    SlugNotFound { slug: String },
}

impl FetchError {
    /// HTTP status of the last attempt, when it got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ManifestUnavailable { source, .. } | Self::ChapterUnavailable { source, .. } => {
                source.status()
            }
            Self::ChapterNotFound { .. } | Self::SlugNotFound { .. } => None,
        }
    }
}

/// Failure of a single attempt at one location.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("no usable location: {0}")]
    NoLocation(String),
    #[error("GET {url}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url}: status {status}")]
    Status { url: Url, status: reqwest::StatusCode },
    #[error("read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decode {location}")]
    Decode {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

impl TierError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Request { source, .. } => source.status().map(|status| status.as_u16()),
            Self::NoLocation(_) | Self::Read { .. } | Self::Decode { .. } => None,
        }
    }
}

/// A concrete place to read one resource from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(Url),
    File(PathBuf),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// `{base}/{owner}/{id}/raw/chapters.json`
pub fn remote_manifest_url(base: &Url, book: &BookConfig) -> Result<Url, TierError> {
    let owner = book.remote.owner.trim();
    let id = book.remote.id.trim();
    if owner.is_empty() || id.is_empty() {
        return Err(TierError::NoLocation(format!(
            "book `{}` has no remote owner/id",
            book.title
        )));
    }

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| TierError::NoLocation(format!("remote base is not a base url: {base}")))?
        .pop_if_empty()
        .extend([owner, id, "raw", MANIFEST_FILENAME]);
    Ok(url)
}

/// `{local_root}/{local_path}/{filename}`
pub fn local_locator(root: &LocalRoot, local_path: &str, filename: &str) -> Result<Locator, TierError> {
    let mut segments = Vec::new();
    for part in [local_path, filename] {
        for segment in part.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(TierError::NoLocation(format!(
                        "local path must not contain '..': {local_path}/{filename}"
                    )));
                }
                _ => segments.push(segment),
            }
        }
    }
    if segments.is_empty() {
        return Err(TierError::NoLocation("empty local path".to_owned()));
    }

    match root {
        LocalRoot::Dir(dir) => {
            let mut path = dir.clone();
            for segment in &segments {
                path.push(segment);
            }
            Ok(Locator::File(path))
        }
        LocalRoot::Http(base) => {
            let mut url = base.clone();
            url.path_segments_mut()
                .map_err(|()| TierError::NoLocation(format!("local root is not a base url: {base}")))?
                .pop_if_empty()
                .extend(&segments);
            Ok(Locator::Url(url))
        }
    }
}

/// Fetches book content through the remote/local fallback.
///
/// Cloning is cheap; clones share the registry, settings and HTTP connection pool.
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    registry: Arc<Registry>,
    settings: Arc<FetchSettings>,
    client: reqwest::Client,
}

impl ContentFetcher {
    pub fn new(registry: Registry, settings: FetchSettings) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(10));
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("build content http client")?;

        Ok(Self {
            registry: Arc::new(registry),
            settings: Arc::new(settings),
            client,
        })
    }

    pub fn from_args(args: &SourceArgs) -> anyhow::Result<Self> {
        let registry = Registry::from_args(args).context("load book registry")?;
        let settings = FetchSettings::from_args(args).context("build fetch settings")?;
        Self::new(registry, settings)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn resolve_book_config(&self, book_key: &str) -> &BookConfig {
        self.registry.resolve(book_key)
    }

    pub async fn fetch_manifest(&self, book_key: &str) -> Result<ChapterManifest, FetchError> {
        let book = self.resolve_book_config(book_key);
        let remote = remote_manifest_url(&self.settings.remote_base_url, book).map(Locator::Url);
        let local = local_locator(&self.settings.local_root, &book.local_path, MANIFEST_FILENAME);

        tracing::debug!(book = book_key, "fetch chapters manifest");
        self.fetch_two_tier(remote, local, |text| ChapterManifest::from_json(&text))
            .await
            .map_err(|source| FetchError::ManifestUnavailable {
                book: book_key.to_owned(),
                source,
            })
    }

    pub async fn fetch_chapter_body(
        &self,
        remote_url: &str,
        filename: &str,
        book_key: &str,
    ) -> Result<String, FetchError> {
        let book = self.resolve_book_config(book_key);
        let remote = Url::parse(remote_url)
            .map(Locator::Url)
            .map_err(|err| TierError::NoLocation(format!("invalid chapter url {remote_url:?}: {err}")));
        let local = local_locator(&self.settings.local_root, &book.local_path, filename);

        tracing::debug!(book = book_key, filename, "fetch chapter body");
        self.fetch_two_tier(remote, local, Ok)
            .await
            .map_err(|source| FetchError::ChapterUnavailable {
                book: book_key.to_owned(),
                filename: filename.to_owned(),
                source,
            })
    }

    /// Looks up `chapter_number` in `manifest` and fetches its body.
    pub async fn fetch_chapter<'m>(
        &self,
        manifest: &'m ChapterManifest,
        chapter_number: u32,
        book_key: &str,
    ) -> Result<(&'m ChapterRef, String), FetchError> {
        let chapter = manifest
            .find(chapter_number)
            .ok_or(FetchError::ChapterNotFound {
                chapter: chapter_number,
            })?;
        let body = self
            .fetch_chapter_body(&chapter.remote_url, &chapter.filename, book_key)
            .await?;
        Ok((chapter, body))
    }

    /// Tries `remote`, then `local`. Only the local outcome is ever returned as an error.
    async fn fetch_two_tier<T, D>(
        &self,
        remote: Result<Locator, TierError>,
        local: Result<Locator, TierError>,
        decode: D,
    ) -> Result<T, TierError>
    where
        D: Fn(String) -> anyhow::Result<T>,
    {
        match remote {
            Ok(locator) => match self.attempt(&locator, &decode).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        location = %locator,
                        error = %format!("{:#}", anyhow::Error::from(err)),
                        "remote fetch failed; trying local copy"
                    );
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "remote location unavailable; trying local copy");
            }
        }

        let locator = local?;
        let result = self.attempt(&locator, &decode).await;
        if let Err(err) = &result {
            tracing::debug!(location = %locator, error = %err, "local fetch failed");
        }
        result
    }

    async fn attempt<T, D>(&self, locator: &Locator, decode: &D) -> Result<T, TierError>
    where
        D: Fn(String) -> anyhow::Result<T>,
    {
        let text = self.read(locator).await?;
        decode(text).map_err(|source| TierError::Decode {
            location: locator.to_string(),
            source,
        })
    }

    async fn read(&self, locator: &Locator) -> Result<String, TierError> {
        match locator {
            Locator::Url(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .header(USER_AGENT, self.settings.user_agent.as_str())
                    .send()
                    .await
                    .map_err(|source| TierError::Request {
                        url: url.clone(),
                        source,
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(TierError::Status {
                        url: url.clone(),
                        status,
                    });
                }

                response.text().await.map_err(|source| TierError::Request {
                    url: url.clone(),
                    source,
                })
            }
            Locator::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| TierError::Read {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }
}
