//! Source adapters: anything that can enumerate entries.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use importer_logging::{import_debug, import_warn};
use serde::Deserialize;
use url::Url;

use crate::config::{ConfigError, SourceConfig};
use crate::fetch::Fetcher;
use crate::types::{Author, ContentType, Entry, EntryStatus, FetchError, PathOverride};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {location}: {message}")]
    Read { location: String, message: String },
    #[error("failed to parse {location}: {message}")]
    Parse { location: String, message: String },
    #[error("failed to fetch {location}: {source}")]
    Fetch {
        location: String,
        source: FetchError,
    },
}

/// Per-instance override: `(url, fallback_path) -> Some(Skip | Path) | None`.
pub type PathOverrideFn = Arc<dyn Fn(&str, &str) -> Option<PathOverride> + Send + Sync>;

pub trait Source: Send + Sync {
    fn kind(&self) -> &'static str;

    fn label(&self) -> &str;

    /// Only entries dated at or after `within` are produced.
    fn set_within(&mut self, within: Option<DateTime<Utc>>);

    /// Whether entries may be emitted as markdown when that is the output format.
    fn supports_markdown(&self) -> bool {
        true
    }

    /// Source-specific output path for `url`, used instead of the URL path.
    fn fallback_path(&self, _url: &Url) -> Option<String> {
        None
    }

    fn path_override(&self, _url: &str, _fallback: &str) -> Option<PathOverride> {
        None
    }

    /// Drain this source. The stream is finite and should be consumed once.
    fn entries(&mut self) -> BoxStream<'_, Result<Entry, SourceError>>;
}

/// Turn a one-shot load into an entry stream, applying the `within` cutoff.
fn entry_stream<'a, F>(load: F, within: Option<DateTime<Utc>>) -> BoxStream<'a, Result<Entry, SourceError>>
where
    F: std::future::Future<Output = Result<Vec<Entry>, SourceError>> + Send + 'a,
{
    stream::once(load)
        .map(move |loaded| match loaded {
            Ok(entries) => stream::iter(
                entries
                    .into_iter()
                    .filter(move |entry| within.is_none_or(|cutoff| entry.date >= cutoff))
                    .map(Ok),
            )
            .left_stream(),
            Err(err) => stream::iter(vec![Err(err)]).right_stream(),
        })
        .flatten()
        .boxed()
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::None => Vec::new(),
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntryRecord {
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "contentType")]
    content_type: ContentType,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    date: DateTime<Utc>,
    #[serde(default)]
    tags: OneOrMany,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    status: EntryStatus,
    #[serde(default)]
    media: BTreeMap<String, String>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Entries stored as a JSON array in a local file.
pub struct JsonFileSource {
    path: PathBuf,
    label: String,
    within: Option<DateTime<Utc>>,
    path_override: Option<PathOverrideFn>,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string());
        Self {
            path,
            label,
            within: None,
            path_override: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_path_override(mut self, path_override: PathOverrideFn) -> Self {
        self.path_override = Some(path_override);
        self
    }

    fn load(path: PathBuf, label: String) -> Result<Vec<Entry>, SourceError> {
        let location = path.display().to_string();
        let raw = fs::read_to_string(&path).map_err(|err| SourceError::Read {
            location: location.clone(),
            message: err.to_string(),
        })?;
        let records: Vec<EntryRecord> =
            serde_json::from_str(&raw).map_err(|err| SourceError::Parse {
                location,
                message: err.to_string(),
            })?;
        Ok(records
            .into_iter()
            .map(|record| {
                let mut entry = Entry::new(record.url, record.date);
                if let Some(uuid) = record.uuid {
                    entry.uuid = uuid;
                }
                entry.content = record.content;
                entry.content_type = record.content_type;
                entry.title = record.title;
                entry.authors = record.authors;
                entry.tags = record.tags.into_vec();
                entry.kind = record.kind.unwrap_or_else(|| "json".to_string());
                entry.status = record.status;
                entry.media = record.media;
                entry.metadata = record.metadata;
                entry.source = label.clone();
                entry
            })
            .collect())
    }
}

impl Source for JsonFileSource {
    fn kind(&self) -> &'static str {
        "json"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn set_within(&mut self, within: Option<DateTime<Utc>>) {
        self.within = within;
    }

    fn path_override(&self, url: &str, fallback: &str) -> Option<PathOverride> {
        self.path_override.as_ref().and_then(|f| f(url, fallback))
    }

    fn entries(&mut self) -> BoxStream<'_, Result<Entry, SourceError>> {
        let path = self.path.clone();
        let label = self.label.clone();
        entry_stream(async move { Self::load(path, label) }, self.within)
    }
}

#[derive(Debug, Deserialize)]
struct JsonFeed {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<FeedAuthor>,
    #[serde(default)]
    author: Option<FeedAuthor>,
    #[serde(default)]
    items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedAttachment {
    url: String,
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    id: serde_json::Value,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content_html: Option<String>,
    #[serde(default)]
    content_text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    banner_image: Option<String>,
    #[serde(default)]
    date_published: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    date_modified: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    authors: Vec<FeedAuthor>,
    #[serde(default)]
    author: Option<FeedAuthor>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    attachments: Vec<FeedAttachment>,
}

/// A remote JSON Feed (version 1 or 1.1) document.
pub struct JsonFeedSource {
    feed_url: Url,
    label: String,
    http: Arc<dyn Fetcher>,
    within: Option<DateTime<Utc>>,
    path_override: Option<PathOverrideFn>,
}

impl JsonFeedSource {
    pub fn new(feed_url: Url, http: Arc<dyn Fetcher>) -> Self {
        let label = feed_url.host_str().unwrap_or("jsonfeed").to_string();
        Self {
            feed_url,
            label,
            http,
            within: None,
            path_override: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_path_override(mut self, path_override: PathOverrideFn) -> Self {
        self.path_override = Some(path_override);
        self
    }

    async fn load(
        http: Arc<dyn Fetcher>,
        feed_url: Url,
        label: String,
    ) -> Result<Vec<Entry>, SourceError> {
        let location = feed_url.to_string();
        let output = http
            .fetch(feed_url.as_str())
            .await
            .map_err(|source| SourceError::Fetch {
                location: location.clone(),
                source,
            })?;
        let feed: JsonFeed =
            serde_json::from_slice(&output.bytes).map_err(|err| SourceError::Parse {
                location: location.clone(),
                message: err.to_string(),
            })?;

        let feed_authors: Vec<FeedAuthor> = feed.authors.into_iter().chain(feed.author).collect();
        let mut entries = Vec::with_capacity(feed.items.len());
        for item in feed.items {
            match feed_item_to_entry(item, &feed_url, &feed_authors, &label) {
                Some(entry) => entries.push(entry),
                None => import_warn!("Skipping {location} item without url or date"),
            }
        }
        if let Some(title) = feed.title {
            import_debug!("Loaded {} items from {title}", entries.len());
        }
        Ok(entries)
    }
}

fn feed_item_to_entry(
    item: FeedItem,
    feed_url: &Url,
    feed_authors: &[FeedAuthor],
    label: &str,
) -> Option<Entry> {
    let id = match &item.id {
        serde_json::Value::String(id) => id.clone(),
        other => other.to_string(),
    };
    let url = item
        .url
        .or(item.external_url)
        .or_else(|| Url::parse(&id).ok().map(String::from))?;
    // Relative item URLs are resolved against the feed.
    let url = feed_url.join(&url).ok()?.to_string();
    let date = item.date_published.or(item.date_modified)?;

    let mut entry = Entry::new(url, date.with_timezone(&Utc));
    entry.uuid = id;
    entry.kind = "jsonfeed".to_string();
    entry.title = item.title;
    entry.source = label.to_string();
    (entry.content, entry.content_type) = match (item.content_html, item.content_text) {
        (Some(html), _) => (html, ContentType::Html),
        (None, Some(text)) => (text, ContentType::Text),
        (None, None) => (item.summary.unwrap_or_default(), ContentType::Text),
    };

    let item_authors: Vec<FeedAuthor> = item.authors.into_iter().chain(item.author).collect();
    let authors = if item_authors.is_empty() {
        feed_authors.to_vec()
    } else {
        item_authors
    };
    entry.authors = authors
        .into_iter()
        .filter_map(|author| {
            author.name.map(|name| Author {
                name,
                url: author.url,
            })
        })
        .collect();
    entry.tags = item.tags;

    if let Some(image) = item.image {
        entry.media.insert("image".to_string(), image);
    }
    if let Some(banner) = item.banner_image {
        entry.media.insert("banner".to_string(), banner);
    }
    for attachment in item.attachments {
        entry.media.insert(attachment.mime_type, attachment.url);
    }
    Some(entry)
}

impl Source for JsonFeedSource {
    fn kind(&self) -> &'static str {
        "jsonfeed"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn set_within(&mut self, within: Option<DateTime<Utc>>) {
        self.within = within;
    }

    fn path_override(&self, url: &str, fallback: &str) -> Option<PathOverride> {
        self.path_override.as_ref().and_then(|f| f(url, fallback))
    }

    fn entries(&mut self) -> BoxStream<'_, Result<Entry, SourceError>> {
        let load = Self::load(self.http.clone(), self.feed_url.clone(), self.label.clone());
        entry_stream(load, self.within)
    }
}

/// Shared collaborators handed to source constructors.
#[derive(Clone)]
pub struct SourceContext {
    pub http: Arc<dyn Fetcher>,
}

pub type SourceFactory = fn(&SourceConfig, &SourceContext) -> Result<Box<dyn Source>, ConfigError>;

/// Maps a source type tag to its constructor.
#[derive(Default)]
pub struct SourceRegistry {
    factories: HashMap<&'static str, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", build_json_file);
        registry.register("jsonfeed", build_json_feed);
        registry
    }

    pub fn register(&mut self, kind: &'static str, factory: SourceFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn build(
        &self,
        config: &SourceConfig,
        context: &SourceContext,
    ) -> Result<Box<dyn Source>, ConfigError> {
        let factory = self
            .factories
            .get(config.kind.trim().to_ascii_lowercase().as_str())
            .ok_or_else(|| ConfigError::UnsupportedSource(config.kind.clone()))?;
        factory(config, context)
    }
}

fn build_json_file(
    config: &SourceConfig,
    _context: &SourceContext,
) -> Result<Box<dyn Source>, ConfigError> {
    let mut source = JsonFileSource::new(&config.location);
    if let Some(label) = &config.label {
        source = source.with_label(label);
    }
    Ok(Box::new(source))
}

fn build_json_feed(
    config: &SourceConfig,
    context: &SourceContext,
) -> Result<Box<dyn Source>, ConfigError> {
    let url = Url::parse(&config.location).map_err(|err| ConfigError::InvalidLocation {
        location: config.location.clone(),
        message: err.to_string(),
    })?;
    let mut source = JsonFeedSource::new(url, context.http.clone());
    if let Some(label) = &config.label {
        source = source.with_label(label);
    }
    Ok(Box::new(source))
}
