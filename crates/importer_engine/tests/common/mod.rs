#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use importer_engine::{
    AssetFetcher, AssetStats, Collaborators, ConvertError, ConvertStats, DirectoryCache, Entry,
    FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher, MarkdownService,
    PathOverrideFn, PersistError, PersistMeta, PersistSink, Source, SourceError,
};
use url::Url;

pub fn date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid RFC3339 date")
        .with_timezone(&Utc)
}

pub fn entry(url: &str, raw_date: &str, content: &str) -> Entry {
    let mut entry = Entry::new(url, date(raw_date));
    entry.content = content.to_string();
    entry
}

/// In-memory source with optional path hooks.
pub struct StaticSource {
    pub label: String,
    pub entries: Vec<Entry>,
    pub within: Option<DateTime<Utc>>,
    pub markdown: bool,
    pub fallback: Option<fn(&Url) -> Option<String>>,
    pub path_override: Option<PathOverrideFn>,
    pub fail: bool,
}

impl StaticSource {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            label: "static".to_string(),
            entries,
            within: None,
            markdown: true,
            fallback: None,
            path_override: None,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn boxed(self) -> Box<dyn Source> {
        Box::new(self)
    }
}

impl Source for StaticSource {
    fn kind(&self) -> &'static str {
        "static"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn set_within(&mut self, within: Option<DateTime<Utc>>) {
        self.within = within;
    }

    fn supports_markdown(&self) -> bool {
        self.markdown
    }

    fn fallback_path(&self, url: &Url) -> Option<String> {
        self.fallback.and_then(|fallback| fallback(url))
    }

    fn path_override(
        &self,
        url: &str,
        fallback: &str,
    ) -> Option<importer_engine::PathOverride> {
        self.path_override
            .as_ref()
            .and_then(|path_override| path_override(url, fallback))
    }

    fn entries(&mut self) -> BoxStream<'_, Result<Entry, SourceError>> {
        if self.fail {
            return stream::iter(vec![Err(SourceError::Read {
                location: "static".to_string(),
                message: "boom".to_string(),
            })])
            .boxed();
        }
        let within = self.within;
        let entries: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| within.is_none_or(|cutoff| entry.date >= cutoff))
            .cloned()
            .map(Ok)
            .collect();
        stream::iter(entries).boxed()
    }
}

/// HTTP stand-in serving canned bodies and counting requests per URL.
#[derive(Default)]
pub struct StubFetcher {
    pub bodies: HashMap<String, (Vec<u8>, Option<String>)>,
    pub calls: Mutex<HashMap<String, usize>>,
}

impl StubFetcher {
    pub fn with(mut self, url: &str, body: &[u8], content_type: Option<&str>) -> Self {
        self.bodies.insert(
            url.to_string(),
            (body.to_vec(), content_type.map(str::to_string)),
        );
        self
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let (bytes, content_type) = self
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::new(FailureKind::HttpStatus(404), "not found"))?;
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

/// Asset fetcher that leaves every URL as is.
pub struct NoAssets;

#[async_trait::async_trait]
impl AssetFetcher for NoAssets {
    fn downloads_enabled(&self) -> bool {
        false
    }

    async fn fetch_asset(&self, url: &str, _document: &Path) -> Result<String, FetchError> {
        Ok(url.to_string())
    }

    fn stats(&self) -> AssetStats {
        AssetStats::default()
    }
}

/// Wraps the body in a marker; fails on bodies containing `FAIL`.
#[derive(Default)]
pub struct StubMarkdown {
    pub inits: AtomicUsize,
    pub cleanups: AtomicUsize,
    pub converted: AtomicUsize,
    pub selectors: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl MarkdownService for StubMarkdown {
    async fn init(&self) -> Result<(), ConvertError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn to_markdown(&self, html: &str, entry: &Entry) -> Result<String, ConvertError> {
        if html.contains("FAIL") {
            return Err(ConvertError::Failed {
                url: entry.url.clone(),
                message: "refused".to_string(),
            });
        }
        self.converted.fetch_add(1, Ordering::SeqCst);
        Ok(format!("md:{html}"))
    }

    fn add_preserved_selector(&self, selector: &str) {
        self.selectors.lock().unwrap().push(selector.to_string());
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn stats(&self) -> ConvertStats {
        ConvertStats {
            converted: self.converted.load(Ordering::SeqCst),
            cleaned: 0,
        }
    }
}

/// Persist sink that records what it was handed.
#[derive(Default)]
pub struct RecordingPersist {
    pub enabled: bool,
    pub files: Mutex<Vec<(PathBuf, String, PersistMeta)>>,
}

impl RecordingPersist {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _, _)| path.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl PersistSink for RecordingPersist {
    fn can_persist(&self) -> bool {
        self.enabled
    }

    async fn persist_file(
        &self,
        path: &Path,
        content: &str,
        meta: PersistMeta,
    ) -> Result<(), PersistError> {
        self.files
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string(), meta));
        Ok(())
    }

    fn persisted(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

pub struct Doubles {
    pub markdown: Arc<StubMarkdown>,
    pub persist: Arc<RecordingPersist>,
}

impl Doubles {
    pub fn new(persist: RecordingPersist) -> Self {
        Self {
            markdown: Arc::new(StubMarkdown::default()),
            persist: Arc::new(persist),
        }
    }

    pub fn collaborators(&self, dry_run: bool) -> Collaborators {
        Collaborators {
            assets: Arc::new(NoAssets),
            markdown: self.markdown.clone(),
            persist: self.persist.clone(),
            dirs: Arc::new(DirectoryCache::new(dry_run)),
        }
    }
}
