use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Native markup of an entry body as the source produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Text,
    Markdown,
}

/// Format of the documents written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Published,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One content item as a source adapter produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub url: String,
    pub content: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub authors: Vec<Author>,
    pub date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub uuid: String,
    pub kind: String,
    pub status: EntryStatus,
    /// Related media keyed by media type (e.g. `image`), resolved to local references before write.
    pub media: BTreeMap<String, String>,
    /// Extra source metadata carried into the front matter `metadata` block.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Display label of the source that produced this entry.
    pub source: String,
}

impl Entry {
    /// Minimal published HTML entry; sources fill in the rest.
    pub fn new(url: impl Into<String>, date: DateTime<Utc>) -> Self {
        let url = url.into();
        Self {
            uuid: url.clone(),
            url,
            content: String::new(),
            content_type: ContentType::Html,
            title: None,
            authors: Vec::new(),
            date,
            tags: Vec::new(),
            kind: String::new(),
            status: EntryStatus::Published,
            media: BTreeMap::new(),
            metadata: BTreeMap::new(),
            source: String::new(),
        }
    }

    pub fn is_draft(&self) -> bool {
        self.status == EntryStatus::Draft
    }
}

/// Output location of an entry, fixed once before transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePath {
    Path(PathBuf),
    Skip,
}

impl FilePath {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            FilePath::Path(path) => Some(path),
            FilePath::Skip => None,
        }
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilePath::Path(path) => write!(f, "{}", path.display()),
            FilePath::Skip => write!(f, "(skip)"),
        }
    }
}

/// Result of a per-instance path override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOverride {
    /// Never write this entry.
    Skip,
    /// Use this path verbatim, extension included.
    Path(String),
}

/// An entry paired with its output path and target format.
///
/// The path is set on construction and only readable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    entry: Entry,
    file_path: FilePath,
    target: OutputFormat,
}

impl ResolvedEntry {
    pub fn new(entry: Entry, file_path: FilePath, target: OutputFormat) -> Self {
        Self {
            entry,
            file_path,
            target,
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn entry_mut(&mut self) -> &mut Entry {
        &mut self.entry
    }

    pub fn file_path(&self) -> &FilePath {
        &self.file_path
    }

    pub fn target(&self) -> OutputFormat {
        self.target
    }
}

/// A transform failure for one entry; the entry is dropped from the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub found: usize,
    pub skipped: usize,
    pub failures: Vec<EntryFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub skipped: usize,
    pub persisted: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetStats {
    pub fetched: usize,
    pub cached: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    pub converted: usize,
    pub cleaned: usize,
}

/// Totals for a whole run, summed from the per-stage reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub pipeline: PipelineReport,
    pub write: WriteReport,
    pub assets: AssetStats,
    pub convert: ConvertStats,
    pub dry_run: bool,
    pub elapsed: std::time::Duration,
}

impl RunReport {
    pub fn errors(&self) -> usize {
        self.pipeline.failures.len()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {written} of {found} documents, {fetched} assets ({cached} cached, {cleaned} cleaned), {skipped} skipped, {errors} errors in {secs:.2}s",
            written = self.write.written,
            found = self.pipeline.found,
            fetched = self.assets.fetched,
            cached = self.assets.cached,
            cleaned = self.convert.cleaned,
            skipped = self.pipeline.skipped + self.write.skipped,
            errors = self.errors(),
            secs = self.elapsed.as_secs_f64(),
        )?;
        if self.dry_run {
            write!(f, " (dry run)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}
