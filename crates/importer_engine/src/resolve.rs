use std::path::PathBuf;

use url::Url;

use crate::config::{AssetMode, ImportOptions};
use crate::filename::{content_hash, normalize_path};
use crate::source::Source;
use crate::types::{Entry, FilePath, OutputFormat, PathOverride};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot derive an output path from url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Computes the output path of an entry. Collisions are left for the writer to detect.
#[derive(Debug, Clone)]
pub struct PathResolver {
    output_folder: PathBuf,
    drafts_folder: String,
    colocate: bool,
}

impl PathResolver {
    pub fn new(output_folder: impl Into<PathBuf>, drafts_folder: impl Into<String>, assets: AssetMode) -> Self {
        Self {
            output_folder: output_folder.into(),
            drafts_folder: drafts_folder.into(),
            colocate: assets == AssetMode::Colocate,
        }
    }

    pub fn from_options(options: &ImportOptions) -> Self {
        Self::new(
            options.output_folder.clone(),
            options.drafts_folder.clone(),
            options.assets,
        )
    }

    /// Source-specific path, else the URL path; a bare `/` becomes a hash of the full URL.
    pub fn fallback_path(&self, entry: &Entry, source: &dyn Source) -> Result<String, ResolveError> {
        let url = Url::parse(&entry.url).map_err(|err| ResolveError::InvalidUrl {
            url: entry.url.clone(),
            message: err.to_string(),
        })?;
        let fallback = source
            .fallback_path(&url)
            .unwrap_or_else(|| url.path().to_string());
        if fallback == "/" {
            return Ok(content_hash(&entry.url));
        }
        Ok(fallback)
    }

    pub fn resolve(
        &self,
        entry: &Entry,
        source: &dyn Source,
        target: OutputFormat,
    ) -> Result<FilePath, ResolveError> {
        let fallback = self.fallback_path(entry, source)?;

        match source.path_override(&entry.url, &fallback) {
            Some(PathOverride::Skip) => return Ok(FilePath::Skip),
            Some(PathOverride::Path(path)) => return Ok(FilePath::Path(PathBuf::from(path))),
            None => {}
        }

        let mut base = self.output_folder.clone();
        if entry.is_draft() {
            base.push(&self.drafts_folder);
        }

        let normalized = normalize_path(&fallback);
        let ext = target.extension();
        let stem = normalized.trim_end_matches('/');
        let stem = if stem.is_empty() {
            content_hash(&entry.url)
        } else {
            stem.to_string()
        };

        let path = if normalized.ends_with('/') && self.colocate {
            base.join(stem).join(format!("index.{ext}"))
        } else {
            base.join(format!("{stem}.{ext}"))
        };
        Ok(FilePath::Path(path))
    }
}
