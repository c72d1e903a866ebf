use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use importer_logging::{import_debug, import_warn};
use tokio::sync::OnceCell;
use url::Url;

use crate::config::{AssetMode, ImportOptions};
use crate::dircache::DirectoryCache;
use crate::fetch::Fetcher;
use crate::filename::content_hash;
use crate::persist::write_atomic;
use crate::types::{AssetStats, FailureKind, FetchError};

/// Turns a remote asset URL into a reference usable from a given document.
#[async_trait::async_trait]
pub trait AssetFetcher: Send + Sync {
    fn downloads_enabled(&self) -> bool;

    /// `document` is the output path of the entry the asset belongs to.
    async fn fetch_asset(&self, url: &str, document: &Path) -> Result<String, FetchError>;

    fn stats(&self) -> AssetStats;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSettings {
    pub output_folder: PathBuf,
    pub assets_folder: String,
    pub mode: AssetMode,
    pub dry_run: bool,
    pub safe_mode: bool,
    pub cache_duration: Duration,
}

impl AssetSettings {
    pub fn from_options(options: &ImportOptions) -> Self {
        Self {
            output_folder: options.output_folder.clone(),
            assets_folder: options.assets_folder.clone(),
            mode: options.assets,
            dry_run: options.dry_run,
            safe_mode: options.safe_mode,
            cache_duration: options.cache_duration,
        }
    }
}

type DownloadCell = Arc<OnceCell<Result<String, FetchError>>>;

/// Downloads assets into the output tree, once per storage location per run.
pub struct LocalAssetFetcher {
    http: Arc<dyn Fetcher>,
    settings: AssetSettings,
    dirs: Arc<DirectoryCache>,
    downloads: Mutex<HashMap<(PathBuf, String), DownloadCell>>,
    fetched: AtomicUsize,
    cached: AtomicUsize,
    failed: AtomicUsize,
}

impl LocalAssetFetcher {
    pub fn new(http: Arc<dyn Fetcher>, settings: AssetSettings, dirs: Arc<DirectoryCache>) -> Self {
        Self {
            http,
            settings,
            dirs,
            downloads: Mutex::new(HashMap::new()),
            fetched: AtomicUsize::new(0),
            cached: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn storage_dir(&self, document: &Path) -> PathBuf {
        match self.settings.mode {
            AssetMode::Colocate => document
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.settings.output_folder.clone()),
            _ => self.settings.output_folder.join(&self.settings.assets_folder),
        }
    }

    fn cell_for(&self, dir: &Path, url: &str) -> DownloadCell {
        let mut downloads = self
            .downloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        downloads
            .entry((dir.to_path_buf(), url.to_string()))
            .or_default()
            .clone()
    }

    fn reference(&self, document: &Path, dir: &Path, file_name: &str) -> String {
        match self.settings.mode {
            AssetMode::Relative => {
                let from = document.parent().unwrap_or_else(|| Path::new(""));
                relative_reference(from, &dir.join(file_name))
            }
            AssetMode::Absolute => format!(
                "/{}/{}",
                self.settings.assets_folder.trim_matches('/'),
                file_name
            ),
            AssetMode::Colocate | AssetMode::Disabled => file_name.to_string(),
        }
    }

    fn is_reusable(&self, path: &Path) -> bool {
        let Ok(meta) = fs::metadata(path) else {
            return false;
        };
        if self.settings.safe_mode {
            return true;
        }
        meta.modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age < self.settings.cache_duration)
    }

    /// A reusable earlier download of `hash`. Without a URL extension the
    /// stored name is whatever the content type gave last time.
    fn existing_name(&self, dir: &Path, hash: &str, hinted: Option<&str>) -> Option<String> {
        if let Some(ext) = hinted {
            let name = format!("{hash}.{ext}");
            return self.is_reusable(&dir.join(&name)).then_some(name);
        }
        let prefix = format!("{hash}.");
        fs::read_dir(dir)
            .ok()?
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .find(|name| name.starts_with(&prefix) && self.is_reusable(&dir.join(name)))
    }

    async fn download(&self, url: &str, dir: &Path) -> Result<String, FetchError> {
        let hash = content_hash(url);
        let hinted = extension_from_url(url);

        if let Some(name) = self.existing_name(dir, &hash, hinted.as_deref()) {
            self.cached.fetch_add(1, Ordering::Relaxed);
            import_debug!("Asset cache hit {url} -> {name}");
            return Ok(name);
        }

        let output = match self.http.fetch(url).await {
            Ok(output) => output,
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };
        let ext = hinted
            .or_else(|| {
                output
                    .metadata
                    .content_type
                    .as_deref()
                    .map(extension_from_content_type)
            })
            .unwrap_or_else(|| "bin".to_string());
        let name = format!("{hash}.{ext}");
        let target = dir.join(&name);

        if !self.settings.dry_run {
            let io_error = |message: String| FetchError::new(FailureKind::Io, message);
            self.dirs
                .ensure(&target)
                .map_err(|err| io_error(err.to_string()))?;
            write_atomic(&target, &output.bytes).map_err(|err| io_error(err.to_string()))?;
        }
        self.fetched.fetch_add(1, Ordering::Relaxed);
        import_debug!("Fetched asset {url} -> {}", target.display());
        Ok(name)
    }
}

#[async_trait::async_trait]
impl AssetFetcher for LocalAssetFetcher {
    fn downloads_enabled(&self) -> bool {
        self.settings.mode.downloads_enabled()
    }

    async fn fetch_asset(&self, url: &str, document: &Path) -> Result<String, FetchError> {
        if !self.downloads_enabled() {
            return Ok(url.to_string());
        }
        let dir = self.storage_dir(document);
        let cell = self.cell_for(&dir, url);
        let file_name = cell
            .get_or_init(|| self.download(url, &dir))
            .await
            .clone()
            .inspect_err(|err| import_warn!("Asset {url} unavailable: {err}"))?;
        Ok(self.reference(document, &dir, &file_name))
    }

    fn stats(&self) -> AssetStats {
        AssetStats {
            fetched: self.fetched.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Path from `from_dir` to `target`, `/`-separated.
pub fn relative_reference(from_dir: &Path, target: &Path) -> String {
    if from_dir.is_absolute() != target.is_absolute() {
        if let (Ok(from), Ok(to)) = (std::path::absolute(from_dir), std::path::absolute(target)) {
            return relative_reference(&from, &to);
        }
    }
    let from: Vec<Component> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let valid = (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

fn extension_from_content_type(content_type: &str) -> String {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    if mime == "application/octet-stream" {
        return "bin".to_string();
    }
    // Prefer the subtype itself when it is a known extension (`image/png` -> `png`).
    let subtype = mime.rsplit('/').next().unwrap_or_default();
    mime_guess::get_mime_extensions_str(&mime)
        .and_then(|exts| exts.iter().find(|ext| **ext == subtype).or_else(|| exts.first()))
        .map_or_else(|| "bin".to_string(), |ext| (*ext).to_string())
}
