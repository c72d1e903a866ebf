use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use importer_logging::import_verbose;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("persist target missing or not a directory: {0}")]
    Target(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Write `content` to `target` through a temp file in the same directory, then rename.
///
/// The parent directory must already exist.
pub fn write_atomic(target: &Path, content: &[u8]) -> Result<(), PersistError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistKind {
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistMeta {
    pub url: String,
    pub kind: PersistKind,
}

/// Secondary sink that receives every published document after it is written.
#[async_trait::async_trait]
pub trait PersistSink: Send + Sync {
    fn can_persist(&self) -> bool;

    async fn persist_file(
        &self,
        path: &Path,
        content: &str,
        meta: PersistMeta,
    ) -> Result<(), PersistError>;

    fn persisted(&self) -> usize;
}

/// Mirrors documents into a second directory tree, keyed by their path
/// relative to the output folder.
#[derive(Debug)]
pub struct DirectoryPersist {
    output_folder: PathBuf,
    target: Option<PathBuf>,
    persisted: AtomicUsize,
}

impl DirectoryPersist {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            target: None,
            persisted: AtomicUsize::new(0),
        }
    }

    pub fn set_target(&mut self, target: &str) -> Result<(), PersistError> {
        let dir = PathBuf::from(target.trim());
        if dir.as_os_str().is_empty() {
            return Err(PersistError::Target(target.to_string()));
        }
        if dir.exists() && !dir.is_dir() {
            return Err(PersistError::Target(target.to_string()));
        }
        self.target = Some(dir);
        Ok(())
    }

    fn mirror_path(&self, target: &Path, path: &Path) -> PathBuf {
        let relative = path
            .strip_prefix(&self.output_folder)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| path.file_name().map(PathBuf::from))
            .unwrap_or_else(|| path.to_path_buf());
        target.join(relative)
    }
}

#[async_trait::async_trait]
impl PersistSink for DirectoryPersist {
    fn can_persist(&self) -> bool {
        self.target.is_some()
    }

    async fn persist_file(
        &self,
        path: &Path,
        content: &str,
        meta: PersistMeta,
    ) -> Result<(), PersistError> {
        let Some(target) = self.target.as_deref() else {
            return Ok(());
        };
        let destination = self.mirror_path(target, path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&destination, content.as_bytes())?;
        self.persisted.fetch_add(1, Ordering::Relaxed);
        import_verbose!(
            "Persisted {:?} {} to {}",
            meta.kind,
            meta.url,
            destination.display()
        );
        Ok(())
    }

    fn persisted(&self) -> usize {
        self.persisted.load(Ordering::Relaxed)
    }
}
