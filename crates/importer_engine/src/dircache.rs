use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use importer_logging::import_debug;

/// Remembers which parent directories were created during this run.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    dry_run: bool,
    created: Mutex<HashSet<PathBuf>>,
}

impl DirectoryCache {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            created: Mutex::new(HashSet::new()),
        }
    }

    /// Create the parent directory of `path` once per run. No-op in dry-run.
    pub fn ensure(&self, path: &Path) -> io::Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let Some(dir) = parent_dir(path) else {
            return Ok(());
        };

        let mut created = self
            .created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if created.contains(dir) {
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        import_debug!("Created directory {}", dir.display());
        created.insert(dir.to_path_buf());
        Ok(())
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .map(|created| created.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

/// Parent directory worth creating; `None` for the filesystem root or a bare filename.
fn parent_dir(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() || parent.parent().is_none() {
        return None;
    }
    Some(parent)
}
