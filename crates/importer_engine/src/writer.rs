use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use importer_logging::import_verbose;

use crate::dircache::DirectoryCache;
use crate::error::ImportError;
use crate::frontmatter::build_document;
use crate::persist::{write_atomic, PersistKind, PersistMeta, PersistSink};
use crate::skip::SkipPolicy;
use crate::types::{ResolvedEntry, WriteReport};

/// Emits an ordered entry list to disk and to the persist sink.
///
/// Not atomic across entries: a conflict aborts the call but leaves earlier
/// files in place.
pub struct Writer {
    skip: SkipPolicy,
    dirs: Arc<DirectoryCache>,
    persist: Arc<dyn PersistSink>,
    dry_run: bool,
}

impl Writer {
    pub fn new(
        skip: SkipPolicy,
        dirs: Arc<DirectoryCache>,
        persist: Arc<dyn PersistSink>,
        dry_run: bool,
    ) -> Self {
        Self {
            skip,
            dirs,
            persist,
            dry_run,
        }
    }

    pub async fn write(&self, entries: &[ResolvedEntry]) -> Result<WriteReport, ImportError> {
        let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
        let mut report = WriteReport::default();

        for resolved in entries {
            let entry = resolved.entry();
            if let Some(path) = resolved.file_path().as_path() {
                match claimed.get(path) {
                    Some(existing) if *existing != entry.url => {
                        return Err(ImportError::Conflict {
                            path: path.to_path_buf(),
                            existing: existing.to_string(),
                            incoming: entry.url.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        claimed.insert(path.to_path_buf(), &entry.url);
                    }
                }
            }

            let document = build_document(entry)?;

            if self.skip.should_skip(resolved) {
                report.skipped += 1;
                import_verbose!("Skipping {} from {}", resolved.file_path(), entry.url);
                continue;
            }
            let Some(path) = resolved.file_path().as_path() else {
                continue;
            };

            if !self.dry_run {
                self.dirs.ensure(path)?;
                write_atomic(path, document.as_bytes())?;
                report.written += 1;
            }
            import_verbose!("Importing {} from {}", path.display(), entry.url);

            // Runs in dry-run too; only the local write is suppressed.
            if !entry.is_draft() && self.persist.can_persist() {
                self.persist
                    .persist_file(
                        path,
                        &document,
                        PersistMeta {
                            url: entry.url.clone(),
                            kind: PersistKind::Post,
                        },
                    )
                    .await?;
                report.persisted += 1;
            }
        }

        Ok(report)
    }
}
