use crate::config::ImportOptions;
use crate::types::{FilePath, ResolvedEntry};

/// Decides whether an entry must be left off disk.
///
/// Checked once before transformation and again right before writing, since
/// files can appear in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPolicy {
    pub safe_mode: bool,
    pub overwrite_drafts: bool,
}

impl SkipPolicy {
    pub fn from_options(options: &ImportOptions) -> Self {
        Self {
            safe_mode: options.safe_mode,
            overwrite_drafts: options.overwrite_drafts,
        }
    }

    pub fn should_skip(&self, resolved: &ResolvedEntry) -> bool {
        let path = match resolved.file_path() {
            FilePath::Skip => return true,
            FilePath::Path(path) => path,
        };
        if !self.safe_mode || !path.exists() {
            return false;
        }
        !resolved.entry().is_draft() || !self.overwrite_drafts
    }
}
