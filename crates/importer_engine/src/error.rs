use std::path::PathBuf;

use crate::config::ConfigError;
use crate::convert::ConvertError;
use crate::persist::PersistError;
use crate::source::SourceError;

/// Run-level failures. Anything here aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("output conflict at {path}: {existing} and {incoming} resolve to the same file")]
    Conflict {
        path: PathBuf,
        existing: String,
        incoming: String,
    },
    #[error("markdown service error: {0}")]
    Convert(#[from] ConvertError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("failed to render front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
