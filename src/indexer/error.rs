use std::path::PathBuf;

use thiserror::Error;

use crate::local::StoreError;

/// Failure of a single file's reindex.
///
/// None of these leave a fingerprint behind, so the file is picked up again
/// by the next scan or watch cycle.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("embedding unavailable for {path}: {reason}")]
    Embedding { path: String, reason: String },

    #[error("failed to record fingerprint: {0:#}")]
    Fingerprint(anyhow::Error),
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
