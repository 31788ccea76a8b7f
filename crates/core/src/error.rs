use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A filesystem entry was unreadable or vanished during traversal. The
    /// scan aborts rather than hand a partial catalog to the selector.
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A catalog move referenced an absent key. This is an internal
    /// invariant violation, never expected during normal operation.
    #[error("no unit named {path} in catalog")]
    NotFound { path: PathBuf },

    /// No block-device statistics could be resolved for the given path.
    #[error("no device information available for {path}")]
    Device { path: PathBuf },
}
