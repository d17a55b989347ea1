//! Domain-specific errors.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure while waiting for the derived artifact to catch up with its source.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("artifact was not refreshed within {waited:?}")]
    Timeout { waited: Duration },
    #[error("artifact is not accessible: {0}")]
    Unavailable(#[source] io::Error),
}

/// Every way a "run current cell" request can fail.
///
/// The display strings are the one-line messages shown to the user.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{} is not an F# source file", path.display())]
    UnsupportedSource { path: PathBuf },
    #[error("cannot access {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Python file was not updated, is Fable running?")]
    NotUpdated { waited: Duration },
    #[error("Python file {} not found, is Fable running?", path.display())]
    ArtifactUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cell {index} not found in Python file ({found} cells present)")]
    CellNotFound { index: usize, found: usize },
    #[error("Cannot run selection, open the interactive window")]
    Dispatch(#[source] anyhow::Error),
}
