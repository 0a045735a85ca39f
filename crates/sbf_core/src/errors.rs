use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SbfError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Allocation of {requested} bytes failed: {source}")]
    AllocationFailed {
        requested: u64,
        #[source]
        source: Box<SbfError>,
    },

    #[error("JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Corrupt: {0}")]
    Corrupt(String),
}

impl SbfError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SbfError::InvalidParameters(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SbfError>;
