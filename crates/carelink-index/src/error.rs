use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// A precondition on the arguments was violated. Nothing was written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The storage collaborator failed. Surfaced as-is, never retried here.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
