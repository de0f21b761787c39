//! Error types shared across the memex crates.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("invalid record id: {0}")]
    InvalidId(String),
    #[error("vector index unavailable: {0}")]
    VectorUnavailable(String),
}
