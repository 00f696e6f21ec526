use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache file path is empty")]
    EmptyPath,

    #[error("Invalid cache path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
