use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Socket path error: {0}")]
    SocketPath(String),

    #[error("Reload hub not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
