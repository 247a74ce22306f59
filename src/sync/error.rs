use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("block size must be greater than zero")]
    InvalidBlockSize,

    #[error("remote hash list is empty")]
    EmptyHashList,

    #[error("worker count must be greater than zero")]
    NoWorkers,

    #[error("scan was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
