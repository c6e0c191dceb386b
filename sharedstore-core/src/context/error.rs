/*
    error.rs - Errors surfaced by the storage handle

    The replication protocol itself never fails. These only describe
    problems talking to a context's event loop.
*/

use thiserror::Error;

use crate::protocol::ChannelError;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The context's event loop has stopped
    #[error("Storage context has shut down")]
    ContextClosed,

    /// The context stopped before the first snapshot arrived
    #[error("Ready signal can no longer fire")]
    ReadyUnavailable,

    #[error("Operation is only available on the owner context")]
    NotOwner,

    #[error("Operation is only available on a worker context")]
    NotWorker,

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Result type for storage handle operations
pub type StorageResult<T> = Result<T, StorageError>;
