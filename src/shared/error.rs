use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// Backpressure: the queue is at capacity and holds no evictable
    /// low-priority item. The only hard rejection the queue surfaces.
    #[error("Queue is full ({0} operations) and no low-priority item can be evicted")]
    QueueFull(usize),

    #[error("No network connection")]
    Offline,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
