use thiserror::Error;

/// Errors raised by draft record stores.
#[derive(Debug, Error)]
pub enum StateError {
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the statement.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored row could not be mapped back into a record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The operation did not complete in time.
    #[error("operation timed out")]
    Timeout,
}

impl StateError {
    /// Returns `true` if the error is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}
