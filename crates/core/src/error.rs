use thiserror::Error;

/// Errors raised while parsing or validating core domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The subject identifier was empty or contained a path separator.
    #[error("invalid subject id")]
    InvalidSubject,

    /// The form type did not match any known variant.
    #[error("unknown form type: {0}")]
    UnknownFormType(String),

    /// The event type attribute did not match a handled storage event.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The blob identifier was empty or contained a path separator.
    #[error("invalid blob id: {0}")]
    InvalidBlobId(String),
}
