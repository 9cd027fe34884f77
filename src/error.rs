use thiserror::Error;

/// Failures of the local key-value store, the remote object store and the
/// upload queue. Callers on the frame path log these and move on.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote store error: {0}")]
    Remote(String),
    #[error("upload queue is full")]
    QueueFull,
    #[error("upload queue is closed")]
    QueueClosed,
    #[error("no signed-in user")]
    NotSignedIn,
    #[error("stored data is malformed: {0}")]
    Corrupt(String),
}

/// Reasons a perturbation profile is refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("strength must be non-negative, got {0}")]
    NegativeStrength(f64),
    #[error("impulse profile needs a non-empty random interval, got {0}..={1}")]
    EmptyInterval(f64, f64),
    #[error("frequency must be finite and non-negative, got {0}")]
    InvalidFrequency(f64),
}
