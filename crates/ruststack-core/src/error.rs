//! Error types for the RustStack core.

/// Core error type for configuration and addressing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Unknown bucket lookup style.
    #[error("invalid bucket lookup style: {0} (expected auto, dns or path)")]
    InvalidBucketLookup(String),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
