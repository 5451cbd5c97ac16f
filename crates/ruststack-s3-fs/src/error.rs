//! Filesystem-layer errors.
//!
//! [`FsError`] is what every entry, remove result and watch error carries.
//! It is `Clone` so it can ride inside [`Entry`](crate::Entry) values.
//! [`FsError::kind`] collapses it into the five-way [`ErrorKind`] taxonomy.

use ruststack_s3_store::StoreError;

/// Coarse classification of an [`FsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ambiguous or contradictory request shape.
    Usage,
    /// Bucket or key absent.
    ResourceMissing,
    /// The caller is not allowed to do this.
    PermissionDenied,
    /// The endpoint does not offer this feature.
    ProviderUnsupported,
    /// Passthrough network or provider failure.
    Transport,
}

/// Filesystem-layer error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    /// The request is malformed.
    #[error("{0}")]
    Usage(String),

    /// The bucket does not exist.
    #[error("Bucket `{bucket}` does not exist")]
    BucketMissing {
        /// Bucket name.
        bucket: String,
    },

    /// The object (or upload, or prefix) does not exist.
    #[error("Object `{key}` does not exist in bucket `{bucket}`")]
    ObjectMissing {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },

    /// Access denied.
    #[error("Access denied to `{bucket}/{key}`")]
    PermissionDenied {
        /// Bucket name.
        bucket: String,
        /// Object key or prefix.
        key: String,
    },

    /// The endpoint does not implement this API.
    #[error("`{api}` is not supported by {endpoint}")]
    Unsupported {
        /// The API that was attempted.
        api: String,
        /// The endpoint that refused it.
        endpoint: String,
    },

    /// Any other provider or network failure.
    #[error("{message}")]
    Transport {
        /// Provider error code, if one was returned.
        code: String,
        /// Human readable message.
        message: String,
    },
}

impl FsError {
    /// The taxonomy bucket this error falls into.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::BucketMissing { .. } | Self::ObjectMissing { .. } => ErrorKind::ResourceMissing,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Unsupported { .. } => ErrorKind::ProviderUnsupported,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Translate a provider error raised while operating on `bucket`/`key`.
    #[must_use]
    pub fn from_store(error: StoreError, bucket: &str, key: &str, endpoint: &str) -> Self {
        match error {
            StoreError::NoSuchBucket { bucket } => Self::BucketMissing { bucket },
            StoreError::NoSuchKey { key } | StoreError::NoSuchUpload { key } => {
                Self::ObjectMissing {
                    bucket: bucket.to_owned(),
                    key,
                }
            }
            StoreError::AccessDenied => Self::PermissionDenied {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            },
            StoreError::InvalidBucketName { name } => {
                Self::Usage(format!("Bucket name `{name}` is not valid"))
            }
            StoreError::NotImplemented { api } => Self::Unsupported {
                api,
                endpoint: endpoint.to_owned(),
            },
            other => Self::Transport {
                code: other.code().to_owned(),
                message: other.to_string(),
            },
        }
    }
}

/// Convenience result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
