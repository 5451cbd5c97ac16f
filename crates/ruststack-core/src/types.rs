//! Common type definitions shared across crates.

use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// How the bucket name is carried in a request address.
///
/// `Dns` places the bucket in the host name (`bucket.s3.amazonaws.com`),
/// `Path` places it in the first path segment (`host/bucket/key`), and
/// `Auto` picks DNS style only for hosts known to support it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BucketLookup {
    /// Decide from the host name.
    #[default]
    Auto,
    /// Always treat the first host label as the bucket.
    Dns,
    /// Always treat the first path segment as the bucket.
    Path,
}

impl BucketLookup {
    /// Get the lookup style as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Dns => "dns",
            Self::Path => "path",
        }
    }
}

impl FromStr for BucketLookup {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "dns" => Ok(Self::Dns),
            "path" => Ok(Self::Path),
            _ => Err(CoreError::InvalidBucketLookup(s.to_owned())),
        }
    }
}

impl fmt::Display for BucketLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
