//! Configuration management.
//!
//! All configuration is driven by environment variables. [`FsConfig`] tunes
//! the filesystem layer (paging, channel depths, addressing) and
//! [`ClientConfig`] describes how to reach one storage endpoint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::types::BucketLookup;

/// Filesystem layer configuration.
///
/// # Examples
///
/// ```
/// use ruststack_core::FsConfig;
///
/// let config = FsConfig::default();
/// assert_eq!(config.list_page_size, 1000);
/// assert_eq!(config.remove_queue_depth, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct FsConfig {
    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Bucket addressing style used when parsing target addresses.
    #[builder(default)]
    pub bucket_lookup: BucketLookup,

    /// Maximum keys requested per listing page.
    #[builder(default = 1000)]
    pub list_page_size: usize,

    /// Depth of the per-bucket delete request queue.
    #[builder(default = 1)]
    pub remove_queue_depth: usize,

    /// Depth of result channels (delete failures, remove errors).
    #[builder(default = 16)]
    pub result_buffer: usize,

    /// Depth of the shared watch event and error channels.
    #[builder(default = 64)]
    pub watch_buffer: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            log_level: String::from("info"),
            bucket_lookup: BucketLookup::Auto,
            list_page_size: 1000,
            remove_queue_depth: 1,
            result_buffer: 16,
            watch_buffer: 64,
        }
    }
}

impl FsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LOG_LEVEL` | `info` |
    /// | `FS_BUCKET_LOOKUP` | `auto` |
    /// | `FS_LIST_PAGE_SIZE` | `1000` |
    /// | `FS_REMOVE_QUEUE_DEPTH` | `1` |
    /// | `FS_RESULT_BUFFER` | `16` |
    /// | `FS_WATCH_BUFFER` | `64` |
    ///
    /// Invalid values are ignored with a warning. Zero sizes are clamped to 1
    /// since every channel and page needs room for at least one item.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("FS_BUCKET_LOOKUP") {
            match v.parse() {
                Ok(lookup) => config.bucket_lookup = lookup,
                Err(e) => warn!(error = %e, "ignoring FS_BUCKET_LOOKUP"),
            }
        }
        if let Some(n) = parse_size("FS_LIST_PAGE_SIZE") {
            config.list_page_size = n;
        }
        if let Some(n) = parse_size("FS_REMOVE_QUEUE_DEPTH") {
            config.remove_queue_depth = n;
        }
        if let Some(n) = parse_size("FS_RESULT_BUFFER") {
            config.result_buffer = n;
        }
        if let Some(n) = parse_size("FS_WATCH_BUFFER") {
            config.watch_buffer = n;
        }

        config
    }
}

/// Connection settings for a single storage endpoint.
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Endpoint URL (e.g. `"https://s3.amazonaws.com"`).
    #[builder(setter(into))]
    pub host_url: String,

    /// Access key id.
    #[builder(default, setter(into))]
    pub access_key: String,

    /// Secret access key.
    #[builder(default, setter(into))]
    pub secret_key: String,

    /// Optional session token for temporary credentials.
    #[builder(default, setter(strip_option, into))]
    pub session_token: Option<String>,

    /// Bucket addressing style.
    #[builder(default)]
    pub bucket_lookup: BucketLookup,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host_url", &self.host_url)
            .field("access_key", &self.access_key)
            .field("bucket_lookup", &self.bucket_lookup)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Load client settings from environment variables.
    ///
    /// Reads `S3_ENDPOINT_URL`, `ACCESS_KEY` / `AWS_ACCESS_KEY_ID`,
    /// `SECRET_KEY` / `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN` and
    /// `FS_BUCKET_LOOKUP`.
    #[must_use]
    pub fn from_env() -> Self {
        let host_url = std::env::var("S3_ENDPOINT_URL")
            .unwrap_or_else(|_| String::from("https://s3.amazonaws.com"));
        let mut config = Self::builder().host_url(host_url).build();

        if let Ok(v) = std::env::var("ACCESS_KEY").or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
        {
            config.access_key = v;
        }
        if let Ok(v) =
            std::env::var("SECRET_KEY").or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
        {
            config.secret_key = v;
        }
        if let Ok(v) = std::env::var("AWS_SESSION_TOKEN") {
            config.session_token = Some(v);
        }
        if let Ok(v) = std::env::var("FS_BUCKET_LOOKUP") {
            if let Ok(lookup) = v.parse() {
                config.bucket_lookup = lookup;
            }
        }

        config
    }

    /// Hex SHA-256 of the access key, secret key and session token.
    ///
    /// Used as part of the registry key so two configs pointing at the same
    /// endpoint with different credentials get distinct client handles.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.access_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.secret_key.as_bytes());
        if let Some(token) = &self.session_token {
            hasher.update([0u8]);
            hasher.update(token.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn parse_size(var: &str) -> Option<usize> {
    let v = std::env::var(var).ok()?;
    match v.parse::<usize>() {
        Ok(n) => Some(n.max(1)),
        Err(e) => {
            warn!(variable = var, value = %v, error = %e, "ignoring invalid size");
            None
        }
    }
}
