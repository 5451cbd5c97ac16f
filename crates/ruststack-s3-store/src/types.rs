//! Wire-independent value types exchanged with a storage provider.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Buckets and objects
// ---------------------------------------------------------------------------

/// A bucket as reported by `ListBuckets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created.
    pub creation_date: DateTime<Utc>,
}

/// One key (or delimiter-matched prefix) returned by an object listing or a
/// HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectItem {
    /// Object key, or the common prefix when `is_prefix` is set.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Entity tag without surrounding quotes.
    pub etag: String,
    /// Last modification time. Absent for common prefixes.
    pub last_modified: Option<DateTime<Utc>>,
    /// Expiry time, if the object has one.
    pub expires: Option<DateTime<Utc>>,
    /// Storage class (e.g. `STANDARD`).
    pub storage_class: String,
    /// User-defined metadata. Only filled when metadata was requested.
    pub user_metadata: HashMap<String, String>,
    /// System metadata such as `Content-Type`. Only filled when metadata
    /// was requested.
    pub metadata: HashMap<String, String>,
    /// Whether this item is a delimiter-matched common prefix.
    pub is_prefix: bool,
}

impl ObjectItem {
    /// A common-prefix item.
    #[must_use]
    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_prefix: true,
            ..Self::default()
        }
    }
}

/// One in-progress multipart upload (or common prefix) from an upload listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    /// Key the upload will create, or the common prefix.
    pub key: String,
    /// Upload identifier. Empty for common prefixes.
    pub upload_id: String,
    /// When the upload was initiated.
    pub initiated: Option<DateTime<Utc>>,
    /// Bytes uploaded so far.
    pub size: u64,
    /// Storage class of the final object.
    pub storage_class: String,
    /// Whether this item is a delimiter-matched common prefix.
    pub is_prefix: bool,
}

impl UploadItem {
    /// A common-prefix item.
    #[must_use]
    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_prefix: true,
            ..Self::default()
        }
    }
}

/// Optional attributes for a put.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// `Content-Type` to record.
    pub content_type: Option<String>,
    /// User-defined metadata.
    pub user_metadata: HashMap<String, String>,
    /// Storage class, `STANDARD` when unset.
    pub storage_class: Option<String>,
    /// Expiry time.
    pub expires: Option<DateTime<Utc>>,
    /// Report no modification time, as some gateways do for folder markers.
    pub hide_last_modified: bool,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Parameters for one page of an object or upload listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Bucket to list.
    pub bucket: String,
    /// Only keys starting with this prefix.
    pub prefix: String,
    /// Group keys by this delimiter. `None` lists recursively.
    pub delimiter: Option<String>,
    /// Continue after this key or prefix.
    pub cursor: Option<String>,
    /// Maximum keys and prefixes in the page.
    pub max_keys: usize,
    /// Include user and system metadata in each item.
    pub with_metadata: bool,
}

impl ListQuery {
    /// A one-level listing grouped by `delimiter`.
    #[must_use]
    pub fn delimited(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        delimiter: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: Some(delimiter.into()),
            cursor: None,
            max_keys: 1000,
            with_metadata: false,
        }
    }

    /// A flat listing of every key under `prefix`.
    #[must_use]
    pub fn recursive(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: None,
            cursor: None,
            max_keys: 1000,
            with_metadata: false,
        }
    }

    /// Whether the listing descends past the delimiter.
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.delimiter.is_none()
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Keys and common prefixes, in key order.
    pub items: Vec<T>,
    /// Cursor for the next page, `None` when the listing is complete.
    pub next_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Options for a batch delete conduit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete objects held under governance-mode retention.
    pub bypass_governance: bool,
    /// Depth of the failure result channel.
    pub result_buffer: usize,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            bypass_governance: false,
            result_buffer: 16,
        }
    }
}

/// A key that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// The key that failed.
    pub key: String,
    /// Why it failed.
    pub error: StoreError,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Server-side filter for a notification subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    /// Only keys starting with this prefix.
    pub prefix: String,
    /// Only keys ending with this suffix.
    pub suffix: String,
    /// Event name patterns such as `s3:ObjectCreated:*`. Empty matches all.
    pub events: Vec<String>,
}

impl NotificationFilter {
    /// Whether a record passes this filter.
    ///
    /// `key` must already be decoded.
    #[must_use]
    pub fn matches(&self, event_name: &str, key: &str) -> bool {
        key.starts_with(&self.prefix)
            && key.ends_with(&self.suffix)
            && (self.events.is_empty()
                || self.events.iter().any(|pattern| match pattern.strip_suffix('*') {
                    Some(head) => event_name.starts_with(head),
                    None => event_name == pattern,
                }))
    }
}

/// Origin of the request that produced a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    /// Client host.
    pub host: String,
    /// Client port.
    pub port: String,
    /// Client user agent.
    pub user_agent: String,
}

/// A single raw notification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Provider event name, e.g. `s3:ObjectCreated:Put`.
    pub event_name: String,
    /// When the event happened.
    pub event_time: DateTime<Utc>,
    /// Bucket the object lives in.
    pub bucket: String,
    /// Percent-encoded object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// User metadata of the object.
    pub user_metadata: HashMap<String, String>,
    /// Request origin.
    pub source: EventSource,
}

/// A batch of notification records delivered together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationInfo {
    /// The records in this batch.
    pub records: Vec<EventRecord>,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Receiving half of a shared cancellation signal.
///
/// Cloned into every subscriber. Resolves once [`CancelTrigger::cancel`] is
/// called or the trigger is dropped.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&mut self) {
        // An error means the trigger is gone, which also cancels.
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sending half of a shared cancellation signal.
#[derive(Debug)]
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

impl CancelTrigger {
    /// Request cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this trigger.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a connected cancellation trigger and signal.
#[must_use]
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx }, CancelSignal { rx })
}
