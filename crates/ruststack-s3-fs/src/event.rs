//! Watch events and the provider event-name mapping.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use ruststack_s3_store::EventRecord;

use crate::error::FsError;
use crate::locator::Locator;

/// Normalized kind of a [`WatchEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// Object created by an upload.
    Created,
    /// Object created by a server-side copy.
    CreatedViaCopy,
    /// Object retention updated.
    CreatedPutRetention,
    /// Object removed.
    Removed,
    /// Object read.
    AccessedRead,
    /// Object metadata read.
    AccessedStat,
}

impl WatchEventKind {
    /// Map a provider event name to a kind.
    ///
    /// Returns `None` for names outside the object created, removed and
    /// accessed families.
    #[must_use]
    pub fn classify(event_name: &str) -> Option<Self> {
        if let Some(action) = event_name.strip_prefix("s3:ObjectCreated:") {
            return Some(if action.starts_with("Copy") {
                Self::CreatedViaCopy
            } else if action.starts_with("PutRetention") {
                Self::CreatedPutRetention
            } else {
                Self::Created
            });
        }
        if event_name.starts_with("s3:ObjectRemoved:") {
            return Some(Self::Removed);
        }
        match event_name {
            "s3:ObjectAccessed:Get" => Some(Self::AccessedRead),
            "s3:ObjectAccessed:Head" => Some(Self::AccessedStat),
            _ => None,
        }
    }

    /// Short display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::CreatedViaCopy => "created-copy",
            Self::CreatedPutRetention => "created-put-retention",
            Self::Removed => "removed",
            Self::AccessedRead => "accessed-read",
            Self::AccessedStat => "accessed-stat",
        }
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event families a watch can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Object creation.
    Put,
    /// Object removal.
    Delete,
    /// Object access.
    Get,
}

impl EventCategory {
    /// Provider filter pattern for this category.
    #[must_use]
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Put => "s3:ObjectCreated:*",
            Self::Delete => "s3:ObjectRemoved:*",
            Self::Get => "s3:ObjectAccessed:*",
        }
    }
}

impl FromStr for EventCategory {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            "get" => Ok(Self::Get),
            other => Err(FsError::Usage(format!(
                "unknown event type `{other}` (expected put, delete or get)"
            ))),
        }
    }
}

/// A normalized change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// When it happened.
    pub time: DateTime<Utc>,
    /// Object size; zero for removals.
    pub size: u64,
    /// Object user metadata; empty for removals.
    pub user_metadata: HashMap<String, String>,
    /// Requesting client host.
    pub source_host: String,
    /// Requesting client port.
    pub source_port: String,
    /// Requesting client user agent.
    pub user_agent: String,
    /// Fully qualified locator of the object.
    pub locator: Locator,
}

impl WatchEvent {
    /// Build an event from a raw record whose key is already decoded.
    pub(crate) fn from_record(
        kind: WatchEventKind,
        record: EventRecord,
        root: &Locator,
        key: &str,
    ) -> Self {
        let removed = kind == WatchEventKind::Removed;
        Self {
            kind,
            time: record.event_time,
            size: if removed { 0 } else { record.size },
            user_metadata: if removed {
                HashMap::new()
            } else {
                record.user_metadata
            },
            source_host: record.source.host,
            source_port: record.source.port,
            user_agent: record.source.user_agent,
            locator: root.child(&record.bucket, key),
        }
    }
}

/// Decode a query-escaped object key.
///
/// `+` decodes to a space. A `%` not followed by two hex digits, or a
/// sequence that decodes to invalid UTF-8, is an error.
pub(crate) fn unescape_key(raw: &str) -> Result<String, FsError> {
    let invalid = || FsError::Transport {
        code: "InvalidKeyEncoding".to_owned(),
        message: format!("invalid escape in object key `{raw}`"),
    };

    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let pair = bytes.get(i + 1..i + 3).ok_or_else(invalid)?;
            if !pair.iter().all(u8::is_ascii_hexdigit) {
                return Err(invalid());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| invalid())
}
