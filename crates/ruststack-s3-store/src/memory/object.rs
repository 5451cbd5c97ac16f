//! Stored object and retention state.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::types::{ObjectItem, PutOptions};

/// Object lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionMode {
    /// Deletable by callers that bypass governance.
    Governance,
    /// Not deletable until the retention date passes.
    Compliance,
}

/// Active retention on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Retention {
    pub mode: RetentionMode,
    pub retain_until: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredObject {
    pub data: Bytes,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub options: PutOptions,
    pub retention: Option<Retention>,
}

impl StoredObject {
    pub fn new(data: Bytes, options: PutOptions) -> Self {
        let etag = hex::encode(Md5::digest(&data));
        Self {
            data,
            etag,
            last_modified: Utc::now(),
            options,
            retention: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether retention currently forbids deleting this object.
    pub fn is_locked(&self, bypass_governance: bool) -> bool {
        match self.retention {
            Some(r) if r.retain_until > Utc::now() => {
                r.mode == RetentionMode::Compliance || !bypass_governance
            }
            _ => false,
        }
    }

    pub fn to_item(&self, key: &str, with_metadata: bool) -> ObjectItem {
        let mut item = ObjectItem {
            key: key.to_owned(),
            size: self.size(),
            etag: self.etag.clone(),
            last_modified: (!self.options.hide_last_modified).then_some(self.last_modified),
            expires: self.options.expires,
            storage_class: self
                .options
                .storage_class
                .clone()
                .unwrap_or_else(|| "STANDARD".to_owned()),
            ..ObjectItem::default()
        };
        if with_metadata {
            item.user_metadata = self.options.user_metadata.clone();
            if let Some(ct) = &self.options.content_type {
                item.metadata.insert("Content-Type".to_owned(), ct.clone());
            }
        }
        item
    }
}
