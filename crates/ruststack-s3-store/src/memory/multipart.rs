//! In-progress multipart upload state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::UploadItem;

/// An upload that has been started but neither completed nor aborted.
#[derive(Debug, Clone)]
pub(crate) struct StoredUpload {
    pub upload_id: String,
    pub initiated: DateTime<Utc>,
    /// Part number to part size.
    pub parts: BTreeMap<u32, u64>,
}

impl StoredUpload {
    pub fn new() -> Self {
        Self {
            upload_id: uuid::Uuid::new_v4().to_string(),
            initiated: Utc::now(),
            parts: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> u64 {
        self.parts.values().sum()
    }

    pub fn to_item(&self, key: &str) -> UploadItem {
        UploadItem {
            key: key.to_owned(),
            upload_id: self.upload_id.clone(),
            initiated: Some(self.initiated),
            size: self.size(),
            storage_class: "STANDARD".to_owned(),
            is_prefix: false,
        }
    }
}
