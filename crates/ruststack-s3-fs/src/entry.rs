//! Listing entries and listing options.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ruststack_s3_store::{BucketInfo, ObjectItem, UploadItem};
use typed_builder::TypedBuilder;

use crate::error::FsError;
use crate::locator::Locator;

/// What an [`Entry`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A stored object.
    Object,
    /// A bucket or a synthesized directory (key prefix).
    Directory,
    /// An in-progress multipart upload.
    IncompleteUpload,
}

/// Where synthesized directory entries appear relative to their children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DirPlacement {
    /// Never emit directory entries in recursive listings.
    #[default]
    None,
    /// Emit each directory before its descendants.
    First,
    /// Emit each directory after its descendants.
    Last,
}

impl FromStr for DirPlacement {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(FsError::Usage(format!(
                "unknown directory placement `{s}` (expected none, first or last)"
            ))),
        }
    }
}

/// Options for [`ObjectFs::list`](crate::ObjectFs::list).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder)]
pub struct ListOptions {
    /// Descend below the first level.
    #[builder(default)]
    pub recursive: bool,
    /// List in-progress uploads instead of objects.
    #[builder(default)]
    pub incomplete: bool,
    /// Ask the provider for user and system metadata.
    #[builder(default)]
    pub with_metadata: bool,
    /// Directory placement for recursive listings.
    #[builder(default)]
    pub dir_placement: DirPlacement,
}

/// One listing result.
///
/// An entry with `error` set marks a branch that could not be listed; its
/// other fields carry no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Fully qualified locator of the object or directory.
    pub locator: Locator,
    /// What this entry stands for.
    pub kind: EntryKind,
    /// Size in bytes (bytes uploaded so far for incomplete uploads).
    pub size: u64,
    /// Modification time (initiation time for incomplete uploads).
    pub last_modified: Option<DateTime<Utc>>,
    /// Expiry time.
    pub expires: Option<DateTime<Utc>>,
    /// Entity tag.
    pub etag: String,
    /// Storage class.
    pub storage_class: String,
    /// User-defined metadata.
    pub user_metadata: HashMap<String, String>,
    /// System metadata such as `Content-Type`.
    pub metadata: HashMap<String, String>,
    /// Upload id of an incomplete upload.
    pub upload_id: Option<String>,
    /// Why this branch could not be listed.
    pub error: Option<FsError>,
}

impl Entry {
    fn blank(locator: Locator, kind: EntryKind) -> Self {
        Self {
            locator,
            kind,
            size: 0,
            last_modified: None,
            expires: None,
            etag: String::new(),
            storage_class: String::new(),
            user_metadata: HashMap::new(),
            metadata: HashMap::new(),
            upload_id: None,
            error: None,
        }
    }

    /// A synthesized directory entry.
    #[must_use]
    pub fn directory(locator: Locator) -> Self {
        Self::blank(locator, EntryKind::Directory)
    }

    /// An error-carrying entry for `locator`.
    #[must_use]
    pub fn failed(locator: Locator, error: FsError) -> Self {
        let mut entry = Self::blank(locator, EntryKind::Object);
        entry.error = Some(error);
        entry
    }

    /// Directory entry for a bucket.
    #[must_use]
    pub fn bucket(root: &Locator, info: &BucketInfo) -> Self {
        let mut entry = Self::directory(root.child(&info.name, ""));
        entry.last_modified = Some(info.creation_date);
        entry
    }

    /// Build an entry from an object listing item.
    ///
    /// Common prefixes, and zero-byte keys ending in the separator with no
    /// modification time, become directories.
    #[must_use]
    pub fn from_object(root: &Locator, bucket: &str, item: ObjectItem) -> Self {
        let sep = root.separator();
        let is_dir = item.is_prefix
            || (item.key.ends_with(sep) && item.size == 0 && item.last_modified.is_none());
        let locator = root.child(bucket, &item.key);
        if is_dir {
            return Self::directory(locator);
        }

        Self {
            locator,
            kind: EntryKind::Object,
            size: item.size,
            last_modified: item.last_modified,
            expires: item.expires,
            etag: item.etag,
            storage_class: item.storage_class,
            user_metadata: item.user_metadata,
            metadata: item.metadata,
            upload_id: None,
            error: None,
        }
    }

    /// Build an entry from an upload listing item.
    #[must_use]
    pub fn from_upload(root: &Locator, bucket: &str, item: UploadItem) -> Self {
        let locator = root.child(bucket, &item.key);
        if item.is_prefix {
            return Self::directory(locator);
        }

        let mut entry = Self::blank(locator, EntryKind::IncompleteUpload);
        entry.size = item.size;
        entry.last_modified = item.initiated;
        entry.storage_class = item.storage_class;
        entry.upload_id = Some(item.upload_id);
        entry
    }

    /// Whether this entry is a bucket or directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// The entry's (bucket, key).
    #[must_use]
    pub fn bucket_and_key(&self) -> (String, String) {
        self.locator.resolve()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {error}", self.locator),
            None => write!(f, "{}", self.locator),
        }
    }
}
