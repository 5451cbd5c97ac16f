//! In-memory [`StorageApi`] implementation.
//!
//! [`MemoryStore`] keeps buckets in a `DashMap`, objects and uploads in
//! sorted maps, and publishes a notification record for every mutation or
//! access through a broadcast channel. It also carries a small fault table
//! so callers can make specific keys, prefixes or APIs fail.

mod keystore;
mod multipart;
mod object;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::{Ref, RefMut};
use futures::StreamExt;
use futures::stream;
use parking_lot::RwLock;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{NotificationStream, StorageApi};
use crate::error::{StoreError, StoreResult};
use crate::types::{
    BucketInfo, CancelSignal, DeleteFailure, DeleteOptions, EventRecord, EventSource, ListQuery,
    NotificationFilter, NotificationInfo, ObjectItem, Page, PutOptions, UploadItem,
};

use self::keystore::{Listed, page_keys};
use self::multipart::StoredUpload;
use self::object::{Retention, StoredObject};

pub use self::object::RetentionMode;

/// Keys per delete round trip.
const MAX_DELETE_BATCH: usize = 1000;

/// Capacity of the notification broadcast channel.
const NOTIFY_CAPACITY: usize = 1024;

/// Characters left unescaped in notification keys.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug)]
struct MemoryBucket {
    creation_date: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
    uploads: BTreeMap<String, Vec<StoredUpload>>,
}

impl MemoryBucket {
    fn new() -> Self {
        Self {
            creation_date: Utc::now(),
            objects: BTreeMap::new(),
            uploads: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.uploads.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Notice {
    Record(EventRecord),
    Error { bucket: String, error: StoreError },
}

#[derive(Debug, Default)]
struct Faults {
    delete_failures: HashMap<(String, String), StoreError>,
    failure_delay: Option<Duration>,
    denied: Vec<(String, String)>,
    notifications_unsupported: bool,
    list_buckets_error: Option<StoreError>,
}

struct Inner {
    endpoint: String,
    buckets: DashMap<String, MemoryBucket>,
    notices: broadcast::Sender<Notice>,
    faults: RwLock<Faults>,
    delete_calls: AtomicUsize,
}

/// In-memory object store.
///
/// Cheap to clone; clones share state.
///
/// # Examples
///
/// ```
/// use ruststack_s3_store::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.create_bucket("media").unwrap();
/// store.put_object("media", "a.txt", "hello").unwrap();
/// assert_eq!(store.keys("media"), vec!["a.txt".to_owned()]);
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("endpoint", &self.inner.endpoint)
            .field("bucket_count", &self.inner.buckets.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default endpoint name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoint("memory://localhost")
    }

    /// Create an empty store reporting `endpoint` in errors.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let (notices, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                buckets: DashMap::new(),
                notices,
                faults: RwLock::new(Faults::default()),
                delete_calls: AtomicUsize::new(0),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    /// Create a bucket.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidBucketName`] for an empty name or one containing `/`.
    /// - [`StoreError::BucketAlreadyOwnedByYou`] if it already exists.
    pub fn create_bucket(&self, name: &str) -> StoreResult<()> {
        if name.is_empty() || name.contains('/') {
            return Err(StoreError::InvalidBucketName {
                name: name.to_owned(),
            });
        }
        match self.inner.buckets.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::BucketAlreadyOwnedByYou {
                bucket: name.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(MemoryBucket::new());
                info!(bucket = %name, "bucket created");
                Ok(())
            }
        }
    }

    /// Every key in `bucket`, sorted. Empty if the bucket does not exist.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.inner
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `bucket` exists.
    #[must_use]
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.inner.buckets.contains_key(bucket)
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Store an object and return its etag.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> StoreResult<String> {
        self.put_object_with(bucket, key, data, PutOptions::default())
    }

    /// Store an object with explicit attributes and return its etag.
    pub fn put_object_with(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        options: PutOptions,
    ) -> StoreResult<String> {
        self.check_access(bucket, key)?;
        let object = StoredObject::new(data.into(), options);
        let etag = object.etag.clone();
        let record = Self::record(bucket, key, "s3:ObjectCreated:Put", Some(&object));
        self.bucket_mut(bucket)?.objects.insert(key.to_owned(), object);

        debug!(bucket = %bucket, key = %key, "object stored");
        self.notify(record);
        Ok(etag)
    }

    /// Server-side copy within a bucket.
    pub fn copy_object(&self, bucket: &str, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.copy_between(bucket, src_key, bucket, dst_key)
    }

    /// Server-side copy from one bucket to another.
    pub fn copy_between(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StoreResult<()> {
        self.check_access(src_bucket, src_key)?;
        self.check_access(dst_bucket, dst_key)?;
        let mut copy = self
            .bucket(src_bucket)?
            .objects
            .get(src_key)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchKey {
                key: src_key.to_owned(),
            })?;
        copy.last_modified = Utc::now();
        copy.retention = None;
        let record = Self::record(dst_bucket, dst_key, "s3:ObjectCreated:Copy", Some(&copy));
        self.bucket_mut(dst_bucket)?
            .objects
            .insert(dst_key.to_owned(), copy);
        self.notify(record);
        Ok(())
    }

    /// Read an object's content.
    pub fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.check_access(bucket, key)?;
        let (data, record) = {
            let b = self.bucket(bucket)?;
            let object = b.objects.get(key).ok_or_else(|| StoreError::NoSuchKey {
                key: key.to_owned(),
            })?;
            (
                object.data.clone(),
                Self::record(bucket, key, "s3:ObjectAccessed:Get", Some(object)),
            )
        };
        self.notify(record);
        Ok(data)
    }

    /// Delete a single object. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError::AccessDenied`] if the object is under retention.
    pub fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.check_access(bucket, key)?;
        let removed = {
            let mut b = self.bucket_mut(bucket)?;
            if b.objects.get(key).is_some_and(|o| o.is_locked(false)) {
                return Err(StoreError::AccessDenied);
            }
            b.objects.remove(key).is_some()
        };
        if removed {
            self.notify(Self::record(bucket, key, "s3:ObjectRemoved:Delete", None));
        }
        Ok(())
    }

    /// Place a retention lock on an object.
    pub fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        mode: RetentionMode,
        retain_until: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check_access(bucket, key)?;
        let record = {
            let mut b = self.bucket_mut(bucket)?;
            let object = b.objects.get_mut(key).ok_or_else(|| StoreError::NoSuchKey {
                key: key.to_owned(),
            })?;
            object.retention = Some(Retention { mode, retain_until });
            Self::record(bucket, key, "s3:ObjectCreated:PutRetention", Some(object))
        };
        self.notify(record);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Multipart uploads
    // -----------------------------------------------------------------------

    /// Start a multipart upload and return its id.
    pub fn create_multipart_upload(&self, bucket: &str, key: &str) -> StoreResult<String> {
        self.check_access(bucket, key)?;
        let upload = StoredUpload::new();
        let id = upload.upload_id.clone();
        self.bucket_mut(bucket)?
            .uploads
            .entry(key.to_owned())
            .or_default()
            .push(upload);
        debug!(bucket = %bucket, key = %key, upload_id = %id, "multipart upload created");
        Ok(id)
    }

    /// Record an uploaded part.
    pub fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: impl Into<Bytes>,
    ) -> StoreResult<()> {
        let data = data.into();
        let mut b = self.bucket_mut(bucket)?;
        let upload = b
            .uploads
            .get_mut(key)
            .and_then(|uploads| uploads.iter_mut().find(|u| u.upload_id == upload_id))
            .ok_or_else(|| StoreError::NoSuchUpload {
                key: key.to_owned(),
            })?;
        upload.parts.insert(part_number, data.len() as u64);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Publish a raw record to every matching subscriber.
    pub fn publish(&self, record: EventRecord) {
        self.notify(record);
    }

    /// Deliver `error` to every subscriber of `bucket`.
    pub fn inject_notification_error(&self, bucket: &str, error: StoreError) {
        let _ = self.inner.notices.send(Notice::Error {
            bucket: bucket.to_owned(),
            error,
        });
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Make deleting `key` in `bucket` fail with `error`.
    pub fn fail_delete(&self, bucket: &str, key: &str, error: StoreError) {
        self.inner
            .faults
            .write()
            .delete_failures
            .insert((bucket.to_owned(), key.to_owned()), error);
    }

    /// Delay each delete failure report by `delay`.
    pub fn set_failure_delay(&self, delay: Duration) {
        self.inner.faults.write().failure_delay = Some(delay);
    }

    /// Deny every operation on keys under `prefix` in `bucket`.
    pub fn deny_prefix(&self, bucket: &str, prefix: &str) {
        self.inner
            .faults
            .write()
            .denied
            .push((bucket.to_owned(), prefix.to_owned()));
    }

    /// Make `list_buckets` fail with `error`.
    pub fn fail_list_buckets(&self, error: StoreError) {
        self.inner.faults.write().list_buckets_error = Some(error);
    }

    /// Report notification subscriptions as unsupported.
    pub fn disable_notifications(&self) {
        self.inner.faults.write().notifications_unsupported = true;
    }

    /// Number of live notification subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.notices.receiver_count()
    }

    /// Number of delete conduits opened so far.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn bucket(
        &self,
        name: &str,
    ) -> StoreResult<Ref<'_, String, MemoryBucket>> {
        self.inner
            .buckets
            .get(name)
            .ok_or_else(|| StoreError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    fn bucket_mut(
        &self,
        name: &str,
    ) -> StoreResult<RefMut<'_, String, MemoryBucket>> {
        self.inner
            .buckets
            .get_mut(name)
            .ok_or_else(|| StoreError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    fn check_access(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let faults = self.inner.faults.read();
        if faults
            .denied
            .iter()
            .any(|(b, p)| b == bucket && key.starts_with(p.as_str()))
        {
            return Err(StoreError::AccessDenied);
        }
        Ok(())
    }

    fn record(
        bucket: &str,
        key: &str,
        event_name: &str,
        object: Option<&StoredObject>,
    ) -> EventRecord {
        EventRecord {
            event_name: event_name.to_owned(),
            event_time: Utc::now(),
            bucket: bucket.to_owned(),
            key: utf8_percent_encode(key, KEY_ENCODE_SET).to_string(),
            size: object.map_or(0, StoredObject::size),
            user_metadata: object
                .map(|o| o.options.user_metadata.clone())
                .unwrap_or_default(),
            source: EventSource {
                host: "127.0.0.1".to_owned(),
                port: String::new(),
                user_agent: "ruststack-memory".to_owned(),
            },
        }
    }

    fn notify(&self, record: EventRecord) {
        // No subscribers is not an error.
        let _ = self.inner.notices.send(Notice::Record(record));
    }

    /// Delete one batch and return the keys that failed.
    fn delete_batch(&self, bucket: &str, keys: &[String], bypass: bool) -> Vec<DeleteFailure> {
        let mut failures = Vec::new();
        let mut removed = Vec::new();
        {
            let faults = self.inner.faults.read();
            let mut b = match self.bucket_mut(bucket) {
                Ok(b) => b,
                Err(error) => {
                    return keys
                        .iter()
                        .map(|key| DeleteFailure {
                            key: key.clone(),
                            error: error.clone(),
                        })
                        .collect();
                }
            };

            for key in keys {
                let injected = faults
                    .delete_failures
                    .get(&(bucket.to_owned(), key.clone()))
                    .cloned();
                let denied = faults
                    .denied
                    .iter()
                    .any(|(db, p)| db == bucket && key.starts_with(p.as_str()));
                let error = if let Some(error) = injected {
                    Some(error)
                } else if denied || b.objects.get(key).is_some_and(|o| o.is_locked(bypass)) {
                    Some(StoreError::AccessDenied)
                } else {
                    None
                };

                if let Some(error) = error {
                    failures.push(DeleteFailure {
                        key: key.clone(),
                        error,
                    });
                } else if b.objects.remove(key).is_some() {
                    removed.push(key.clone());
                }
            }
        }

        for key in &removed {
            self.notify(Self::record(bucket, key, "s3:ObjectRemoved:Delete", None));
        }
        debug!(
            bucket = %bucket,
            removed = removed.len(),
            failed = failures.len(),
            "delete batch processed"
        );
        failures
    }
}

#[async_trait]
impl StorageApi for MemoryStore {
    fn endpoint(&self) -> String {
        self.inner.endpoint.clone()
    }

    async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>> {
        if let Some(error) = self.inner.faults.read().list_buckets_error.clone() {
            return Err(error);
        }
        let mut buckets: Vec<BucketInfo> = self
            .inner
            .buckets
            .iter()
            .map(|entry| BucketInfo {
                name: entry.key().clone(),
                creation_date: entry.value().creation_date,
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        self.check_access(bucket, "")?;
        Ok(self.inner.buckets.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.create_bucket(bucket)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        opts: PutOptions,
    ) -> StoreResult<String> {
        self.put_object_with(bucket, key, data, opts)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        MemoryStore::get_object(self, bucket, key)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StoreResult<()> {
        self.copy_between(src_bucket, src_key, dst_bucket, dst_key)
    }

    async fn list_objects_page(&self, query: &ListQuery) -> StoreResult<Page<ObjectItem>> {
        self.check_access(&query.bucket, &query.prefix)?;
        let b = self.bucket(&query.bucket)?;
        let (slots, next_cursor) = page_keys(
            &b.objects,
            &query.prefix,
            query.delimiter.as_deref(),
            query.cursor.as_deref(),
            query.max_keys,
        );
        let items = slots
            .into_iter()
            .map(|slot| match slot {
                Listed::Entry(key, object) => object.to_item(key, query.with_metadata),
                Listed::Prefix(cp) => ObjectItem::prefix(cp),
            })
            .collect();
        Ok(Page { items, next_cursor })
    }

    async fn list_uploads_page(&self, query: &ListQuery) -> StoreResult<Page<UploadItem>> {
        self.check_access(&query.bucket, &query.prefix)?;
        let b = self.bucket(&query.bucket)?;
        let (slots, next_cursor) = page_keys(
            &b.uploads,
            &query.prefix,
            query.delimiter.as_deref(),
            query.cursor.as_deref(),
            query.max_keys,
        );
        let items = slots
            .into_iter()
            .flat_map(|slot| match slot {
                Listed::Entry(key, uploads) => {
                    uploads.iter().map(|u| u.to_item(key)).collect::<Vec<_>>()
                }
                Listed::Prefix(cp) => vec![UploadItem::prefix(cp)],
            })
            .collect();
        Ok(Page { items, next_cursor })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectItem> {
        self.check_access(bucket, key)?;
        let (item, record) = {
            let b = self.bucket(bucket)?;
            let object = b.objects.get(key).ok_or_else(|| StoreError::NoSuchKey {
                key: key.to_owned(),
            })?;
            (
                object.to_item(key, true),
                Self::record(bucket, key, "s3:ObjectAccessed:Head", Some(object)),
            )
        };
        self.notify(record);
        Ok(item)
    }

    fn delete_objects(
        &self,
        bucket: &str,
        mut names: mpsc::Receiver<String>,
        opts: DeleteOptions,
    ) -> mpsc::Receiver<DeleteFailure> {
        let (tx, rx) = mpsc::channel(opts.result_buffer.max(1));
        let store = self.clone();
        let bucket = bucket.to_owned();
        self.inner.delete_calls.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(MAX_DELETE_BATCH);
            while let Some(name) = names.recv().await {
                batch.push(name);
                while batch.len() < MAX_DELETE_BATCH {
                    match names.try_recv() {
                        Ok(name) => batch.push(name),
                        Err(_) => break,
                    }
                }

                let failures = store.delete_batch(&bucket, &batch, opts.bypass_governance);
                batch.clear();

                let delay = store.inner.faults.read().failure_delay;
                for failure in failures {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    if tx.send(failure).await.is_err() {
                        debug!(bucket = %bucket, "delete result receiver dropped");
                        return;
                    }
                }
            }
        });

        rx
    }

    async fn remove_incomplete_upload(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.check_access(bucket, key)?;
        let mut b = self.bucket_mut(bucket)?;
        match b.uploads.remove(key) {
            Some(uploads) => {
                debug!(bucket = %bucket, key = %key, count = uploads.len(), "uploads aborted");
                Ok(())
            }
            None => Err(StoreError::NoSuchUpload {
                key: key.to_owned(),
            }),
        }
    }

    async fn remove_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.check_access(bucket, "")?;
        let b = self.bucket(bucket)?;
        if !b.is_empty() {
            return Err(StoreError::BucketNotEmpty {
                bucket: bucket.to_owned(),
            });
        }
        // Drop the read reference before removing.
        drop(b);

        self.inner.buckets.remove(bucket);
        info!(bucket = %bucket, "bucket deleted");
        Ok(())
    }

    async fn subscribe_notifications(
        &self,
        bucket: &str,
        filter: &NotificationFilter,
        cancel: CancelSignal,
    ) -> StoreResult<NotificationStream> {
        if self.inner.faults.read().notifications_unsupported {
            return Err(StoreError::NotImplemented {
                api: "ListenBucketNotification".to_owned(),
            });
        }
        self.check_access(bucket, &filter.prefix)?;
        if !self.inner.buckets.contains_key(bucket) {
            return Err(StoreError::NoSuchBucket {
                bucket: bucket.to_owned(),
            });
        }

        let rx = self.inner.notices.subscribe();
        let state = (rx, cancel, filter.clone(), bucket.to_owned());
        let stream = stream::unfold(state, |(mut rx, mut cancel, filter, bucket)| async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return None,
                    notice = rx.recv() => match notice {
                        Ok(Notice::Record(record)) => {
                            if record.bucket != bucket {
                                continue;
                            }
                            let matched = filter.matches(
                                &record.event_name,
                                &percent_decode_str(&record.key).decode_utf8_lossy(),
                            );
                            if matched {
                                let info = NotificationInfo { records: vec![record] };
                                return Some((Ok(info), (rx, cancel, filter, bucket)));
                            }
                        }
                        Ok(Notice::Error { bucket: target, error }) => {
                            if target == bucket {
                                return Some((Err(error), (rx, cancel, filter, bucket)));
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(bucket = %bucket, skipped, "notification subscriber lagged");
                        }
                        Err(RecvError::Closed) => return None,
                    },
                }
            }
        });

        Ok(stream.boxed())
    }
}
