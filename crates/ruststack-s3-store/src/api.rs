//! The primitive storage API.
//!
//! [`StorageApi`] is the seam between the filesystem layer and whatever
//! speaks the storage wire protocol. Implementations must be safe to share
//! across tasks; callers hold them as `Arc<dyn StorageApi>`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::error::StoreResult;
use crate::types::{
    BucketInfo, CancelSignal, DeleteFailure, DeleteOptions, ListQuery, NotificationFilter,
    NotificationInfo, ObjectItem, Page, PutOptions, UploadItem,
};

/// Stream of raw notification batches from one bucket subscription.
pub type NotificationStream = BoxStream<'static, StoreResult<NotificationInfo>>;

/// Primitive operations against an object storage endpoint.
#[async_trait]
pub trait StorageApi: Send + Sync + std::fmt::Debug {
    /// Endpoint this client talks to, used in error reports.
    fn endpoint(&self) -> String;

    /// List every bucket visible to the caller.
    async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>>;

    /// Whether `bucket` exists.
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    /// Create a bucket.
    async fn make_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Store an object, returning its etag.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        opts: PutOptions,
    ) -> StoreResult<String>;

    /// Read an object's content.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Server-side copy of one object, possibly across buckets.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StoreResult<()>;

    /// Fetch one page of keys (and common prefixes when delimited).
    async fn list_objects_page(&self, query: &ListQuery) -> StoreResult<Page<ObjectItem>>;

    /// Fetch one page of in-progress multipart uploads.
    async fn list_uploads_page(&self, query: &ListQuery) -> StoreResult<Page<UploadItem>>;

    /// HEAD a single object.
    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectItem>;

    /// Open a batch delete conduit for `bucket`.
    ///
    /// Keys sent on `names` are deleted in batches. Every key that fails is
    /// reported on the returned channel, which closes after `names` closes
    /// and the last batch completes.
    fn delete_objects(
        &self,
        bucket: &str,
        names: mpsc::Receiver<String>,
        opts: DeleteOptions,
    ) -> mpsc::Receiver<DeleteFailure>;

    /// Abort every in-progress upload for `key`.
    async fn remove_incomplete_upload(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Remove an empty bucket.
    async fn remove_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Subscribe to change notifications for `bucket`.
    ///
    /// The stream ends when `cancel` fires.
    async fn subscribe_notifications(
        &self,
        bucket: &str,
        filter: &NotificationFilter,
        cancel: CancelSignal,
    ) -> StoreResult<NotificationStream>;
}
