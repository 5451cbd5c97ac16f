//! Object storage primitives for the RustStack filesystem layer.
//!
//! [`StorageApi`] is the primitive API the filesystem view is built on:
//! bucket creation, object reads and writes, paged listings, HEAD, batched
//! deletes, bucket removal and change notifications. [`MemoryStore`]
//! implements it entirely in memory.

pub mod api;
pub mod error;
pub mod memory;
pub mod types;

pub use api::{NotificationStream, StorageApi};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, RetentionMode};
pub use types::{
    BucketInfo, CancelSignal, CancelTrigger, DeleteFailure, DeleteOptions, EventRecord,
    EventSource, ListQuery, NotificationFilter, NotificationInfo, ObjectItem, Page, PutOptions,
    UploadItem, cancel_pair,
};
