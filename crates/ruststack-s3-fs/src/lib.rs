//! Filesystem view over object storage.
//!
//! [`ObjectFs`] presents a bucket/key namespace as a tree:
//!
//! - [`ObjectFs::list`] lazily lists objects, synthesized directories and
//!   incomplete uploads, optionally recursing depth-first with directories
//!   placed before or after their children.
//! - [`ObjectFs::stat`] resolves a single target.
//! - [`ObjectFs::make_bucket`] creates a bucket or a folder marker, and
//!   [`ObjectFs::put`], [`ObjectFs::get`] and [`ObjectFs::copy_from`] move
//!   single objects.
//! - [`ObjectFs::remove`] consumes a stream of [`RemoveTarget`]s and batches
//!   them into per-bucket delete conduits, streaming back every failure.
//! - [`ObjectFs::watch`] subscribes to change notifications on one or all
//!   buckets and merges them into one event stream and one error stream.
//!
//! Views are opened through [`ObjectFsFactory`], which shares storage
//! handles per endpoint and credential through a
//! [`ClientRegistry`](ruststack_core::ClientRegistry).

mod client;
mod entry;
mod error;
mod event;
mod list;
mod locator;
mod object;
mod remove;
mod stat;
mod watch;

pub use client::{Connector, ObjectFs, ObjectFsFactory};
pub use entry::{DirPlacement, Entry, EntryKind, ListOptions};
pub use error::{ErrorKind, FsError, FsResult};
pub use event::{EventCategory, WatchEvent, WatchEventKind};
pub use locator::{DEFAULT_SEPARATOR, Locator, is_virtual_host_style};
pub use object::DEFAULT_CONTENT_TYPE;
pub use remove::{RemoveError, RemoveErrorStream, RemoveOptions, RemoveTarget};
pub use watch::{WatchHandle, WatchParams};
