//! Listing engine.
//!
//! A [`Lister`] is a depth-first walk driven by an explicit stack of
//! [`Task`]s. Each pull pops tasks until one yields an [`Entry`]; expanding
//! a frame fetches exactly one page and pushes its items (and the
//! continuation for the next page) back on the stack, so at most one page per
//! open branch is held in memory.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use ruststack_s3_store::{ListQuery, StorageApi, StoreResult};
use tracing::debug;

use crate::entry::{DirPlacement, Entry, ListOptions};
use crate::error::{ErrorKind, FsError};
use crate::locator::Locator;
use crate::stat::stat;

/// How a frame treats the items of its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// Immediate children only.
    OneLevel,
    /// Delimited listing, recursing into every sub-prefix.
    Descend,
    /// A single non-delimited listing; directories never materialize.
    Flat,
}

/// One page worth of listing under `prefix`.
#[derive(Debug)]
struct Frame {
    bucket: String,
    prefix: String,
    cursor: Option<String>,
    walk: Walk,
}

impl Frame {
    fn new(bucket: &str, prefix: &str, walk: Walk) -> Self {
        Self {
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
            cursor: None,
            walk,
        }
    }
}

#[derive(Debug)]
enum Task {
    /// Resolve the root locator into the initial tasks.
    Seed,
    /// Hand this entry to the consumer.
    Emit(Box<Entry>),
    /// Fetch the next page of a frame.
    Expand(Frame),
    /// Hand this entry to the consumer only if nothing was emitted since
    /// the emitted count was `mark`.
    Fallback { entry: Box<Entry>, mark: usize },
}

/// Stateful depth-first walker behind [`list`].
#[derive(Debug)]
pub(crate) struct Lister {
    api: Arc<dyn StorageApi>,
    root: Locator,
    opts: ListOptions,
    page_size: usize,
    stack: Vec<Task>,
    emitted: usize,
}

/// Lazily list `root` according to `opts`.
pub(crate) fn list(
    api: Arc<dyn StorageApi>,
    root: Locator,
    opts: ListOptions,
    page_size: usize,
) -> BoxStream<'static, Entry> {
    let lister = Lister {
        api,
        root,
        opts,
        page_size: page_size.max(1),
        stack: vec![Task::Seed],
        emitted: 0,
    };
    stream::unfold(lister, |mut lister| async move {
        let entry = lister.next_entry().await?;
        Some((entry, lister))
    })
    .boxed()
}

impl Lister {
    async fn next_entry(&mut self) -> Option<Entry> {
        while let Some(task) = self.stack.pop() {
            match task {
                Task::Emit(entry) => {
                    self.emitted += 1;
                    return Some(*entry);
                }
                Task::Fallback { entry, mark } if mark == self.emitted => {
                    self.emitted += 1;
                    return Some(*entry);
                }
                Task::Fallback { .. } => {}
                Task::Seed => self.seed().await,
                Task::Expand(frame) => self.expand(frame).await,
            }
        }
        None
    }

    fn emit(&mut self, entry: Entry) {
        self.stack.push(Task::Emit(Box::new(entry)));
    }

    fn fail(&mut self, locator: Locator, error: FsError) {
        debug!(locator = %locator, error = %error, "listing branch failed");
        self.emit(Entry::failed(locator, error));
    }

    /// Push `dir` and its subtree so the directory lands where the placement
    /// policy wants it.
    fn push_tree(&mut self, dir: Entry, frame: Frame) {
        match self.opts.dir_placement {
            DirPlacement::First => {
                self.stack.push(Task::Expand(frame));
                self.emit(dir);
            }
            DirPlacement::Last => {
                self.emit(dir);
                self.stack.push(Task::Expand(frame));
            }
            DirPlacement::None => self.stack.push(Task::Expand(frame)),
        }
    }

    fn recursive_walk(&self) -> Walk {
        match self.opts.dir_placement {
            DirPlacement::None => Walk::Flat,
            DirPlacement::First | DirPlacement::Last => Walk::Descend,
        }
    }

    async fn check_bucket(&self, bucket: &str) -> Result<Entry, FsError> {
        match self.api.bucket_exists(bucket).await {
            Ok(true) => Ok(Entry::directory(self.root.child(bucket, ""))),
            Ok(false) => Err(FsError::BucketMissing {
                bucket: bucket.to_owned(),
            }),
            Err(e) => Err(FsError::from_store(e, bucket, "", &self.api.endpoint())),
        }
    }

    async fn seed(&mut self) {
        let (bucket, object) = self.root.resolve();

        if bucket.is_empty() {
            self.seed_buckets().await;
            return;
        }

        if !self.opts.recursive {
            let trailing = self.root.path().ends_with(self.root.separator());
            if object.is_empty() && !trailing {
                match self.check_bucket(&bucket).await {
                    Ok(entry) => self.emit(entry),
                    Err(e) => self.fail(self.root.clone(), e),
                }
            } else {
                self.stack
                    .push(Task::Expand(Frame::new(&bucket, &object, Walk::OneLevel)));
            }
            return;
        }

        if self.opts.dir_placement == DirPlacement::None {
            self.stack
                .push(Task::Expand(Frame::new(&bucket, &object, Walk::Flat)));
            return;
        }

        if object.is_empty() {
            match self.check_bucket(&bucket).await {
                Ok(dir) => self.push_tree(dir, Frame::new(&bucket, "", Walk::Descend)),
                Err(e) => self.fail(self.root.clone(), e),
            }
            return;
        }

        match stat(
            self.api.as_ref(),
            &self.root,
            self.opts.incomplete,
            self.page_size,
        )
        .await
        {
            Ok(entry) if entry.is_dir() => {
                let (_, key) = entry.bucket_and_key();
                self.push_tree(entry, Frame::new(&bucket, &key, Walk::Descend));
            }
            Ok(entry) => self.emit(entry),
            Err(e) if e.kind() == ErrorKind::ResourceMissing => {
                // Keys may still share the bare prefix; report the miss only
                // if the walk finds none.
                debug!(bucket = %bucket, prefix = %object, "no root entry, walking prefix");
                self.stack.push(Task::Fallback {
                    entry: Box::new(Entry::failed(self.root.clone(), e)),
                    mark: self.emitted,
                });
                self.stack
                    .push(Task::Expand(Frame::new(&bucket, &object, Walk::Descend)));
            }
            Err(e) => self.fail(self.root.clone(), e),
        }
    }

    async fn seed_buckets(&mut self) {
        let buckets = match self.api.list_buckets().await {
            Ok(buckets) => buckets,
            Err(e) => {
                let error = FsError::from_store(e, "", "", &self.api.endpoint());
                self.fail(self.root.clone(), error);
                return;
            }
        };
        debug!(count = buckets.len(), "listing buckets");

        let walk = self.recursive_walk();
        for info in buckets.iter().rev() {
            let dir = Entry::bucket(&self.root, info);
            if self.opts.recursive {
                self.push_tree(dir, Frame::new(&info.name, "", walk));
            } else {
                self.emit(dir);
            }
        }
    }

    async fn fetch(&self, query: &ListQuery) -> StoreResult<(Vec<Entry>, Option<String>)> {
        let bucket = query.bucket.as_str();
        if self.opts.incomplete {
            let page = self.api.list_uploads_page(query).await?;
            let entries = page
                .items
                .into_iter()
                .map(|item| Entry::from_upload(&self.root, bucket, item))
                .collect();
            Ok((entries, page.next_cursor))
        } else {
            let page = self.api.list_objects_page(query).await?;
            let entries = page
                .items
                .into_iter()
                .map(|item| Entry::from_object(&self.root, bucket, item))
                .collect();
            Ok((entries, page.next_cursor))
        }
    }

    async fn expand(&mut self, frame: Frame) {
        let sep = self.root.separator();
        let mut query = match frame.walk {
            Walk::Flat => ListQuery::recursive(&frame.bucket, &frame.prefix),
            Walk::OneLevel | Walk::Descend => {
                ListQuery::delimited(&frame.bucket, &frame.prefix, sep)
            }
        };
        query.cursor.clone_from(&frame.cursor);
        query.max_keys = self.page_size;
        query.with_metadata = self.opts.with_metadata;

        let (entries, next_cursor) = match self.fetch(&query).await {
            Ok(page) => page,
            Err(e) => {
                let error =
                    FsError::from_store(e, &frame.bucket, &frame.prefix, &self.api.endpoint());
                self.fail(self.root.child(&frame.bucket, &frame.prefix), error);
                return;
            }
        };

        if let Some(cursor) = next_cursor {
            self.stack.push(Task::Expand(Frame {
                cursor: Some(cursor),
                ..Frame::new(&frame.bucket, &frame.prefix, frame.walk)
            }));
        }

        for entry in entries.into_iter().rev() {
            let (_, key) = entry.bucket_and_key();
            match frame.walk {
                Walk::Flat => {
                    if !entry.is_dir() {
                        self.emit(entry);
                    }
                }
                // The prefix's own marker key is the directory being listed.
                _ if key == frame.prefix && key.ends_with(sep) => {}
                Walk::Descend if entry.is_dir() => {
                    self.push_tree(entry, Frame::new(&frame.bucket, &key, Walk::Descend));
                }
                Walk::OneLevel | Walk::Descend => self.emit(entry),
            }
        }
    }
}
