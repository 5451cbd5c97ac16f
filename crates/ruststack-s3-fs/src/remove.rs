//! Bulk remove pipeline.
//!
//! Targets are consumed in order and routed to one per-bucket delete conduit
//! at a time. Failures reported by a conduit are forwarded as
//! [`RemoveError`]s; a bucket's failures are fully drained before the next
//! bucket's conduit opens.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use ruststack_core::FsConfig;
use ruststack_s3_store::{DeleteFailure, DeleteOptions, StorageApi};
use tokio::sync::mpsc;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::entry::Entry;
use crate::error::{FsError, FsResult};
use crate::locator::Locator;

/// One thing for the pipeline to act on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoveTarget {
    /// Delete `key` from `bucket`.
    Object {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// Nothing more is coming for `bucket`; close its conduit now.
    EndOfBucket {
        /// Bucket name.
        bucket: String,
    },
}

impl RemoveTarget {
    /// The bucket this target belongs to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::Object { bucket, .. } | Self::EndOfBucket { bucket } => bucket,
        }
    }

    /// Convert a listing entry. Error entries are skipped, and a bucket
    /// entry marks the end of that bucket.
    #[must_use]
    pub fn from_entry(entry: &Entry) -> Option<Self> {
        if entry.error.is_some() {
            return None;
        }
        let (bucket, key) = entry.bucket_and_key();
        if bucket.is_empty() {
            return None;
        }
        Some(if key.is_empty() {
            Self::EndOfBucket { bucket }
        } else {
            Self::Object { bucket, key }
        })
    }
}

/// Options for [`ObjectFs::remove`](crate::ObjectFs::remove).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder)]
pub struct RemoveOptions {
    /// Abort incomplete uploads instead of deleting objects.
    #[builder(default)]
    pub incomplete: bool,
    /// Remove each bucket once its objects are gone.
    #[builder(default)]
    pub remove_bucket: bool,
    /// Delete objects under governance retention.
    #[builder(default)]
    pub bypass_governance: bool,
}

/// A target that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to remove {locator}: {cause}")]
pub struct RemoveError {
    /// What could not be removed.
    pub locator: Locator,
    /// Why.
    pub cause: FsError,
}

/// Stream of [`RemoveError`]s. Ends when the pipeline has finished.
#[derive(Debug)]
pub struct RemoveErrorStream {
    rx: mpsc::Receiver<RemoveError>,
}

impl Stream for RemoveErrorStream {
    type Item = RemoveError;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Start removing `targets`.
///
/// Fails up front, before any delete call, when bucket removal is requested
/// for a locator that names an object path.
pub(crate) fn remove<S>(
    api: Arc<dyn StorageApi>,
    root: &Locator,
    config: &FsConfig,
    opts: RemoveOptions,
    targets: S,
) -> FsResult<RemoveErrorStream>
where
    S: Stream<Item = RemoveTarget> + Send + 'static,
{
    let (_, object) = root.resolve();
    if opts.remove_bucket && !object.is_empty() {
        return Err(FsError::Usage(format!(
            "cannot delete prefixes with `rb`, `{root}` names an object path"
        )));
    }

    let result_buffer = config.result_buffer.max(1);
    let (tx, rx) = mpsc::channel(result_buffer);
    let pipeline = Pipeline {
        api,
        root: root.clone(),
        opts,
        queue_depth: config.remove_queue_depth.max(1),
        result_buffer,
        errors: tx,
    };
    tokio::spawn(pipeline.run(targets));

    Ok(RemoveErrorStream { rx })
}

#[derive(Debug)]
struct Conduit {
    bucket: String,
    names: Option<mpsc::Sender<String>>,
    failures: mpsc::Receiver<DeleteFailure>,
}

impl Conduit {
    fn is_open(&self) -> bool {
        self.names.is_some()
    }

    fn close(&mut self) {
        self.names = None;
    }
}

#[derive(Debug)]
struct Pipeline {
    api: Arc<dyn StorageApi>,
    root: Locator,
    opts: RemoveOptions,
    queue_depth: usize,
    result_buffer: usize,
    errors: mpsc::Sender<RemoveError>,
}

impl Pipeline {
    async fn run<S>(self, targets: S)
    where
        S: Stream<Item = RemoveTarget> + Send,
    {
        let mut targets = std::pin::pin!(targets);
        let mut current: Option<Conduit> = None;

        while let Some(target) = targets.next().await {
            let bucket = target.bucket().to_owned();
            if bucket.is_empty() {
                debug!("skipping remove target without bucket");
                continue;
            }
            let end = matches!(target, RemoveTarget::EndOfBucket { .. });

            let conduit = match current.take() {
                Some(c) if c.bucket == bucket && (c.is_open() || end) => c,
                Some(prev) => {
                    // Reopening the same bucket after its end marker keeps it.
                    let switching = prev.bucket != bucket;
                    if !self.finish(prev, switching).await {
                        return;
                    }
                    self.open(&bucket)
                }
                None => self.open(&bucket),
            };
            let conduit = current.insert(conduit);

            match target {
                RemoveTarget::Object { key, .. } => {
                    if !self.submit(conduit, key).await {
                        return;
                    }
                }
                RemoveTarget::EndOfBucket { .. } => conduit.close(),
            }
        }

        if let Some(last) = current.take() {
            self.finish(last, true).await;
        }
        debug!("remove pipeline finished");
    }

    fn open(&self, bucket: &str) -> Conduit {
        let (names_tx, names_rx) = mpsc::channel(self.queue_depth);
        let failures = if self.opts.incomplete {
            spawn_abort(
                Arc::clone(&self.api),
                bucket.to_owned(),
                names_rx,
                self.result_buffer,
            )
        } else {
            self.api.delete_objects(
                bucket,
                names_rx,
                DeleteOptions {
                    bypass_governance: self.opts.bypass_governance,
                    result_buffer: self.result_buffer,
                },
            )
        };
        debug!(bucket = %bucket, incomplete = self.opts.incomplete, "delete conduit opened");

        Conduit {
            bucket: bucket.to_owned(),
            names: Some(names_tx),
            failures,
        }
    }

    /// Hand `key` to the conduit, forwarding any failures that are ready in
    /// the meantime. Returns `false` once the consumer has gone away.
    async fn submit(&self, conduit: &mut Conduit, key: String) -> bool {
        let Some(names) = conduit.names.as_ref() else {
            return true;
        };
        loop {
            tokio::select! {
                permit = names.reserve() => {
                    if let Ok(permit) = permit {
                        permit.send(key);
                        return true;
                    }
                    let cause = FsError::Transport {
                        code: "InternalError".to_owned(),
                        message: "delete conduit closed".to_owned(),
                    };
                    return self.report(&conduit.bucket, &key, cause).await;
                }
                Some(failure) = conduit.failures.recv() => {
                    if !self.report_failure(&conduit.bucket, failure).await {
                        return false;
                    }
                }
            }
        }
    }

    /// Close the conduit, drain it, and remove the bucket when asked to.
    async fn finish(&self, mut conduit: Conduit, remove_bucket: bool) -> bool {
        conduit.close();
        while let Some(failure) = conduit.failures.recv().await {
            if !self.report_failure(&conduit.bucket, failure).await {
                return false;
            }
        }

        if remove_bucket && self.opts.remove_bucket && !self.opts.incomplete {
            match self.api.remove_bucket(&conduit.bucket).await {
                Ok(()) => info!(bucket = %conduit.bucket, "bucket removed"),
                Err(e) => {
                    let cause = FsError::from_store(e, &conduit.bucket, "", &self.api.endpoint());
                    return self.report(&conduit.bucket, "", cause).await;
                }
            }
        }
        true
    }

    async fn report_failure(&self, bucket: &str, failure: DeleteFailure) -> bool {
        let cause = FsError::from_store(failure.error, bucket, &failure.key, &self.api.endpoint());
        self.report(bucket, &failure.key, cause).await
    }

    async fn report(&self, bucket: &str, key: &str, cause: FsError) -> bool {
        let error = RemoveError {
            locator: self.root.child(bucket, key),
            cause,
        };
        if self.errors.send(error).await.is_err() {
            debug!(bucket = %bucket, "remove error receiver dropped");
            return false;
        }
        true
    }
}

/// Conduit for the incomplete-upload domain.
fn spawn_abort(
    api: Arc<dyn StorageApi>,
    bucket: String,
    mut names: mpsc::Receiver<String>,
    buffer: usize,
) -> mpsc::Receiver<DeleteFailure> {
    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(async move {
        while let Some(key) = names.recv().await {
            if let Err(error) = api.remove_incomplete_upload(&bucket, &key).await {
                if tx.send(DeleteFailure { key, error }).await.is_err() {
                    return;
                }
            }
        }
    });
    rx
}
