//! Watch fan-out/fan-in.
//!
//! One worker per bucket subscribes to change notifications and forwards
//! normalized events and errors into two shared channels. A supervisor task
//! owns the original senders and drops them once every worker has returned,
//! so both channels close exactly once. All workers observe one shared
//! cancellation signal.

use std::sync::Arc;

use futures::StreamExt;
use ruststack_core::FsConfig;
use ruststack_s3_store::{
    CancelSignal, CancelTrigger, NotificationFilter, NotificationInfo, StorageApi, StoreError,
    cancel_pair,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::error::{FsError, FsResult};
use crate::event::{EventCategory, WatchEvent, WatchEventKind, unescape_key};
use crate::locator::Locator;

/// Filters for [`ObjectFs::watch`](crate::ObjectFs::watch).
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct WatchParams {
    /// Only keys starting with this prefix.
    #[builder(default, setter(into))]
    pub prefix: String,
    /// Only keys ending with this suffix.
    #[builder(default, setter(into))]
    pub suffix: String,
    /// Event families to subscribe to. Empty subscribes to all.
    #[builder(default)]
    pub categories: Vec<EventCategory>,
}

/// A running watch.
///
/// Both receivers end once every bucket worker has stopped. Dropping the
/// handle cancels the watch.
#[derive(Debug)]
pub struct WatchHandle {
    /// Normalized events from every watched bucket.
    pub events: mpsc::Receiver<WatchEvent>,
    /// Errors from every watched bucket.
    pub errors: mpsc::Receiver<FsError>,
    trigger: CancelTrigger,
}

impl WatchHandle {
    /// Stop every worker. Safe to call more than once.
    pub fn cancel(&self) {
        self.trigger.cancel();
    }
}

/// Start watching the buckets named by `root`.
pub(crate) async fn watch(
    api: Arc<dyn StorageApi>,
    root: &Locator,
    config: &FsConfig,
    params: WatchParams,
) -> FsResult<WatchHandle> {
    let (bucket, object) = root.resolve();
    if !object.is_empty() && !params.prefix.is_empty() {
        return Err(FsError::Usage(format!(
            "`{root}` names an object path and a prefix filter was also given"
        )));
    }

    let filter = NotificationFilter {
        prefix: if object.is_empty() { params.prefix } else { object },
        suffix: params.suffix,
        events: params
            .categories
            .iter()
            .map(|c| c.pattern().to_owned())
            .collect(),
    };

    let endpoint = api.endpoint();
    let buckets = if bucket.is_empty() {
        api.list_buckets()
            .await
            .map_err(|e| FsError::from_store(e, "", "", &endpoint))?
            .into_iter()
            .map(|info| info.name)
            .collect()
    } else {
        vec![bucket]
    };

    let buffer = config.watch_buffer.max(1);
    let (events_tx, events_rx) = mpsc::channel(buffer);
    let (errors_tx, errors_rx) = mpsc::channel(buffer);
    let (trigger, signal) = cancel_pair();

    info!(buckets = buckets.len(), prefix = %filter.prefix, "starting watch");
    let mut workers = JoinSet::new();
    for bucket in buckets {
        let worker = Worker {
            api: Arc::clone(&api),
            root: root.clone(),
            bucket,
            filter: filter.clone(),
            endpoint: endpoint.clone(),
            events: events_tx.clone(),
            errors: errors_tx.clone(),
        };
        workers.spawn(worker.run(signal.clone()));
    }

    tokio::spawn(async move {
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "watch worker failed");
            }
        }
        drop(events_tx);
        drop(errors_tx);
        debug!("watch streams closed");
    });

    Ok(WatchHandle {
        events: events_rx,
        errors: errors_rx,
        trigger,
    })
}

#[derive(Debug)]
struct Worker {
    api: Arc<dyn StorageApi>,
    root: Locator,
    bucket: String,
    filter: NotificationFilter,
    endpoint: String,
    events: mpsc::Sender<WatchEvent>,
    errors: mpsc::Sender<FsError>,
}

impl Worker {
    async fn run(self, mut cancel: CancelSignal) {
        let subscription = cancel.clone();
        let subscribed = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = self.api.subscribe_notifications(&self.bucket, &self.filter, subscription) => result,
        };
        let mut stream = match subscribed {
            Ok(stream) => stream,
            Err(e) => {
                self.send_error(&mut cancel, self.translate(e)).await;
                return;
            }
        };
        debug!(bucket = %self.bucket, "watch worker subscribed");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.events.closed() => break,
                item = stream.next() => match item {
                    Some(Ok(info)) => {
                        if !self.forward(&mut cancel, info).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        self.send_error(&mut cancel, self.translate(e)).await;
                        break;
                    }
                    None => break,
                },
            }
        }
        debug!(bucket = %self.bucket, "watch worker stopped");
    }

    fn translate(&self, error: StoreError) -> FsError {
        match error {
            StoreError::NotImplemented { .. } => FsError::Unsupported {
                api: "Watch".to_owned(),
                endpoint: self.endpoint.clone(),
            },
            other => FsError::from_store(other, &self.bucket, &self.filter.prefix, &self.endpoint),
        }
    }

    async fn forward(&self, cancel: &mut CancelSignal, info: NotificationInfo) -> bool {
        for record in info.records {
            let Some(kind) = WatchEventKind::classify(&record.event_name) else {
                debug!(bucket = %self.bucket, event = %record.event_name, "dropping unrecognized event");
                continue;
            };
            let sent = match unescape_key(&record.key) {
                Ok(key) => {
                    let event = WatchEvent::from_record(kind, record, &self.root, &key);
                    self.send_event(cancel, event).await
                }
                Err(e) => self.send_error(cancel, e).await,
            };
            if !sent {
                return false;
            }
        }
        true
    }

    async fn send_event(&self, cancel: &mut CancelSignal, event: WatchEvent) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            result = self.events.send(event) => result.is_ok(),
        }
    }

    async fn send_error(&self, cancel: &mut CancelSignal, error: FsError) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            result = self.errors.send(error) => result.is_ok(),
        }
    }
}
