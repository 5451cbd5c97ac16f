//! The filesystem facade and the factory that builds it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use futures::stream::BoxStream;
use ruststack_core::{BucketLookup, ClientConfig, ClientKey, ClientRegistry, FsConfig};
use ruststack_s3_store::{PutOptions, StorageApi};
use tracing::debug;

use crate::entry::{Entry, ListOptions};
use crate::error::FsResult;
use crate::list::list;
use crate::locator::Locator;
use crate::object;
use crate::remove::{RemoveErrorStream, RemoveOptions, RemoveTarget, remove};
use crate::stat::stat;
use crate::watch::{WatchHandle, WatchParams, watch};

/// Builds a storage handle for a client configuration.
pub type Connector = Arc<dyn Fn(&ClientConfig) -> FsResult<Arc<dyn StorageApi>> + Send + Sync>;

/// A filesystem view of one target locator.
#[derive(Debug, Clone)]
pub struct ObjectFs {
    api: Arc<dyn StorageApi>,
    target: Locator,
    config: FsConfig,
}

impl ObjectFs {
    /// View `target` through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn StorageApi>, target: Locator, config: FsConfig) -> Self {
        Self {
            api,
            target,
            config,
        }
    }

    /// The target locator.
    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.target
    }

    /// The underlying storage handle.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn StorageApi> {
        &self.api
    }

    /// Lazily list the target.
    ///
    /// Branch failures show up as entries with `error` set; the stream keeps
    /// going past them.
    #[must_use]
    pub fn list(&self, opts: ListOptions) -> BoxStream<'static, Entry> {
        list(
            Arc::clone(&self.api),
            self.target.clone(),
            opts,
            self.config.list_page_size,
        )
    }

    /// Resolve the target to a single entry.
    ///
    /// # Errors
    ///
    /// Returns a usage error without a bucket, and a missing-resource error
    /// when neither an object nor a prefix exists at the target.
    pub async fn stat(&self, incomplete: bool) -> FsResult<Entry> {
        stat(
            self.api.as_ref(),
            &self.target,
            incomplete,
            self.config.list_page_size,
        )
        .await
    }

    /// Create the target bucket, or a zero-byte folder marker when the
    /// target has an object path.
    ///
    /// A missing bucket is created before the marker is written.
    ///
    /// # Errors
    ///
    /// Returns a usage error without a bucket or when the object path does
    /// not end with the separator. An existing bucket is an error unless
    /// `ignore_existing` is set.
    pub async fn make_bucket(&self, ignore_existing: bool) -> FsResult<()> {
        object::make_bucket(self.api.as_ref(), &self.target, ignore_existing).await
    }

    /// Write `data` at the target and return its etag.
    ///
    /// `Content-Type` defaults to [`DEFAULT_CONTENT_TYPE`](crate::DEFAULT_CONTENT_TYPE).
    pub async fn put(&self, data: Bytes, opts: PutOptions) -> FsResult<String> {
        object::put(self.api.as_ref(), &self.target, data, opts).await
    }

    /// Read the target object.
    pub async fn get(&self) -> FsResult<Bytes> {
        object::get(self.api.as_ref(), &self.target).await
    }

    /// Server-side copy of `source` to the target.
    pub async fn copy_from(&self, source: &Locator) -> FsResult<()> {
        object::copy(self.api.as_ref(), source, &self.target).await
    }

    /// Remove `targets`, streaming back every failure.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a usage error when `opts.remove_bucket` is set and the target
    /// names an object path.
    pub fn remove<S>(&self, opts: RemoveOptions, targets: S) -> FsResult<RemoveErrorStream>
    where
        S: Stream<Item = RemoveTarget> + Send + 'static,
    {
        remove(
            Arc::clone(&self.api),
            &self.target,
            &self.config,
            opts,
            targets,
        )
    }

    /// Watch the target's bucket, or every bucket when it names none.
    ///
    /// # Errors
    ///
    /// Returns a usage error when the target has an object path and
    /// `params.prefix` is also set, and any error from listing buckets.
    pub async fn watch(&self, params: WatchParams) -> FsResult<WatchHandle> {
        watch(Arc::clone(&self.api), &self.target, &self.config, params).await
    }
}

/// Opens [`ObjectFs`] views, sharing storage handles through a
/// [`ClientRegistry`].
#[derive(Clone)]
pub struct ObjectFsFactory {
    registry: Arc<ClientRegistry<dyn StorageApi>>,
    connector: Connector,
    config: FsConfig,
}

impl fmt::Debug for ObjectFsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFsFactory")
            .field("clients", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ObjectFsFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry<dyn StorageApi>>,
        connector: Connector,
        config: FsConfig,
    ) -> Self {
        Self {
            registry,
            connector,
            config,
        }
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry<dyn StorageApi>> {
        &self.registry
    }

    /// Open a view of `address` using the endpoint described by `client`.
    ///
    /// # Errors
    ///
    /// Returns whatever the connector fails with; nothing is cached then.
    pub fn open(&self, address: &str, client: &ClientConfig) -> FsResult<ObjectFs> {
        let lookup = match client.bucket_lookup {
            BucketLookup::Auto => self.config.bucket_lookup,
            explicit => explicit,
        };
        let target = Locator::parse(address, lookup);
        let key = ClientKey::from_config(client);
        let api = self
            .registry
            .get_or_try_insert_with(&key, || (self.connector)(client))?;
        debug!(locator = %target, endpoint = %key.endpoint, "opened object fs");
        Ok(ObjectFs::new(api, target, self.config.clone()))
    }
}
