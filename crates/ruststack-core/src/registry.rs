//! Storage client handle registry.
//!
//! Provides [`ClientRegistry`], a thread-safe cache of client handles keyed
//! by endpoint and credential fingerprint. The registry is an ordinary value:
//! the application constructs it once and hands it to whatever builds
//! clients, and tests can [`reset`](ClientRegistry::reset) it between cases.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::ClientConfig;

/// Registry key: the endpoint and a fingerprint of the credentials used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// Endpoint host URL.
    pub endpoint: String,
    /// Hex SHA-256 of the credentials.
    pub fingerprint: String,
}

impl ClientKey {
    /// Derive the key for a client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.host_url.clone(),
            fingerprint: config.fingerprint(),
        }
    }
}

/// Thread-safe cache of shared client handles.
///
/// `T` is usually a trait object such as `dyn StorageApi`. Uses `DashMap`
/// for lock-free concurrent access.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use ruststack_core::{ClientConfig, ClientKey, ClientRegistry};
///
/// let registry = ClientRegistry::<String>::new();
/// let config = ClientConfig::builder().host_url("http://localhost:9000").build();
/// let key = ClientKey::from_config(&config);
///
/// let a = registry.get_or_insert_with(&key, || Arc::new("client".to_owned()));
/// let b = registry.get_or_insert_with(&key, || Arc::new("other".to_owned()));
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug)]
pub struct ClientRegistry<T: ?Sized + Send + Sync> {
    inner: DashMap<ClientKey, Arc<T>>,
}

impl<T: ?Sized + Send + Sync> ClientRegistry<T> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Get the cached handle for `key`, creating it with `make` on first use.
    #[must_use]
    pub fn get_or_insert_with(&self, key: &ClientKey, make: impl FnOnce() -> Arc<T>) -> Arc<T> {
        self.inner
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(endpoint = %key.endpoint, "creating client handle");
                make()
            })
            .clone()
    }

    /// Get the cached handle for `key`, creating it with a fallible `make`.
    ///
    /// Nothing is cached when `make` fails.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &ClientKey,
        make: impl FnOnce() -> Result<Arc<T>, E>,
    ) -> Result<Arc<T>, E> {
        let entry = self.inner.entry(key.clone()).or_try_insert_with(|| {
            debug!(endpoint = %key.endpoint, "creating client handle");
            make()
        })?;
        Ok(entry.clone())
    }

    /// Drop every cached handle.
    pub fn reset(&self) {
        self.inner.clear();
    }

    /// Number of cached handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: ?Sized + Send + Sync> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
