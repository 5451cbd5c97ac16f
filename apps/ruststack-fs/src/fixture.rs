//! JSON fixtures for seeding the in-memory store.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ruststack_s3_store::MemoryStore;
use serde::Deserialize;
use tracing::info;

/// `{"buckets": {"name": ["key", ...]}}`
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub buckets: BTreeMap<String, Vec<String>>,
}

impl Fixture {
    /// Parse a fixture document.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid fixture document")
    }

    /// Create every bucket and object in `store`.
    ///
    /// Object bodies are the key itself.
    pub fn apply(&self, store: &MemoryStore) -> Result<()> {
        for (bucket, keys) in &self.buckets {
            store
                .create_bucket(bucket)
                .with_context(|| format!("cannot create bucket {bucket}"))?;
            for key in keys {
                store
                    .put_object(bucket, key, key.clone())
                    .with_context(|| format!("cannot store {bucket}/{key}"))?;
            }
        }
        Ok(())
    }
}

/// Build a store from the fixture at `path`.
pub async fn load(path: &Path) -> Result<MemoryStore> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read fixture {}", path.display()))?;
    let fixture = Fixture::parse(&text)?;

    let store = MemoryStore::new();
    fixture.apply(&store)?;
    info!(
        path = %path.display(),
        buckets = fixture.buckets.len(),
        "seeded store from fixture"
    );
    Ok(store)
}
