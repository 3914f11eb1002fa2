//! Time-bounded memoization of schema artifacts with a local file override

use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use apollo_compiler::{Schema, validation::Valid};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, info, warn};

/// A value held by the schema cache
#[derive(Debug, Clone)]
pub enum CachedValue {
    /// Raw text, such as SDL or the contents of an override file
    Text(String),

    /// An arbitrary JSON document
    Json(Value),

    /// A parsed and validated schema
    Schema(Arc<Valid<Schema>>),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

/// Schema cache configuration
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct SchemaCacheConfig {
    /// How long fetched schema artifacts are kept (default: 1h)
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub ttl: Duration,

    /// Directory searched for `<key>.graphql` override files
    pub local_dir: Option<PathBuf>,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            local_dir: Some(PathBuf::from("schemas")),
        }
    }
}

/// In-process cache for schema artifacts fetched from the upstream endpoint
///
/// A lookup checks memory first, then an override file named after the key
/// in the local directory, and finally falls back to the supplied fetch.
/// Failed fetches are never cached.
#[derive(Debug)]
pub struct SchemaCache {
    ttl: Duration,
    local_dir: Option<PathBuf>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SchemaCache {
    pub fn new(ttl: Duration, local_dir: Option<PathBuf>) -> Self {
        Self {
            ttl,
            local_dir,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SchemaCacheConfig) -> Self {
        Self::new(config.ttl, config.local_dir.clone())
    }

    /// Return the cached value for `key`, resolving and storing it on a miss
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<CachedValue, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue, E>>,
    {
        if let Some(value) = self.live_entry(key).await {
            debug!("Cache hit (memory) for {key}");
            return Ok(value);
        }

        if let Some(text) = self.read_override(key).await {
            info!("Cache hit (file) for {key}");
            let value = CachedValue::Text(text);
            self.set(key, value.clone()).await;
            return Ok(value);
        }

        debug!("Cache miss for {key}");
        let value = fetch().await?;
        self.set(key, value.clone()).await;
        Ok(value)
    }

    /// Store a value under `key` with the configured time to live
    pub async fn set(&self, key: &str, value: CachedValue) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn live_entry(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn read_override(&self, key: &str) -> Option<String> {
        let path = override_path(self.local_dir.as_deref()?, key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => {
                warn!("Could not read schema override {}: {error}", path.display());
                None
            }
        }
    }
}

fn override_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.graphql"))
}
