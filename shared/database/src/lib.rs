pub mod error;
pub mod memory;
pub mod redis;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use keepalive_models::KeepaliveDocument;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Operations the keepalive loop needs from the cluster.
///
/// Every call takes its own timeout. A missing document is always reported
/// as [`StoreError::NotFound`] so callers can tell it apart from real failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn namespace(&self) -> &Namespace;

    /// Liveness probe scoped to the configured collection
    async fn ping(&self, timeout: Duration) -> StoreResult<()>;

    async fn get(&self, id: &str, timeout: Duration) -> StoreResult<KeepaliveDocument>;

    /// Insert-only write; fails with [`StoreError::AlreadyExists`] if the id is live
    async fn insert(
        &self,
        document: &KeepaliveDocument,
        expiry: Duration,
        timeout: Duration,
    ) -> StoreResult<()>;

    /// Adds `delta` to a counter document, creating it with `initial` when absent.
    /// Returns the counter value after the call.
    async fn increment(
        &self,
        id: &str,
        delta: u64,
        initial: u64,
        timeout: Duration,
    ) -> StoreResult<u64>;
}

/// Bucket, scope and collection that all keepalive documents live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub bucket: String,
    pub scope: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(
        bucket: impl Into<String>,
        scope: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            scope: scope.into(),
            collection: collection.into(),
        }
    }

    pub fn key(&self, id: &str) -> String {
        format!("{}:{}:{}:{}", self.bucket, self.scope, self.collection, id)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bucket, self.scope, self.collection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub connection_string: String,
    pub username: String,
    pub password: String,
    pub bucket_name: String,
    pub scope_name: String,
    pub collection_name: String,
    pub connect_timeout: Duration,
    pub backend: StoreBackend,
}

impl ClusterConfig {
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.bucket_name, &self.scope_name, &self.collection_name)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            connection_string: "localhost".to_string(),
            username: String::new(),
            password: String::new(),
            bucket_name: "default".to_string(),
            scope_name: "_default".to_string(),
            collection_name: "_default".to_string(),
            connect_timeout: Duration::from_secs(10),
            backend: StoreBackend::Redis,
        }
    }
}

/// Opens the store selected by `config.backend`.
pub async fn connect(config: &ClusterConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Redis => Ok(Arc::new(RedisStore::connect(config).await?)),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, nothing is sent to the cluster");
            Ok(Arc::new(MemoryStore::new(config.namespace())))
        }
    }
}

/// Bounds `future` by `timeout`, reporting expiry as [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, timeout }),
    }
}
