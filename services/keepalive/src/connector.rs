use keepalive_database::DocumentStore;
use keepalive_utils::{KeepaliveConfig, KeepaliveError, KeepaliveResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Handle to the cluster connection, probed before it is handed out.
///
/// Dropping the handle releases the connection, so every exit path
/// (including a failed probe) cleans up.
pub struct ClusterConnection {
    store: Arc<dyn DocumentStore>,
    cluster: String,
}

impl ClusterConnection {
    /// Connects with the configured credentials, then pings the target collection.
    pub async fn open(config: &KeepaliveConfig) -> KeepaliveResult<Self> {
        let cluster = config.cluster.connection_string.clone();
        let store = keepalive_database::connect(&config.cluster).await.map_err(|e| {
            KeepaliveError::connection(format!("failed to connect to cluster '{}': {}", cluster, e))
        })?;

        Self::establish(store, cluster, config.operation_timeout).await
    }

    /// Wraps an already-open store and probes it.
    pub async fn establish(
        store: Arc<dyn DocumentStore>,
        cluster: impl Into<String>,
        probe_timeout: Duration,
    ) -> KeepaliveResult<Self> {
        let connection = Self {
            store,
            cluster: cluster.into(),
        };
        connection.probe(probe_timeout).await?;
        Ok(connection)
    }

    pub async fn probe(&self, timeout: Duration) -> KeepaliveResult<()> {
        let namespace = self.store.namespace();
        self.store
            .ping(timeout)
            .await
            .map_err(|e| KeepaliveError::probe(namespace.to_string(), e.to_string()))
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }
}

impl Drop for ClusterConnection {
    fn drop(&mut self) {
        info!(cluster = %self.cluster, "Cluster connection released");
    }
}
