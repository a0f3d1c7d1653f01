use async_trait::async_trait;
use keepalive_models::KeepaliveDocument;
use redis::{aio::ConnectionManager, Client, ConnectionInfo, IntoConnectionInfo};
use std::time::Duration;

use crate::{with_timeout, ClusterConfig, DocumentStore, Namespace, StoreError, StoreResult};

/// Id probed with `EXISTS` to check access to the namespace.
const PROBE_ID: &str = "__keepalive_probe__";

/// Cluster store backed by a Redis-compatible managed service.
///
/// Reconnects are handled by the [`ConnectionManager`]; dropping the store
/// releases the connection.
pub struct RedisStore {
    manager: ConnectionManager,
    namespace: Namespace,
}

impl RedisStore {
    pub async fn connect(config: &ClusterConfig) -> StoreResult<Self> {
        let info = connection_info(config)?;
        let client = Client::open(info)?;
        let manager = with_timeout("connect", config.connect_timeout, async {
            ConnectionManager::new(client).await.map_err(StoreError::from)
        })
        .await?;

        tracing::info!(
            cluster = %config.connection_string,
            namespace = %config.namespace(),
            "Connected to cluster"
        );

        Ok(Self {
            manager,
            namespace: config.namespace(),
        })
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn ping(&self, timeout: Duration) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let probe_key = self.namespace.key(PROBE_ID);

        with_timeout("ping", timeout, async {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            let _: i64 = redis::cmd("EXISTS").arg(&probe_key).query_async(&mut conn).await?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            StoreError::Timeout { .. } => e,
            other => StoreError::connection(format!(
                "ping of '{}' failed: {}",
                self.namespace, other
            )),
        })
    }

    async fn get(&self, id: &str, timeout: Duration) -> StoreResult<KeepaliveDocument> {
        let mut conn = self.manager.clone();
        let key = self.namespace.key(id);

        with_timeout("get", timeout, async {
            let raw: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
            match raw {
                Some(raw) => Ok(KeepaliveDocument::from_json(&raw)?),
                None => Err(StoreError::not_found(id)),
            }
        })
        .await
    }

    async fn insert(
        &self,
        document: &KeepaliveDocument,
        expiry: Duration,
        timeout: Duration,
    ) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let key = self.namespace.key(&document.id);
        let body = document.to_json()?;

        with_timeout("insert", timeout, async {
            // NX makes this an insert: nil reply means the key is still live
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(body)
                .arg("NX")
                .arg("EX")
                .arg(expiry_seconds(expiry))
                .query_async(&mut conn)
                .await?;

            match reply {
                Some(_) => Ok(()),
                None => Err(StoreError::already_exists(&document.id)),
            }
        })
        .await
    }

    async fn increment(
        &self,
        id: &str,
        delta: u64,
        initial: u64,
        timeout: Duration,
    ) -> StoreResult<u64> {
        let mut conn = self.manager.clone();
        let key = self.namespace.key(id);

        with_timeout("increment", timeout, async {
            let created: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(initial)
                .arg("NX")
                .query_async(&mut conn)
                .await?;
            if created.is_some() {
                return Ok(initial);
            }

            let value: i64 = redis::cmd("INCRBY")
                .arg(&key)
                .arg(delta)
                .query_async(&mut conn)
                .await?;
            u64::try_from(value).map_err(|_| {
                StoreError::backend(format!("counter '{}' is negative: {}", id, value))
            })
        })
        .await
    }
}

/// Builds connection info from the configured connection string and credentials.
fn connection_info(config: &ClusterConfig) -> StoreResult<ConnectionInfo> {
    let url = normalize_connection_string(&config.connection_string);
    let mut info = url.as_str().into_connection_info().map_err(|e| {
        StoreError::connection(format!(
            "invalid connection string '{}': {}",
            config.connection_string, e
        ))
    })?;

    info.redis.username = Some(config.username.clone());
    info.redis.password = Some(config.password.clone());
    Ok(info)
}

/// Bare hosts such as `localhost` get a `redis://` scheme.
fn normalize_connection_string(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("redis://{}", raw)
    }
}

/// Sub-second expiries round up; `EX 0` is rejected by the server.
fn expiry_seconds(expiry: Duration) -> u64 {
    let secs = expiry.as_secs();
    if expiry.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ConnectionAddr;

    fn config(connection_string: &str) -> ClusterConfig {
        ClusterConfig {
            connection_string: connection_string.to_string(),
            username: "keepalive".to_string(),
            password: "secret".to_string(),
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string("localhost"), "redis://localhost");
        assert_eq!(normalize_connection_string(" db.internal:6380 "), "redis://db.internal:6380");
        assert_eq!(normalize_connection_string("rediss://db.internal"), "rediss://db.internal");
    }

    #[test]
    fn test_connection_info_applies_credentials() {
        let info = connection_info(&config("localhost")).unwrap();

        assert_eq!(info.redis.username.as_deref(), Some("keepalive"));
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
        match info.addr {
            ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "localhost");
                assert_eq!(port, 6379);
            }
            other => panic!("unexpected address {:?}", other),
        }
    }

    #[test]
    fn test_connection_info_rejects_garbage() {
        let err = connection_info(&config("http://not-a-cluster")).unwrap_err();
        assert!(matches!(err, StoreError::Connection { .. }));
    }

    #[test]
    fn test_expiry_seconds() {
        assert_eq!(expiry_seconds(Duration::from_secs(3600)), 3600);
        assert_eq!(expiry_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(expiry_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis with a `keepalive` ACL user
    async fn test_live_round_trip() {
        let store = RedisStore::connect(&config("localhost")).await.unwrap();
        let timeout = Duration::from_secs(5);

        store.ping(timeout).await.unwrap();
        let doc = KeepaliveDocument::new(u64::MAX, "localhost");
        let _ = store.insert(&doc, Duration::from_secs(60), timeout).await;
        assert_eq!(store.get(&doc.id, timeout).await.unwrap().id, doc.id);
        assert!(store.increment("keepalive-counter", 1, 1, timeout).await.unwrap() >= 1);
    }
}
