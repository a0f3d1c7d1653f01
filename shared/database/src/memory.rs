use async_trait::async_trait;
use keepalive_models::KeepaliveDocument;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{with_timeout, DocumentStore, Namespace, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum StoredValue {
    Document(String),
    Counter(u64),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// In-process store with the same insert and expiry semantics as the cluster.
///
/// Expiry is measured on the tokio clock, so paused-time tests can skip
/// past a retention window.
#[derive(Debug)]
pub struct MemoryStore {
    namespace: Namespace,
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every following call fail with a connection error (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of unexpired entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::connection(format!(
                "store for '{}' is unavailable",
                self.namespace
            )))
        }
    }

    /// Looks up a live entry, dropping it if it has expired.
    fn live_entry<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn ping(&self, timeout: Duration) -> StoreResult<()> {
        with_timeout("ping", timeout, async { self.check_available() }).await
    }

    async fn get(&self, id: &str, timeout: Duration) -> StoreResult<KeepaliveDocument> {
        with_timeout("get", timeout, async {
            self.check_available()?;
            let mut entries = self.entries.lock().await;

            match Self::live_entry(&mut entries, &self.namespace.key(id)) {
                Some(Entry {
                    value: StoredValue::Document(raw),
                    ..
                }) => Ok(KeepaliveDocument::from_json(raw)?),
                Some(Entry {
                    value: StoredValue::Counter(_),
                    ..
                }) => Err(StoreError::backend(format!(
                    "'{}' is a counter, not a document",
                    id
                ))),
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
        with_timeout("insert", timeout, async {
            self.check_available()?;
            let key = self.namespace.key(&document.id);
            let now = Instant::now();
            let mut entries = self.entries.lock().await;

            // Every write adds a key, so expired ones are swept here
            entries.retain(|_, entry| entry.is_live(now));
            if entries.contains_key(&key) {
                return Err(StoreError::already_exists(&document.id));
            }

            entries.insert(
                key,
                Entry {
                    value: StoredValue::Document(document.to_json()?),
                    expires_at: now.checked_add(expiry),
                },
            );
            Ok(())
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
        with_timeout("increment", timeout, async {
            self.check_available()?;
            let key = self.namespace.key(id);
            let mut entries = self.entries.lock().await;

            match Self::live_entry(&mut entries, &key) {
                Some(Entry {
                    value: StoredValue::Counter(current),
                    ..
                }) => {
                    *current = current.saturating_add(delta);
                    Ok(*current)
                }
                Some(_) => Err(StoreError::backend(format!("'{}' is not a counter", id))),
                None => {
                    entries.insert(
                        key,
                        Entry {
                            value: StoredValue::Counter(initial),
                            expires_at: None,
                        },
                    );
                    Ok(initial)
                }
            }
        })
        .await
    }
}
