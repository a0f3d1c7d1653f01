//! Operation Executor
//!
//! Runs one keepalive operation against the store: read by synthetic id,
//! insert a fresh keepalive document, or bump the shared counter document.

use async_trait::async_trait;
use keepalive_database::{DocumentStore, StoreError};
use keepalive_models::{document_id, KeepaliveDocument, OperationKind, OperationMode, ReadTarget};
use keepalive_utils::{KeepaliveConfig, KeepaliveError, KeepaliveResult};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::counter::DocumentCounter;

/// Initial value of the counter document when it does not exist yet.
pub const COUNTER_INITIAL_VALUE: u64 = 1;

/// Work performed once per scheduler tick.
#[async_trait]
pub trait KeepaliveTask: Send {
    async fn run_once(&mut self) -> KeepaliveResult<OperationOutcome>;
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub mode: OperationMode,
    pub read_target: ReadTarget,
    pub operation_timeout: Duration,
    pub document_expiry: Duration,
    /// Written into every document's `cluster` field
    pub cluster_id: String,
    pub counter_document_id: String,
}

impl From<&KeepaliveConfig> for ExecutorSettings {
    fn from(config: &KeepaliveConfig) -> Self {
        Self {
            mode: config.operation_mode,
            read_target: config.read_target,
            operation_timeout: config.operation_timeout,
            document_expiry: config.document_expiry,
            cluster_id: config.cluster.connection_string.clone(),
            counter_document_id: config.counter_document_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Read { id: String, found: bool },
    Written { id: String, sequence: u64 },
    Incremented { id: String, value: u64 },
}

impl OperationOutcome {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Read { .. } => OperationKind::Read,
            Self::Written { .. } => OperationKind::Write,
            Self::Incremented { .. } => OperationKind::Increment,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            Self::Read { id, .. } | Self::Written { id, .. } | Self::Incremented { id, .. } => id,
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { id, found: true } => write!(f, "retrieved document {}", id),
            Self::Read { id, found: false } => write!(f, "document {} not present", id),
            Self::Written { id, .. } => write!(f, "created document {}", id),
            Self::Incremented { id, value } => write!(f, "counter {} is now {}", id, value),
        }
    }
}

/// Picks the operation for each tick according to [`OperationMode`].
#[derive(Debug, Clone)]
pub struct OperationSelector {
    mode: OperationMode,
    next_alternate: OperationKind,
}

impl OperationSelector {
    pub fn new(mode: OperationMode) -> Self {
        Self {
            mode,
            next_alternate: OperationKind::Write,
        }
    }

    pub fn next(&mut self) -> OperationKind {
        match self.mode {
            OperationMode::Random => {
                if rand::thread_rng().gen_bool(0.5) {
                    OperationKind::Read
                } else {
                    OperationKind::Write
                }
            }
            OperationMode::Alternate => {
                let kind = self.next_alternate;
                self.next_alternate = match kind {
                    OperationKind::Write => OperationKind::Read,
                    _ => OperationKind::Write,
                };
                kind
            }
            OperationMode::Read => OperationKind::Read,
            OperationMode::Write => OperationKind::Write,
            OperationMode::Increment => OperationKind::Increment,
        }
    }
}

pub struct OperationExecutor {
    store: Arc<dyn DocumentStore>,
    counter: DocumentCounter,
    selector: OperationSelector,
    settings: ExecutorSettings,
}

impl OperationExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, settings: ExecutorSettings) -> Self {
        Self::with_counter(store, settings, DocumentCounter::new())
    }

    pub fn with_counter(
        store: Arc<dyn DocumentStore>,
        settings: ExecutorSettings,
        counter: DocumentCounter,
    ) -> Self {
        Self {
            store,
            counter,
            selector: OperationSelector::new(settings.mode),
            settings,
        }
    }

    pub fn counter(&self) -> &DocumentCounter {
        &self.counter
    }

    pub async fn execute(&self, kind: OperationKind) -> KeepaliveResult<OperationOutcome> {
        match kind {
            OperationKind::Read => self.read().await,
            OperationKind::Write => self.write().await,
            OperationKind::Increment => self.increment().await,
        }
    }

    /// Reads the document for the targeted counter value. Absence is a success.
    pub async fn read(&self) -> KeepaliveResult<OperationOutcome> {
        let sequence = self.read_sequence().await;
        let id = document_id(sequence);

        match self.store.get(&id, self.settings.operation_timeout).await {
            Ok(_) => Ok(OperationOutcome::Read { id, found: true }),
            Err(StoreError::NotFound { .. }) => Ok(OperationOutcome::Read { id, found: false }),
            Err(e) => Err(operation_error(OperationKind::Read, e)),
        }
    }

    /// Takes the next counter value and inserts a document under it.
    pub async fn write(&self) -> KeepaliveResult<OperationOutcome> {
        let sequence = self.counter.advance().await;
        let document = KeepaliveDocument::new(sequence, self.settings.cluster_id.as_str());

        self.store
            .insert(&document, self.settings.document_expiry, self.settings.operation_timeout)
            .await
            .map_err(|e| operation_error(OperationKind::Write, e))?;

        Ok(OperationOutcome::Written {
            id: document.id,
            sequence,
        })
    }

    pub async fn increment(&self) -> KeepaliveResult<OperationOutcome> {
        let id = self.settings.counter_document_id.clone();
        let value = self
            .store
            .increment(&id, 1, COUNTER_INITIAL_VALUE, self.settings.operation_timeout)
            .await
            .map_err(|e| operation_error(OperationKind::Increment, e))?;

        Ok(OperationOutcome::Incremented { id, value })
    }

    async fn read_sequence(&self) -> u64 {
        let current = self.counter.current().await;
        match self.settings.read_target {
            ReadTarget::Latest => current,
            ReadTarget::Random => rand::thread_rng().gen_range(0..=current),
        }
    }
}

#[async_trait]
impl KeepaliveTask for OperationExecutor {
    async fn run_once(&mut self) -> KeepaliveResult<OperationOutcome> {
        let kind = self.selector.next();
        self.execute(kind).await
    }
}

fn operation_error(kind: OperationKind, error: StoreError) -> KeepaliveError {
    KeepaliveError::operation(kind.as_str(), error.to_string())
}
