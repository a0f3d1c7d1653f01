//! Cluster Keepalive Service
//!
//! Connects to a managed cluster, probes the target collection, then
//! performs a lightweight read, write or counter increment on a fixed
//! interval so the session never looks idle.

pub mod connector;
pub mod counter;
pub mod executor;
pub mod scheduler;
pub mod signal;

pub use connector::ClusterConnection;
pub use counter::DocumentCounter;
pub use executor::{
    ExecutorSettings, KeepaliveTask, OperationExecutor, OperationOutcome, OperationSelector,
};
pub use scheduler::{supervise, KeepaliveScheduler, TickReport};
pub use signal::{ShutdownSignal, ShutdownSignals};
