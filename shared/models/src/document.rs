use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Tag stored in the `operation` field of every keepalive document.
pub const KEEPALIVE_OPERATION_TAG: &str = "keepalive";

/// Document written by the write operation.
///
/// The identifier doubles as the document key, so the body and the key
/// always agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveDocument {
    pub id: String,
    /// Seconds since the Unix epoch at creation time
    pub timestamp: i64,
    pub value: String,
    pub operation: String,
    /// Connection string of the cluster the document was written from
    pub cluster: String,
}

impl KeepaliveDocument {
    pub fn new(sequence: u64, cluster: impl Into<String>) -> Self {
        Self::with_timestamp(sequence, cluster, Utc::now().timestamp())
    }

    pub fn with_timestamp(sequence: u64, cluster: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: document_id(sequence),
            timestamp,
            value: format!("keepalive-value-{}", sequence),
            operation: KEEPALIVE_OPERATION_TAG.to_string(),
            cluster: cluster.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Synthetic document id for a counter value.
pub fn document_id(sequence: u64) -> String {
    sequence.to_string()
}
