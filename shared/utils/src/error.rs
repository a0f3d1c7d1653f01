use keepalive_database::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum KeepaliveError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Probe of '{namespace}' failed: {message}")]
    Probe { namespace: String, message: String },

    #[error("{operation} operation failed: {message}")]
    Operation { operation: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl KeepaliveError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn probe(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Probe { .. } => "PROBE_ERROR",
            Self::Operation { .. } => "OPERATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Fatal errors abort startup; the rest are logged per tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::Connection { .. }
                | Self::Probe { .. }
                | Self::Internal { .. }
        )
    }
}

pub type KeepaliveResult<T> = Result<T, KeepaliveError>;

impl From<StoreError> for KeepaliveError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Connection { message } => Self::connection(message),
            StoreError::Timeout { operation, timeout } => {
                Self::operation(operation, format!("timed out after {:?}", timeout))
            }
            other => Self::operation("store", other.to_string()),
        }
    }
}
