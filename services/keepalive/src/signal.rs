use keepalive_utils::{KeepaliveError, KeepaliveResult};
use std::fmt;
use tracing::info;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Signals that stop the keepalive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - Docker/Kubernetes graceful shutdown
    Terminate,
    /// SIGINT - Ctrl+C
    Interrupt,
    Quit,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Quit => write!(f, "SIGQUIT"),
        }
    }
}

/// Termination signal listeners. Signals delivered after `install` are
/// buffered until `recv` is polled, so install before connecting.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
    sigquit: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn install() -> KeepaliveResult<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate()).map_err(handler_error)?,
            sigint: signal(SignalKind::interrupt()).map_err(handler_error)?,
            sigquit: signal(SignalKind::quit()).map_err(handler_error)?,
        })
    }

    /// Waits for the first termination signal.
    pub async fn recv(&mut self) -> ShutdownSignal {
        let received = tokio::select! {
            _ = self.sigterm.recv() => ShutdownSignal::Terminate,
            _ = self.sigint.recv() => ShutdownSignal::Interrupt,
            _ = self.sigquit.recv() => ShutdownSignal::Quit,
        };

        info!("Received shutdown signal: {}", received);
        received
    }
}

#[cfg(windows)]
pub struct ShutdownSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl ShutdownSignals {
    pub fn install() -> KeepaliveResult<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c().map_err(handler_error)?,
        })
    }

    pub async fn recv(&mut self) -> ShutdownSignal {
        self.ctrl_c.recv().await;
        info!("Received shutdown signal: {}", ShutdownSignal::Interrupt);
        ShutdownSignal::Interrupt
    }
}

fn handler_error(error: std::io::Error) -> KeepaliveError {
    KeepaliveError::internal(format!("failed to install signal handler: {}", error))
}
