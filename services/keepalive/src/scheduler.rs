//! Keepalive Scheduler
//!
//! Fires once per interval and runs the keepalive task to completion on
//! every tick. Failures are logged and counted; they never stop the loop.

use keepalive_utils::{KeepaliveError, KeepaliveResult};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::executor::KeepaliveTask;
use crate::signal::ShutdownSignal;

/// Start instant used when `now + interval` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Tick counts collected over one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
}

pub struct KeepaliveScheduler {
    interval: Duration,
}

impl KeepaliveScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Runs until `shutdown` is cancelled. The first tick fires one interval
    /// after the call. Cancellation is only observed between ticks, so an
    /// in-flight operation always finishes.
    pub async fn run<T: KeepaliveTask>(
        &self,
        task: &mut T,
        shutdown: CancellationToken,
    ) -> TickReport {
        let now = Instant::now();
        let start = now
            .checked_add(self.interval)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut ticker = time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = TickReport::default();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    report.ticks += 1;
                    match task.run_once().await {
                        Ok(outcome) => {
                            report.successes += 1;
                            info!(
                                operation = %outcome.kind(),
                                document_id = outcome.document_id(),
                                "Successfully performed keepalive operation: {}",
                                outcome
                            );
                        }
                        Err(e) => {
                            report.failures += 1;
                            error!(
                                error = %e,
                                code = e.error_code(),
                                "Error performing keepalive operation"
                            );
                        }
                    }
                }
            }
        }

        info!(
            ticks = report.ticks,
            successes = report.successes,
            failures = report.failures,
            "Keepalive loop stopped"
        );
        report
    }
}

/// Waits for `stop` or for the loop task to end, whichever comes first.
///
/// On `stop` the loop is cancelled and its report returned once the
/// in-flight operation finishes. A loop that ends on its own, or panics,
/// is an error: the process must not sit idle without keepalives.
pub async fn supervise<S>(
    mut keepalive: JoinHandle<TickReport>,
    stop: S,
    shutdown: CancellationToken,
) -> KeepaliveResult<TickReport>
where
    S: Future<Output = ShutdownSignal>,
{
    tokio::select! {
        signal = stop => {
            info!(%signal, "Stopping keepalive loop");
            shutdown.cancel();
            keepalive.await.map_err(loop_failed)
        }
        finished = &mut keepalive => match finished {
            Ok(report) => Err(KeepaliveError::internal(format!(
                "keepalive loop stopped unexpectedly after {} ticks",
                report.ticks
            ))),
            Err(e) => Err(loop_failed(e)),
        },
    }
}

fn loop_failed(error: tokio::task::JoinError) -> KeepaliveError {
    KeepaliveError::internal(format!("keepalive loop failed: {}", error))
}
