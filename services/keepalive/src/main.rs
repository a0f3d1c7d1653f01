use anyhow::Result;
use keepalive_service::{
    supervise, ClusterConnection, ExecutorSettings, KeepaliveScheduler, OperationExecutor,
    ShutdownSignals, TickReport,
};
use keepalive_utils::{init_logging, KeepaliveConfig, LoggingConfig};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match KeepaliveConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // No usable config means no logging config either
            let _ = init_logging(&LoggingConfig::default());
            error!(error = %e, code = e.error_code(), "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    config.log_warnings();

    match run(config).await {
        Ok(report) => {
            info!(
                ticks = report.ticks,
                failures = report.failures,
                "Keepalive stopped cleanly"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Keepalive aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: KeepaliveConfig) -> Result<TickReport> {
    // Installed first so a signal during connect still exits cleanly
    let mut signals = ShutdownSignals::install()?;

    info!(
        cluster = %config.cluster.connection_string,
        backend = %config.cluster.backend,
        "Connecting to cluster"
    );
    let connection = tokio::select! {
        connection = ClusterConnection::open(&config) => connection?,
        signal = signals.recv() => {
            info!(%signal, "Shutdown requested before the keepalive loop started");
            return Ok(TickReport::default());
        }
    };

    info!("Successfully connected to cluster");
    info!(
        bucket = %config.cluster.bucket_name,
        scope = %config.cluster.scope_name,
        collection = %config.cluster.collection_name,
        "Target collection ready"
    );
    info!(
        mode = %config.operation_mode,
        read_target = %config.read_target,
        "Keeping cluster alive with operations every {:?}",
        config.interval
    );

    let settings = ExecutorSettings::from(&config);
    let mut executor = OperationExecutor::new(connection.store(), settings);
    let scheduler = KeepaliveScheduler::new(config.interval);

    let shutdown = CancellationToken::new();
    // Stops the loop even if we leave early through `?`
    let _stop_on_exit = shutdown.clone().drop_guard();

    let loop_token = shutdown.clone();
    let keepalive =
        tokio::spawn(async move { scheduler.run(&mut executor, loop_token).await });

    let report = supervise(keepalive, signals.recv(), shutdown.clone()).await?;
    drop(connection);
    Ok(report)
}
