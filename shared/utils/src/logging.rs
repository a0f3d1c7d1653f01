use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` overrides `config.level`.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            let fmt_layer = fmt::layer().json().with_target(true).with_thread_names(true);

            if let Some(file_path) = &config.file_path {
                let file = std::fs::OpenOptions::new().create(true).append(true).open(file_path)?;

                registry.with(fmt_layer.with_writer(file).with_ansi(false)).try_init()?;
            } else {
                registry.with(fmt_layer).try_init()?;
            }
        }
        _ => {
            let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);

            if let Some(file_path) = &config.file_path {
                let file = std::fs::OpenOptions::new().create(true).append(true).open(file_path)?;

                registry.with(fmt_layer.with_writer(file).with_ansi(false)).try_init()?;
            } else {
                registry.with(fmt_layer).try_init()?;
            }
        }
    }

    tracing::info!("Logging initialized with level: {}", config.level);
    Ok(())
}
