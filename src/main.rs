//! pagesense - page perception and stability engine
//!
//! Main entry point for the pagesense CLI.

mod cli;
mod cmd_page;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use pagesense_cdp::CdpConnector;
use pagesense_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use pagesense_core::ConnectionPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};
use cmd_page::Engine;

/// Initialize console and daily-rotated file logging.
fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = ConfigLoader::expand_path(&config.log_dir().to_string_lossy());
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("pagesense")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Console goes to stderr so stdout carries only JSON results.
    let console = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);
    let file = if config.json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

fn check_config(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config)?;
    for warning in &result.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        for e in &result.errors {
            error!("{}: {}", e.path, e.message);
        }
        return Err(format!("{} has {} error(s)", path.display(), result.errors.len()).into());
    }
    info!(
        path = %path.display(),
        warnings = result.warnings.len(),
        "Configuration is valid"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.logging)?;
    debug!(config = %cli.config.display(), "Loaded configuration");

    if let Commands::CheckConfig = cli.command {
        return check_config(&cli.config, &config);
    }

    let connector = CdpConnector::new(config.pool.container_host_pattern.as_deref())?;
    let pool = Arc::new(ConnectionPool::new(Arc::new(connector), config.pool.clone()));
    pool.spawn_sweeper();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let engine = Engine::new(&config, pool.clone(), cancel);
    let result = cmd_page::run(&engine, &cli.endpoint, &cli.session, cli.command).await;
    pool.shutdown().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
