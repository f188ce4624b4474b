//! yarn-usage-agent - version 0.1.0
//!
//! Entry point: resolves configuration, registers the host instance with the
//! collector, then runs the discovery and dispatcher loops until a shutdown
//! signal arrives.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, Level};

use yarn_usage_agent::cli::{Args, LogLevel};
use yarn_usage_agent::config::{resolve_config, show_config, validate_effective_config, Config};
use yarn_usage_agent::procfs::ProcFs;
use yarn_usage_agent::sink::HttpSink;
use yarn_usage_agent::state::AgentState;
use yarn_usage_agent::{discovery, dispatcher, instance};

fn tracing_level(level: &LogLevel) -> Level {
    match level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

/// A level set in the config file wins only when the CLI stays at its
/// default. Config values go through the same parser as the CLI flag, so
/// every accepted spelling (`off`, `WARN`, ...) works in both places; an
/// unparseable value is ignored.
fn effective_log_level(config: &Config, args: &Args) -> Level {
    if let (Some(from_file), LogLevel::Info) = (config.log_level.as_deref(), &args.log_level) {
        if let Ok(level) = <LogLevel as clap::ValueEnum>::from_str(from_file, true) {
            return tracing_level(&level);
        }
    }
    tracing_level(&args.log_level)
}

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(effective_log_level(config, args))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Resolves Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    if args.show_config {
        return show_config(&config).map_err(|e| anyhow::anyhow!(e.to_string()));
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config, &args);
    info!("Starting yarn-usage-agent");

    let client = HttpSink::default_client().context("could not build HTTP client")?;

    // Instance identity is resolved exactly once; without it the agent
    // cannot attribute samples, so failure aborts startup.
    let instance_id = match &config.instance_id {
        Some(id) => {
            info!(instance_id = %id, "using configured instance id");
            id.clone()
        }
        None => {
            match instance::resolve_and_register(&client, config.imds_url(), config.sink_url())
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    error!("{}", e);
                    anyhow::bail!("startup aborted: {}", e);
                }
            }
        }
    };

    let state = Arc::new(AgentState::new(ProcFs::default(), &config));
    let sink = HttpSink::new(client, config.sink_url());

    let (usage_tx, usage_rx) = mpsc::unbounded_channel();
    let (finish_tx, finish_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher_handle = tokio::spawn(dispatcher::run(
        sink,
        instance_id,
        state.clone(),
        usage_rx,
        finish_rx,
        config.max_in_flight_sends(),
    ));

    let discovery_handle = tokio::spawn(discovery::run(
        state,
        usage_tx,
        finish_tx,
        shutdown_rx,
    ));

    shutdown_signal().await;
    // Stops discovery and every sampler; once their channel senders are
    // dropped the dispatcher drains and exits.
    let _ = shutdown_tx.send(true);

    discovery_handle.await.context("discovery task panicked")?;
    dispatcher_handle.await.context("dispatcher task panicked")?;

    info!("yarn-usage-agent stopped");
    Ok(())
}
