//! CLI for weather-relay
//!
//! Subcommands:
//! - `run`: relay messages and serve the HTTP endpoints (default)
//! - `config`: print the resolved configuration
//! - `fetch-one`: take a single message off the queue and print it

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use weather_relay::config::{Settings, load_config};
use weather_relay::relay::broker::Connector;
use weather_relay::relay::{
    ConnectionManager, DeliveryProcessor, LapinConnector, RelaySupervisor, RetryPolicy, amqp,
};
use weather_relay::sink::{HttpSink, Sink};
use weather_relay::store::LatestStore;
use weather_relay::transport;
use weather_relay::utils::error::{RelayError, Result};
use weather_relay::utils::logging;

#[derive(Parser)]
#[command(name = "weather-relay", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Relay queue messages downstream until SIGINT/SIGTERM
    Run,
    /// Print the resolved configuration as JSON, broker password masked
    Config,
    /// Consume and ack one message, printing its body
    FetchOne,
}

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env is the normal case
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.level);

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::Config => print_config(&settings),
        Command::FetchOne => fetch_one(&settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "weather-relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e: std::net::AddrParseError| RelayError::InvalidSetting {
            key: "server.host",
            reason: e.to_string(),
        })?;

    let store = Arc::new(LatestStore::new());
    let sink: Arc<dyn Sink> = Arc::new(HttpSink::new(
        &settings.sink.base_url,
        &settings.sink.path,
        settings.sink.timeout(),
    )?);
    let policy = RetryPolicy::from(&settings.retry);
    let processor = DeliveryProcessor::new(sink, Arc::clone(&store), policy)
        .with_mode(settings.relay.transform)
        .with_store_simplified(settings.relay.store_simplified);
    let connector: Arc<dyn Connector> =
        Arc::new(LapinConnector::new(settings.broker.url.clone()));
    let manager = ConnectionManager::new(connector, Arc::new(processor), &settings.broker);
    let supervisor = RelaySupervisor::new(manager, settings.broker.reconnect_delay());

    let lifetime = CancellationToken::new();

    {
        let lifetime = lifetime.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            lifetime.cancel();
        });
    }

    let server = {
        let lifetime = lifetime.clone();
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let result = transport::serve(addr, store, lifetime.clone()).await;
            if let Err(e) = &result {
                error!(error = %e, "http server failed, shutting down");
                lifetime.cancel();
            }
            result
        })
    };

    info!(
        queue = %settings.broker.queue,
        sink = %settings.sink.base_url,
        "weather relay starting"
    );
    supervisor.run(lifetime.clone()).await;

    match server.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "http server task aborted");
            Ok(())
        }
    }
}

fn print_config(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    Ok(())
}

async fn fetch_one(settings: &Settings) -> Result<()> {
    if let Some(body) = amqp::fetch_one(&settings.broker.url, &settings.broker.queue).await? {
        println!("{}", String::from_utf8_lossy(&body));
    } else {
        info!(queue = %settings.broker.queue, "queue is empty");
    }
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
