use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use draftsync_server::components::{self, Components};
use draftsync_server::config::DraftsyncConfig;
use draftsync_server::state_factory::create_store;

/// Draft notification lifecycle service.
#[derive(Parser, Debug)]
#[command(name = "draftsync-server", about = "Draft notification lifecycle service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "draftsync.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the bucket wiring, print the resulting topology and exit.
    Provision,
    /// Run database migrations for the configured state backend, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = DraftsyncConfig::load(Path::new(&cli.config))?;
    draftsync_server::telemetry::init(&config.telemetry);

    match cli.command {
        Some(Commands::Provision) => {
            let topology = components::provision(&config).await?;
            println!("{}", serde_json::to_string_pretty(&topology)?);
            return Ok(());
        }
        Some(Commands::Migrate) => {
            create_store(&config.state).await?;
            info!(backend = %config.state.backend, "migrations complete");
            return Ok(());
        }
        None => {}
    }

    let components = Components::build(&config).await?;
    let cancel = CancellationToken::new();
    let mut workers = components
        .worker(&config)
        .map(|worker| worker.spawn(&cancel));

    let app = draftsync_server::api::router(components.app_state());

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "draftsync-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(set) = workers.as_mut() {
        let timeout_secs = config.server.shutdown_timeout_seconds;
        info!(timeout_secs, "waiting for subscriber loops...");
        let drain = async {
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "subscriber loop panicked");
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(timeout_secs), drain)
            .await
            .is_err()
        {
            warn!(timeout_secs, "shutdown timeout exceeded, aborting subscriber loops");
            set.abort_all();
        }
    }

    info!("draftsync-server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
