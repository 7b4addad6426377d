use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

use dotdash_server::auth::credentials::CredentialService;
use dotdash_server::config::{generate_config_template, CliArgs, Config};
use dotdash_server::ws::{actor, ConnectionRegistry};
use dotdash_server::{routes, state, store};

/// Upper bound on waiting for receiver actors to finish during shutdown.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    init_tracing(config.json_logs);

    tracing::info!("dotdash server v{} starting", env!("CARGO_PKG_VERSION"));

    let credentials_config = config.credentials();
    let credential_store = store::open_store(&credentials_config)?;
    store::purge::spawn_expiry_purge(
        credential_store.clone(),
        credentials_config.purge_interval_secs,
    );
    tracing::info!(
        backend = ?credentials_config.backend,
        ttl_secs = credentials_config.ttl_secs,
        "Credential store ready"
    );

    let connections = ConnectionRegistry::new();
    let shutdown = CancellationToken::new();
    let actors = TaskTracker::new();

    let app_state = state::AppState {
        credentials: CredentialService::new(credential_store, credentials_config.ttl()),
        connections: connections.clone(),
        ws: config.ws(),
        rate_limit: config.rate_limit(),
        shutdown: shutdown.clone(),
        actors: actors.clone(),
    };

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    if !actor::drain(&actors, SHUTDOWN_DRAIN_TIMEOUT).await {
        tracing::warn!(
            remaining = actors.len(),
            registered = connections.len(),
            "Receiver actors still running after shutdown timeout"
        );
    }
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dotdash_server=info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}

/// Resolve on ctrl-c and tell every receiver actor to close.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return std::future::pending().await;
    }
    tracing::info!("Shutdown signal received, closing receiver connections");
    shutdown.cancel();
}
