//! Datagate Server entry point.

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use datagate_server::AppState;
use datagate_server::config::Config;
use datagate_server::error::StartupError;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let state = AppState::new(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        data_file = ?config.data_file,
        "Datagate Server starting",
    );

    let app = datagate_server::router(state.clone());

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|source| StartupError::InvalidHost {
            host: config.host.clone(),
            source,
        })?;
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    // Spawn rate-limiter cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let before = cleanup_state.rate_limiter().tracked_clients();
            cleanup_state.rate_limiter().cleanup();
            let removed = before.saturating_sub(cleanup_state.rate_limiter().tracked_clients());
            if removed > 0 {
                tracing::debug!(removed, "Cleaned up expired rate-limit windows");
            }
        }
    });

    tracing::info!(%addr, "Datagate Server ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Datagate Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install signal handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
