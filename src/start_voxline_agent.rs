//! Startup helpers for the voice assistant server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::common::config::AssistantConfig;
use crate::common::errors::AssistantResult;
use crate::server::{self, AppState};
use crate::session::SessionSweeper;

/// Run the server (used by the `voxline-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting voice assistant v{}", env!("CARGO_PKG_VERSION"));

    let config = AssistantConfig::from_env();
    let state = match initialize(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to initialize: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(state, &config)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Validate configuration and build application state without starting the server.
///
/// # Errors
/// Returns an error if the configuration is invalid or a client cannot be built.
pub fn initialize(config: &AssistantConfig) -> AssistantResult<Arc<AppState>> {
    config.validate()?;
    tracing::info!(
        model = %config.llm.model,
        ollama = config.llm.base_url.as_deref().unwrap_or("default"),
        public_url = %config.telephony.public_base_url,
        "Configuration loaded"
    );
    AppState::new(config)
}

/// Serve until ctrl-c, then stop the session sweeper.
///
/// # Errors
/// Returns an error if the listener cannot be bound.
pub async fn serve(state: Arc<AppState>, config: &AssistantConfig) -> std::io::Result<()> {
    let sweeper = SessionSweeper::new(Arc::clone(&state.store), &config.session);
    let sweeper_shutdown = sweeper.shutdown_notifier();
    let sweeper_handle = sweeper.spawn();

    let result =
        server::run_server_with_shutdown(state, config.server.port, shutdown_signal()).await;

    sweeper_shutdown.notify_one();
    if let Err(e) = sweeper_handle.await {
        tracing::warn!("Session sweeper did not stop cleanly: {e}");
    }
    tracing::info!("Server stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
