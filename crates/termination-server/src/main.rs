//! termination-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing.
//! 3. Open the task store and wire the detector.
//! 4. Start the HTTP server with graceful shutdown.

use tracing::{info, warn};

use termination_server::{Config, build_detector, router, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    telemetry::init(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "termination-server starting");

    // ── 3. Detector ────────────────────────────────────────────────────────────
    let detector = build_detector(&cfg).await?;
    info!(
        database_url = %cfg.database_url,
        tasks_storing_duration = %cfg.tasks_storing_duration,
        "task store ready"
    );

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let app = router(detector);
    let listener = tokio::net::TcpListener::bind(cfg.bind_address).await?;
    info!(addr = %cfg.bind_address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("termination-server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
