//! Rollcall Server - receives attendance selfies
//!
//! Endpoints:
//! - GET  /        - Liveness
//! - GET  /health  - Health check (upload directory writable)
//! - GET  /ready   - Readiness check
//! - POST /upload  - Store a selfie (JSON: image, filename; header: auth-key)
//! - GET  /get_attendance      - Ledger rows (filters: date, roll, subject)
//! - GET  /download_attendance - One day of the ledger as CSV

use std::net::SocketAddr;

use rollcall_server::{create_router_with_config, Config, UploadDir};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rollcall_server=info,tower_http=info,info")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env();

    // Created up front so the first upload does not fail
    let uploads = UploadDir::new(&config.upload_dir);
    uploads.ensure_exists()?;
    info!(upload_dir = %uploads.path().display(), "Upload directory ready");
    info!(ledger = %config.attendance_file.display(), "Attendance ledger");

    let app = create_router_with_config(&config);
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Server running at http://{}", addr);
    info!("  POST /upload  - Store a selfie (JSON: image, filename; header: auth-key)");
    info!("  GET  /get_attendance - Attendance rows");
    info!("  GET  /download_attendance - Attendance CSV");
    info!("  GET  /health  - Health check");
    info!("  GET  /swagger-ui - API documentation");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
