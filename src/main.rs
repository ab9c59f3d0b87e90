use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod broadcast;
mod metrics;
mod state;
mod types;
mod ws;

use broadcast::Broadcaster;
use state::AppState;

const DEFAULT_PORT: u16 = 8080;

/// Accepts `--port N`, `-p N`, and `--port=N`; last one wins.
fn parse_port<I: IntoIterator<Item = String>>(args: I, default: u16) -> u16 {
    let mut it = args.into_iter().skip(1);
    let mut found: Option<String> = None;
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--port" | "-p" => {
                if let Some(v) = it.next() {
                    found = Some(v);
                }
            }
            _ => {
                if let Some(v) = arg.strip_prefix("--port=") {
                    found = Some(v.to_string());
                }
            }
        }
    }
    found.and_then(|s| s.parse().ok()).unwrap_or(default)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port = parse_port(std::env::args(), DEFAULT_PORT);

    // Only CPU and memory refresh plumbing is needed; skip processes/disks.
    let refresh_kind = RefreshKind::nothing()
        .with_cpu(CpuRefreshKind::everything())
        .with_memory(MemoryRefreshKind::everything());
    let mut sys = System::new_with_specifics(refresh_kind);
    sys.refresh_specifics(refresh_kind);
    // A second refresh after the minimum interval gives the first usage
    // readings a real baseline instead of zeros.
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu_usage();

    let sys = Arc::new(Mutex::new(sys));
    let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&sys)));
    let app_state = AppState {
        sys,
        broadcaster: Arc::clone(&broadcaster),
    };

    let app = Router::new()
        .route("/api/cpu", get(api::get_cpu))
        .route("/api/memory", get(api::get_memory))
        .route("/api/cores", get(api::get_cores))
        .route("/api/stats", get(api::get_stats))
        .route("/ws/stats", get(ws::ws_handler))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "telemetry agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Join the broadcast loop instead of orphaning it.
    broadcaster.shutdown().await;
    Ok(())
}
