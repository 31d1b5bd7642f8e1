use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use deskrota::engine::Engine;
use deskrota::notify::NotifyHub;
use deskrota::policy::DEFAULT_COMPACT_THRESHOLD;
use deskrota::scheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("DESKROTA_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    deskrota::observability::init(metrics_port);

    let data_dir = std::env::var("DESKROTA_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("DESKROTA_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_COMPACT_THRESHOLD);

    std::fs::create_dir_all(&data_dir)?;
    let wal_path = PathBuf::from(&data_dir).join("deskrota.wal");

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::open(&wal_path, notify, compact_threshold)?);

    info!("deskrota started");
    info!("  data_dir: {data_dir}");
    info!("  compact_threshold: {compact_threshold}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    let scheduler_task = tokio::spawn(scheduler::run(engine.clone()));

    // Graceful shutdown on SIGTERM/ctrl-c.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;

    info!("shutdown signal received");
    scheduler_task.abort();
    info!("deskrota stopped");
    Ok(())
}
