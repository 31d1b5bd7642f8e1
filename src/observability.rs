use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking decisions. Labels: outcome (accepted | reason label).
pub const DECISIONS_TOTAL: &str = "deskrota_booking_decisions_total";

/// Histogram: booking decision latency in seconds.
pub const DECISION_DURATION_SECONDS: &str = "deskrota_booking_decision_duration_seconds";

/// Counter: releases. Labels: status (ok | denied).
pub const RELEASES_TOTAL: &str = "deskrota_releases_total";

// ── Lifecycle scheduler ─────────────────────────────────────────

/// Counter: scheduler job runs. Labels: job, status (ok | error).
pub const SCHEDULER_RUNS_TOTAL: &str = "deskrota_scheduler_runs_total";

/// Counter: bookings finalized to completed.
pub const BOOKINGS_FINALIZED_TOTAL: &str = "deskrota_bookings_finalized_total";

/// Counter: notices emitted. Labels: kind (reminder | unlock | booking).
pub const NOTICES_TOTAL: &str = "deskrota_notices_total";

// ── Storage ─────────────────────────────────────────────────────

/// Counter: WAL appends.
pub const WAL_APPENDS_TOTAL: &str = "deskrota_wal_appends_total";

/// Counter: WAL compaction rewrites.
pub const WAL_REWRITES_TOTAL: &str = "deskrota_wal_rewrites_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
