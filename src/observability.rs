use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: room booking attempts. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "innkeep_bookings_total";

/// Histogram: room booking latency in seconds.
pub const BOOKING_DURATION_SECONDS: &str = "innkeep_booking_duration_seconds";

/// Counter: service booking attempts. Labels: outcome.
pub const SERVICE_BOOKINGS_TOTAL: &str = "innkeep_service_bookings_total";

/// Counter: reservation lifecycle transitions. Labels: to.
pub const LIFECYCLE_TRANSITIONS_TOTAL: &str = "innkeep_lifecycle_transitions_total";

/// Counter: inbound chat messages handled. Labels: outcome.
pub const INTAKE_MESSAGES_TOTAL: &str = "innkeep_intake_messages_total";

/// Histogram: time from inbound message to reply, in seconds.
pub const INTAKE_DURATION_SECONDS: &str = "innkeep_intake_duration_seconds";

/// Counter: HTTP requests answered with an error. Labels: error.
pub const HTTP_ERRORS_TOTAL: &str = "innkeep_http_errors_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: room statuses corrected by the reconciler.
pub const RECONCILE_CORRECTIONS_TOTAL: &str = "innkeep_reconcile_corrections_total";

/// Gauge: live conversation sessions.
pub const SESSIONS_ACTIVE: &str = "innkeep_sessions_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
