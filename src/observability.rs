use std::net::SocketAddr;

// ── Domain counters ─────────────────────────────────────────────

/// Counter: bookings persisted with their index records.
pub const BOOKINGS_SAVED_TOTAL: &str = "leasebook_bookings_saved_total";

/// Counter: booking lifecycle transitions. Labels: transition, status (ok|error).
pub const TRANSITIONS_TOTAL: &str = "leasebook_transitions_total";

/// Counter: payment callbacks handled. Labels: outcome.
pub const PAYMENTS_TOTAL: &str = "leasebook_payments_total";

/// Counter: media assets uploaded. Labels: status (ok|error|timeout).
pub const MEDIA_UPLOADS_TOTAL: &str = "leasebook_media_uploads_total";

/// Counter: chat messages sent.
pub const MESSAGES_SENT_TOTAL: &str = "leasebook_messages_sent_total";

// ── Store ───────────────────────────────────────────────────────

/// Counter: commits rejected because a read document changed.
pub const TXN_CONFLICTS_TOTAL: &str = "leasebook_txn_conflicts_total";

/// Counter: transaction bodies re-run after a conflict.
pub const TXN_RETRIES_TOTAL: &str = "leasebook_txn_retries_total";

/// Counter: snapshots pushed to listeners.
pub const LISTENER_DELIVERIES_TOTAL: &str = "leasebook_listener_deliveries_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "leasebook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (commits per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "leasebook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Install the fmt subscriber. No-op if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// `ok` / `error` label for a result.
pub fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "ok" } else { "error" }
}
