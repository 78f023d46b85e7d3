//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::ownership::Strategy;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Views ---
    pub views_total: AtomicU64,
    pub view_errors: AtomicU64,
    pub views_rejected: AtomicU64,
    pub tokens_listed: AtomicU64,

    // --- Latency (μs) ---
    pub view_duration_us_sum: AtomicU64,
    pub view_duration_us_max: AtomicU64,

    // --- Ownership resolution, indexed by `Strategy as usize` ---
    pub strategy_hits: [AtomicU64; 4],
    pub resolutions_empty: AtomicU64,

    // --- Metadata / gateways ---
    pub metadata_failures: AtomicU64,
    pub gateway_attempt_failures: AtomicU64,

    // --- Mint ---
    pub mints_sent: AtomicU64,
    pub mints_failed: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            views_total: AtomicU64::new(0),
            view_errors: AtomicU64::new(0),
            views_rejected: AtomicU64::new(0),
            tokens_listed: AtomicU64::new(0),
            view_duration_us_sum: AtomicU64::new(0),
            view_duration_us_max: AtomicU64::new(0),
            strategy_hits: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            resolutions_empty: AtomicU64::new(0),
            metadata_failures: AtomicU64::new(0),
            gateway_attempt_failures: AtomicU64::new(0),
            mints_sent: AtomicU64::new(0),
            mints_failed: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
        }
    }

    pub fn record_view_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.view_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        // CAS loop for max tracking
        let mut cur = self.view_duration_us_max.load(Ordering::Relaxed);
        while us > cur {
            match self.view_duration_us_max.compare_exchange_weak(
                cur,
                us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    pub fn record_resolution(&self, strategy: Option<Strategy>) {
        match strategy {
            Some(s) => {
                self.strategy_hits[s as usize].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.resolutions_empty.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let views_total = self.views_total.load(Ordering::Relaxed);
        let view_errors = self.view_errors.load(Ordering::Relaxed);
        let views_rejected = self.views_rejected.load(Ordering::Relaxed);
        let tokens_listed = self.tokens_listed.load(Ordering::Relaxed);
        let dur_sum = self.view_duration_us_sum.load(Ordering::Relaxed);
        let dur_max = self.view_duration_us_max.swap(0, Ordering::Relaxed);
        let empty = self.resolutions_empty.load(Ordering::Relaxed);
        let metadata_failures = self.metadata_failures.load(Ordering::Relaxed);
        let gateway_failures = self.gateway_attempt_failures.load(Ordering::Relaxed);
        let mints_sent = self.mints_sent.load(Ordering::Relaxed);
        let mints_failed = self.mints_failed.load(Ordering::Relaxed);
        let rpc_failovers = self.rpc_failovers.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);

        let dur_sum_s = dur_sum as f64 / 1_000_000.0;
        let dur_max_s = dur_max as f64 / 1_000_000.0;

        let mut strategies = String::from(
            "# HELP viewer_ownership_strategy_total Resolutions decided by each strategy.\n\
# TYPE viewer_ownership_strategy_total counter\n",
        );
        for s in Strategy::ORDER {
            let hits = self.strategy_hits[s as usize].load(Ordering::Relaxed);
            strategies.push_str(&format!(
                "viewer_ownership_strategy_total{{strategy=\"{}\"}} {hits}\n",
                s.label()
            ));
        }

        format!(
            "\
# HELP viewer_views_total View requests started.\n\
# TYPE viewer_views_total counter\n\
viewer_views_total {views_total}\n\
# HELP viewer_view_errors_total View requests that ended in an error.\n\
# TYPE viewer_view_errors_total counter\n\
viewer_view_errors_total {view_errors}\n\
# HELP viewer_views_rejected_total View requests rejected while another was in flight.\n\
# TYPE viewer_views_rejected_total counter\n\
viewer_views_rejected_total {views_rejected}\n\
# HELP viewer_tokens_listed_total Tokens returned to the display list.\n\
# TYPE viewer_tokens_listed_total counter\n\
viewer_tokens_listed_total {tokens_listed}\n\
# HELP viewer_view_duration_seconds_sum Total view time (seconds).\n\
# TYPE viewer_view_duration_seconds_sum counter\n\
viewer_view_duration_seconds_sum {dur_sum_s:.6}\n\
# HELP viewer_view_duration_seconds_max Max view time since last scrape (seconds).\n\
# TYPE viewer_view_duration_seconds_max gauge\n\
viewer_view_duration_seconds_max {dur_max_s:.6}\n\
{strategies}\
# HELP viewer_ownership_empty_total Resolutions where no strategy found tokens.\n\
# TYPE viewer_ownership_empty_total counter\n\
viewer_ownership_empty_total {empty}\n\
# HELP viewer_metadata_failures_total Tokens whose metadata could not be retrieved.\n\
# TYPE viewer_metadata_failures_total counter\n\
viewer_metadata_failures_total {metadata_failures}\n\
# HELP viewer_gateway_attempt_failures_total Failed gateway attempts (before fallback).\n\
# TYPE viewer_gateway_attempt_failures_total counter\n\
viewer_gateway_attempt_failures_total {gateway_failures}\n\
# HELP viewer_mints_sent_total Mint transactions accepted by the wallet.\n\
# TYPE viewer_mints_sent_total counter\n\
viewer_mints_sent_total {mints_sent}\n\
# HELP viewer_mints_failed_total Mint transactions that failed.\n\
# TYPE viewer_mints_failed_total counter\n\
viewer_mints_failed_total {mints_failed}\n\
# HELP viewer_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE viewer_rpc_failovers_total counter\n\
viewer_rpc_failovers_total {rpc_failovers}\n\
# HELP viewer_rpc_errors_total RPC errors.\n\
# TYPE viewer_rpc_errors_total counter\n\
viewer_rpc_errors_total {rpc_errors}\n"
        )
    }
}
