// =============================================================================
// Central Application State — Stock Dashboard
// =============================================================================
//
// Shared by every request handler via `Arc<AppState>`. Dashboard requests are
// stateless; what lives here is the configuration, the provider handle, and
// a small amount of operational bookkeeping for the health and error
// endpoints.
//
// Thread safety:
//   - Atomic counters for lock-free request accounting.
//   - parking_lot::RwLock for the config and the error log.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::provider::MarketDataProvider;
use crate::runtime_config::DashboardConfig;

// =============================================================================
// Error Record
// =============================================================================

/// A failed dashboard request, kept for the error log endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Failure category (`invalid_request`, `provider`, ...).
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
pub const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub config: Arc<RwLock<DashboardConfig>>,

    // ── Market Data ─────────────────────────────────────────────────────
    pub provider: Arc<dyn MarketDataProvider>,

    // ── Accounting ──────────────────────────────────────────────────────
    pub requests_served: AtomicU64,
    pub requests_failed: AtomicU64,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: DashboardConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            provider,
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Snapshot of the current configuration, so no lock is held across an
    /// await point.
    pub fn config_snapshot(&self) -> DashboardConfig {
        self.config.read().clone()
    }

    pub fn record_success(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed request. The log is capped at [`MAX_RECENT_ERRORS`];
    /// oldest entries are evicted first.
    pub fn push_error_with_code(&self, msg: String, code: Option<String>) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);

        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceTable;
    use crate::provider::testing::StaticProvider;

    fn state() -> AppState {
        let provider = Arc::new(StaticProvider::new(PriceTable::empty(), PriceTable::empty()));
        AppState::new(DashboardConfig::default(), provider)
    }

    #[test]
    fn error_log_is_capped() {
        let state = state();
        for i in 0..(MAX_RECENT_ERRORS + 7) {
            state.push_error_with_code(format!("failure {i}"), Some("provider".into()));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "failure 7");
        assert_eq!(
            state.requests_failed.load(Ordering::Relaxed),
            (MAX_RECENT_ERRORS + 7) as u64
        );
    }

    #[test]
    fn config_snapshot_is_detached() {
        let state = state();
        let mut snapshot = state.config_snapshot();
        snapshot.default_tickers.clear();
        assert_eq!(state.config.read().default_tickers, vec!["AAPL", "MSFT"]);
    }
}
