// =============================================================================
// Runtime Configuration — dashboard defaults, sectors, indicator windows
// =============================================================================
//
// Central configuration for the dashboard service. Every field carries
// `#[serde(default)]` so that adding new fields never breaks loading an older
// config file.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::{IndicatorParams, MacdParams};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_available_tickers() -> Vec<String> {
    ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "NFLX"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_tickers() -> Vec<String> {
    vec!["AAPL".to_string(), "MSFT".to_string()]
}

fn default_sectors() -> BTreeMap<String, Vec<String>> {
    let sector = |names: &[&str]| -> Vec<String> { names.iter().map(|s| s.to_string()).collect() };
    BTreeMap::from([
        ("Technology".to_string(), sector(&["AAPL", "MSFT", "GOOGL"])),
        ("Consumer".to_string(), sector(&["AMZN", "TSLA"])),
        ("Communication".to_string(), sector(&["NFLX", "GOOGL"])),
    ])
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn default_money_flow_period() -> String {
    "5d".to_string()
}

fn default_money_flow_interval() -> String {
    "1d".to_string()
}

fn default_provider_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// DashboardConfig
// =============================================================================

/// Top-level configuration for the dashboard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    // --- Ticker universe ----------------------------------------------------

    /// Tickers offered for selection.
    #[serde(default = "default_available_tickers")]
    pub available_tickers: Vec<String>,

    /// Tickers selected when a request names none.
    #[serde(default = "default_tickers")]
    pub default_tickers: Vec<String>,

    /// Sector name -> member tickers.
    #[serde(default = "default_sectors")]
    pub sectors: BTreeMap<String, Vec<String>>,

    // --- Date range ---------------------------------------------------------

    #[serde(default = "default_start_date")]
    pub default_start: NaiveDate,

    /// Exclusive.
    #[serde(default = "default_end_date")]
    pub default_end: NaiveDate,

    // --- Indicators ---------------------------------------------------------

    #[serde(default)]
    pub indicators: IndicatorParams,

    /// Trailing window of the money-flow heatmap.
    #[serde(default = "default_money_flow_period")]
    pub money_flow_period: String,

    #[serde(default = "default_money_flow_interval")]
    pub money_flow_interval: String,

    // --- Provider / server --------------------------------------------------

    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            available_tickers: default_available_tickers(),
            default_tickers: default_tickers(),
            sectors: default_sectors(),
            default_start: default_start_date(),
            default_end: default_end_date(),
            indicators: IndicatorParams::default(),
            money_flow_period: default_money_flow_period(),
            money_flow_interval: default_money_flow_interval(),
            provider_base_url: default_provider_base_url(),
            provider_timeout_secs: default_provider_timeout_secs(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dashboard config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dashboard config from {}", path.display()))?;

        info!(
            path = %path.display(),
            tickers = ?config.default_tickers,
            sectors = config.sectors.len(),
            "dashboard config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise dashboard config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "dashboard config saved (atomic)");
        Ok(())
    }

    /// Apply `DASHBOARD_TICKERS` / `DASHBOARD_BIND_ADDR` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(list) = std::env::var("DASHBOARD_TICKERS") {
            self.apply_ticker_override(&list);
        }
        if let Ok(addr) = std::env::var("DASHBOARD_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
    }

    fn apply_ticker_override(&mut self, list: &str) {
        let tickers: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if tickers.is_empty() {
            return;
        }
        for t in &tickers {
            if !self.available_tickers.contains(t) {
                self.available_tickers.push(t.clone());
            }
        }
        self.default_tickers = tickers;
    }

    /// Reject settings the indicator and orchestration code cannot honour.
    pub fn validate(&self) -> Result<()> {
        let IndicatorParams {
            rsi_window,
            macd:
                MacdParams {
                    short_window,
                    long_window,
                    signal_window,
                },
        } = self.indicators;

        if rsi_window == 0 || short_window == 0 || long_window == 0 || signal_window == 0 {
            bail!("indicator windows must be positive: {:?}", self.indicators);
        }
        if short_window >= long_window {
            bail!("macd short window ({short_window}) must be below long window ({long_window})");
        }
        if self.default_tickers.is_empty() {
            bail!("default_tickers must not be empty");
        }
        if let Some(t) = self
            .default_tickers
            .iter()
            .find(|t| !self.available_tickers.contains(t))
        {
            bail!("default ticker {t} is not in available_tickers");
        }
        if self.default_start >= self.default_end {
            bail!(
                "default_start ({}) must be before default_end ({})",
                self.default_start,
                self.default_end
            );
        }
        if self.money_flow_period.trim().is_empty() || self.money_flow_interval.trim().is_empty() {
            bail!("money-flow period and interval must be set");
        }
        if self.provider_timeout_secs == 0 {
            bail!("provider_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.available_tickers.len(), 6);
        assert_eq!(cfg.default_tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(cfg.default_start.to_string(), "2023-01-01");
        assert_eq!(cfg.default_end.to_string(), "2024-01-01");
        assert_eq!(cfg.indicators.rsi_window, 14);
        assert_eq!(cfg.indicators.macd.short_window, 12);
        assert_eq!(cfg.indicators.macd.long_window, 26);
        assert_eq!(cfg.indicators.macd.signal_window, 9);
        assert_eq!(cfg.money_flow_period, "5d");
        assert!(cfg.sectors.contains_key("Technology"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.default_tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(cfg.provider_timeout_secs, 10);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_tickers": ["TSLA"], "indicators": { "rsi_window": 7, "macd": { "short_window": 5, "long_window": 10, "signal_window": 3 } } }"#;
        let cfg: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_tickers, vec!["TSLA"]);
        assert_eq!(cfg.indicators.rsi_window, 7);
        assert_eq!(cfg.indicators.macd.long_window, 10);
        assert_eq!(cfg.money_flow_interval, "1d");
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("dashboard-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard_config.json");

        let mut cfg = DashboardConfig::default();
        cfg.default_tickers = vec!["NFLX".into()];
        cfg.save(&path).unwrap();

        let loaded = DashboardConfig::load(&path).unwrap();
        assert_eq!(loaded.default_tickers, vec!["NFLX"]);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_errors() {
        assert!(DashboardConfig::load("/definitely/not/here.json").is_err());
    }

    #[test]
    fn validate_rejects_bad_windows() {
        let mut cfg = DashboardConfig::default();
        cfg.indicators.rsi_window = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DashboardConfig::default();
        cfg.indicators.macd.short_window = 26;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_default_ticker() {
        let mut cfg = DashboardConfig::default();
        cfg.default_tickers = vec!["ZZZZ".into()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_dates() {
        let mut cfg = DashboardConfig::default();
        std::mem::swap(&mut cfg.default_start, &mut cfg.default_end);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ticker_override_extends_universe() {
        let mut cfg = DashboardConfig::default();
        cfg.apply_ticker_override(" nvda, aapl ,,");
        assert_eq!(cfg.default_tickers, vec!["NVDA", "AAPL"]);
        assert!(cfg.available_tickers.contains(&"NVDA".to_string()));
        assert!(cfg.validate().is_ok());

        cfg.apply_ticker_override(" , ");
        assert_eq!(cfg.default_tickers, vec!["NVDA", "AAPL"]);
    }
}
