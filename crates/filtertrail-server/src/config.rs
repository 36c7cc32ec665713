// ABOUTME: Configuration loading and validation for the filtertrail server and monitor.
// ABOUTME: Reads FILTERTRAIL_* environment variables, falling back to defaults for each.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use filtertrail_core::DiffThresholds;
use filtertrail_core::headers::DEFAULT_MAX_COLUMNS;
use filtertrail_core::state::DEFAULT_HISTORY_CAP;
use filtertrail_monitor::MonitorConfig;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:7341";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("FILTERTRAIL_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("{var} has an invalid value: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Server and monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub poll_interval: Duration,
    pub save_interval: Duration,
    pub max_columns: usize,
    pub history_cap: usize,
    pub thresholds: DiffThresholds,
}

impl TrailConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - FILTERTRAIL_HOME: data directory (default: ~/.filtertrail)
    /// - FILTERTRAIL_BIND: socket address to bind (default: 127.0.0.1:7341)
    /// - FILTERTRAIL_POLL_MS: poll interval in milliseconds (default: 250)
    /// - FILTERTRAIL_SAVE_INTERVAL_MS: periodic save cadence (default: 1000)
    /// - FILTERTRAIL_MAX_COLUMNS: header columns read per snapshot (default: 200)
    /// - FILTERTRAIL_HISTORY_CAP: events shown in the views (default: 100)
    /// - FILTERTRAIL_JITTER_ROWS: row count noise ignored by the diff (default: 2)
    /// - FILTERTRAIL_SIGNIFICANCE: fraction of the total a bare count change must exceed (default: 0.001)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TrailConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("FILTERTRAIL_HOME").map(PathBuf::from).unwrap_or_else(|| {
            var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".filtertrail")
        });

        let bind_str = var("FILTERTRAIL_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str.clone()))?;

        let poll_ms: u64 = parse_var(&var, "FILTERTRAIL_POLL_MS", 250)?;
        let save_ms: u64 = parse_var(&var, "FILTERTRAIL_SAVE_INTERVAL_MS", 1000)?;
        let max_columns: usize = parse_var(&var, "FILTERTRAIL_MAX_COLUMNS", DEFAULT_MAX_COLUMNS)?;
        let history_cap: usize = parse_var(&var, "FILTERTRAIL_HISTORY_CAP", DEFAULT_HISTORY_CAP)?;
        let jitter_rows: u64 =
            parse_var(&var, "FILTERTRAIL_JITTER_ROWS", DiffThresholds::DEFAULT_JITTER_ROWS)?;
        let significance_ratio: f64 = parse_var(
            &var,
            "FILTERTRAIL_SIGNIFICANCE",
            DiffThresholds::DEFAULT_SIGNIFICANCE_RATIO,
        )?;

        for (name, value) in [
            ("FILTERTRAIL_POLL_MS", poll_ms as usize),
            ("FILTERTRAIL_SAVE_INTERVAL_MS", save_ms as usize),
            ("FILTERTRAIL_MAX_COLUMNS", max_columns),
            ("FILTERTRAIL_HISTORY_CAP", history_cap),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if !significance_ratio.is_finite() || significance_ratio < 0.0 {
            return Err(ConfigError::InvalidValue {
                var: "FILTERTRAIL_SIGNIFICANCE",
                value: significance_ratio.to_string(),
            });
        }

        Ok(Self {
            home,
            bind,
            poll_interval: Duration::from_millis(poll_ms),
            save_interval: Duration::from_millis(save_ms),
            max_columns,
            history_cap,
            thresholds: DiffThresholds {
                jitter_rows,
                significance_ratio,
            },
        })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: self.poll_interval,
            save_interval: self.save_interval,
            max_columns: self.max_columns,
        }
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: key,
            value: raw,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<TrailConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TrailConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn config_loads_defaults() {
        let config = load(&[("HOME", "/home/analyst")]).unwrap();

        assert_eq!(config.home, PathBuf::from("/home/analyst/.filtertrail"));
        assert_eq!(config.bind, "127.0.0.1:7341".parse::<SocketAddr>().unwrap());
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.save_interval, Duration::from_secs(1));
        assert_eq!(config.max_columns, 200);
        assert_eq!(config.history_cap, 100);
        assert_eq!(config.thresholds, DiffThresholds::default());
    }

    #[test]
    fn config_reads_overrides() {
        let config = load(&[
            ("FILTERTRAIL_HOME", "/data/trail"),
            ("FILTERTRAIL_BIND", "0.0.0.0:9000"),
            ("FILTERTRAIL_POLL_MS", "500"),
            ("FILTERTRAIL_JITTER_ROWS", "5"),
            ("FILTERTRAIL_SIGNIFICANCE", "0.01"),
        ])
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/data/trail"));
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.monitor_config().poll_interval, Duration::from_millis(500));
        assert_eq!(config.thresholds.jitter_rows, 5);
        assert_eq!(config.thresholds.significance_ratio, 0.01);
    }

    #[test]
    fn config_rejects_bad_values() {
        assert_eq!(
            load(&[("FILTERTRAIL_BIND", "not-an-address")]).unwrap_err(),
            ConfigError::InvalidBind("not-an-address".to_string())
        );
        assert!(matches!(
            load(&[("FILTERTRAIL_POLL_MS", "fast")]),
            Err(ConfigError::InvalidValue { var: "FILTERTRAIL_POLL_MS", .. })
        ));
        assert_eq!(
            load(&[("FILTERTRAIL_HISTORY_CAP", "0")]).unwrap_err(),
            ConfigError::Zero("FILTERTRAIL_HISTORY_CAP")
        );
        assert!(load(&[("FILTERTRAIL_SIGNIFICANCE", "-1")]).is_err());
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = load(&[("FILTERTRAIL_POLL_MS", "  ")]).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }
}
