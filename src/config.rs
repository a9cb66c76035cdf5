//! Configuration module
//!
//! Reads TOML configuration from `~/.config/gridpass-charging/config.toml`
//! (overridable with the `GRIDPASS_CONFIG` env var). Every field has a
//! default, so a missing or partial file still yields a runnable config.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::booking::BookingConfig;
use crate::application::negotiator::NegotiatorConfig;
use crate::application::planner::PlannerConfig;
use crate::shared::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server bind configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Plan builder parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub slot_minutes: u32,
    pub ramp_fraction: f64,
    pub min_lead_minutes: i64,
    pub max_horizon_hours: i64,
    pub balanced_price_weight: f64,
    pub balanced_power_weight: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        let d = PlannerConfig::default();
        Self {
            slot_minutes: d.slot_minutes,
            ramp_fraction: d.ramp_fraction,
            min_lead_minutes: d.min_lead_minutes,
            max_horizon_hours: d.max_horizon_hours,
            balanced_price_weight: d.balanced_price_weight,
            balanced_power_weight: d.balanced_power_weight,
        }
    }
}

/// Negotiation parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NegotiationSettings {
    pub top_k: usize,
    pub search_radius_km: f64,
    pub default_battery_capacity_kwh: f64,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        let d = NegotiatorConfig::default();
        Self {
            top_k: d.top_k,
            search_radius_km: d.search_radius_km,
            default_battery_capacity_kwh: d.default_battery_capacity_kwh,
        }
    }
}

/// Booking and external-call parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
    pub external_call_timeout_secs: u64,
    pub anchor_retry_max_attempts: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            external_call_timeout_secs: 10,
            anchor_retry_max_attempts: 5,
        }
    }
}

/// Capacity ledger parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Limit assumed for sites without an explicit registration.
    pub default_site_limit_kw: f64,
    /// How long elapsed slots stay queryable before pruning.
    pub retention_hours: i64,
    pub prune_interval_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_site_limit_kw: 50.0,
            retention_hours: 24,
            prune_interval_secs: 300,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub planner: PlannerSettings,
    pub negotiation: NegotiationSettings,
    pub booking: BookingSettings,
    pub ledger: LedgerSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            slot_minutes: self.planner.slot_minutes,
            ramp_fraction: self.planner.ramp_fraction,
            min_lead_minutes: self.planner.min_lead_minutes,
            max_horizon_hours: self.planner.max_horizon_hours,
            balanced_price_weight: self.planner.balanced_price_weight,
            balanced_power_weight: self.planner.balanced_power_weight,
        }
    }

    pub fn negotiator_config(&self) -> NegotiatorConfig {
        NegotiatorConfig {
            top_k: self.negotiation.top_k,
            search_radius_km: self.negotiation.search_radius_km,
            default_battery_capacity_kwh: self.negotiation.default_battery_capacity_kwh,
        }
    }

    pub fn booking_config(&self) -> BookingConfig {
        BookingConfig {
            external_call_timeout: StdDuration::from_secs(self.booking.external_call_timeout_secs),
            anchor_retry: RetryConfig {
                max_attempts: self.booking.anchor_retry_max_attempts,
                ..RetryConfig::default()
            },
        }
    }
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridpass-charging")
        .join("config.toml")
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.address(), "0.0.0.0:8080");
        assert_eq!(cfg.planner.slot_minutes, 15);
        assert_eq!(cfg.planner.ramp_fraction, 0.5);
        assert_eq!(cfg.negotiation.top_k, 5);
        assert_eq!(cfg.ledger.default_site_limit_kw, 50.0);
        assert_eq!(cfg.booking.external_call_timeout_secs, 10);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [planner]
            slot_minutes = 30

            [negotiation]
            top_k = 3
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.planner.slot_minutes, 30);
        assert_eq!(cfg.planner.max_horizon_hours, 12);
        assert_eq!(cfg.negotiation.top_k, 3);
    }

    #[test]
    fn component_configs_mirror_settings() {
        let mut cfg = AppConfig::default();
        cfg.planner.slot_minutes = 10;
        cfg.booking.external_call_timeout_secs = 3;

        assert_eq!(cfg.planner_config().slot_minutes, 10);
        assert_eq!(
            cfg.booking_config().external_call_timeout,
            StdDuration::from_secs(3)
        );
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
