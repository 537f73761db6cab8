//! Configuration for the lockbridge host bridge.
//!
//! A TOML file at the platform config directory, overlaid by
//! `LOCKBRIDGE_*` environment variables, translated into
//! `lockbridge_core::BridgeConfig`. Nested keys use a double underscore in
//! the environment: `LOCKBRIDGE_BRIDGE__PAIRING_TIMEOUT_SECS=45`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use lockbridge_core::{BridgeConfig, RadioState};

/// Prefix shared by every configuration environment variable.
pub const ENV_PREFIX: &str = "LOCKBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Process-wide defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Session timing and framing.
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Behavior of the built-in simulated lock.
    #[serde(default)]
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// `tracing` filter used when neither `-v` nor `RUST_LOG` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BridgeSettings {
    #[serde(default = "default_pairing_timeout")]
    pub pairing_timeout_secs: u64,

    /// Applied when a WiFi request carries no timeout of its own.
    #[serde(default = "default_wifi_timeout")]
    pub wifi_timeout_secs: u64,

    /// Upper bound on key fragment size; the transport may lower it.
    #[serde(default = "default_key_chunk_size")]
    pub key_chunk_size: usize,

    #[serde(default = "default_key_confirmation_timeout")]
    pub key_confirmation_timeout_secs: u64,

    /// Bound on one key chunk, journal page or lock command.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,

    #[serde(default)]
    pub chip_type: u8,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        let runtime = BridgeConfig::default();
        Self {
            pairing_timeout_secs: runtime.pairing_timeout.as_secs(),
            wifi_timeout_secs: runtime.wifi_timeout.as_secs(),
            key_chunk_size: runtime.key_chunk_size,
            key_confirmation_timeout_secs: runtime.key_confirmation_timeout.as_secs(),
            ack_timeout_secs: runtime.ack_timeout.as_secs(),
            chip_type: runtime.chip_type,
        }
    }
}

fn default_pairing_timeout() -> u64 {
    BridgeSettings::default().pairing_timeout_secs
}
fn default_wifi_timeout() -> u64 {
    BridgeSettings::default().wifi_timeout_secs
}
fn default_key_chunk_size() -> usize {
    BridgeSettings::default().key_chunk_size
}
fn default_key_confirmation_timeout() -> u64 {
    BridgeSettings::default().key_confirmation_timeout_secs
}
fn default_ack_timeout() -> u64 {
    BridgeSettings::default().ack_timeout_secs
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulatorSettings {
    /// Delay applied to every simulated exchange.
    #[serde(default = "default_latency")]
    pub latency_ms: u64,

    /// Largest key fragment the simulated link accepts.
    #[serde(default = "default_frame_payload")]
    pub frame_payload: usize,

    /// Adapter state reported at startup.
    #[serde(default = "default_radio_state")]
    pub radio_state: RadioState,

    /// Entries in each simulated lock's journal.
    #[serde(default = "default_journal_records")]
    pub journal_records: usize,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            latency_ms: default_latency(),
            frame_payload: default_frame_payload(),
            radio_state: default_radio_state(),
            journal_records: default_journal_records(),
        }
    }
}

fn default_latency() -> u64 {
    50
}
fn default_frame_payload() -> usize {
    lockbridge_core::transport::DEFAULT_FRAME_PAYLOAD
}
fn default_radio_state() -> RadioState {
    RadioState::On
}
fn default_journal_records() -> usize {
    23
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bridge = &self.bridge;
        for (field, secs) in [
            ("bridge.pairing_timeout_secs", bridge.pairing_timeout_secs),
            ("bridge.wifi_timeout_secs", bridge.wifi_timeout_secs),
            (
                "bridge.key_confirmation_timeout_secs",
                bridge.key_confirmation_timeout_secs,
            ),
            ("bridge.ack_timeout_secs", bridge.ack_timeout_secs),
        ] {
            if secs == 0 {
                return Err(invalid(field, "must be at least 1 second"));
            }
        }
        if bridge.key_chunk_size == 0 {
            return Err(invalid("bridge.key_chunk_size", "must be positive"));
        }
        if self.simulator.frame_payload == 0 {
            return Err(invalid("simulator.frame_payload", "must be positive"));
        }
        match self.defaults.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(invalid(
                "defaults.log_format",
                format!("expected 'text' or 'json', got '{other}'"),
            )),
        }
    }

    /// Validate and build the runtime configuration.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        self.validate()?;
        let bridge = &self.bridge;
        Ok(BridgeConfig {
            pairing_timeout: Duration::from_secs(bridge.pairing_timeout_secs),
            wifi_timeout: Duration::from_secs(bridge.wifi_timeout_secs),
            key_chunk_size: bridge.key_chunk_size,
            key_confirmation_timeout: Duration::from_secs(bridge.key_confirmation_timeout_secs),
            ack_timeout: Duration::from_secs(bridge.ack_timeout_secs),
            chip_type: bridge.chip_type,
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "lockbridge", "lockbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lockbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layer defaults, the TOML file at `path` (if present) and the
/// environment, then validate.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Defaults plus the TOML file only, ignoring the environment. Used when
/// the result is written back so env overrides never leak into the file.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Validate, then write `cfg` as TOML to `path`, creating parent directories.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    cfg.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime_defaults() {
        let runtime = Config::default().to_bridge_config().unwrap();
        assert_eq!(runtime, BridgeConfig::default());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = Config::default();
        cfg.bridge.wifi_timeout_secs = 0;
        let err = cfg.to_bridge_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "bridge.wifi_timeout_secs"
        ));
    }

    #[test]
    fn ack_timeout_flows_into_runtime_config() {
        let mut cfg = Config::default();
        cfg.bridge.ack_timeout_secs = 4;
        let runtime = cfg.to_bridge_config().unwrap();
        assert_eq!(runtime.ack_timeout, Duration::from_secs(4));

        cfg.bridge.ack_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut cfg = Config::default();
        cfg.defaults.log_format = "yaml".into();
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid defaults.log_format: expected 'text' or 'json', got 'yaml'"
        );
    }
}
