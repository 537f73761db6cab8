//! Config subcommand handlers.

use std::path::Path;
use std::str::FromStr;

use lockbridge_config::{Config, ConfigError, load_config_file, load_config_from, save_config_to};
use lockbridge_core::RadioState;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

const VALID_KEYS: &str = "defaults.log_level, defaults.log_format, \
    bridge.pairing_timeout_secs, bridge.wifi_timeout_secs, bridge.key_chunk_size, \
    bridge.key_confirmation_timeout_secs, bridge.ack_timeout_secs, bridge.chip_type, \
    simulator.latency_ms, simulator.frame_payload, simulator.radio_state, \
    simulator.journal_records";

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, path: &Path) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = load_config_from(path)?;
            let rendered = toml::to_string_pretty(&cfg).map_err(ConfigError::from)?;
            print!("{rendered}");
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config_to(path, &Config::default())?;
            eprintln!("✓ Configuration written to {}", path.display());
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = load_config_file(path)?;
            apply(&mut cfg, &key, &value)?;
            save_config_to(path, &cfg)?;
            eprintln!("✓ Set {key} = {value}");
            Ok(())
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

fn apply(cfg: &mut Config, key: &str, value: &str) -> Result<(), CliError> {
    const SECONDS: &str = "a whole number of seconds";
    const COUNT: &str = "a positive whole number";

    match key {
        "defaults.log_level" => cfg.defaults.log_level = value.into(),
        "defaults.log_format" => cfg.defaults.log_format = value.into(),
        "bridge.pairing_timeout_secs" => cfg.bridge.pairing_timeout_secs = parse(key, value, SECONDS)?,
        "bridge.wifi_timeout_secs" => cfg.bridge.wifi_timeout_secs = parse(key, value, SECONDS)?,
        "bridge.key_chunk_size" => cfg.bridge.key_chunk_size = parse(key, value, COUNT)?,
        "bridge.key_confirmation_timeout_secs" => {
            cfg.bridge.key_confirmation_timeout_secs = parse(key, value, SECONDS)?;
        }
        "bridge.ack_timeout_secs" => cfg.bridge.ack_timeout_secs = parse(key, value, SECONDS)?,
        "bridge.chip_type" => cfg.bridge.chip_type = parse(key, value, "a number from 0 to 255")?,
        "simulator.latency_ms" => {
            cfg.simulator.latency_ms = parse(key, value, "a whole number of milliseconds")?;
        }
        "simulator.frame_payload" => cfg.simulator.frame_payload = parse(key, value, COUNT)?,
        "simulator.journal_records" => {
            cfg.simulator.journal_records = parse(key, value, "a whole number")?;
        }
        "simulator.radio_state" => {
            cfg.simulator.radio_state = parse::<RadioState>(
                key,
                value,
                "one of on, off, unavailable, unauthorized, unsupported",
            )?;
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {VALID_KEYS}"),
            });
        }
    }
    Ok(())
}
