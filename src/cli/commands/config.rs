//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::{StreamsError, StreamsResult};
use crate::storage::name::parse_lenient;
use crate::ui::{self, UiContext};
use std::path::PathBuf;
use url::Url;

const VALID_KEYS: [&str; 10] = [
    "general.log_format",
    "general.event_log",
    "worker.cache_prefix",
    "worker.version",
    "worker.core_assets",
    "network.origin",
    "network.bypass_hosts",
    "network.user_agent",
    "storage.backend",
    "storage.state_dir",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> StreamsResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> StreamsResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> StreamsResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());

    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> StreamsResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();

    if let Err(e) = apply(&mut config, key, value) {
        ui::step_error_detail(&ctx, "Cannot set config value", &e.to_string());
        if matches!(&e, StreamsError::ConfigValue { reason, .. } if reason == "unknown key") {
            ui::remark(&ctx, "Valid keys:");
            for key in VALID_KEYS {
                ui::remark(&ctx, &format!("  {}", key));
            }
        }
        return Err(e);
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply a dotted `key = value` to the config, validating the value
fn apply(config: &mut Config, key: &str, value: &str) -> StreamsResult<()> {
    let invalid = |reason: String| StreamsError::ConfigValue {
        key: key.to_string(),
        reason,
    };

    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => return Err(invalid("expected text or json".to_string())),
        },
        ["general", "event_log"] => config.general.event_log = parse_bool(value).map_err(invalid)?,

        ["worker", "cache_prefix"] => {
            if value.trim().is_empty() {
                return Err(invalid("must not be empty".to_string()));
            }
            config.worker.cache_prefix = value.trim().to_string();
        }
        ["worker", "version"] => {
            parse_lenient(value).ok_or_else(|| invalid(format!("'{}' is not a version", value)))?;
            config.worker.version = value.to_string();
        }
        ["worker", "core_assets"] => config.worker.core_assets = parse_list(value),

        ["network", "origin"] => {
            Url::parse(value).map_err(|e| invalid(e.to_string()))?;
            config.network.origin = value.to_string();
        }
        ["network", "bypass_hosts"] => config.network.bypass_hosts = parse_list(value),
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),

        ["storage", "backend"] => {
            config.storage.backend = match value {
                "disk" => StorageBackend::Disk,
                "memory" => StorageBackend::Memory,
                _ => return Err(invalid("expected disk or memory".to_string())),
            }
        }
        ["storage", "state_dir"] => {
            config.storage.state_dir = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        }

        _ => return Err(invalid("unknown key".to_string())),
    }
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(format!("invalid boolean value: {}. Use true/false", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_worker_version() {
        let mut config = Config::default();
        apply(&mut config, "worker.version", "13.3").unwrap();
        assert_eq!(config.worker.cache_name(), "streams-cache-v13.3");

        let err = apply(&mut config, "worker.version", "next").unwrap_err();
        assert!(matches!(err, StreamsError::ConfigValue { .. }));
        assert_eq!(config.worker.version, "13.3");
    }

    #[test]
    fn sets_lists() {
        let mut config = Config::default();
        apply(&mut config, "network.bypass_hosts", "api.example.com, ,tiles.example.com").unwrap();
        assert_eq!(
            config.network.bypass_hosts,
            vec!["api.example.com", "tiles.example.com"]
        );

        apply(&mut config, "worker.core_assets", "/index.html").unwrap();
        assert_eq!(config.worker.core_assets, vec!["/index.html"]);
    }

    #[test]
    fn validates_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "network.origin", "localhost").is_err());
        assert!(apply(&mut config, "storage.backend", "s3").is_err());
        assert!(apply(&mut config, "general.event_log", "maybe").is_err());
        assert!(apply(&mut config, "general.log_format", "xml").is_err());

        apply(&mut config, "storage.backend", "memory").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        apply(&mut config, "general.event_log", "no").unwrap();
        assert!(!config.general.event_log);
    }

    #[test]
    fn unknown_key() {
        let err = apply(&mut Config::default(), "vm.name", "x").unwrap_err();
        assert!(err.to_string().contains("unknown key"));
    }

    #[test]
    fn every_listed_key_is_settable() {
        let samples = [
            "json",
            "true",
            "streams",
            "14",
            "/index.html",
            "https://streams.example.com",
            "api.open-meteo.com",
            "streams-cache/test",
            "disk",
            "/tmp/streams",
        ];
        let mut config = Config::default();
        for (key, value) in VALID_KEYS.iter().zip(samples) {
            apply(&mut config, key, value).unwrap();
        }
    }
}
