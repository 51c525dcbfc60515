//! Configuration management for herakles-rdt-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, BackendKind, ConfigFormat};
use herakles_rdt_exporter::backend::resctrl::DEFAULT_RESCTRL_PATH;
use herakles_rdt_exporter::config_tree::{items_from_section, ConfigItem, ConfigValue, ConfigValues};
use herakles_rdt_exporter::context::CORES_KEY;
use herakles_rdt_exporter::core_group::MAX_CORES;
use herakles_rdt_exporter::rangelist;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_INTERVAL_SECONDS: u64 = 10;

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Monitoring
    #[serde(alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    pub hostname: Option<String>,
    /// "resctrl" | "synthetic"
    pub backend: Option<String>,
    #[serde(alias = "resctrl-path")]
    pub resctrl_path: Option<PathBuf>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    /// Monitoring plugin block, e.g. `Cores: ["0-3", "4-7"]`
    #[serde(default)]
    pub rdt: BTreeMap<String, ConfigValues>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            interval_seconds: Some(DEFAULT_INTERVAL_SECONDS),
            hostname: None,
            backend: Some(BackendKind::Resctrl.as_str().to_string()),
            resctrl_path: Some(PathBuf::from(DEFAULT_RESCTRL_PATH)),
            enable_health: Some(true),
            log_level: Some("info".into()),
            rdt: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Selected backend, falling back to resctrl.
    pub fn backend_kind(&self) -> Result<BackendKind, Box<dyn std::error::Error>> {
        match self.backend.as_deref() {
            None | Some("resctrl") => Ok(BackendKind::Resctrl),
            Some("synthetic") => Ok(BackendKind::Synthetic),
            Some(other) => Err(format!(
                "Invalid backend '{}', expected 'resctrl' or 'synthetic'",
                other
            )
            .into()),
        }
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS))
    }

    pub fn resctrl_root(&self) -> PathBuf {
        self.resctrl_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESCTRL_PATH))
    }

    /// Configuration block handed to the monitoring context.
    pub fn rdt_items(&self) -> Vec<ConfigItem> {
        items_from_section(&self.rdt)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.port == Some(0) {
        return Err("port must not be 0".into());
    }

    if cfg.interval_seconds == Some(0) {
        return Err("interval_seconds must be at least 1".into());
    }

    cfg.backend_kind()?;

    if let Some(bind) = cfg.bind.as_deref() {
        bind.parse::<std::net::IpAddr>()
            .map_err(|e| format!("Invalid bind address '{}': {}", bind, e))?;
    }

    // Catch malformed core groups before the platform is touched
    for item in cfg.rdt_items() {
        if !item.key.eq_ignore_ascii_case(CORES_KEY) {
            continue;
        }
        for (idx, value) in item.values.iter().enumerate() {
            let text = match value {
                ConfigValue::String(s) => s,
                other => {
                    return Err(format!(
                        "Core group value is not a string [idx={}]: {}",
                        idx, other
                    )
                    .into());
                }
            };
            if text.is_empty() {
                continue;
            }
            let cores = rangelist::parse(text, MAX_CORES)
                .map_err(|e| format!("Error parsing core group ({}): {}", text, e))?;
            if cores.is_empty() {
                return Err(format!("Error parsing core group ({}): no cores", text).into());
            }
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(interval) = args.interval {
        config.interval_seconds = Some(interval);
    }
    if let Some(backend) = args.backend {
        config.backend = Some(backend.as_str().to_string());
    }
    if let Some(path) = &args.resctrl_path {
        config.resctrl_path = Some(path.clone());
    }
    if let Some(hostname) = &args.hostname {
        config.hostname = Some(hostname.clone());
    }

    // Core groups: CLI replaces the whole list
    if !args.cores.is_empty() {
        config.rdt.retain(|key, _| !key.eq_ignore_ascii_case(CORES_KEY));
        config.rdt.insert(
            CORES_KEY.to_string(),
            ConfigValues::Many(
                args.cores
                    .iter()
                    .map(|s| ConfigValue::String(s.clone()))
                    .collect(),
            ),
        );
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/rdt-exporter.yaml",
            "/etc/herakles/rdt-exporter.yml",
            "/etc/herakles/rdt-exporter.json",
            "./herakles-rdt-exporter.yaml",
            "./herakles-rdt-exporter.yml",
            "./herakles-rdt-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text by file extension; anything unknown is read as YAML.
pub fn parse_config(
    content: &str,
    extension: Option<&str>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.interval().as_secs(), 10);
        assert_eq!(cfg.backend_kind().unwrap(), BackendKind::Resctrl);
        assert!(cfg.rdt_items().is_empty());
    }

    #[test]
    fn yaml_with_rdt_block() {
        let yaml = r#"
port: 9300
interval_seconds: 5
backend: synthetic
rdt:
  Cores:
    - "0-3"
    - "4,5,6"
"#;
        let cfg = parse_config(yaml, Some("yaml")).unwrap();
        assert_eq!(cfg.port, Some(9300));
        assert_eq!(cfg.backend_kind().unwrap(), BackendKind::Synthetic);
        let items = cfg.rdt_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].values.len(), 2);
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn toml_with_rdt_block() {
        let text = r#"
port = 9400

[rdt]
Cores = ["0-1", "2"]
"#;
        let cfg = parse_config(text, Some("toml")).unwrap();
        assert_eq!(cfg.port, Some(9400));
        assert_eq!(cfg.rdt_items()[0].values[1], ConfigValue::from("2"));
    }

    #[test]
    fn malformed_cores_fail_validation() {
        let cfg = parse_config(r#"{"rdt": {"Cores": ["0-3", "zz"]}}"#, Some("json")).unwrap();
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = parse_config(r#"{"rdt": {"cores": [7]}}"#, Some("json")).unwrap();
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let cfg = Config {
            interval_seconds: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            backend: Some("pqos".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "port: 9300\nrdt:\n  cores: [\"0-7\"]\n  Verbose: true").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from([
            "herakles-rdt-exporter",
            "--config",
            path.as_str(),
            "--port",
            "9500",
            "--cores",
            "0-1",
            "--cores",
            "2-3",
        ]);
        let cfg = resolve_config(&args).unwrap();

        assert_eq!(cfg.port, Some(9500));
        let cores = cfg.rdt.get(CORES_KEY).unwrap().clone().into_vec();
        assert_eq!(cores, vec![ConfigValue::from("0-1"), ConfigValue::from("2-3")]);
        assert!(!cfg.rdt.contains_key("cores"));
        assert!(cfg.rdt.contains_key("Verbose"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = load_config(Some("/nonexistent/rdt-exporter.yaml")).unwrap();
        assert_eq!(cfg.port, Some(DEFAULT_PORT));
    }
}
