//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use herakles_rdt_exporter::config_tree::{ConfigValue, ConfigValues};
use herakles_rdt_exporter::context::CORES_KEY;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = sample_config();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-rdt-exporter.yaml"),
    };

    let content = render_config(&config, format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Default configuration with an example core group list.
pub fn sample_config() -> Config {
    let mut config = Config::default();
    config.rdt.insert(
        CORES_KEY.to_string(),
        ConfigValues::Many(vec![ConfigValue::from("0-3"), ConfigValue::from("4-7")]),
    );
    config
}

fn render_config(
    config: &Config,
    format: ConfigFormat,
    commented: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(config)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
    };
    Ok(content)
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles RDT Exporter Configuration
# ===================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Monitoring
# ----------
# interval_seconds: 10         # Seconds between two ticks
# hostname: null               # Host label (null = system host name)
# backend: "resctrl"           # resctrl or synthetic
# resctrl_path: "/sys/fs/resctrl"
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Core Groups
# -----------
# rdt:
#   Cores:                     # One range list per group, e.g. "0-3,8,0x10-12"
#     - "0-3"                  # Empty or missing list = one group per core
#     - "4-7"                  # A core may belong to one group only
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, validate_effective_config};

    #[test]
    fn sample_yaml_round_trips_and_validates() {
        let text = render_config(&sample_config(), ConfigFormat::Yaml, true).unwrap();
        assert!(text.starts_with("# Herakles RDT Exporter Configuration"));
        let cfg = parse_config(&text, Some("yaml")).unwrap();
        assert_eq!(cfg.rdt_items()[0].values.len(), 2);
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn sample_toml_parses() {
        let text = render_config(&sample_config(), ConfigFormat::Toml, false).unwrap();
        let cfg = parse_config(&text, Some("toml")).unwrap();
        assert_eq!(cfg.port, sample_config().port);
        assert!(cfg.rdt.contains_key(CORES_KEY));
    }
}
