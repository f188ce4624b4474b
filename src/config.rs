//! Configuration management for yarn-usage-agent.
//!
//! Configuration is resolved with precedence CLI > config file > defaults.
//! YAML, JSON and TOML files are supported, selected by extension.

use crate::cli::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_SINK_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_IMDS_URL: &str = "http://169.254.169.254";
pub const DEFAULT_PROCESS_NAME: &str = "java";
pub const DEFAULT_APPLICATION_MARKER: &str = "application";
pub const DEFAULT_CONTAINER_MARKER: &str = "container";
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_MAX_IN_FLIGHT_SENDS: usize = 32;

/// Agent configuration. Every field is optional in the file; effective
/// values fall back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the usage collector.
    pub sink_url: Option<String>,
    /// Base URL of the instance metadata service.
    pub imds_url: Option<String>,
    /// Static instance id, bypassing the metadata lookup (useful off-EC2).
    pub instance_id: Option<String>,

    // Discovery filter
    pub process_name: Option<String>,
    pub application_marker: Option<String>,
    pub container_marker: Option<String>,

    // Timing
    pub discovery_interval_secs: Option<u64>,
    pub sample_interval_secs: Option<u64>,

    /// Bound on concurrent outbound sends; samples beyond it are dropped.
    pub max_in_flight_sends: Option<usize>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sink_url: Some(DEFAULT_SINK_URL.to_string()),
            imds_url: Some(DEFAULT_IMDS_URL.to_string()),
            instance_id: None,
            process_name: Some(DEFAULT_PROCESS_NAME.to_string()),
            application_marker: Some(DEFAULT_APPLICATION_MARKER.to_string()),
            container_marker: Some(DEFAULT_CONTAINER_MARKER.to_string()),
            discovery_interval_secs: Some(DEFAULT_DISCOVERY_INTERVAL_SECS),
            sample_interval_secs: Some(DEFAULT_SAMPLE_INTERVAL_SECS),
            max_in_flight_sends: Some(DEFAULT_MAX_IN_FLIGHT_SENDS),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn sink_url(&self) -> &str {
        self.sink_url.as_deref().unwrap_or(DEFAULT_SINK_URL)
    }

    pub fn imds_url(&self) -> &str {
        self.imds_url.as_deref().unwrap_or(DEFAULT_IMDS_URL)
    }

    pub fn process_name(&self) -> &str {
        self.process_name.as_deref().unwrap_or(DEFAULT_PROCESS_NAME)
    }

    pub fn application_marker(&self) -> &str {
        self.application_marker
            .as_deref()
            .unwrap_or(DEFAULT_APPLICATION_MARKER)
    }

    pub fn container_marker(&self) -> &str {
        self.container_marker
            .as_deref()
            .unwrap_or(DEFAULT_CONTAINER_MARKER)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(
            self.discovery_interval_secs
                .unwrap_or(DEFAULT_DISCOVERY_INTERVAL_SECS),
        )
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(
            self.sample_interval_secs
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL_SECS),
        )
    }

    pub fn max_in_flight_sends(&self) -> usize {
        self.max_in_flight_sends
            .unwrap_or(DEFAULT_MAX_IN_FLIGHT_SENDS)
    }
}

/// Validate effective config (used at startup).
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.discovery_interval_secs == Some(0) {
        return Err("discovery_interval_secs must be greater than zero".into());
    }
    if cfg.sample_interval_secs == Some(0) {
        return Err("sample_interval_secs must be greater than zero".into());
    }
    if cfg.max_in_flight_sends == Some(0) {
        return Err("max_in_flight_sends must be greater than zero".into());
    }
    if cfg.process_name().is_empty() {
        return Err("process_name must not be empty".into());
    }
    if !cfg.sink_url().starts_with("http://") && !cfg.sink_url().starts_with("https://") {
        return Err(format!("sink_url is not an HTTP URL: {}", cfg.sink_url()).into());
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

    if let Some(sink_url) = &args.sink_url {
        config.sink_url = Some(sink_url.clone());
    }
    if let Some(instance_id) = &args.instance_id {
        config.instance_id = Some(instance_id.clone());
    }
    if let Some(process_name) = &args.process_name {
        config.process_name = Some(process_name.clone());
    }
    if let Some(secs) = args.discovery_interval_secs {
        config.discovery_interval_secs = Some(secs);
    }
    if let Some(secs) = args.sample_interval_secs {
        config.sample_interval_secs = Some(secs);
    }

    Ok(config)
}

/// Configuration loading with multiple format support.
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/yarn-usage-agent/config.yaml",
            "/etc/yarn-usage-agent/config.yml",
            "/etc/yarn-usage-agent/config.toml",
            "./yarn-usage-agent.yaml",
            "./yarn-usage-agent.yml",
            "./yarn-usage-agent.toml",
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

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Prints the effective merged configuration as YAML.
pub fn show_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_effective() {
        let cfg = Config::default();
        assert_eq!(cfg.process_name(), "java");
        assert_eq!(cfg.discovery_interval(), Duration::from_secs(1));
        assert_eq!(cfg.sample_interval(), Duration::from_secs(2));
        assert_eq!(cfg.max_in_flight_sends(), DEFAULT_MAX_IN_FLIGHT_SENDS);
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let cfg = Config {
            sample_interval_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_non_http_sink_url_rejected() {
        let cfg = Config {
            sink_url: Some("ftp://collector".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_yaml_partial_file_falls_back_to_defaults() {
        let yaml = "sink_url: http://collector:9000\nsample_interval_secs: 5\n";
        let cfg: Config = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(cfg.sink_url(), "http://collector:9000");
        assert_eq!(cfg.sample_interval(), Duration::from_secs(5));
        // Unset fields fall back to defaults at access time.
        assert_eq!(cfg.process_name(), "java");
    }
}
