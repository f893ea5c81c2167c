//! Updater configuration
//!
//! Loaded from `/etc/limiquantix/updater.yaml`. Every field has a default so
//! a missing or partial file still yields a usable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use limiquantix_common::LogFormat;
use serde::{Deserialize, Serialize};

use crate::record::BuildInfo;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/limiquantix/updater.yaml";

/// How often the updater checks on its own
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInterval {
    Never,
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl CheckInterval {
    /// Period between automatic checks, `None` when disabled
    pub fn period(&self) -> Option<Duration> {
        const DAY: u64 = 86_400;
        match self {
            CheckInterval::Never => None,
            CheckInterval::Daily => Some(Duration::from_secs(DAY)),
            CheckInterval::Weekly => Some(Duration::from_secs(DAY * 7)),
            CheckInterval::Monthly => Some(Duration::from_secs(DAY * 30)),
        }
    }
}

/// Updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, json)
    #[serde(default)]
    pub log_format: LogFormat,

    /// File holding the persisted lifecycle state
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Whether the device installs through the A/B update engine
    #[serde(default = "default_ab_device")]
    pub ab_device: bool,

    /// Accent colour for rich content (e.g. "#4F8CC9")
    #[serde(default = "default_accent_color")]
    pub accent_color: String,

    /// Automatic check schedule
    #[serde(default)]
    pub auto_check_interval: CheckInterval,

    /// How long to wait for the service to report before falling back to a
    /// fresh check (e.g. "200ms")
    #[serde(default = "default_resolve_debounce")]
    pub resolve_debounce: String,

    /// How often to re-check the battery while a download is held back
    #[serde(default = "default_battery_poll_interval")]
    pub battery_poll_interval: String,

    /// Capacity of the UI event queue
    #[serde(default = "default_ui_channel_capacity")]
    pub ui_channel_capacity: usize,

    /// Hardware id sent to the update server when early updates are accepted
    #[serde(default)]
    pub hw_id: String,

    /// The running build
    #[serde(default)]
    pub build: BuildInfo,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/data/updater/state.json")
}

fn default_ab_device() -> bool {
    true
}

fn default_accent_color() -> String {
    "#4F8CC9".to_string()
}

fn default_resolve_debounce() -> String {
    "200ms".to_string()
}

fn default_battery_poll_interval() -> String {
    "3s".to_string()
}

fn default_ui_channel_capacity() -> usize {
    64
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            state_file: default_state_file(),
            ab_device: default_ab_device(),
            accent_color: default_accent_color(),
            auto_check_interval: CheckInterval::default(),
            resolve_debounce: default_resolve_debounce(),
            battery_poll_interval: default_battery_poll_interval(),
            ui_channel_capacity: default_ui_channel_capacity(),
            hw_id: String::new(),
            build: BuildInfo::default(),
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: UpdaterConfig = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Parse the resolve debounce
    pub fn resolve_debounce_duration(&self) -> Duration {
        parse_duration(&self.resolve_debounce).unwrap_or(Duration::from_millis(200))
    }

    /// Parse the battery poll interval
    pub fn battery_poll_duration(&self) -> Duration {
        parse_duration(&self.battery_poll_interval).unwrap_or(Duration::from_secs(3))
    }

    /// Accent colour as 0xRRGGBB
    pub fn accent_rgb(&self) -> Option<u32> {
        parse_color(&self.accent_color)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if parse_duration(&self.resolve_debounce).is_none() {
            return Err(format!(
                "Invalid resolve debounce '{}'. Use format like '200ms', '1s'",
                self.resolve_debounce
            ));
        }

        match parse_duration(&self.battery_poll_interval) {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(format!(
                    "Invalid battery poll interval '{}'. Use format like '3s', '1m'",
                    self.battery_poll_interval
                ))
            }
        }

        if !self.accent_color.is_empty() && parse_color(&self.accent_color).is_none() {
            return Err(format!(
                "Invalid accent color '{}'. Use #RRGGBB",
                self.accent_color
            ));
        }

        if self.ui_channel_capacity == 0 {
            return Err("UI channel capacity must be at least 1".to_string());
        }

        if self.state_file.as_os_str().is_empty() {
            return Err("State file path cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Parse a duration string like "200ms", "3s", "30m", "1h", "1d"
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num) = s.strip_suffix("ms") {
        return num.parse().ok().map(Duration::from_millis);
    }

    let (split, unit) = s.char_indices().last()?;
    let num: u64 = s[..split].parse().ok()?;

    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return None,
    };

    num.checked_mul(scale).map(Duration::from_secs)
}

/// Parse "#RRGGBB" (leading '#' optional)
fn parse_color(s: &str) -> Option<u32> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("200ms"), Some(Duration::from_millis(200)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86400)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("2é"), None);
        assert_eq!(parse_duration("é"), None);
        assert_eq!(parse_duration(&format!("{}d", u64::MAX)), None);
    }

    #[test]
    fn test_validate_rejects_non_ascii_unit() {
        let config = UpdaterConfig {
            resolve_debounce: "2é".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#4F8CC9"), Some(0x4F8CC9));
        assert_eq!(parse_color("ffffff"), Some(0xFFFFFF));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("#GGGGGG"), None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = UpdaterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve_debounce_duration(), Duration::from_millis(200));
        assert_eq!(config.battery_poll_duration(), Duration::from_secs(3));

        config.resolve_debounce = "soon".to_string();
        assert!(config.validate().is_err());

        config.resolve_debounce = "200ms".to_string();
        config.battery_poll_interval = "0s".to_string();
        assert!(config.validate().is_err());

        config.battery_poll_interval = "3s".to_string();
        config.accent_color = "blue".to_string();
        assert!(config.validate().is_err());

        config.accent_color = String::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.accent_rgb(), None);
    }

    #[test]
    fn test_check_interval_period() {
        assert_eq!(CheckInterval::Never.period(), None);
        assert_eq!(CheckInterval::Daily.period(), Some(Duration::from_secs(86_400)));
        assert_eq!(CheckInterval::default(), CheckInterval::Weekly);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
ab_device: false
auto_check_interval: daily
build:
  device: alioth
  timestamp: 1665584742
"#;
        let config: UpdaterConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.ab_device);
        assert_eq!(config.auto_check_interval, CheckInterval::Daily);
        assert_eq!(config.build.device, "alioth");
        assert_eq!(config.build.timestamp, 1665584742);
        assert_eq!(config.build.version, "0.0.1");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }
}
