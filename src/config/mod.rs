//! mtu1280 Configuration System
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./mtu1280.yaml` (current directory - highest priority)
//! 2. `~/.mtu1280.yaml` (home directory)
//! 3. `~/.config/mtu1280/mtu1280.yaml` (user config directory)
//! 4. `/etc/mtu1280/mtu1280.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority
//! files; command-line arguments override all of them.
//!
//! # YAML Structure
//!
//! ```yaml
//! interface: eth0
//! queue:
//!   num: 0
//!   copy_range: 65535
//!   recv_timeout_ms: 500
//! mtu: 1280
//! link:
//!   transmit: true
//!   source_mac: "02:00:00:00:00:01"
//! ```

mod link;
mod queue;

use crate::synth::{TargetMtu, DEFAULT_TARGET_MTU, MIN_TARGET_MTU};
use crate::wire::MacAddr;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use link::LinkConfig;
pub use queue::QueueConfig;

/// Default config filename.
const CONFIG_FILENAME: &str = "mtu1280.yaml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("no network interface configured")]
    MissingInterface,

    #[error("no queue number configured")]
    MissingQueue,

    #[error("MTU {mtu} is too small: must be at least {min}")]
    MtuTooSmall { mtu: u16, min: u16 },

    #[error("queue receive timeout must be non-zero")]
    ZeroRecvTimeout,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Interface packets arrive on and replies leave from (`interface`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    /// Interception queue (`queue.*`).
    #[serde(default)]
    pub queue: QueueConfig,

    /// MTU advertised in Packet Too Big replies (`mtu`). Defaults to 1280.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,

    /// Reply transmission (`link.*`).
    #[serde(default)]
    pub link: LinkConfig,
}

/// Validated settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub interface: String,
    pub queue_num: u16,
    pub copy_range: u16,
    pub recv_timeout: Duration,
    pub mtu: TargetMtu,
    pub transmit: bool,
    pub source_mac: Option<MacAddr>,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/mtu1280").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mtu1280").join(CONFIG_FILENAME));
        }

        // Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".mtu1280.yaml"));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        if other.interface.is_some() {
            self.interface = other.interface;
        }
        if other.mtu.is_some() {
            self.mtu = other.mtu;
        }
        self.queue.merge(other.queue);
        self.link.merge(other.link);
    }

    /// Get the advertised MTU, using default if not configured.
    pub fn mtu(&self) -> u16 {
        self.mtu.unwrap_or(DEFAULT_TARGET_MTU)
    }

    /// Check required fields and the MTU floor, applying defaults.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let interface = self
            .interface
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingInterface)?;
        let queue_num = self.queue.num.ok_or(ConfigError::MissingQueue)?;
        let mtu = TargetMtu::new(self.mtu()).map_err(|_| ConfigError::MtuTooSmall {
            mtu: self.mtu(),
            min: MIN_TARGET_MTU,
        })?;
        // SO_RCVTIMEO of zero blocks forever and the shutdown flag is never polled.
        let recv_timeout = self.queue.recv_timeout();
        if recv_timeout.is_zero() {
            return Err(ConfigError::ZeroRecvTimeout);
        }

        Ok(Settings {
            interface: interface.to_string(),
            queue_num,
            copy_range: self.queue.copy_range(),
            recv_timeout,
            mtu,
            transmit: self.link.transmit(),
            source_mac: self.link.source_mac,
        })
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn complete() -> Config {
        let mut config = Config::new();
        config.interface = Some("eth0".to_string());
        config.queue.num = Some(0);
        config
    }

    #[test]
    fn test_empty_config() {
        let config = Config::new();
        assert!(config.interface.is_none());
        assert_eq!(config.mtu(), 1280);
        assert!(config.link.transmit());
    }

    #[test]
    fn test_parse_yaml_full() {
        let yaml = r#"
interface: eth1
queue:
  num: 3
  copy_range: 1500
  recv_timeout_ms: 250
mtu: 1400
link:
  transmit: false
  source_mac: "02:00:00:00:00:01"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let settings = config.validate().unwrap();

        assert_eq!(settings.interface, "eth1");
        assert_eq!(settings.queue_num, 3);
        assert_eq!(settings.copy_range, 1500);
        assert_eq!(settings.recv_timeout, Duration::from_millis(250));
        assert_eq!(settings.mtu.get(), 1400);
        assert!(!settings.transmit);
        assert_eq!(
            settings.source_mac,
            Some(MacAddr::new([0x02, 0, 0, 0, 0, 0x01]))
        );
    }

    #[test]
    fn test_parse_yaml_empty() {
        let config: Config = serde_yaml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_yaml_rejects_unknown_fields() {
        let yaml = r#"
interface: eth0
mtuu: 1280
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_parse_yaml_rejects_bad_mac() {
        let yaml = r#"
link:
  source_mac: "not-a-mac"
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let settings = complete().validate().unwrap();
        assert_eq!(settings.copy_range, 0xffff);
        assert_eq!(settings.recv_timeout, Duration::from_millis(500));
        assert_eq!(settings.mtu.get(), 1280);
        assert!(settings.transmit);
        assert_eq!(settings.source_mac, None);
    }

    #[test]
    fn test_validate_missing_interface() {
        let mut config = complete();
        config.interface = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingInterface)));

        config.interface = Some(String::new());
        assert!(matches!(config.validate(), Err(ConfigError::MissingInterface)));
    }

    #[test]
    fn test_validate_missing_queue() {
        let mut config = complete();
        config.queue.num = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingQueue)));
    }

    #[test]
    fn test_validate_mtu_floor() {
        let mut config = complete();
        config.mtu = Some(47);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MtuTooSmall { mtu: 47, min: 48 })
        ));

        config.mtu = Some(48);
        assert_eq!(config.validate().unwrap().mtu.max_payload(), 0);
    }

    #[test]
    fn test_validate_zero_recv_timeout() {
        let mut config = complete();
        config.queue.recv_timeout_ms = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRecvTimeout)));

        config.queue.recv_timeout_ms = Some(1);
        assert_eq!(
            config.validate().unwrap().recv_timeout,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_merge_configs() {
        let mut base = complete();
        base.mtu = Some(1400);
        base.link.transmit = Some(false);

        let mut override_config = Config::new();
        override_config.interface = Some("eth9".to_string());
        override_config.queue.copy_range = Some(2000);

        base.merge(override_config);
        assert_eq!(base.interface.as_deref(), Some("eth9"));
        assert_eq!(base.queue.num, Some(0));
        assert_eq!(base.queue.copy_range, Some(2000));
        assert_eq!(base.mtu, Some(1400));
        assert_eq!(base.link.transmit, Some(false));
    }

    #[test]
    fn test_merge_preserves_base_when_override_empty() {
        let mut base = complete();
        base.merge(Config::new());
        assert_eq!(base, complete());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("mtu1280.yaml");

        fs::write(&config_path, "interface: wlan0\nqueue:\n  num: 2\n").unwrap();

        let config = Config::load_file(&config_path).unwrap();
        assert_eq!(config.interface.as_deref(), Some("wlan0"));
        assert_eq!(config.queue.num, Some(2));
    }

    #[test]
    fn test_load_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.yaml");
        fs::write(&config_path, "queue: [1, 2").unwrap();

        let err = Config::load_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml { .. }));
        assert!(err.to_string().contains("broken.yaml"));

        let missing = temp_dir.path().join("missing.yaml");
        assert!(matches!(
            Config::load_file(&missing),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_load_from_paths_merges() {
        let temp_dir = TempDir::new().unwrap();

        let low_priority = temp_dir.path().join("low.yaml");
        let high_priority = temp_dir.path().join("high.yaml");

        fs::write(
            &low_priority,
            r#"
interface: eth0
queue:
  num: 1
mtu: 1400
"#,
        )
        .unwrap();

        fs::write(
            &high_priority,
            r#"
mtu: 1280
queue:
  num: 5
"#,
        )
        .unwrap();

        let paths = vec![low_priority.clone(), high_priority.clone()];
        let (config, loaded) = Config::load_from_paths(&paths).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(config.interface.as_deref(), Some("eth0"));
        assert_eq!(config.queue.num, Some(5));
        assert_eq!(config.mtu, Some(1280));
    }

    #[test]
    fn test_load_skips_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("exists.yaml");
        let missing = temp_dir.path().join("missing.yaml");

        fs::write(&existing, "interface: eth3\n").unwrap();

        let paths = vec![missing, existing.clone()];
        let (config, loaded) = Config::load_from_paths(&paths).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], existing);
        assert_eq!(config.interface.as_deref(), Some("eth3"));
    }

    #[test]
    fn test_search_paths_includes_expected() {
        let paths = Config::search_paths();

        assert!(paths.iter().any(|p| p.ends_with("mtu1280.yaml")));
        assert!(paths
            .iter()
            .any(|p| p.starts_with("/etc/mtu1280") && p.ends_with("mtu1280.yaml")));
    }

    #[test]
    fn test_to_yaml() {
        let mut config = complete();
        config.link.source_mac = Some(MacAddr::new([0x02, 0, 0, 0, 0, 0x09]));

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("interface: eth0"));
        assert!(yaml.contains("num: 0"));
        assert!(yaml.contains("02:00:00:00:00:09"));
        // Unset optional values are omitted
        assert!(!yaml.contains("mtu:"));

        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
