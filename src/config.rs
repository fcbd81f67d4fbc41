//! Daemon configuration
//!
//! Read from a TOML file; every key is optional.
//!
//! ```toml
//! devpath = "/dev/input/ckb"
//! gid = 1000
//! scan_interval_ms = 1000
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::devnode::{NodeConfig, DEFAULT_DEVPATH};

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ckb-daemon.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Node path prefix; slot `n` lives at `<devpath><n>`
    pub devpath: PathBuf,
    /// Group allowed to use the device nodes
    pub gid: Option<u32>,
    /// Hot-plug scan interval
    pub scan_interval_ms: u64,
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            devpath: PathBuf::from(DEFAULT_DEVPATH),
            gid: None,
            scan_interval_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        if config.scan_interval_ms == 0 {
            anyhow::bail!("scan_interval_ms must be positive");
        }
        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new(&self.devpath, self.gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.devpath, PathBuf::from("/dev/input/ckb"));
        assert_eq!(config.scan_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file() {
        let config = DaemonConfig::from_toml("gid = 27\ndevpath = \"/tmp/ckb\"\n").unwrap();
        assert_eq!(config.gid, Some(27));
        assert_eq!(config.node_config().slot_path(3), PathBuf::from("/tmp/ckb3"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(DaemonConfig::from_toml("scan_interval_ms = 0").is_err());
        assert!(DaemonConfig::from_toml("gid = \"wheel\"").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("ckb-daemon-no-such-config.toml");
        assert_eq!(DaemonConfig::load(&path).unwrap(), DaemonConfig::default());
    }
}
