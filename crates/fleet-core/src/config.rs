//! fleetgrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Resource store plugin selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// "redb" or "memory".
    #[serde(default = "default_backend")]
    pub backend: String,
}

/// History store plugin selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "redb", "memory", or "disabled".
    #[serde(default = "default_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/fleetgrid")
}

fn default_backend() -> String {
    "redb".to_string()
}

fn default_filter() -> String {
    "info,fleetd=debug,fleetgrid=debug".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: default_backend(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FleetConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Everything in memory; nothing touches disk.
    pub fn in_memory() -> Self {
        FleetConfig {
            store: StoreConfig {
                data_dir: PathBuf::new(),
                backend: "memory".to_string(),
            },
            history: HistoryConfig {
                backend: "memory".to_string(),
            },
            log: LogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty() {
        let config = FleetConfig::from_toml_str("").unwrap();
        assert_eq!(config.store.backend, "redb");
        assert_eq!(config.store.data_dir, PathBuf::from("/var/lib/fleetgrid"));
        assert_eq!(config.history.backend, "redb");
        assert!(config.log.filter.starts_with("info"));
    }

    #[test]
    fn test_parse_sections() {
        let toml_str = r#"
[store]
data_dir = "/tmp/fg"
backend = "memory"

[history]
backend = "disabled"
"#;
        let config = FleetConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/fg"));
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.history.backend, "disabled");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = FleetConfig::in_memory();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("memory"));
        let back = FleetConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(back.history.backend, "memory");
    }
}
