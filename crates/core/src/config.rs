//! Application configuration.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ingest::ExpansionPolicy, stowage::MatchPolicy, time::days};

/// Environment variable pointing at an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "OLYA_CONFIG";
/// Prefix of environment overrides, e.g. `OLYA__MATCHING__LOOKAHEAD_DAYS=21`.
pub const ENV_PREFIX: &str = "OLYA";

/// Matcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Days after a discharge ends within which a loading may be paired by time.
    pub lookahead_days: i64,
    /// Only pair operations without cargo lots by time.
    pub strict_cargo_lots: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 14,
            strict_cargo_lots: false,
        }
    }
}

impl From<&MatchingConfig> for MatchPolicy {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            lookahead: days(config.lookahead_days),
            strict_cargo_lots: config.strict_cargo_lots,
        }
    }
}

/// Default leg durations for voyage-level records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Loading duration in days.
    pub loading_days: i64,
    /// Minimum laden passage in days.
    pub transit_days: i64,
    /// Discharge duration in days.
    pub discharge_days: i64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            loading_days: 2,
            transit_days: 10,
            discharge_days: 2,
        }
    }
}

impl From<&ExpansionConfig> for ExpansionPolicy {
    fn from(config: &ExpansionConfig) -> Self {
        Self {
            loading: days(config.loading_days),
            transit: days(config.transit_days),
            discharge: days(config.discharge_days),
        }
    }
}

/// Top-level configuration of a planning deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `ports.json`, `vessels.json` and `records/`.
    pub data_dir: PathBuf,
    /// Directory run reports are written to.
    pub output_dir: PathBuf,
    /// Transfer nodes to match barge and vessel operations at.
    pub transfer_nodes: Vec<String>,
    /// Matcher settings.
    pub matching: MatchingConfig,
    /// Summary record expansion settings.
    pub expansion: ExpansionConfig,
    /// Recompute whenever the data directory changes.
    pub watch: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("reports"),
            transfer_nodes: vec!["OYA".to_string()],
            matching: MatchingConfig::default(),
            expansion: ExpansionConfig::default(),
            watch: false,
        }
    }
}

impl AppConfig {
    /// Load from the default location layered with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) layered with environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("transfer_nodes")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Persist the configuration as JSON, creating parent directories as needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, serialized).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Location of the configuration file: `$OLYA_CONFIG`, else `<config dir>/olya/config.json`.
pub fn config_path() -> PathBuf {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("olya")
        .join("config.json")
}

/// Write the default configuration if no file exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    if !path.exists() {
        AppConfig::default().persist(&path)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let temp = tempdir()?;
        let config = AppConfig::load_from(temp.path().join("absent.json"))?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"transfer_nodes": ["OYA", "AKTAU"], "matching": {"lookahead_days": 21}}"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.transfer_nodes, vec!["OYA", "AKTAU"]);
        assert_eq!(config.matching.lookahead_days, 21);
        assert!(!config.matching.strict_cargo_lots);
        assert_eq!(config.expansion, ExpansionConfig::default());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        Ok(())
    }

    #[test]
    fn persisted_config_loads_back() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("nested/config.json");
        let mut config = AppConfig::default();
        config.watch = true;
        config.expansion.transit_days = 12;
        config.persist(&path)?;

        assert_eq!(AppConfig::load_from(&path)?, config);
        Ok(())
    }

    #[test]
    fn policies_follow_settings() {
        let matching = MatchingConfig {
            lookahead_days: 7,
            strict_cargo_lots: true,
        };
        let policy = MatchPolicy::from(&matching);
        assert_eq!(policy.lookahead, chrono::Duration::days(7));
        assert!(policy.strict_cargo_lots);

        let expansion = ExpansionPolicy::from(&ExpansionConfig::default());
        assert_eq!(expansion, ExpansionPolicy::default());
    }
}
