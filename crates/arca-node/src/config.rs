use anyhow::{bail, Context, Result};
use arca_economics::Amount;
use arca_storage_market::MarketConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Default location probed when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "./arca.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub logging: LoggingConfig,
    pub market: MarketConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub name: String,
    /// Account label that holds the owner role in scripted runs
    pub owner: String,
    /// Collateral required per stored byte by the in-memory registry
    pub stake_per_byte: Amount,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "arca-node".to_string(),
            owner: "owner".to_string(),
            stake_per_byte: Amount::from_base_units(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// One of `pretty`, `compact` or `json`
    pub format: String,
    pub file_output: Option<PathBuf>,
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Explicit path, then `./arca.toml` if present, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => Ok(Self::default()),
        }
    }

    /// Loads `KEY=value` lines from `path`, or from `./.env` when no path is
    /// given and one exists. Variables already set in the process win.
    pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(path) => {
                dotenvy::from_path(path)
                    .with_context(|| format!("reading env file {}", path.display()))?;
                Ok(Some(path.to_path_buf()))
            }
            None => Ok(dotenvy::dotenv().ok()),
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(level) = env::var("ARCA_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("ARCA_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }
        if let Ok(bps) = env::var("ARCA_REPORTER_BPS") {
            self.market.reporter_bps = bps
                .parse()
                .with_context(|| format!("ARCA_REPORTER_BPS={bps} is not an integer"))?;
        }
        if let Ok(window) = env::var("ARCA_CHALLENGE_WINDOW") {
            self.market.challenge.challenge_window = window
                .parse()
                .with_context(|| format!("ARCA_CHALLENGE_WINDOW={window} is not an integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!("unknown log format '{}'", self.logging.format);
        }
        if self.node.stake_per_byte.is_zero() {
            bail!("stake_per_byte must be > 0");
        }
        self.market.validate().context("invalid market config")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [logging]
            format = "json"

            [market]
            reporter_bps = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.market.reporter_bps, 500);
        assert_eq!(config.market.challenge.num_slots, 4);
        assert_eq!(config.node.owner, "owner");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NodeConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.market.reporter_bps = config.market.max_reporter_bps + 1;
        assert!(config.validate().is_err());
    }
}
