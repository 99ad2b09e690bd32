//! CLI configuration management.
//!
//! Handles the data directory, governance rules, logging and the token
//! balances backing the balance oracle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use carecoop_core::TokenBalances;
use carecoop_governance::{AdminConfig, GovernanceConfig};
use carecoop_types::Address;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "carecoop.toml";

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory holding the ledger file
    pub data_dir: PathBuf,
    /// Initial registry admin, as an address or a label
    pub admin: String,
    pub governance: GovernanceConfig,
    pub logging: LoggingConfig,
    /// Token balances by identity
    pub balances: BTreeMap<String, u64>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./carecoop-data"),
            admin: "admin".to_string(),
            governance: GovernanceConfig::default(),
            logging: LoggingConfig::default(),
            balances: BTreeMap::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "carecoop_governance=debug"
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
    /// Log file (optional, stderr otherwise)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl CliConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        // Validate path to prevent directory traversal
        if path.to_string_lossy().contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: CliConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Load `path`, or `carecoop.toml` if present, or the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        if path.to_string_lossy().contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir cannot be empty");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("logging.format must be 'pretty' or 'json', got '{}'", self.logging.format);
        }
        self.governance.validate()?;
        self.admin_config()?;
        for identity in self.balances.keys() {
            parse_identity(identity)?;
        }
        Ok(())
    }

    pub fn admin_config(&self) -> anyhow::Result<AdminConfig> {
        Ok(AdminConfig::new(parse_identity(&self.admin)?))
    }

    /// Balance oracle seeded from the `[balances]` table.
    pub fn token_balances(&self) -> anyhow::Result<TokenBalances> {
        self.balances
            .iter()
            .map(|(identity, balance)| Ok((parse_identity(identity)?, u128::from(*balance))))
            .collect()
    }
}

/// Parse an identity: a `coop1…` or `0x…` address, or any other string as a label.
pub fn parse_identity(value: &str) -> anyhow::Result<Address> {
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("identity cannot be empty");
    }
    let bech32_prefix = format!("{}1", Address::BECH32_HRP);
    if value.starts_with(&bech32_prefix) || value.starts_with("0x") {
        return Address::from_str(value).map_err(|e| anyhow::anyhow!("invalid address '{}': {}", value, e));
    }
    Ok(Address::from_label(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.governance.sponsorship_threshold, 500);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CliConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = CliConfig::default();
        config.governance.max_sponsors = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_identity() {
        let alice = parse_identity("alice").unwrap();
        assert_eq!(alice, Address::from_label("alice"));
        assert_eq!(parse_identity(&alice.to_string()).unwrap(), alice);
        assert_eq!(parse_identity(&format!("{:x}", alice)).unwrap(), alice);
        assert!(parse_identity("0xzz").is_err());
        assert!(parse_identity("  ").is_err());
        assert_eq!(parse_identity("cooper").unwrap(), Address::from_label("cooper"));
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carecoop.toml");

        let mut config = CliConfig::default();
        config.balances.insert("alice".to_string(), 1_000);
        config.to_file(&path).unwrap();

        let loaded = CliConfig::from_file(&path).unwrap();
        assert_eq!(loaded.balances.get("alice"), Some(&1_000));
        assert_eq!(loaded.governance, config.governance);
        let balances = loaded.token_balances().unwrap();
        use carecoop_core::BalanceOracle;
        assert_eq!(balances.balance_of(&Address::from_label("alice")), 1_000);
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(CliConfig::from_file(Path::new("../etc/carecoop.toml")).is_err());
    }

    #[test]
    fn test_partial_file() {
        let config: CliConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/carecoop"

            [governance]
            submission_threshold = 250

            [balances]
            alice = 900
            "#,
        )
        .unwrap();
        assert_eq!(config.governance.submission_threshold, 250);
        assert_eq!(config.governance.activation_sponsor_count, 5);
        assert_eq!(config.admin, "admin");
    }
}
