use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wagertoe_core::config::DEFAULT_CONTRACT_ADDRESS;
use wagertoe_core::{Address, ClientConfig, Result, WagerError};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub poll_interval_secs: u64,
    pub confirmations: u64,
    /// Keep a local history of submitted actions.
    pub journal: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            poll_interval_secs: 3,
            confirmations: 1,
            journal: true,
        }
    }
}

impl CliConfig {
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wagertoe")
    }

    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Saved settings, or defaults when nothing has been saved yet.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(data_dir).await?;
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(Self::path(data_dir), raw).await?;
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "rpc_url" => self.rpc_url = value.to_string(),
            "contract_address" => {
                Address::parse(value)?;
                self.contract_address = value.to_string();
            }
            "poll_interval_secs" => self.poll_interval_secs = parse_number(key, value)?,
            "confirmations" => self.confirmations = parse_number(key, value)?,
            "journal" => {
                self.journal = value
                    .parse()
                    .map_err(|_| WagerError::config(format!("journal must be true or false, got '{}'", value)))?
            }
            _ => {
                return Err(WagerError::config(format!(
                    "Unknown setting '{}' (rpc_url, contract_address, poll_interval_secs, confirmations, journal)",
                    key
                )))
            }
        }
        Ok(())
    }

    /// Apply command-line or environment overrides, then build the core
    /// client configuration.
    pub fn client_config(
        &self,
        rpc_url: Option<String>,
        contract: Option<String>,
    ) -> Result<ClientConfig> {
        let rpc_url = rpc_url.unwrap_or_else(|| self.rpc_url.clone());
        let contract = Address::parse(contract.as_deref().unwrap_or(&self.contract_address))?;

        let mut config = ClientConfig::new(rpc_url, contract)
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs));
        config.confirmations = self.confirmations;
        config.validate()?;
        Ok(config)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| WagerError::config(format!("{} must be a whole number, got '{}'", key, value)))
}
