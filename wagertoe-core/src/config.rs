use crate::error::{Result, WagerError};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deployment the client talks to when nothing else is configured.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xedE64A0Da3C4Ed6dF6DaB2595ff0D3d98E8F36Bc";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub poll_interval: Duration,
    /// Blocks a receipt must be buried under before a write counts as final.
    pub confirmations: u64,
    pub receipt_poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: Address::parse(DEFAULT_CONTRACT_ADDRESS)
                .unwrap_or_else(|_| Address::zero()),
            poll_interval: Duration::from_secs(3),
            confirmations: 1,
            receipt_poll_interval: Duration::from_secs(1),
            confirmation_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn new(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(WagerError::config("RPC URL cannot be empty"));
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(WagerError::config(format!(
                "RPC URL must be http(s): {}",
                self.rpc_url
            )));
        }

        if self.contract_address.is_zero() {
            return Err(WagerError::config("Contract address cannot be the zero address"));
        }

        if self.poll_interval.is_zero() {
            return Err(WagerError::config("Poll interval must be greater than 0"));
        }

        if self.confirmations == 0 {
            return Err(WagerError::config("Confirmations must be at least 1"));
        }

        if self.receipt_poll_interval.is_zero() {
            return Err(WagerError::config(
                "Receipt poll interval must be greater than 0",
            ));
        }

        if self.confirmation_timeout < self.receipt_poll_interval {
            return Err(WagerError::config(
                "Confirmation timeout must cover at least one receipt poll",
            ));
        }

        Ok(())
    }
}
