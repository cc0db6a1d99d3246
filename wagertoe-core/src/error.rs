use thiserror::Error;

pub type Result<T> = std::result::Result<T, WagerError>;

#[derive(Error, Debug)]
pub enum WagerError {
    #[error("No wallet available: {0}")]
    WalletUnavailable(String),

    #[error("Ledger unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Rejected by ledger: {reason}")]
    Rejected { reason: String },

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Another action is still pending")]
    ActionInFlight,

    #[error("No account connected")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed ledger response: {0}")]
    Decode(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WagerError {
    pub fn wallet_unavailable(msg: impl Into<String>) -> Self {
        Self::WalletUnavailable(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(msg.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn invalid_move(msg: impl Into<String>) -> Self {
        Self::InvalidMove(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn dialog(msg: impl Into<String>) -> Self {
        Self::Dialog(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for WagerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WagerError::Timeout(err.to_string())
        } else {
            WagerError::RemoteUnavailable(err.to_string())
        }
    }
}
