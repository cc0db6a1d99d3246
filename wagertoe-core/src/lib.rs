//! Wagertoe - client-side sync engine for staked tic-tac-toe on an EVM ledger
//!
//! The ledger is the only source of truth. This library keeps a local
//! session snapshot consistent with it by polling, and submits player
//! actions one at a time.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod poller;
pub mod session;
pub mod storage;
pub mod sync;
pub mod types;

pub use client::GameClient;
pub use config::ClientConfig;
pub use error::{Result, WagerError};
pub use ledger::{JsonRpcLedger, LedgerGateway};
pub use session::{Phase, SessionEvent, SessionState};
pub use storage::{JournalEntry, JournalStatus};
pub use types::{Action, Address, Board, Cell, GameId, Mark, PendingGame, TxHash, TxReceipt, Wei};
