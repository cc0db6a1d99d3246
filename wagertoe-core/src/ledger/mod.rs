//! Typed access to the game contract.
//!
//! The gateway owns no state and never retries: every call either yields a
//! value or fails, and the caller decides what a failure means.

pub mod abi;
pub mod rpc;

#[cfg(test)]
pub(crate) mod fake;

pub use rpc::JsonRpcLedger;

use crate::error::Result;
use crate::types::{Action, Address, Board, GameId, GameRecord, PendingGame, TxHash, TxReceipt};
use async_trait::async_trait;

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Ask the wallet for an account, prompting the user if needed.
    /// Fails with `WalletUnavailable` when no signer exists.
    async fn request_accounts(&self) -> Result<Address>;

    /// Already-authorised account, without prompting.
    async fn accounts(&self) -> Result<Option<Address>>;

    /// Current game of `player`. `GameId::NONE` when the player has none;
    /// that case is never an error.
    async fn player_game(&self, player: &Address) -> Result<GameId>;

    /// `None` when no record exists for `id`.
    async fn game(&self, id: GameId) -> Result<Option<GameRecord>>;

    /// Board of the game `player` is seated at.
    async fn board(&self, player: &Address) -> Result<Board>;

    async fn pending_games(&self) -> Result<Vec<PendingGame>>;

    /// Seconds left before the active player of `player`'s game times out.
    async fn remaining_timeout(&self, player: &Address) -> Result<u64>;

    /// Submit a write. Returns once the ledger accepted the transaction,
    /// not once it is final.
    async fn send_transaction(&self, from: &Address, action: &Action) -> Result<TxHash>;

    /// Wait until `tx` is final. A reverted transaction is `Rejected`.
    async fn await_finality(&self, tx: &TxHash) -> Result<TxReceipt>;
}
