//! Submission of player writes to the ledger.
//!
//! At most one write is in flight per client. A second request while one is
//! pending is refused with [`WagerError::ActionInFlight`]; the ledger would
//! otherwise judge it against state the client cannot see yet.

use crate::error::{Result, WagerError};
use crate::ledger::LedgerGateway;
use crate::storage::ActionJournal;
use crate::sync::Reconciler;
use crate::types::{Action, Address, GameId, TxReceipt, Wei, BOARD_CELLS};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

pub struct ActionDispatcher {
    gateway: Arc<dyn LedgerGateway>,
    reconciler: Arc<Reconciler>,
    journal: Option<Arc<ActionJournal>>,
    in_flight: Mutex<()>,
    busy: watch::Sender<Option<Action>>,
}

impl ActionDispatcher {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        reconciler: Arc<Reconciler>,
        journal: Option<Arc<ActionJournal>>,
    ) -> Self {
        let (busy, _) = watch::channel(None);
        Self {
            gateway,
            reconciler,
            journal,
            in_flight: Mutex::new(()),
            busy,
        }
    }

    /// The write currently awaiting finality, if any.
    pub fn busy(&self) -> watch::Receiver<Option<Action>> {
        self.busy.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.borrow().is_some()
    }

    pub async fn create_game(&self, stake: Wei) -> Result<TxReceipt> {
        self.dispatch(Action::CreateGame { stake }).await
    }

    pub async fn join_game(&self, id: GameId, stake: Wei) -> Result<TxReceipt> {
        self.dispatch(Action::JoinGame { id, stake }).await
    }

    pub async fn leave(&self) -> Result<TxReceipt> {
        self.dispatch(Action::LeavePendingGame).await
    }

    pub async fn make_move(&self, position: u8) -> Result<TxReceipt> {
        self.dispatch(Action::MakeMove { position }).await
    }

    pub async fn claim_win(&self) -> Result<TxReceipt> {
        self.dispatch(Action::ClaimWin).await
    }

    pub async fn dispatch(&self, action: Action) -> Result<TxReceipt> {
        let Ok(_flight) = self.in_flight.try_lock() else {
            tracing::warn!("Refusing {}: another action is in flight", action.name());
            return Err(WagerError::ActionInFlight);
        };

        let identity = self.validate(&action)?;

        let outcome = {
            let _busy = BusyGuard::raise(&self.busy, &action);
            self.submit(&identity, &action).await
        };

        let receipt = outcome?;

        if action.ends_game() {
            self.reconciler.reset_and_reconcile().await;
        } else {
            self.reconciler.reconcile().await;
        }

        Ok(receipt)
    }

    fn validate(&self, action: &Action) -> Result<Address> {
        let state = self.reconciler.snapshot();
        let identity = state.identity.clone().ok_or(WagerError::NotConnected)?;

        match action {
            Action::CreateGame { stake } if stake.is_zero() => {
                Err(WagerError::invalid_amount("stake must be greater than zero"))
            }
            Action::JoinGame { id, .. } if id.is_none() => {
                Err(WagerError::invalid_move("game id 0 does not exist"))
            }
            Action::MakeMove { position } if *position as usize >= BOARD_CELLS => {
                Err(WagerError::invalid_move(format!(
                    "position {} is off the board (0-{})",
                    position,
                    BOARD_CELLS - 1
                )))
            }
            Action::MakeMove { position } if !state.board.is_vacant(*position) => {
                Err(WagerError::invalid_move(format!(
                    "cell {} is already taken",
                    position
                )))
            }
            _ => Ok(identity),
        }
    }

    async fn submit(&self, identity: &Address, action: &Action) -> Result<TxReceipt> {
        let entry = match &self.journal {
            Some(journal) => match journal.record_submitted(identity, action).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("Failed to journal {}: {}", action.name(), e);
                    None
                }
            },
            None => None,
        };

        tracing::info!("Submitting {} from {}", action, identity.short());
        let result = self.send_and_wait(identity, action, entry.as_deref()).await;

        match &result {
            Ok(receipt) => {
                tracing::info!(
                    "{} finalized in block {} ({})",
                    action.name(),
                    receipt.block_number,
                    receipt.tx_hash
                );
                if let (Some(journal), Some(id)) = (&self.journal, &entry) {
                    if let Err(e) = journal.mark_confirmed(id, receipt).await {
                        tracing::warn!("Failed to update journal entry {}: {}", id, e);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", action.name(), e);
                if let (Some(journal), Some(id)) = (&self.journal, &entry) {
                    if let Err(je) = journal.mark_failed(id, &e.to_string()).await {
                        tracing::warn!("Failed to update journal entry {}: {}", id, je);
                    }
                }
            }
        }

        result
    }

    async fn send_and_wait(
        &self,
        identity: &Address,
        action: &Action,
        entry: Option<&str>,
    ) -> Result<TxReceipt> {
        let tx = self.gateway.send_transaction(identity, action).await?;
        tracing::debug!("{} sent as {}", action.name(), tx);

        if let (Some(journal), Some(id)) = (&self.journal, entry) {
            if let Err(e) = journal.attach_tx(id, &tx).await {
                tracing::warn!("Failed to record tx for journal entry {}: {}", id, e);
            }
        }

        self.gateway.await_finality(&tx).await
    }
}

/// Publishes the in-flight action and clears it again on drop, so a caller
/// that abandons `dispatch` mid-await does not leave the client looking busy.
struct BusyGuard<'a>(&'a watch::Sender<Option<Action>>);

impl<'a> BusyGuard<'a> {
    fn raise(busy: &'a watch::Sender<Option<Action>>, action: &Action) -> Self {
        busy.send_replace(Some(action.clone()));
        Self(busy)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(None);
    }
}
