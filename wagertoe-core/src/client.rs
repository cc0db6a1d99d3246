//! The one object a front end holds: connection lifecycle, the polling
//! timer, and player actions, over a shared session snapshot.

use crate::dispatcher::ActionDispatcher;
use crate::error::{Result, WagerError};
use crate::ledger::{JsonRpcLedger, LedgerGateway};
use crate::poller::PollingDriver;
use crate::session::{SessionEvent, SessionState};
use crate::storage::{ActionJournal, JournalEntry, Storage};
use crate::sync::{PassOutcome, Reconciler};
use crate::types::{Action, Address, GameId, TxReceipt, Wei};
use crate::ClientConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};

pub struct GameClient {
    gateway: Arc<dyn LedgerGateway>,
    reconciler: Arc<Reconciler>,
    dispatcher: ActionDispatcher,
    journal: Option<Arc<ActionJournal>>,
    poller: Mutex<Option<PollingDriver>>,
    poll_interval: Duration,
}

impl GameClient {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        journal: Option<Arc<ActionJournal>>,
        poll_interval: Duration,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(gateway.clone()));
        let dispatcher = ActionDispatcher::new(gateway.clone(), reconciler.clone(), journal.clone());
        Self {
            gateway,
            reconciler,
            dispatcher,
            journal,
            poller: Mutex::new(None),
            poll_interval,
        }
    }

    /// JSON-RPC client with an optional on-disk journal.
    pub async fn open(config: ClientConfig, journal_path: Option<&Path>) -> Result<Self> {
        let poll_interval = config.poll_interval;
        let gateway: Arc<dyn LedgerGateway> = Arc::new(JsonRpcLedger::new(config)?);

        let journal = match journal_path {
            Some(path) => {
                let storage = Storage::new(path).await?;
                Some(Arc::new(ActionJournal::new(Arc::new(storage))))
            }
            None => None,
        };

        Ok(Self::new(gateway, journal, poll_interval))
    }

    /// Ask the wallet for an account and start following it.
    pub async fn connect(&self) -> Result<Address> {
        let identity = self.gateway.request_accounts().await?;
        self.attach(identity.clone()).await;
        Ok(identity)
    }

    /// Pick up an already-authorized account without prompting. Returns
    /// `None` when the wallet has nothing to offer.
    pub async fn resume(&self) -> Result<Option<Address>> {
        match self.gateway.accounts().await? {
            Some(identity) => {
                self.attach(identity.clone()).await;
                Ok(Some(identity))
            }
            None => {
                tracing::info!("No authorized account to resume");
                Ok(None)
            }
        }
    }

    pub async fn disconnect(&self) {
        if let Some(driver) = self.poller.lock().await.take() {
            driver.stop().await;
        }
        self.reconciler.set_identity(None);
    }

    async fn attach(&self, identity: Address) {
        let mut poller = self.poller.lock().await;
        if let Some(driver) = poller.take() {
            driver.stop().await;
        }

        tracing::info!("Connected as {}", identity);
        self.reconciler.set_identity(Some(identity));

        if let PassOutcome::Failed = self.reconciler.reconcile().await {
            tracing::warn!("Initial sync failed; the poller will retry");
        }
        *poller = Some(PollingDriver::start(
            self.reconciler.clone(),
            self.poll_interval,
        ));
    }

    /// Manual re-sync, outside the timer.
    pub async fn sync_now(&self) -> Result<SessionState> {
        match self.reconciler.reconcile().await {
            PassOutcome::Disconnected => Err(WagerError::NotConnected),
            PassOutcome::Failed => Err(WagerError::remote("could not read game state")),
            _ => Ok(self.state()),
        }
    }

    pub async fn create_game(&self, stake: Wei) -> Result<TxReceipt> {
        self.dispatcher.create_game(stake).await
    }

    /// Join a pending game at the stake its creator put up.
    pub async fn join_game(&self, id: GameId) -> Result<TxReceipt> {
        let stake = self.stake_of(id).await?;
        self.dispatcher.join_game(id, stake).await
    }

    pub async fn leave_game(&self) -> Result<TxReceipt> {
        self.dispatcher.leave().await
    }

    pub async fn make_move(&self, position: u8) -> Result<TxReceipt> {
        self.dispatcher.make_move(position).await
    }

    pub async fn claim_win(&self) -> Result<TxReceipt> {
        self.dispatcher.claim_win().await
    }

    async fn stake_of(&self, id: GameId) -> Result<Wei> {
        if let Some(listed) = self.state().lobby.iter().find(|g| g.id == id) {
            return Ok(listed.stake);
        }

        match self.gateway.game(id).await? {
            Some(record) if !record.started => Ok(record.stake),
            Some(_) => Err(WagerError::rejected(format!("game {} is already full", id))),
            None => Err(WagerError::rejected(format!("game {} does not exist", id))),
        }
    }

    pub fn state(&self) -> SessionState {
        self.reconciler.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.reconciler.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.reconciler.events()
    }

    pub fn busy(&self) -> watch::Receiver<Option<Action>> {
        self.dispatcher.busy()
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .map_or(false, |p| p.is_running())
    }

    /// Journaled actions for the connected identity, newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        let identity = self.state().identity.ok_or(WagerError::NotConnected)?;
        match &self.journal {
            Some(journal) => journal.recent(&identity, limit).await,
            None => Ok(Vec::new()),
        }
    }
}
