//! Reconciliation of the local session against the ledger.
//!
//! A pass reads the player's game id, the game record, the remaining
//! timeout and the board, derives a complete new [`SessionState`] from those
//! reads plus the previous snapshot, and publishes it in one step. Passes
//! never overlap: the timer skips a tick while one is running, on-demand
//! passes wait their turn.

use crate::ledger::LedgerGateway;
use crate::session::{Phase, SessionEvent, SessionState};
use crate::types::{Address, Board, GameId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};

#[cfg(test)]
mod tests;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was still running.
    Skipped,
    /// No identity connected; nothing to do.
    Disconnected,
    /// The pass finished and its snapshot was published (if it differed).
    Applied { changed: bool },
    /// The identity changed while the pass was in flight; results dropped.
    Stale,
    /// A read the pass could not do without failed; state left as it was.
    Failed,
}

struct Derived {
    next: SessionState,
    events: Vec<SessionEvent>,
}

pub struct Reconciler {
    gateway: Arc<dyn LedgerGateway>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    pass_guard: Mutex<()>,
    /// Bumped on every identity change so in-flight passes can tell they
    /// are stale even when the same account reconnects.
    epoch: AtomicU64,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            state,
            events,
            pass_guard: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Connect (or disconnect) an identity, discarding everything known
    /// about the previous one.
    pub fn set_identity(&self, identity: Option<Address>) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let next = match identity {
            Some(addr) => SessionState::connected(addr),
            None => SessionState::default(),
        };
        tracing::info!(
            "Session identity set to {}",
            next.identity
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "<none>".to_string())
        );
        self.state.send_replace(next);
    }

    /// Timer entry point: runs a pass unless one is already in flight.
    pub async fn poll(&self) -> PassOutcome {
        match self.pass_guard.try_lock() {
            Ok(_guard) => self.run_pass().await,
            Err(_) => {
                tracing::debug!("Reconciliation pass still running, skipping tick");
                PassOutcome::Skipped
            }
        }
    }

    /// On-demand pass; waits for a running pass to finish first.
    pub async fn reconcile(&self) -> PassOutcome {
        let _guard = self.pass_guard.lock().await;
        self.run_pass().await
    }

    /// Drop the current game locally and re-read the ledger, as one step
    /// with respect to other passes. Used after a leave or a claim.
    pub async fn reset_and_reconcile(&self) -> PassOutcome {
        let _guard = self.pass_guard.lock().await;
        self.state.send_if_modified(|current| {
            let reset = current.reset_to_lobby();
            if *current == reset {
                return false;
            }
            *current = reset;
            true
        });
        self.run_pass().await
    }

    async fn run_pass(&self) -> PassOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let prev = self.snapshot();
        let Some(identity) = prev.identity.clone() else {
            return PassOutcome::Disconnected;
        };

        let Some(derived) = self.derive(&prev, &identity).await else {
            return PassOutcome::Failed;
        };

        self.publish(epoch, &identity, derived)
    }

    fn publish(&self, epoch: u64, identity: &Address, derived: Derived) -> PassOutcome {
        let Derived { next, events } = derived;
        let mut stale = false;
        let mut changed = false;

        self.state.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch
                || current.identity.as_ref() != Some(identity)
            {
                stale = true;
                return false;
            }
            if *current == next {
                return false;
            }
            if current.phase != next.phase {
                tracing::info!(
                    "Game {} phase {:?} -> {:?}",
                    if next.active_game_id.is_some() {
                        next.active_game_id
                    } else {
                        current.active_game_id
                    },
                    current.phase,
                    next.phase
                );
            }
            *current = next;
            changed = true;
            true
        });

        if stale {
            tracing::debug!("Discarding reconciliation pass for stale identity {}", identity);
            return PassOutcome::Stale;
        }

        for event in events {
            // no subscribers is fine
            let _ = self.events.send(event);
        }

        PassOutcome::Applied { changed }
    }

    async fn derive(&self, prev: &SessionState, identity: &Address) -> Option<Derived> {
        let game_id = match self.gateway.player_game(identity).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Failed to read current game for {}: {}", identity, e);
                return None;
            }
        };

        let mut events = Vec::new();
        let previous_game = prev.active_game_id;
        if previous_game.is_some() && previous_game != game_id {
            tracing::info!("Game {} is over", previous_game);
            events.push(SessionEvent::GameOver {
                game_id: previous_game,
            });
        }

        if game_id.is_none() {
            let mut next = prev.reset_to_lobby();
            match self.gateway.pending_games().await {
                Ok(lobby) => next.lobby = lobby,
                Err(e) => tracing::warn!("Failed to refresh lobby: {}", e),
            }
            return Some(Derived { next, events });
        }

        let record = match self.gateway.game(game_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("Ledger lists game {} for {} but has no record", game_id, identity);
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read game {}: {}", game_id, e);
                return None;
            }
        };

        let mut next = SessionState {
            identity: Some(identity.clone()),
            lobby: prev.lobby.clone(),
            active_game_id: game_id,
            ..SessionState::default()
        };

        if !record.started {
            next.phase = Phase::WaitingForOpponent;
            return Some(Derived { next, events });
        }
        next.phase = Phase::InProgress;

        let continuing = prev.active_game_id == game_id && prev.phase == Phase::InProgress;
        let symbol = match (continuing, prev.my_symbol) {
            (true, Some(symbol)) => symbol,
            _ => {
                let symbol = record.symbol_for(identity);
                tracing::info!("Game {} started, playing {}", game_id, symbol);
                events.push(SessionEvent::GameStarted { game_id, symbol });
                symbol
            }
        };
        next.my_symbol = Some(symbol);
        next.is_my_turn = record.is_turn_of(identity);

        let (timeout, board) = tokio::join!(
            self.gateway.remaining_timeout(identity),
            self.gateway.board(identity)
        );

        next.remaining_seconds = match timeout {
            Ok(seconds) => Some(seconds),
            Err(e) => {
                tracing::warn!("Failed to read timeout for game {}: {}", game_id, e);
                None
            }
        };

        next.board = match board {
            Ok(board) => board,
            Err(e) => {
                tracing::warn!("Failed to read board for game {}: {}", game_id, e);
                if continuing {
                    prev.board
                } else {
                    Board::empty()
                }
            }
        };

        Some(Derived { next, events })
    }

    pub fn active_game(&self) -> GameId {
        self.state.borrow().active_game_id
    }
}
