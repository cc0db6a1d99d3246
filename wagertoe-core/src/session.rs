use crate::types::{Address, Board, GameId, Mark, PendingGame};
use serde::{Deserialize, Serialize};

/// Where the local player stands with respect to the ledger. A finished game
/// is announced by [`SessionEvent::GameOver`]; the snapshot goes back to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    None,
    WaitingForOpponent,
    InProgress,
}

impl Phase {
    pub fn has_game(&self) -> bool {
        matches!(self, Phase::WaitingForOpponent | Phase::InProgress)
    }
}

/// The client's view of the world, rebuilt wholesale by every reconciliation
/// pass. Nothing here is information the ledger could not reproduce.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub identity: Option<Address>,
    pub lobby: Vec<PendingGame>,
    pub active_game_id: GameId,
    pub phase: Phase,
    pub board: Board,
    pub my_symbol: Option<Mark>,
    pub is_my_turn: bool,
    /// `None` means the timeout was not read (or the read failed) this pass.
    pub remaining_seconds: Option<u64>,
}

impl SessionState {
    pub fn connected(identity: Address) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    /// Same identity and lobby listing, nothing game-scoped.
    pub fn reset_to_lobby(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            lobby: self.lobby.clone(),
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.identity.is_some()
    }

    /// The opponent let their move window run out.
    pub fn can_claim_win(&self) -> bool {
        self.phase == Phase::InProgress && !self.is_my_turn && self.remaining_seconds == Some(0)
    }

    pub fn can_move(&self) -> bool {
        self.phase == Phase::InProgress && self.is_my_turn
    }

    pub fn is_lobby_shape(&self) -> bool {
        self.active_game_id.is_none()
            && self.phase == Phase::None
            && self.board == Board::empty()
            && self.my_symbol.is_none()
            && !self.is_my_turn
            && self.remaining_seconds.is_none()
    }
}

/// One-shot notifications that do not live in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A second player joined and the local player was assigned a symbol.
    GameStarted { game_id: GameId, symbol: Mark },
    /// The ledger no longer lists a game the local player was in.
    GameOver { game_id: GameId },
}
