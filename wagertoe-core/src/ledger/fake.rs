//! In-memory ledger used by tests. It enforces the contract's rules closely
//! enough to drive the client through full games, and lets tests break
//! individual reads or hold writes before finality.

use crate::error::{Result, WagerError};
use crate::ledger::LedgerGateway;
use crate::types::{
    Action, Address, Board, Cell, GameId, GameRecord, PendingGame, TxHash, TxReceipt, Wei,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Notify;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub(crate) fn addr(n: u8) -> Address {
    let digit = char::from_digit((n % 16) as u32, 16).unwrap_or('0');
    Address::parse(&format!("0x{}", digit.to_string().repeat(40))).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Read {
    Accounts,
    PlayerGame,
    Game,
    Board,
    PendingGames,
    Timeout,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeGame {
    pub record: GameRecord,
    pub board: Board,
}

#[derive(Debug, Default)]
pub(crate) struct World {
    pub accounts: Vec<Address>,
    pub games: BTreeMap<u64, FakeGame>,
    pub seats: HashMap<Address, u64>,
    pub next_id: u64,
    /// Scripted `getTimeUntilTimeout`; `None` makes the read fail.
    pub timeout: Option<u64>,
    pub failing: HashSet<Read>,
    pub reads: Vec<Read>,
    pub submitted: Vec<(Address, Action)>,
    pending: HashMap<String, (Address, Action)>,
    block: u64,
}

impl World {
    fn seat(&self, player: &Address) -> Option<u64> {
        self.seats.get(player).copied()
    }

    pub fn end_game(&mut self, id: u64) {
        self.games.remove(&id);
        self.seats.retain(|_, game| *game != id);
    }

    fn apply(&mut self, from: &Address, action: &Action) -> std::result::Result<(), String> {
        match action {
            Action::CreateGame { stake } => {
                if self.seat(from).is_some() {
                    return Err("Already in a game".into());
                }
                if stake.is_zero() {
                    return Err("Stake required".into());
                }
                self.next_id += 1;
                let id = self.next_id;
                self.games.insert(
                    id,
                    FakeGame {
                        record: GameRecord {
                            first_player: from.clone(),
                            second_player: Address::zero(),
                            active_player: from.clone(),
                            started: false,
                            last_move_at: 0,
                            stake: *stake,
                        },
                        board: Board::empty(),
                    },
                );
                self.seats.insert(from.clone(), id);
            }
            Action::JoinGame { id, stake } => {
                if self.seat(from).is_some() {
                    return Err("Already in a game".into());
                }
                let game = self.games.get_mut(&id.0).ok_or("Game not found")?;
                if game.record.started {
                    return Err("Game already full".into());
                }
                if game.record.stake != *stake {
                    return Err("Incorrect stake".into());
                }
                game.record.second_player = from.clone();
                game.record.started = true;
                game.record.active_player = game.record.first_player.clone();
                self.seats.insert(from.clone(), id.0);
            }
            Action::LeavePendingGame => {
                let id = self.seat(from).ok_or("Not in a game")?;
                if self.games.get(&id).map_or(false, |g| g.record.started) {
                    return Err("Cannot leave active game".into());
                }
                self.end_game(id);
            }
            Action::MakeMove { position } => {
                let id = self.seat(from).ok_or("Not in a game")?;
                let game = self.games.get_mut(&id).ok_or("Game not found")?;
                if !game.record.started || game.record.active_player != *from {
                    return Err("Not your turn".into());
                }
                if !game.board.is_vacant(*position) {
                    return Err("Cell occupied".into());
                }
                let mark = if game.record.first_player == *from {
                    Cell::X
                } else {
                    Cell::O
                };
                game.board.0[*position as usize] = mark;
                game.record.last_move_at += 1;

                let won = LINES
                    .iter()
                    .any(|line| line.iter().all(|&i| game.board.0[i] == mark));
                let full = game.board.0.iter().all(|c| !c.is_empty());
                if won || full {
                    self.end_game(id);
                } else {
                    game.record.active_player = if game.record.first_player == *from {
                        game.record.second_player.clone()
                    } else {
                        game.record.first_player.clone()
                    };
                }
            }
            Action::ClaimWin => {
                let id = self.seat(from).ok_or("Not in a game")?;
                let game = self.games.get(&id).ok_or("Game not found")?;
                if !game.record.started || game.record.active_player == *from {
                    return Err("Nothing to claim".into());
                }
                if self.timeout != Some(0) {
                    return Err("Opponent has not timed out".into());
                }
                self.end_game(id);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeLedger {
    world: Mutex<World>,
    /// When set, `await_finality` parks until the gate is notified.
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(account: Address) -> Self {
        let ledger = Self::new();
        ledger.world.lock().accounts.push(account);
        ledger
    }

    pub fn world(&self) -> parking_lot::MutexGuard<'_, World> {
        self.world.lock()
    }

    pub fn fail(&self, read: Read) {
        self.world.lock().failing.insert(read);
    }

    pub fn heal(&self, read: Read) {
        self.world.lock().failing.remove(&read);
    }

    pub fn set_timeout(&self, seconds: Option<u64>) {
        self.world.lock().timeout = seconds;
    }

    /// Apply a write immediately, as another player would.
    pub fn act(&self, from: &Address, action: Action) -> std::result::Result<(), String> {
        self.world.lock().apply(from, &action)
    }

    pub fn hold_finality(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn read_count(&self, read: Read) -> usize {
        self.world.lock().reads.iter().filter(|r| **r == read).count()
    }

    fn read(&self, read: Read) -> Result<parking_lot::MutexGuard<'_, World>> {
        let mut world = self.world.lock();
        world.reads.push(read);
        if world.failing.contains(&read) {
            return Err(WagerError::remote(format!("{:?} unavailable", read)));
        }
        Ok(world)
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn request_accounts(&self) -> Result<Address> {
        self.accounts()
            .await?
            .ok_or_else(|| WagerError::wallet_unavailable("no accounts"))
    }

    async fn accounts(&self) -> Result<Option<Address>> {
        let world = self.read(Read::Accounts)?;
        Ok(world.accounts.first().cloned())
    }

    async fn player_game(&self, player: &Address) -> Result<GameId> {
        let world = self.read(Read::PlayerGame)?;
        Ok(world.seat(player).map(GameId).unwrap_or(GameId::NONE))
    }

    async fn game(&self, id: GameId) -> Result<Option<GameRecord>> {
        let world = self.read(Read::Game)?;
        Ok(world.games.get(&id.0).map(|g| g.record.clone()))
    }

    async fn board(&self, player: &Address) -> Result<Board> {
        let world = self.read(Read::Board)?;
        world
            .seat(player)
            .and_then(|id| world.games.get(&id))
            .map(|g| g.board)
            .ok_or_else(|| WagerError::rejected("No active game"))
    }

    async fn pending_games(&self) -> Result<Vec<PendingGame>> {
        let world = self.read(Read::PendingGames)?;
        Ok(world
            .games
            .iter()
            .filter(|(_, g)| !g.record.started)
            .map(|(id, g)| PendingGame {
                id: GameId(*id),
                stake: g.record.stake,
            })
            .collect())
    }

    async fn remaining_timeout(&self, _player: &Address) -> Result<u64> {
        let world = self.read(Read::Timeout)?;
        world
            .timeout
            .ok_or_else(|| WagerError::remote("timeout unavailable"))
    }

    async fn send_transaction(&self, from: &Address, action: &Action) -> Result<TxHash> {
        let mut world = self.world.lock();
        world.block += 1;
        let hash = format!("0x{:064x}", world.block);
        world.submitted.push((from.clone(), action.clone()));
        world
            .pending
            .insert(hash.clone(), (from.clone(), action.clone()));
        Ok(TxHash(hash))
    }

    async fn await_finality(&self, tx: &TxHash) -> Result<TxReceipt> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut world = self.world.lock();
        let (from, action) = world
            .pending
            .remove(&tx.0)
            .ok_or_else(|| WagerError::internal(format!("unknown transaction {}", tx)))?;
        world.apply(&from, &action).map_err(WagerError::rejected)?;
        Ok(TxReceipt {
            tx_hash: tx.clone(),
            block_number: world.block,
        })
    }
}

pub(crate) fn stake() -> Wei {
    Wei::from_wei(100_000_000_000_000_000)
}
