use crate::error::{Result, WagerError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Account address as reported by the ledger.
///
/// The ledger may hand back the same account in different letter cases
/// (checksummed or not), so equality and hashing ignore case while the
/// original spelling is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub const ZERO: &'static str = "0x0000000000000000000000000000000000000000";

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| WagerError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WagerError::InvalidAddress(s.to_string()));
        }

        Ok(Self(format!("0x{}", hex_part)))
    }

    /// Build from the low 20 bytes of an ABI word.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn zero() -> Self {
        Self(Self::ZERO.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // validated as 40 hex digits on construction
        if let Ok(raw) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&raw);
        }
        out
    }

    /// Shortened form for terminals: `0x1234…abcd`.
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = WagerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = WagerError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

/// Ledger-assigned game identifier. Zero means "no game".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl GameId {
    pub const NONE: GameId = GameId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn is_some(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = WagerError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map_err(|e| WagerError::config(format!("Invalid game id '{}': {}", s, e)))?;
        Ok(GameId(id))
    }
}

const WEI_DECIMALS: usize = 18;

/// Stake amount in wei (256-bit unsigned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(pub U256);

impl Wei {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn from_wei(wei: u128) -> Self {
        Self(U256::from(wei))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse a decimal ether amount such as `"0.1"` or `"2"`.
    pub fn parse_ether(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || WagerError::InvalidAmount(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > WEI_DECIMALS {
            return Err(WagerError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                s, WEI_DECIMALS
            )));
        }

        let whole = if whole.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(whole).map_err(|_| invalid())?
        };
        let frac = if frac.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<width$}", frac, width = WEI_DECIMALS);
            U256::from_dec_str(&padded).map_err(|_| invalid())?
        };

        whole
            .checked_mul(U256::exp10(WEI_DECIMALS))
            .and_then(|w| w.checked_add(frac))
            .map(Wei)
            .ok_or_else(invalid)
    }

    /// Decimal ether string with trailing zeros trimmed.
    pub fn to_ether_string(&self) -> String {
        let unit = U256::exp10(WEI_DECIMALS);
        let whole = self.0 / unit;
        let frac = self.0 % unit;
        if frac.is_zero() {
            return whole.to_string();
        }
        let frac = format!("{:0>width$}", frac.to_string(), width = WEI_DECIMALS);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::X),
            2 => Ok(Cell::O),
            other => Err(WagerError::decode(format!("unknown cell value {}", other))),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn glyph(&self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::X => 'X',
            Cell::O => 'O',
        }
    }
}

/// The symbol owned by a player. The first player plays `X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mark::X => "X",
            Mark::O => "O",
        })
    }
}

pub const BOARD_CELLS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board(pub [Cell; BOARD_CELLS]);

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cell(&self, position: u8) -> Option<Cell> {
        self.0.get(position as usize).copied()
    }

    pub fn is_vacant(&self, position: u8) -> bool {
        self.cell(position).map_or(false, |c| c.is_empty())
    }

    /// Three text rows, e.g. `X . O`.
    pub fn rows(&self) -> Vec<String> {
        self.0
            .chunks(3)
            .map(|row| {
                row.iter()
                    .map(|c| c.glyph().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

/// On-ledger record of a single game, as returned by `games(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub first_player: Address,
    pub second_player: Address,
    pub active_player: Address,
    /// Flips to true once the second player has joined.
    pub started: bool,
    /// Unix seconds of the last move.
    pub last_move_at: u64,
    pub stake: Wei,
}

impl GameRecord {
    pub fn symbol_for(&self, player: &Address) -> Mark {
        if self.first_player == *player {
            Mark::X
        } else {
            Mark::O
        }
    }

    pub fn is_turn_of(&self, player: &Address) -> bool {
        self.active_player == *player
    }
}

/// A game waiting in the lobby for a second player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGame {
    pub id: GameId,
    pub stake: Wei,
}

/// User-initiated writes against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    CreateGame { stake: Wei },
    JoinGame { id: GameId, stake: Wei },
    LeavePendingGame,
    MakeMove { position: u8 },
    ClaimWin,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateGame { .. } => "create_game",
            Action::JoinGame { .. } => "join_game",
            Action::LeavePendingGame => "leave_pending_game",
            Action::MakeMove { .. } => "make_move",
            Action::ClaimWin => "claim_win",
        }
    }

    /// Value attached to the transaction (escrowed stake).
    pub fn value(&self) -> Wei {
        match self {
            Action::CreateGame { stake } | Action::JoinGame { stake, .. } => *stake,
            _ => Wei::zero(),
        }
    }

    /// Leaving or claiming ends the local player's involvement in the game.
    pub fn ends_game(&self) -> bool {
        matches!(self, Action::LeavePendingGame | Action::ClaimWin)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateGame { stake } => write!(f, "create game (stake {})", stake),
            Action::JoinGame { id, stake } => write!(f, "join game {} (stake {})", id, stake),
            Action::LeavePendingGame => write!(f, "leave pending game"),
            Action::MakeMove { position } => write!(f, "move to cell {}", position),
            Action::ClaimWin => write!(f, "claim win"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}
