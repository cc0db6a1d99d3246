//! Minimal contract ABI codec for the tic-tac-toe contract surface.
//!
//! Only the handful of static types the contract uses are supported:
//! `address`, `bool`, `uint8`, `uint256`, the fixed `uint8[9]` board and the
//! dynamic `tuple(uint256,uint256)[]` returned by `getPendingGames`.

use crate::error::{Result, WagerError};
use crate::types::{Action, Address, Board, Cell, GameId, GameRecord, PendingGame, Wei, BOARD_CELLS};
use primitive_types::U256;
use sha3::{Digest, Keccak256};

pub const WORD: usize = 32;

pub const CREATE_GAME: &str = "createGame(uint256)";
pub const JOIN_GAME: &str = "joinGame(uint256)";
pub const LEAVE_PENDING_GAME: &str = "leavePendingGame()";
pub const MAKE_MOVE: &str = "makeMove(uint8)";
pub const CLAIM_WIN: &str = "claimWin()";
pub const GET_PENDING_GAMES: &str = "getPendingGames()";
pub const PLAYER_TO_GAME: &str = "playerToGame(address)";
pub const GET_BOARD: &str = "getBoard()";
pub const GAMES: &str = "games(uint256)";
pub const GET_TIME_UNTIL_TIMEOUT: &str = "getTimeUntilTimeout()";

/// `Error(string)` revert payload selector.
const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Clone)]
pub enum Token {
    Uint(U256),
    Address(Address),
}

pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

fn encode_word(token: &Token) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    match token {
        Token::Uint(value) => value.to_big_endian(&mut word),
        Token::Address(addr) => word[12..].copy_from_slice(&addr.to_bytes()),
    }
    word
}

pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&encode_word(arg));
    }
    data
}

/// Calldata for one of the five write actions.
pub fn action_calldata(action: &Action) -> Vec<u8> {
    match action {
        Action::CreateGame { stake } => encode_call(CREATE_GAME, &[Token::Uint(stake.0)]),
        Action::JoinGame { id, .. } => encode_call(JOIN_GAME, &[Token::Uint(U256::from(id.0))]),
        Action::LeavePendingGame => encode_call(LEAVE_PENDING_GAME, &[]),
        Action::MakeMove { position } => {
            encode_call(MAKE_MOVE, &[Token::Uint(U256::from(*position))])
        }
        Action::ClaimWin => encode_call(CLAIM_WIN, &[]),
    }
}

fn words(data: &[u8]) -> Result<Vec<&[u8]>> {
    if data.len() % WORD != 0 {
        return Err(WagerError::decode(format!(
            "return data length {} is not a multiple of {}",
            data.len(),
            WORD
        )));
    }
    Ok(data.chunks(WORD).collect())
}

fn word_at<'a>(words: &[&'a [u8]], index: usize) -> Result<&'a [u8]> {
    words
        .get(index)
        .copied()
        .ok_or_else(|| WagerError::decode(format!("missing return word {}", index)))
}

fn word_to_u256(word: &[u8]) -> U256 {
    U256::from_big_endian(word)
}

fn word_to_u64(word: &[u8]) -> Result<u64> {
    let value = word_to_u256(word);
    if value > U256::from(u64::MAX) {
        return Err(WagerError::decode(format!("value {} overflows u64", value)));
    }
    Ok(value.low_u64())
}

fn word_to_address(word: &[u8]) -> Address {
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&word[12..]);
    Address::from_bytes(&raw)
}

fn word_to_bool(word: &[u8]) -> bool {
    !word_to_u256(word).is_zero()
}

pub fn decode_uint(data: &[u8]) -> Result<U256> {
    let words = words(data)?;
    Ok(word_to_u256(word_at(&words, 0)?))
}

pub fn decode_u64(data: &[u8]) -> Result<u64> {
    let words = words(data)?;
    word_to_u64(word_at(&words, 0)?)
}

/// `games(uint256)` returns `(address, address, address, bool, uint256, uint256)`.
/// An unknown id comes back zero-filled, which maps to `None`.
pub fn decode_game_record(data: &[u8]) -> Result<Option<GameRecord>> {
    let words = words(data)?;
    if words.len() < 6 {
        return Err(WagerError::decode(format!(
            "game record has {} words, expected 6",
            words.len()
        )));
    }

    let first_player = word_to_address(words[0]);
    if first_player.is_zero() {
        return Ok(None);
    }

    Ok(Some(GameRecord {
        first_player,
        second_player: word_to_address(words[1]),
        active_player: word_to_address(words[2]),
        started: word_to_bool(words[3]),
        last_move_at: word_to_u64(words[4])?,
        stake: Wei(word_to_u256(words[5])),
    }))
}

pub fn decode_board(data: &[u8]) -> Result<Board> {
    let words = words(data)?;
    if words.len() < BOARD_CELLS {
        return Err(WagerError::decode(format!(
            "board has {} cells, expected {}",
            words.len(),
            BOARD_CELLS
        )));
    }

    let mut board = Board::empty();
    for (slot, word) in board.0.iter_mut().zip(words.iter()) {
        let value = word_to_u256(word);
        if value > U256::from(u8::MAX) {
            return Err(WagerError::decode(format!("cell value {} out of range", value)));
        }
        *slot = Cell::from_wire(value.low_u32() as u8)?;
    }
    Ok(board)
}

pub fn decode_pending_games(data: &[u8]) -> Result<Vec<PendingGame>> {
    let words = words(data)?;
    let offset = word_to_u64(word_at(&words, 0)?)? as usize;
    if offset % WORD != 0 {
        return Err(WagerError::decode(format!("unaligned array offset {}", offset)));
    }

    let head = offset / WORD;
    let declared = word_to_u64(word_at(&words, head)?)?;
    let fits = declared
        .checked_mul(2)
        .and_then(|n| n.checked_add(head as u64 + 1))
        .map_or(false, |needed| needed <= words.len() as u64);
    if !fits {
        return Err(WagerError::decode(format!(
            "pending games array of {} entries does not fit in {} words",
            declared,
            words.len()
        )));
    }
    let len = declared as usize;

    let mut games = Vec::with_capacity(len);
    for i in 0..len {
        let base = head + 1 + i * 2;
        games.push(PendingGame {
            id: GameId(word_to_u64(words[base])?),
            stake: Wei(word_to_u256(words[base + 1])),
        });
    }
    Ok(games)
}

/// Extract the message from a standard `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&REVERT_SELECTOR[..])?;
    let words = words(body).ok()?;
    let offset = word_to_u64(words.first()?).ok()? as usize / WORD;
    let len = word_to_u64(words.get(offset)?).ok()? as usize;
    let start = offset.checked_add(1)?.checked_mul(WORD)?;
    let bytes = body.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| WagerError::decode(format!("invalid hex '{}': {}", s, e)))
}
