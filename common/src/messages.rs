use crate::stackfour::{Board, Game, GameStatus, MoveRecord, RawMove};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Events sent by a participant over the game's websocket
#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ClientEvent {
    Move {
        #[serde(rename = "move")]
        mv: RawMove,
        player: String,
    },
    Replay {
        replay_until: u64,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MoveView {
    pub id: u64,
    pub player_name: String,
    #[serde(rename = "move")]
    pub mv: RawMove,
    pub timestamp: DateTime<Utc>,
}

impl From<&MoveRecord> for MoveView {
    fn from(record: &MoveRecord) -> Self {
        MoveView {
            id: record.id,
            player_name: record.player_name.clone(),
            mv: record.mv.into(),
            timestamp: record.timestamp,
        }
    }
}

// Full view of a game, sent to every member of its room after each move
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GameSnapshot {
    pub board: Board,
    pub player_1: String,
    pub player_2: String,
    pub status: GameStatus,
    // true for player one, false for player two
    pub winner: Option<bool>,
    pub next_player: bool,
    // Newest first
    pub moves: Vec<MoveView>,
}

impl GameSnapshot {
    pub fn new(game: &Game, records: &[MoveRecord]) -> Self {
        let mut moves: Vec<MoveView> = records.iter().map(MoveView::from).collect();
        moves.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        GameSnapshot {
            board: game.board().clone(),
            player_1: game.player_one().to_string(),
            player_2: game.player_two().to_string(),
            status: game.status(),
            winner: game.winner().map(|w| w.is_player_one()),
            next_player: game.next_player().is_player_one(),
            moves,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum Response {
    GameState(GameSnapshot),
    Replay { replay_board: Board },
    Error { error: String },
}
