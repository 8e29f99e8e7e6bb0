use chrono::{DateTime, Utc};
use common::{Board, BoardError, Game, GameStatus, Move, MoveRecord, PlayerSlot};
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Game {0} does not exist")]
    GameNotFound(u64),
    #[error("Move record {0} does not exist")]
    MoveRecordNotFound(u64),
    #[error("Cannot create board: {0}")]
    InvalidBoard(BoardError),
    #[error("Persisted board of game {game_id} is corrupt: {source}")]
    CorruptBoard { game_id: u64, source: BoardError },
    #[error("Persistence failure: {0}")]
    Unavailable(String),
}

// A game as persisted. The board is kept in its fixed-width text encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct GameRow {
    pub id: u64,
    pub player_1: String,
    pub player_2: String,
    pub board: String,
    pub status: GameStatus,
    pub winner: Option<PlayerSlot>,
}

impl From<&Game> for GameRow {
    fn from(game: &Game) -> Self {
        GameRow {
            id: game.id(),
            player_1: game.player_one().to_string(),
            player_2: game.player_two().to_string(),
            board: game.board().to_string(),
            status: game.status(),
            winner: game.winner(),
        }
    }
}

impl TryFrom<&GameRow> for Game {
    type Error = StoreError;

    fn try_from(row: &GameRow) -> Result<Self, Self::Error> {
        let board: Board = row.board.parse().map_err(|source| StoreError::CorruptBoard {
            game_id: row.id,
            source,
        })?;
        Ok(Game::from_parts(
            row.id,
            row.player_1.clone(),
            row.player_2.clone(),
            board,
            row.status,
            row.winner,
        ))
    }
}

// A move that has been accepted but not yet assigned an id
#[derive(Clone, Debug)]
pub struct NewMoveRecord {
    pub game_id: u64,
    pub mv: Move,
    pub player_name: String,
    pub timestamp: DateTime<Utc>,
}

// Games live in an ordered key-value table, moves in an append-only log per game
pub trait Store: Send + Sync {
    fn create_game(&self, player_1: String, size: usize) -> Result<Game, StoreError>;

    fn load_game(&self, id: u64) -> Result<Game, StoreError>;

    // All games, oldest first
    fn games(&self) -> Result<Vec<Game>, StoreError>;

    // Write the game's columns and append its move, if any, as one unit.
    // Nothing is written when an error is returned.
    fn commit(
        &self,
        game: &Game,
        record: Option<NewMoveRecord>,
    ) -> Result<Option<MoveRecord>, StoreError>;

    fn move_record(&self, id: u64) -> Result<MoveRecord, StoreError>;

    // The game's log in ascending id order
    fn moves(&self, game_id: u64) -> Result<Vec<MoveRecord>, StoreError>;

    // The prefix of the game's log up to and including `last_id`
    fn moves_until(&self, game_id: u64, last_id: u64) -> Result<Vec<MoveRecord>, StoreError> {
        let mut moves = self.moves(game_id)?;
        moves.retain(|m| m.id <= last_id);
        Ok(moves)
    }
}

#[derive(Debug, Default)]
struct Tables {
    games: BTreeMap<u64, GameRow>,
    logs: HashMap<u64, Vec<MoveRecord>>,
    // Move record id -> game id
    move_index: HashMap<u64, u64>,
    last_game_id: u64,
    last_move_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn create_game(&self, player_1: String, size: usize) -> Result<Game, StoreError> {
        let mut tables = self.tables.write();
        let id = tables.last_game_id + 1;
        let game = Game::new(id, player_1, size).map_err(StoreError::InvalidBoard)?;
        tables.games.insert(id, GameRow::from(&game));
        tables.last_game_id = id;
        Ok(game)
    }

    fn load_game(&self, id: u64) -> Result<Game, StoreError> {
        let tables = self.tables.read();
        let row = tables.games.get(&id).ok_or(StoreError::GameNotFound(id))?;
        Game::try_from(row)
    }

    fn games(&self) -> Result<Vec<Game>, StoreError> {
        self.tables.read().games.values().map(Game::try_from).collect()
    }

    fn commit(
        &self,
        game: &Game,
        record: Option<NewMoveRecord>,
    ) -> Result<Option<MoveRecord>, StoreError> {
        let mut tables = self.tables.write();
        if !tables.games.contains_key(&game.id()) {
            return Err(StoreError::GameNotFound(game.id()));
        }
        let record = record.map(|new| {
            let id = tables.last_move_id + 1;
            tables.last_move_id = id;
            MoveRecord {
                id,
                game_id: game.id(),
                mv: new.mv,
                player_name: new.player_name,
                timestamp: new.timestamp,
            }
        });
        if let Some(record) = &record {
            tables.move_index.insert(record.id, record.game_id);
            tables
                .logs
                .entry(record.game_id)
                .or_default()
                .push(record.clone());
        }
        tables.games.insert(game.id(), GameRow::from(game));
        Ok(record)
    }

    fn move_record(&self, id: u64) -> Result<MoveRecord, StoreError> {
        let tables = self.tables.read();
        tables
            .move_index
            .get(&id)
            .and_then(|game_id| tables.logs.get(game_id))
            .and_then(|log| log.iter().find(|m| m.id == id))
            .cloned()
            .ok_or(StoreError::MoveRecordNotFound(id))
    }

    fn moves(&self, game_id: u64) -> Result<Vec<MoveRecord>, StoreError> {
        let tables = self.tables.read();
        if !tables.games.contains_key(&game_id) {
            return Err(StoreError::GameNotFound(game_id));
        }
        Ok(tables.logs.get(&game_id).cloned().unwrap_or_default())
    }
}
