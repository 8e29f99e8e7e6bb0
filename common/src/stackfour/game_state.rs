use crate::stackfour::board::{Board, BoardError};
use crate::stackfour::moves::Move;
use crate::stackfour::player::PlayerSlot;
use serde::{Deserialize, Serialize};

// Only ever moves forward: Pending -> Started -> Finished
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameStatus {
    Pending,
    Started,
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Game {
    id: u64,
    player_one: String,
    // Empty until a second player is seated
    player_two: String,
    board: Board,
    status: GameStatus,
    winner: Option<PlayerSlot>,
}

impl Game {
    pub fn new(id: u64, player_one: String, size: usize) -> Result<Self, BoardError> {
        Ok(Game {
            id,
            player_one,
            player_two: String::new(),
            board: Board::new(size)?,
            status: GameStatus::Pending,
            winner: None,
        })
    }

    // Rebuild a game from its persisted columns
    pub fn from_parts(
        id: u64,
        player_one: String,
        player_two: String,
        board: Board,
        status: GameStatus,
        winner: Option<PlayerSlot>,
    ) -> Self {
        Game {
            id,
            player_one,
            player_two,
            board,
            status,
            winner,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn player_one(&self) -> &str {
        &self.player_one
    }

    pub fn player_two(&self) -> &str {
        &self.player_two
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn winner(&self) -> Option<PlayerSlot> {
        self.winner
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    pub fn next_player(&self) -> PlayerSlot {
        self.board.turn()
    }

    pub fn player_name(&self, slot: PlayerSlot) -> &str {
        match slot {
            PlayerSlot::PlayerOne => &self.player_one,
            PlayerSlot::PlayerTwo => &self.player_two,
        }
    }

    // Resolve a display name to the seat it occupies
    pub fn slot_of(&self, name: &str) -> Option<PlayerSlot> {
        if name.is_empty() {
            None
        } else if name == self.player_one {
            Some(PlayerSlot::PlayerOne)
        } else if name == self.player_two {
            Some(PlayerSlot::PlayerTwo)
        } else {
            None
        }
    }

    // Seat a second player, starting the game. Returns false if the game
    // cannot take another player.
    pub fn seat(&mut self, name: String) -> bool {
        if self.status != GameStatus::Pending || name.is_empty() || name == self.player_one {
            return false;
        }
        self.player_two = name;
        self.status = GameStatus::Started;
        true
    }

    // The single mutating transition. Returns the index that was filled, or
    // None when the move was absorbed without touching the game.
    pub fn apply_move(&mut self, player: PlayerSlot, mv: Move) -> Option<usize> {
        if self.status != GameStatus::Started {
            return None;
        }
        let index = self.board.apply_move(player, mv)?;
        if let Some(winner) = self.board.find_winner(index) {
            self.status = GameStatus::Finished;
            self.winner = Some(winner);
        } else if self.board.is_full() {
            self.status = GameStatus::Finished;
            self.winner = None;
        }
        Some(index)
    }
}
