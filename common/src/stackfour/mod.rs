mod board;
mod game_state;
mod moves;
mod player;
mod replay;

pub use board::{Board, BoardError, Cell, DEFAULT_BOARD_SIZE, MAX_BOARD_SIZE, MIN_BOARD_SIZE};
pub use game_state::{Game, GameStatus};
pub use moves::{Move, MoveError, RawMove, Side};
pub use player::PlayerSlot;
pub use replay::{reconstruct, MoveRecord};
