use crate::stackfour::board::{Board, BoardError};
use crate::stackfour::moves::Move;
use crate::stackfour::player::PlayerSlot;
use chrono::{DateTime, Utc};

// One accepted move. Never changes once it has been appended to a game's log.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveRecord {
    pub id: u64,
    pub game_id: u64,
    pub mv: Move,
    // Display only, the acting player is derived from the record's position
    pub player_name: String,
    pub timestamp: DateTime<Utc>,
}

// Rebuild a board by replaying moves in log order from an empty board.
// Records must already be in ascending id order. A record that lands in a full
// row means the log is corrupt.
pub fn reconstruct<'a, I>(size: usize, records: I) -> Result<Board, BoardError>
where
    I: IntoIterator<Item = &'a MoveRecord>,
{
    let mut board = Board::new(size)?;
    for (position, record) in records.into_iter().enumerate() {
        let player = PlayerSlot::for_sequence(position);
        let index = board
            .landing_index(record.mv)
            .ok_or(BoardError::RowFull {
                row: record.mv.row(),
            })?;
        board.place(index, player);
    }
    Ok(board)
}
