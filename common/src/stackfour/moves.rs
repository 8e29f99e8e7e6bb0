use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MoveError {
    #[error("Row {row} is outside a board of size {size}")]
    RowOutOfRange { row: usize, size: usize },
}

// The edge of a row that a piece is pushed in from
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

// A move exactly as it arrives over the wire: [row, "L" | "R"]
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawMove(pub usize, pub Side);

// A move whose row is known to exist on a board of a particular size
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Move {
    row: usize,
    side: Side,
}

impl Move {
    pub fn new(raw: RawMove, size: usize) -> Result<Self, MoveError> {
        let RawMove(row, side) = raw;
        if row >= size {
            return Err(MoveError::RowOutOfRange { row, size });
        }
        Ok(Move { row, side })
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

impl From<Move> for RawMove {
    fn from(mv: Move) -> Self {
        RawMove(mv.row, mv.side)
    }
}
