use crate::stackfour::moves::{Move, Side};
use crate::stackfour::player::PlayerSlot;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BoardError {
    #[error("Board size {size} is outside the supported range {min}..={max}")]
    InvalidSize { size: usize, min: usize, max: usize },
    #[error("Board with {0} cells is not square")]
    NotSquare(usize),
    #[error("Unknown cell code {code:?} at index {index}")]
    InvalidCell { code: char, index: usize },
    #[error("Row {row} has no empty cell")]
    RowFull { row: usize },
    #[error("{one} player one pieces against {two} player two pieces cannot occur in play")]
    ImpossibleCounts { one: usize, two: usize },
}

pub const MIN_BOARD_SIZE: usize = 4;
pub const MAX_BOARD_SIZE: usize = 26;
pub const DEFAULT_BOARD_SIZE: usize = 7;

// Number of contiguous pieces needed to win. Longer runs also win.
pub const WIN_LENGTH: usize = 4;

// Each axis is scanned in both of its opposite directions, as (dx, dy) steps
const AXES: [[(isize, isize); 2]; 4] = [
    [(-1, 0), (1, 0)],
    [(0, -1), (0, 1)],
    [(-1, -1), (1, 1)],
    [(1, -1), (-1, 1)],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    PlayerOne,
    PlayerTwo,
}

impl Cell {
    pub fn occupant(&self) -> Option<PlayerSlot> {
        match self {
            Cell::Empty => None,
            Cell::PlayerOne => Some(PlayerSlot::PlayerOne),
            Cell::PlayerTwo => Some(PlayerSlot::PlayerTwo),
        }
    }

    // Fixed-width persisted form, one character per cell
    pub fn code(&self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::PlayerOne => '1',
            Cell::PlayerTwo => '2',
        }
    }

    pub fn from_code(code: char) -> Option<Cell> {
        match code {
            '.' => Some(Cell::Empty),
            '1' => Some(Cell::PlayerOne),
            '2' => Some(Cell::PlayerTwo),
            _ => None,
        }
    }
}

impl From<PlayerSlot> for Cell {
    fn from(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::PlayerOne => Cell::PlayerOne,
            PlayerSlot::PlayerTwo => Cell::PlayerTwo,
        }
    }
}

// Over the wire a cell is null, true (player one) or false (player two)
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.occupant()
            .map(PlayerSlot::is_player_one)
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let occupant = Option::<bool>::deserialize(deserializer)?;
        Ok(occupant.map_or(Cell::Empty, |p| PlayerSlot::from(p).into()))
    }
}

// A square grid stored row-major, so a cell's linear index is row * size + col
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(size: usize) -> Result<Self, BoardError> {
        check_size(size)?;
        Ok(Board {
            size,
            cells: vec![Cell::Empty; size * size],
        })
    }

    // Ensure that the given cells form a square of a supported size
    pub fn from_cells(cells: Vec<Cell>) -> Result<Self, BoardError> {
        let len = cells.len();
        let size = (1..=MAX_BOARD_SIZE)
            .find(|s| s * s == len)
            .ok_or(BoardError::NotSquare(len))?;
        check_size(size)?;
        Ok(Board { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|c| **c == cell).count()
    }

    pub fn is_full(&self) -> bool {
        !self.cells.contains(&Cell::Empty)
    }

    // Whose move it is follows from piece-count parity alone
    pub fn turn(&self) -> PlayerSlot {
        if self.count(Cell::PlayerOne) == self.count(Cell::PlayerTwo) {
            PlayerSlot::PlayerOne
        } else {
            PlayerSlot::PlayerTwo
        }
    }

    // The index a stack move settles on: the first empty cell of the row,
    // scanning from the chosen edge. Does not look at whose turn it is.
    pub fn landing_index(&self, mv: Move) -> Option<usize> {
        if mv.row() >= self.size {
            return None;
        }
        let offset = mv.row() * self.size;
        let is_empty = |i: &usize| self.cells[*i] == Cell::Empty;
        match mv.side() {
            Side::Left => (offset..offset + self.size).find(is_empty),
            Side::Right => (offset..offset + self.size).rev().find(is_empty),
        }
    }

    // Legalize a move: None if it is not the player's turn or the row is full
    pub fn translate_move(&self, player: PlayerSlot, mv: Move) -> Option<usize> {
        if self.turn() != player {
            return None;
        }
        self.landing_index(mv)
    }

    pub fn place(&mut self, index: usize, player: PlayerSlot) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = player.into();
        }
    }

    // Legalize and apply a move, returning the index that was filled
    pub fn apply_move(&mut self, player: PlayerSlot, mv: Move) -> Option<usize> {
        let index = self.translate_move(player, mv)?;
        self.place(index, player);
        Some(index)
    }

    // (x, y) = (column, row)
    pub fn coordinates(&self, index: usize) -> (usize, usize) {
        (index % self.size, index / self.size)
    }

    // The neighbouring index one step in the given direction, or None past an edge
    pub fn next_position(&self, index: usize, (dx, dy): (isize, isize)) -> Option<usize> {
        let (x, y) = self.coordinates(index);
        let x = x.checked_add_signed(dx)?;
        let y = y.checked_add_signed(dy)?;
        if x >= self.size || y >= self.size {
            return None;
        }
        Some(y * self.size + x)
    }

    // Count contiguous cells equal to `cell`, starting one step beyond `index`
    pub fn scan(&self, index: usize, direction: (isize, isize), cell: Cell) -> usize {
        let mut count = 0;
        let mut position = index;
        while let Some(next) = self.next_position(position, direction) {
            if self.cells[next] != cell {
                break;
            }
            count += 1;
            position = next;
        }
        count
    }

    // Check for a run of at least WIN_LENGTH through the piece at `last_index`
    pub fn find_winner(&self, last_index: usize) -> Option<PlayerSlot> {
        let cell = self.get(last_index)?;
        let player = cell.occupant()?;
        let wins = AXES.iter().any(|[backward, forward]| {
            self.scan(last_index, *backward, cell) + self.scan(last_index, *forward, cell)
                >= WIN_LENGTH - 1
        });
        wins.then_some(player)
    }
}

fn check_size(size: usize) -> Result<(), BoardError> {
    if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
        return Err(BoardError::InvalidSize {
            size,
            min: MIN_BOARD_SIZE,
            max: MAX_BOARD_SIZE,
        });
    }
    Ok(())
}

impl Default for Board {
    fn default() -> Self {
        Board {
            size: DEFAULT_BOARD_SIZE,
            cells: vec![Cell::Empty; DEFAULT_BOARD_SIZE * DEFAULT_BOARD_SIZE],
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded: String = self.cells.iter().map(Cell::code).collect();
        write!(f, "{}", encoded)
    }
}

impl FromStr for Board {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cells = s
            .chars()
            .enumerate()
            .map(|(index, code)| Cell::from_code(code).ok_or(BoardError::InvalidCell { code, index }))
            .collect::<Result<Vec<Cell>, BoardError>>()?;
        let board = Board::from_cells(cells)?;
        // Player one always moves first, so it leads by at most one piece
        let (one, two) = (board.count(Cell::PlayerOne), board.count(Cell::PlayerTwo));
        if two > one || one - two > 1 {
            return Err(BoardError::ImpossibleCounts { one, two });
        }
        Ok(board)
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.cells.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cells = Vec::<Cell>::deserialize(deserializer)?;
        Board::from_cells(cells).map_err(de::Error::custom)
    }
}
