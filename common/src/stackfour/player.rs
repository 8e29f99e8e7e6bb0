use serde::{Deserialize, Serialize};

// Player one always opens the game. On the wire a slot is a bool: true for
// player one, false for player two.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(from = "bool", into = "bool")]
pub enum PlayerSlot {
    PlayerOne,
    PlayerTwo,
}

impl PlayerSlot {
    pub fn other(self) -> PlayerSlot {
        match self {
            PlayerSlot::PlayerOne => PlayerSlot::PlayerTwo,
            PlayerSlot::PlayerTwo => PlayerSlot::PlayerOne,
        }
    }

    pub fn is_player_one(self) -> bool {
        matches!(self, PlayerSlot::PlayerOne)
    }

    // The slot that moves at the given zero-based position of a game's move sequence
    pub fn for_sequence(position: usize) -> PlayerSlot {
        if position % 2 == 0 {
            PlayerSlot::PlayerOne
        } else {
            PlayerSlot::PlayerTwo
        }
    }
}

impl From<bool> for PlayerSlot {
    fn from(is_player_one: bool) -> Self {
        if is_player_one {
            PlayerSlot::PlayerOne
        } else {
            PlayerSlot::PlayerTwo
        }
    }
}

impl From<PlayerSlot> for bool {
    fn from(slot: PlayerSlot) -> Self {
        slot.is_player_one()
    }
}
