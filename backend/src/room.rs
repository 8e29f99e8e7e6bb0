use crate::client::{SendError, SendMsg, Sender};
use crate::util;
use common::messages::Response;
use hashbrown::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

pub type SharedRooms = Arc<Rooms<Sender>>;

// Game id -> the connections currently subscribed to that game's broadcasts
#[derive(Debug)]
pub struct Rooms<S> {
    rooms: RwLock<HashMap<u64, HashMap<String, S>>>,
}

impl<S> Default for Rooms<S> {
    fn default() -> Self {
        Rooms {
            rooms: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: SendMsg> Rooms<S> {
    pub fn new() -> Self {
        Rooms::default()
    }

    pub async fn join(&self, game_id: u64, conn_id: String, sender: S) {
        self.rooms
            .write()
            .await
            .entry(game_id)
            .or_default()
            .insert(conn_id, sender);
    }

    pub async fn leave(&self, game_id: u64, conn_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&game_id) {
            room.remove(conn_id);
            if room.is_empty() {
                rooms.remove(&game_id);
            }
        }
    }

    pub async fn members(&self, game_id: u64) -> usize {
        self.rooms
            .read()
            .await
            .get(&game_id)
            .map_or(0, |room| room.len())
    }

    // Send to every member of the room. Returns how many members received it.
    pub async fn broadcast(&self, game_id: u64, response: &Response) -> usize {
        let msg = match encode(response) {
            Some(msg) => msg,
            None => return 0,
        };
        let rooms = self.rooms.read().await;
        let room = match rooms.get(&game_id) {
            Some(room) => room,
            None => return 0,
        };
        room.iter()
            .filter(|(conn_id, sender)| {
                // If the message fails to send even after retries, the connection is
                // going away and will leave the room on its own
                let sent = util::retry(1, || sender.send(&msg)).is_ok();
                if !sent {
                    warn!("Failed to deliver broadcast for game {} to {}", game_id, conn_id);
                }
                sent
            })
            .count()
    }

    // Reply to a single connection of the room
    pub async fn send_to(
        &self,
        game_id: u64,
        conn_id: &str,
        response: &Response,
    ) -> Result<(), SendError> {
        let msg = encode(response).ok_or(SendError)?;
        let rooms = self.rooms.read().await;
        let sender = rooms
            .get(&game_id)
            .and_then(|room| room.get(conn_id))
            .ok_or(SendError)?;
        util::retry(1, || sender.send(&msg)).map_err(|_| SendError)
    }
}

pub fn encode(response: &Response) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(msg) => Some(msg),
        Err(err) => {
            error!("Failed to serialize response: {}", err);
            None
        }
    }
}
