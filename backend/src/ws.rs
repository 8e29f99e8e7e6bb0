use crate::client::{SendMsg, Sender};
use crate::engine::{Engine, Games};
use crate::room::{encode, Rooms, SharedRooms};
use crate::store::Store;
use common::messages::{ClientEvent, Response};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

pub async fn client_connection(ws: WebSocket, game_id: u64, games: Games, rooms: SharedRooms) {
    let (client_ws_sender, mut client_ws_rcv) = ws.split();
    let (client_sender, client_rcv) = mpsc::unbounded_channel();

    let client_rcv = UnboundedReceiverStream::new(client_rcv);
    tokio::task::spawn(client_rcv.forward(client_ws_sender).map(|result| {
        if let Err(e) = result {
            error!("error sending websocket msg: {}", e);
        }
    }));

    let id = Uuid::new_v4().as_simple().to_string();
    let sender = Sender(client_sender);
    rooms.join(game_id, id.clone(), sender.clone()).await;
    info!(
        "{} connected to game {} ({} in room)",
        id,
        game_id,
        rooms.members(game_id).await
    );

    // Bring the new participant up to date before any further broadcast.
    // The snapshot is sent before its lock is released.
    let greeting = games.snapshot(game_id).await;
    let response = match &greeting {
        Ok(snapshot) => Response::GameState((**snapshot).clone()),
        Err(err) => {
            error!("failed to load game {} for {}: {}", game_id, id, err);
            Response::Error {
                error: err.to_string(),
            }
        }
    };
    if let Some(msg) = encode(&response) {
        if sender.send(&msg).is_err() {
            warn!("failed to send initial snapshot to {}", id);
        }
    }
    drop(greeting);

    while let Some(result) = client_ws_rcv.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                error!("error receiving ws message for id: {}): {}", id, e);
                break;
            }
        };
        client_frame(game_id, &id, &msg, &*games, &*rooms).await;
    }

    rooms.leave(game_id, &id).await;
    info!("{} disconnected from game {}", id, game_id);
}

async fn client_frame<S: Store, M: SendMsg>(
    game_id: u64,
    id: &str,
    frame: &Message,
    engine: &Engine<S>,
    rooms: &Rooms<M>,
) {
    if let Ok(text) = frame.to_str() {
        client_msg(game_id, id, text, engine, rooms).await;
    } else if frame.is_binary() {
        warn!("received binary frame from {}", id);
        let error = "Malformed event: expected a text frame".to_string();
        reply_error(game_id, id, error, rooms).await;
    }
    // Close and ping frames carry no game events
}

#[tracing::instrument(skip(engine, rooms))]
pub async fn client_msg<S: Store, M: SendMsg>(
    game_id: u64,
    id: &str,
    message: &str,
    engine: &Engine<S>,
    rooms: &Rooms<M>,
) {
    info!("received message from {}: {:?}", id, message);
    let message = message.trim();
    if message == "ping" {
        return;
    }

    let event: ClientEvent = match serde_json::from_str(message) {
        Ok(event) => event,
        Err(err) => {
            warn!("Failed to deserialize message into client event: {}", err);
            reply_error(game_id, id, format!("Malformed event: {}", err), rooms).await;
            return;
        }
    };

    match event {
        ClientEvent::Move { mv, player } => match engine.apply_move(game_id, &player, mv).await {
            Ok(locked) => {
                // Broadcast before the game's lock is released, so a later move's
                // broadcast always arrives after this one
                let delivered = rooms
                    .broadcast(game_id, &Response::GameState((*locked).clone()))
                    .await;
                info!("broadcast game {} to {} connections", game_id, delivered);
                drop(locked);
            }
            Err(err) => {
                warn!("Rejected move from {}: {}", id, err);
                reply_error(game_id, id, err.to_string(), rooms).await;
            }
        },
        ClientEvent::Replay { replay_until } => match engine.replay_until(replay_until).await {
            Ok(board) => {
                let response = Response::Replay {
                    replay_board: board,
                };
                if rooms.send_to(game_id, id, &response).await.is_err() {
                    warn!("failed to send replay to {}", id);
                }
            }
            Err(err) => {
                warn!("Rejected replay request from {}: {}", id, err);
                reply_error(game_id, id, err.to_string(), rooms).await;
            }
        },
    }
}

async fn reply_error<M: SendMsg>(game_id: u64, id: &str, error: String, rooms: &Rooms<M>) {
    if rooms
        .send_to(game_id, id, &Response::Error { error })
        .await
        .is_err()
    {
        warn!("failed to send error to {}", id);
    }
}
