use crate::config::Config;
use crate::engine::{EngineError, Games, Seating};
use crate::room::SharedRooms;
use crate::store::StoreError;
use crate::ws;
use common::messages::Response;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use warp::{http::StatusCode, reply::json, Rejection, Reply};

type Result<T> = std::result::Result<T, Rejection>;

#[derive(Deserialize, Debug)]
pub struct FindGameRequest {
    player_name: String,
}

#[derive(Serialize, Debug)]
pub struct FindGameResponse {
    game_id: u64,
    url: String,
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
}

pub async fn find_game_handler(
    body: FindGameRequest,
    games: Games,
    rooms: SharedRooms,
    config: Config,
) -> Result<impl Reply> {
    let seating = match games.find_game(&body.player_name).await {
        Ok(seating) => seating,
        Err(err) => return Ok(error_reply(err)),
    };
    let game_id = seating.game().id();

    // The room learns about the new opponent right away. The snapshot goes out
    // under the game's lock so a following move cannot overtake it.
    if matches!(seating, Seating::Seated(_)) {
        match games.snapshot(game_id).await {
            Ok(locked) => {
                rooms
                    .broadcast(game_id, &Response::GameState((*locked).clone()))
                    .await;
                drop(locked);
            }
            Err(err) => warn!("Could not announce seating in game {}: {}", game_id, err),
        }
    }

    Ok(warp::reply::with_status(
        json(&FindGameResponse {
            game_id,
            url: config.ws_url(game_id),
        }),
        StatusCode::OK,
    ))
}

pub async fn snapshot_handler(game_id: u64, games: Games) -> Result<impl Reply> {
    match games.snapshot(game_id).await {
        Ok(locked) => Ok(warp::reply::with_status(
            json(&locked.into_inner()),
            StatusCode::OK,
        )),
        Err(err) => Ok(error_reply(err)),
    }
}

pub async fn ws_handler(
    ws: warp::ws::Ws,
    game_id: u64,
    games: Games,
    rooms: SharedRooms,
) -> Result<impl Reply> {
    if !games.exists(game_id).await {
        info!("Rejected websocket for unknown game {}", game_id);
        return Err(warp::reject::not_found());
    }
    Ok(ws.on_upgrade(move |socket| ws::client_connection(socket, game_id, games, rooms)))
}

pub async fn health_handler() -> Result<impl Reply> {
    Ok(StatusCode::OK)
}

fn error_reply(err: EngineError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = match &err {
        EngineError::InvalidPlayerName { .. } => StatusCode::BAD_REQUEST,
        EngineError::Store(StoreError::GameNotFound(_)) => StatusCode::NOT_FOUND,
        _ => {
            error!("Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    warp::reply::with_status(
        json(&ErrorResponse {
            error: err.to_string(),
        }),
        status,
    )
}
