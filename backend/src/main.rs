use crate::config::Config;
use crate::engine::{Engine, Games};
use crate::room::{Rooms, SharedRooms};
use crate::store::MemoryStore;
use clap::Parser;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;
use warp::{
    http::{header, Method},
    Filter,
};

mod client;
mod config;
mod engine;
mod handler;
mod room;
mod store;
mod util;
mod ws;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("tracing subscriber installed more than once");

    let games: Games = Arc::new(Engine::new(MemoryStore::new(), config.board_size));
    let rooms: SharedRooms = Arc::new(Rooms::new());
    info!("created game engine and rooms, board size {}", config.board_size);

    let health_route = warp::path!("health").and_then(handler::health_handler);

    let games_path = warp::path("games");
    let game_routes = games_path
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_games(games.clone()))
        .and(with_rooms(rooms.clone()))
        .and(with_config(config.clone()))
        .and_then(handler::find_game_handler)
        .or(games_path
            .and(warp::get())
            .and(warp::path::param())
            .and(warp::path::end())
            .and(with_games(games.clone()))
            .and_then(handler::snapshot_handler));

    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(warp::path::param())
        .and(with_games(games.clone()))
        .and(with_rooms(rooms.clone()))
        .and_then(handler::ws_handler);

    let routes = health_route
        .or(game_routes)
        .or(ws_route)
        .with(
            warp::cors()
                .allow_credentials(true)
                .allow_methods(&[Method::OPTIONS, Method::GET, Method::POST])
                .allow_headers(vec![
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                ])
                .max_age(300)
                .allow_any_origin(),
        );

    info!("listening on {}:{}", config.host, config.port);
    warp::serve(routes).run((config.host, config.port)).await;
}

fn with_games(games: Games) -> impl Filter<Extract = (Games,), Error = Infallible> + Clone {
    warp::any().map(move || games.clone())
}

fn with_rooms(rooms: SharedRooms) -> impl Filter<Extract = (SharedRooms,), Error = Infallible> + Clone {
    warp::any().map(move || rooms.clone())
}

fn with_config(config: Config) -> impl Filter<Extract = (Config,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}
