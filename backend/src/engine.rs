use crate::store::{MemoryStore, NewMoveRecord, Store, StoreError};
use chrono::Utc;
use common::messages::GameSnapshot;
use common::{reconstruct, Board, BoardError, Game, GameStatus, Move, MoveError, RawMove};
use hashbrown::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

pub type Games = Arc<Engine<MemoryStore>>;

pub const MAX_PLAYER_NAME_LEN: usize = 30;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid move: {0}")]
    InvalidMove(#[from] MoveError),
    #[error("Cannot rebuild board: {0}")]
    Board(#[from] BoardError),
    #[error("Player {name:?} is not seated in game {game_id}")]
    UnknownPlayer { name: String, game_id: u64 },
    #[error("Player name must be between 1 and {max} characters")]
    InvalidPlayerName { max: usize },
}

// Result of looking up a seat for a player
#[derive(Debug, Clone, PartialEq)]
pub enum Seating {
    // The player already sits in an unfinished game
    Rejoined(Game),
    // The player took the empty second seat of a pending game
    Seated(Game),
    // No game had room, so a new one was opened
    Created(Game),
}

impl Seating {
    pub fn game(&self) -> &Game {
        match self {
            Seating::Rejoined(game) | Seating::Seated(game) | Seating::Created(game) => game,
        }
    }
}

// A value read under a game's lock, which stays held until this is dropped.
// Whatever is sent out from it cannot be overtaken by a later change to the game.
#[derive(Debug)]
pub struct Locked<T> {
    value: T,
    _guard: OwnedMutexGuard<()>,
}

impl<T> Locked<T> {
    // Releases the lock
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Locked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// Serializes every read-modify-write of a game behind that game's own lock.
// Different games never wait on each other.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    board_size: usize,
    locks: RwLock<HashMap<u64, Arc<Mutex<()>>>>,
    matchmaking: Mutex<()>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S, board_size: usize) -> Self {
        Engine {
            store,
            board_size,
            locks: RwLock::new(HashMap::new()),
            matchmaking: Mutex::new(()),
        }
    }

    async fn game_lock(&self, game_id: u64) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&game_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        if let Some(lock) = locks.get(&game_id) {
            return lock.clone();
        }
        // A lock referenced only by the map has no holder and no waiter
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(game_id).or_default().clone()
    }

    // Apply a move submitted by `player_name`. Illegal moves and moves against a
    // game that is not in progress leave the game untouched. Either way the
    // returned snapshot is what is persisted, and the game stays locked until
    // it is dropped.
    #[tracing::instrument(skip(self))]
    pub async fn apply_move(
        &self,
        game_id: u64,
        player_name: &str,
        raw: RawMove,
    ) -> Result<Locked<GameSnapshot>, EngineError> {
        let guard = self.game_lock(game_id).await.lock_owned().await;

        // State must be read only after the lock is held
        let mut game = self.store.load_game(game_id)?;
        let mv = Move::new(raw, game.board().size())?;
        let player = game
            .slot_of(player_name)
            .ok_or_else(|| EngineError::UnknownPlayer {
                name: player_name.to_string(),
                game_id,
            })?;

        match game.apply_move(player, mv) {
            Some(index) => {
                let record = NewMoveRecord {
                    game_id,
                    mv,
                    player_name: player_name.to_string(),
                    timestamp: Utc::now(),
                };
                let committed = self.store.commit(&game, Some(record))?;
                info!(
                    "game {} accepted move {:?} by {} at index {} (record {:?}), status {:?}",
                    game_id,
                    raw,
                    player_name,
                    index,
                    committed.map(|r| r.id),
                    game.status()
                );
                if game.is_finished() {
                    info!("game {} finished, winner {:?}", game_id, game.winner());
                }
            }
            None => {
                debug!(
                    "game {} absorbed move {:?} by {} (status {:?}, turn {:?})",
                    game_id,
                    raw,
                    player_name,
                    game.status(),
                    game.next_player()
                );
            }
        }

        let moves = self.store.moves(game_id)?;
        Ok(Locked {
            value: GameSnapshot::new(&game, &moves),
            _guard: guard,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn snapshot(&self, game_id: u64) -> Result<Locked<GameSnapshot>, EngineError> {
        let guard = self.game_lock(game_id).await.lock_owned().await;
        let game = self.store.load_game(game_id)?;
        let moves = self.store.moves(game_id)?;
        Ok(Locked {
            value: GameSnapshot::new(&game, &moves),
            _guard: guard,
        })
    }

    // Rebuild the board of the record's game as it stood right after that record.
    // Read only, the live game is never touched.
    #[tracing::instrument(skip(self))]
    pub async fn replay_until(&self, record_id: u64) -> Result<Board, EngineError> {
        let target = self.store.move_record(record_id)?;
        let game = self.store.load_game(target.game_id)?;
        let records = self.store.moves_until(target.game_id, record_id)?;
        let board = reconstruct(game.board().size(), &records)?;
        debug!(
            "replayed {} moves of game {} up to record {}",
            records.len(),
            target.game_id,
            record_id
        );
        Ok(board)
    }

    // Find a seat for the player: their own unfinished game, else the second
    // seat of the oldest pending game, else a brand new game.
    #[tracing::instrument(skip(self))]
    pub async fn find_game(&self, player_name: &str) -> Result<Seating, EngineError> {
        let len = player_name.chars().count();
        if len == 0 || len > MAX_PLAYER_NAME_LEN {
            return Err(EngineError::InvalidPlayerName {
                max: MAX_PLAYER_NAME_LEN,
            });
        }
        let _matchmaking = self.matchmaking.lock().await;
        let games = self.store.games()?;

        if let Some(game) = games
            .iter()
            .find(|g| !g.is_finished() && g.slot_of(player_name).is_some())
        {
            info!("{} rejoined game {}", player_name, game.id());
            return Ok(Seating::Rejoined(game.clone()));
        }

        for pending in games.iter().filter(|g| g.status() == GameStatus::Pending) {
            let lock = self.game_lock(pending.id()).await;
            let _guard = lock.lock().await;
            let mut game = self.store.load_game(pending.id())?;
            if game.seat(player_name.to_string()) {
                self.store.commit(&game, None)?;
                info!("{} seated in game {}, game started", player_name, game.id());
                return Ok(Seating::Seated(game));
            }
        }

        let game = self
            .store
            .create_game(player_name.to_string(), self.board_size)?;
        info!("{} created game {}", player_name, game.id());
        Ok(Seating::Created(game))
    }

    pub async fn exists(&self, game_id: u64) -> bool {
        self.store.load_game(game_id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Cell, MoveRecord, Side};

    async fn started_game(engine: &Engine<MemoryStore>) -> u64 {
        let created = engine.find_game("ana").await.unwrap();
        let seated = engine.find_game("bo").await.unwrap();
        assert!(matches!(seated, Seating::Seated(_)));
        assert_eq!(created.game().id(), seated.game().id());
        seated.game().id()
    }

    fn engine() -> Engine<MemoryStore> {
        Engine::new(MemoryStore::new(), 7)
    }

    #[tokio::test]
    async fn test_matchmaking() {
        let engine = engine();
        let created = engine.find_game("ana").await.unwrap();
        assert!(matches!(created, Seating::Created(_)));
        assert_eq!(created.game().status(), GameStatus::Pending);

        let rejoined = engine.find_game("ana").await.unwrap();
        assert_eq!(rejoined, Seating::Rejoined(created.game().clone()));

        let seated = engine.find_game("bo").await.unwrap();
        assert_eq!(seated.game().id(), created.game().id());
        assert_eq!(seated.game().status(), GameStatus::Started);
        assert_eq!(seated.game().player_two(), "bo");

        let third = engine.find_game("cy").await.unwrap();
        assert!(matches!(third, Seating::Created(_)));
        assert_ne!(third.game().id(), created.game().id());

        assert!(matches!(
            engine.find_game("").await,
            Err(EngineError::InvalidPlayerName { .. })
        ));
        assert!(engine.find_game(&"x".repeat(31)).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_move_scenario() {
        let engine = engine();
        let id = started_game(&engine).await;

        let snapshot = engine
            .apply_move(id, "ana", RawMove(3, Side::Right))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(snapshot.board.get(27), Some(Cell::PlayerOne));
        assert!(!snapshot.next_player);
        assert_eq!(snapshot.moves.len(), 1);

        let snapshot = engine
            .apply_move(id, "bo", RawMove(3, Side::Right))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(snapshot.board.get(26), Some(Cell::PlayerTwo));
        assert!(snapshot.next_player);
        assert_eq!(snapshot.moves[0].player_name, "bo");
    }

    #[tokio::test]
    async fn test_illegal_moves_are_absorbed() {
        let engine = engine();
        let id = started_game(&engine).await;
        let before = engine.snapshot(id).await.unwrap().into_inner();
        let after = engine
            .apply_move(id, "bo", RawMove(3, Side::Right))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(after, before);
        assert!(engine.store.moves(id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_moves_are_errors() {
        let engine = engine();
        let id = started_game(&engine).await;
        assert!(matches!(
            engine.apply_move(id, "ana", RawMove(7, Side::Left)).await,
            Err(EngineError::InvalidMove(_))
        ));
        assert!(matches!(
            engine.apply_move(id, "cy", RawMove(0, Side::Left)).await,
            Err(EngineError::UnknownPlayer { .. })
        ));
        assert!(matches!(
            engine.apply_move(99, "ana", RawMove(0, Side::Left)).await,
            Err(EngineError::Store(StoreError::GameNotFound(99)))
        ));
    }

    #[tokio::test]
    async fn test_pending_game_absorbs_moves() {
        let engine = engine();
        let id = engine.find_game("ana").await.unwrap().game().id();
        let snapshot = engine
            .apply_move(id, "ana", RawMove(0, Side::Left))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(snapshot.status, GameStatus::Pending);
        assert!(snapshot.moves.is_empty());
    }

    #[tokio::test]
    async fn test_finished_game_is_frozen() {
        let engine = engine();
        let id = started_game(&engine).await;
        for _ in 0..3 {
            engine.apply_move(id, "ana", RawMove(0, Side::Left)).await.unwrap();
            engine.apply_move(id, "bo", RawMove(1, Side::Left)).await.unwrap();
        }
        let finished = engine
            .apply_move(id, "ana", RawMove(0, Side::Left))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(finished.status, GameStatus::Finished);
        assert_eq!(finished.winner, Some(true));

        for player in ["ana", "bo"] {
            let after = engine
                .apply_move(id, player, RawMove(4, Side::Right))
                .await
                .unwrap();
            assert_eq!(*after, finished);
        }
        // A finished game is not offered again by matchmaking
        assert!(matches!(
            engine.find_game("ana").await.unwrap(),
            Seating::Created(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_moves_are_serialized() {
        let engine = Arc::new(engine());
        let id = started_game(&engine).await;

        // Both players hammer the same row at once. Only legal moves may land,
        // so the row fills exactly once and every record alternates players.
        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let engine = engine.clone();
                let player = if i % 2 == 0 { "ana" } else { "bo" };
                tokio::spawn(async move {
                    engine
                        .apply_move(id, player, RawMove(3, Side::Right))
                        .await
                        .unwrap()
                        .into_inner()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let game = engine.store.load_game(id).unwrap();
        let records: Vec<MoveRecord> = engine.store.moves(id).unwrap();
        assert!(records.len() <= 7);
        assert_eq!(
            game.board().count(Cell::PlayerOne) + game.board().count(Cell::PlayerTwo),
            records.len()
        );
        for (position, record) in records.iter().enumerate() {
            let expected = if position % 2 == 0 { "ana" } else { "bo" };
            assert_eq!(record.player_name, expected);
        }
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(reconstruct(7, &records).unwrap(), *game.board());
    }

    #[tokio::test]
    async fn test_replay_until() {
        let engine = engine();
        let id = started_game(&engine).await;
        let moves = [
            ("ana", RawMove(3, Side::Right)),
            ("bo", RawMove(3, Side::Right)),
            ("ana", RawMove(0, Side::Left)),
            ("bo", RawMove(6, Side::Left)),
        ];
        for (player, mv) in moves {
            engine.apply_move(id, player, mv).await.unwrap();
        }
        let records = engine.store.moves(id).unwrap();

        let second = engine.replay_until(records[1].id).await.unwrap();
        assert_eq!(second.get(27), Some(Cell::PlayerOne));
        assert_eq!(second.get(26), Some(Cell::PlayerTwo));
        assert_eq!(second.count(Cell::Empty), 47);
        assert_eq!(engine.replay_until(records[1].id).await.unwrap(), second);

        let last = engine.replay_until(records[3].id).await.unwrap();
        assert_eq!(last, *engine.store.load_game(id).unwrap().board());

        assert!(matches!(
            engine.replay_until(1000).await,
            Err(EngineError::Store(StoreError::MoveRecordNotFound(1000)))
        ));
    }

    #[tokio::test]
    async fn test_replay_does_not_mix_games() {
        let engine = engine();
        let first = started_game(&engine).await;
        let second = started_game_for(&engine, "cy", "di").await;
        engine.apply_move(first, "ana", RawMove(0, Side::Left)).await.unwrap();
        engine.apply_move(second, "cy", RawMove(6, Side::Right)).await.unwrap();
        engine.apply_move(first, "bo", RawMove(0, Side::Left)).await.unwrap();

        let last_of_first = engine.store.moves(first).unwrap()[1].id;
        let board = engine.replay_until(last_of_first).await.unwrap();
        assert_eq!(board, *engine.store.load_game(first).unwrap().board());
        assert_eq!(board.get(48), Some(Cell::Empty));
    }

    #[tokio::test]
    async fn test_snapshot_holds_the_game_lock() {
        let engine = Arc::new(engine());
        let id = started_game(&engine).await;
        let held = engine.snapshot(id).await.unwrap();

        let mover = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .apply_move(id, "ana", RawMove(3, Side::Right))
                    .await
                    .unwrap()
                    .into_inner()
            })
        };
        tokio::task::yield_now().await;
        assert!(!mover.is_finished());
        assert!(engine.store.moves(id).unwrap().is_empty());

        drop(held);
        let after = mover.await.unwrap();
        assert_eq!(after.moves.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let engine = engine();
        let first = started_game(&engine).await;
        let second = started_game_for(&engine, "cy", "di").await;
        for player in ["ana", "bo", "ana"] {
            engine.apply_move(first, player, RawMove(0, Side::Left)).await.unwrap();
        }
        assert!(engine.locks.read().await.contains_key(&first));

        // A held lock survives the pruning a new game's lock triggers
        let held = engine.snapshot(first).await.unwrap();
        engine.snapshot(second).await.unwrap();
        assert!(engine.locks.read().await.contains_key(&first));
        drop(held);

        let third = started_game_for(&engine, "ed", "fi").await;
        engine.snapshot(third).await.unwrap();
        let locks = engine.locks.read().await;
        assert!(!locks.contains_key(&first));
        assert!(!locks.contains_key(&second));
        assert!(locks.contains_key(&third));
    }

    async fn started_game_for(engine: &Engine<MemoryStore>, one: &str, two: &str) -> u64 {
        engine.find_game(one).await.unwrap();
        engine.find_game(two).await.unwrap().game().id()
    }

    // Accepts reads but refuses every write
    struct FailingStore(MemoryStore);

    impl Store for FailingStore {
        fn create_game(&self, player_1: String, size: usize) -> Result<Game, StoreError> {
            self.0.create_game(player_1, size)
        }

        fn load_game(&self, id: u64) -> Result<Game, StoreError> {
            self.0.load_game(id)
        }

        fn games(&self) -> Result<Vec<Game>, StoreError> {
            self.0.games()
        }

        fn commit(
            &self,
            _game: &Game,
            _record: Option<NewMoveRecord>,
        ) -> Result<Option<MoveRecord>, StoreError> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }

        fn move_record(&self, id: u64) -> Result<MoveRecord, StoreError> {
            self.0.move_record(id)
        }

        fn moves(&self, game_id: u64) -> Result<Vec<MoveRecord>, StoreError> {
            self.0.moves(game_id)
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_is_propagated_and_nothing_is_written() {
        let store = MemoryStore::new();
        let mut game = store.create_game("ana".to_string(), 7).unwrap();
        game.seat("bo".to_string());
        store.commit(&game, None).unwrap();

        let engine = Engine::new(FailingStore(store), 7);
        assert!(matches!(
            engine.apply_move(game.id(), "ana", RawMove(3, Side::Left)).await,
            Err(EngineError::Store(StoreError::Unavailable(_)))
        ));
        let snapshot = engine.snapshot(game.id()).await.unwrap().into_inner();
        assert_eq!(snapshot.board, Board::default());
        assert!(snapshot.moves.is_empty());
    }
}
