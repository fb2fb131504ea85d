use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{Game, GameResult, GameStatus, GameUserInfo, LobbyUserInfo};
use crate::domain::errors::AppError;

#[async_trait]
pub trait GameRepo: Send + Sync {
    /// Creates a new `LOBBY`/`MULTI` game row.
    async fn create(&self) -> Result<Game, AppError>;

    /// Locked read of the first `LOBBY` game with room, for a fresh join.
    async fn get_joinable_for_update(&self, player_limit: i64) -> Result<Option<Game>, AppError>;

    /// Locked read of a single game by id, for reconnects and consumers.
    async fn get_for_update(&self, id: i64) -> Result<Option<Game>, AppError>;

    async fn get(&self, id: i64) -> Result<Option<Game>, AppError>;

    /// Increments `player_count` and returns the updated row.
    async fn increase_player_count(&self, id: i64) -> Result<Game, AppError>;

    /// Decrements `player_count`, for a lobby leave before the game starts.
    async fn decrease_player_count(&self, id: i64) -> Result<Game, AppError>;

    /// Sets `status = IN_GAME`, `start_at = now()` in one update.
    async fn start_game(&self, id: i64, now: DateTime<Utc>) -> Result<Game, AppError>;

    /// Increments `finish_count` and returns the updated row.
    async fn increase_finish_count(&self, id: i64) -> Result<Option<Game>, AppError>;

    /// Sets `status = FINISHED`, `end_at = now()`.
    async fn set_finished(&self, id: i64, now: DateTime<Utc>) -> Result<(), AppError>;

    #[allow(dead_code)]
    async fn status(&self, id: i64) -> Result<Option<GameStatus>, AppError>;
}

#[async_trait]
pub trait GameResultRepo: Send + Sync {
    async fn create(&self, result: GameResult) -> Result<(), AppError>;
    async fn total_games(&self, user_id: &str) -> Result<i64, AppError>;
    async fn statistics(&self, user_id: &str) -> Result<Statistics, AppError>;
    async fn history(
        &self,
        user_id: &str,
        size: i64,
        page: i64,
    ) -> Result<Vec<GameResultWithType>, AppError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_games: i64,
    pub best: f64,
    pub last_10: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameResultWithType {
    pub game_id: i64,
    pub wpm: f64,
    pub wpm_raw: f64,
    pub accuracy: f64,
    pub finished_at: DateTime<Utc>,
    pub rank: i32,
}

#[async_trait]
pub trait LobbyCacheRepo: Send + Sync {
    /// Adds/updates a player; returns `true` if the player was not already present.
    async fn add_player(&self, game_id: i64, info: LobbyUserInfo) -> Result<bool, AppError>;
    async fn is_new_player(&self, game_id: i64, user_id: &str) -> Result<bool, AppError>;
    async fn remove_player(&self, game_id: i64, user_id: &str) -> Result<bool, AppError>;
    async fn get_players(&self, game_id: i64) -> Result<Option<Vec<LobbyUserInfo>>, AppError>;
    async fn set_start_time(&self, game_id: i64, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn get_start_time(&self, game_id: i64) -> Result<Option<DateTime<Utc>>, AppError>;
    async fn clear_cache(&self, game_id: i64) -> Result<(), AppError>;
    /// Per-game advisory lock guarding the read-modify-write cycle above.
    async fn lock(&self, game_id: i64) -> Result<Box<dyn CacheLockGuard>, AppError>;
}

#[async_trait]
pub trait GameCacheRepo: Send + Sync {
    async fn update_player_cache(&self, game_id: i64, info: GameUserInfo) -> Result<(), AppError>;
    async fn get_players(&self, game_id: i64) -> Result<Option<Vec<GameUserInfo>>, AppError>;
    async fn get_words(&self, game_id: i64) -> Result<Option<String>, AppError>;
    async fn set_words(&self, game_id: i64, words: &str) -> Result<(), AppError>;
    async fn get_start_time(&self, game_id: i64) -> Result<Option<DateTime<Utc>>, AppError>;
    async fn set_start_time(&self, game_id: i64, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn clear_cache(&self, game_id: i64) -> Result<(), AppError>;
    async fn lock(&self, game_id: i64) -> Result<Box<dyn CacheLockGuard>, AppError>;
}

/// A held advisory lock; dropping it releases the lock.
pub trait CacheLockGuard: Send {}

/// Produces the shuffled word list handed out for a game's typing text.
/// Loaded once at startup from `game.word_file`.
pub trait WordGenerator: Send + Sync {
    fn generate(&self, word_count: usize) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mints/redeems the one-shot guest token key a fresh lobby connection
/// exchanges for its access token. Shared contract with `auth_server`.
pub use token_layer::GuestTokenRepo;

/// Everything QueueIn, the consumers, and the game/lobby services publish.
/// Exchange/queue names, TTLs, and routing keys are an adapter concern —
/// this port only expresses intent.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// `LobbyCountdown{game_id}` onto the lobby-countdown wait queue.
    async fn schedule_lobby_countdown(&self, game_id: i64) -> Result<(), AppError>;
    /// `GameCleanup{game_id}` onto the game-cleanup wait queue.
    async fn schedule_game_cleanup(&self, game_id: i64) -> Result<(), AppError>;
    /// `GameStart{game_id}` onto the game-start wait queue.
    async fn schedule_game_start(&self, game_id: i64) -> Result<(), AppError>;

    async fn notify_user_joined(&self, game_id: i64) -> Result<(), AppError>;
    async fn notify_user_left(&self, game_id: i64) -> Result<(), AppError>;
    async fn notify_game_start(&self, game_id: i64) -> Result<(), AppError>;

    async fn publish_keystroke(
        &self,
        game_id: i64,
        user_id: &str,
        word_index: u32,
        char_index: u32,
    ) -> Result<(), AppError>;
}
