//! `LobbyCache`/`GameCache` adapters. Key layout mirrors the original
//! service: `{lobby,game}-cache-players-{game_id}` hashes, a
//! `{lobby,game}-cache-countdown-{game_id}` string for the start time, and
//! (for games) a `game-cache-words-{game_id}` string. Locks are a plain
//! `SET key 1 NX PX ttl` per game, released by a best-effort `DEL`
//! fired from `Drop` — the guard can't run an async destructor, so the
//! unlock is spawned rather than awaited.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::entities::{GameUserInfo, LobbyUserInfo};
use crate::domain::errors::AppError;
use crate::domain::ports::{CacheLockGuard, GameCacheRepo, LobbyCacheRepo};

fn map_redis_err(err: redis::RedisError) -> AppError {
    tracing::error!(error = %err, "redis error");
    AppError::Unknown
}

const LOCK_TTL_MS: usize = 5_000;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);
const LOCK_MAX_ATTEMPTS: u32 = 250;

pub struct RedisLock {
    conn: ConnectionManager,
    key: String,
}

impl CacheLockGuard for RedisLock {}

impl Drop for RedisLock {
    fn drop(&mut self) {
        let mut conn = self.conn.clone();
        let key = std::mem::take(&mut self.key);
        tokio::spawn(async move {
            let result: Result<(), redis::RedisError> =
                redis::cmd("DEL").arg(&key).query_async(&mut conn).await;
            if let Err(err) = result {
                tracing::warn!(error = %err, key, "failed to release cache lock");
            }
        });
    }
}

async fn acquire_lock(conn: &ConnectionManager, key: String) -> Result<Box<dyn CacheLockGuard>, AppError> {
    let mut c = conn.clone();
    for _ in 0..LOCK_MAX_ATTEMPTS {
        let acquired: bool = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(LOCK_TTL_MS)
            .query_async::<Option<String>>(&mut c)
            .await
            .map_err(map_redis_err)?
            .is_some();
        if acquired {
            return Ok(Box::new(RedisLock { conn: conn.clone(), key }));
        }
        tokio::time::sleep(LOCK_RETRY_DELAY).await;
    }
    tracing::error!(key, "timed out waiting for cache lock");
    Err(AppError::Unknown)
}

fn epoch_ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

pub struct RedisLobbyCacheRepo {
    pub conn: ConnectionManager,
    pub expire_secs: u64,
}

impl RedisLobbyCacheRepo {
    fn players_key(game_id: i64) -> String {
        format!("lobby-cache-players-{game_id}")
    }
    fn countdown_key(game_id: i64) -> String {
        format!("lobby-cache-countdown-{game_id}")
    }
    fn lock_key(game_id: i64) -> String {
        format!("lobby-cache-{game_id}-lock")
    }
}

#[async_trait]
impl LobbyCacheRepo for RedisLobbyCacheRepo {
    async fn add_player(&self, game_id: i64, info: LobbyUserInfo) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let key = Self::players_key(game_id);
        let payload = serde_json::to_string(&info).map_err(|_| AppError::Unknown)?;
        let added: i32 = conn
            .hset(&key, &info.id, payload)
            .await
            .map_err(map_redis_err)?;
        let _: () = conn.expire(&key, self.expire_secs as i64).await.map_err(map_redis_err)?;
        Ok(added > 0)
    }

    async fn is_new_player(&self, game_id: i64, user_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .hexists(Self::players_key(game_id), user_id)
            .await
            .map_err(map_redis_err)?;
        Ok(!exists)
    }

    async fn remove_player(&self, game_id: i64, user_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let removed: i32 = conn
            .hdel(Self::players_key(game_id), user_id)
            .await
            .map_err(map_redis_err)?;
        Ok(removed > 0)
    }

    async fn get_players(&self, game_id: i64) -> Result<Option<Vec<LobbyUserInfo>>, AppError> {
        let mut conn = self.conn.clone();
        let raw: std::collections::HashMap<String, String> = conn
            .hgetall(Self::players_key(game_id))
            .await
            .map_err(map_redis_err)?;
        if raw.is_empty() {
            return Ok(None);
        }
        let players = raw
            .values()
            .filter_map(|v| serde_json::from_str(v).ok())
            .collect();
        Ok(Some(players))
    }

    async fn set_start_time(&self, game_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let key = Self::countdown_key(game_id);
        let _: () = conn
            .set_ex(&key, at.timestamp_millis(), self.expire_secs)
            .await
            .map_err(map_redis_err)?;
        Ok(())
    }

    async fn get_start_time(&self, game_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
        let mut conn = self.conn.clone();
        let ms: Option<i64> = conn
            .get(Self::countdown_key(game_id))
            .await
            .map_err(map_redis_err)?;
        Ok(ms.map(epoch_ms_to_datetime))
    }

    async fn clear_cache(&self, game_id: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&[Self::players_key(game_id), Self::countdown_key(game_id)])
            .await
            .map_err(map_redis_err)?;
        Ok(())
    }

    async fn lock(&self, game_id: i64) -> Result<Box<dyn CacheLockGuard>, AppError> {
        acquire_lock(&self.conn, Self::lock_key(game_id)).await
    }
}

pub struct RedisGameCacheRepo {
    pub conn: ConnectionManager,
    /// Single TTL used for players/countdown/words; the original splits
    /// this across `in_game_cache_expire_time` (bulk populate) and
    /// `result_cache_expire_time` (single-entry update) depending on call
    /// site — our port only exposes one update method, so both routes
    /// share `result_cache_expire_time`.
    pub expire_secs: u64,
}

impl RedisGameCacheRepo {
    fn players_key(game_id: i64) -> String {
        format!("game-cache-players-{game_id}")
    }
    fn countdown_key(game_id: i64) -> String {
        format!("game-cache-countdown-{game_id}")
    }
    fn words_key(game_id: i64) -> String {
        format!("game-cache-words-{game_id}")
    }
    fn lock_key(game_id: i64) -> String {
        format!("game-cache-{game_id}-lock")
    }
}

#[async_trait]
impl GameCacheRepo for RedisGameCacheRepo {
    async fn update_player_cache(&self, game_id: i64, info: GameUserInfo) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let key = Self::players_key(game_id);
        let payload = serde_json::to_string(&info).map_err(|_| AppError::Unknown)?;
        let _: () = conn.hset(&key, &info.id, payload).await.map_err(map_redis_err)?;
        let _: () = conn.expire(&key, self.expire_secs as i64).await.map_err(map_redis_err)?;
        Ok(())
    }

    async fn get_players(&self, game_id: i64) -> Result<Option<Vec<GameUserInfo>>, AppError> {
        let mut conn = self.conn.clone();
        let raw: std::collections::HashMap<String, String> = conn
            .hgetall(Self::players_key(game_id))
            .await
            .map_err(map_redis_err)?;
        if raw.is_empty() {
            return Ok(None);
        }
        let players = raw
            .values()
            .filter_map(|v| serde_json::from_str(v).ok())
            .collect();
        Ok(Some(players))
    }

    async fn get_words(&self, game_id: i64) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.get(Self::words_key(game_id)).await.map_err(map_redis_err)
    }

    async fn set_words(&self, game_id: i64, words: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::words_key(game_id), words, self.expire_secs)
            .await
            .map_err(map_redis_err)?;
        Ok(())
    }

    async fn get_start_time(&self, game_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
        let mut conn = self.conn.clone();
        let ms: Option<i64> = conn
            .get(Self::countdown_key(game_id))
            .await
            .map_err(map_redis_err)?;
        Ok(ms.map(epoch_ms_to_datetime))
    }

    async fn set_start_time(&self, game_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::countdown_key(game_id), at.timestamp_millis(), self.expire_secs)
            .await
            .map_err(map_redis_err)?;
        Ok(())
    }

    async fn clear_cache(&self, game_id: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&[
                Self::players_key(game_id),
                Self::countdown_key(game_id),
                Self::words_key(game_id),
            ])
            .await
            .map_err(map_redis_err)?;
        Ok(())
    }

    async fn lock(&self, game_id: i64) -> Result<Box<dyn CacheLockGuard>, AppError> {
        acquire_lock(&self.conn, Self::lock_key(game_id)).await
    }
}
