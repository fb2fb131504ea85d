//! One-shot key a guest-token mint trades for its token. Mirrors
//! `game_server`'s adapter of the same name since both crates sit in
//! front of the same Redis store and key format.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use token_layer::GuestTokenRepo;

pub struct RedisGuestTokenRepo {
    pub conn: ConnectionManager,
    pub expire_secs: u64,
}

#[async_trait]
impl GuestTokenRepo for RedisGuestTokenRepo {
    async fn store(&self, token: &str) -> Result<String, String> {
        let mut conn = self.conn.clone();
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_string();
        let key = format!("guest-token-{}-{}", suffix, Utc::now().timestamp_millis());

        let stored: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(token)
            .arg("EX")
            .arg(self.expire_secs)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| e.to_string())?;

        stored.ok_or_else(|| "guest token key collision".to_string())?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let mut conn = self.conn.clone();
        conn.get_del(key).await.map_err(|e| e.to_string())
    }
}
