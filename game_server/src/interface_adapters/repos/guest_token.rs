//! One-shot key a fresh guest lobby connection trades for its token pair.
//! Key is `guest-token-{8 hex uuid chars}-{epoch millis}`; `store` sets it
//! with `NX` so a colliding key never clobbers an existing one, `get`
//! reads and deletes atomically via `GETDEL` so the key can't be redeemed
//! twice.

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
