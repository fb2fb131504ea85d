//! CSRF/replay guard for the OAuth `state` parameter. `set_nx` stores it
//! once under `NX`, `consume` reads-and-deletes atomically via `GETDEL` so
//! a `state` can't be replayed against the callback twice.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::domain::ports::OauthStateRepo;

pub struct RedisOauthStateRepo {
    pub conn: ConnectionManager,
    pub expire_secs: u64,
}

fn state_key(state: &str) -> String {
    format!("oauth-state-{state}")
}

#[async_trait]
impl OauthStateRepo for RedisOauthStateRepo {
    async fn set_nx(&self, state: &str) -> Result<bool, String> {
        let mut conn = self.conn.clone();
        let stored: Option<String> = redis::cmd("SET")
            .arg(state_key(state))
            .arg(1)
            .arg("EX")
            .arg(self.expire_secs)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| e.to_string())?;
        Ok(stored.is_some())
    }

    async fn consume(&self, state: &str) -> Result<bool, String> {
        let mut conn = self.conn.clone();
        let existed: Option<String> = redis::AsyncCommands::get_del(&mut conn, state_key(state))
            .await
            .map_err(|e| e.to_string())?;
        Ok(existed.is_some())
    }
}
