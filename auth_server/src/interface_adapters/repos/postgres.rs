//! `users` persistence: register-on-first-login upsert, lookup, and
//! refresh-token bookkeeping for the OAuth and token-refresh flows.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::entities::User;
use crate::domain::ports::UserRepo;
use token_layer::UserType;

pub struct PostgresUserRepo {
    pub pool: PgPool,
}

fn map_sqlx_err(err: sqlx::Error) -> String {
    tracing::error!(error = %err, "postgres error");
    err.to_string()
}

#[async_trait]
impl UserRepo for PostgresUserRepo {
    async fn register(&self, id: &str, name: &str, user_type: UserType) -> Result<(), String> {
        let user_type = match user_type {
            UserType::Guest => "GUEST",
            UserType::Registered => "REGISTERED",
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, name, user_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(user_type)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<User>, String> {
        sqlx::query_as::<_, User>("SELECT id, name, registered_at, refresh_token FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<(), String> {
        sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}
