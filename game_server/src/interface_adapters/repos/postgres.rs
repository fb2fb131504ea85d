//! `games` / `game_results` persistence. Row mutations rely on single
//! atomic `UPDATE ... RETURNING` statements rather than an explicit
//! `SELECT ... FOR UPDATE` transaction spanning the caller's whole
//! operation — the port doesn't thread a transaction handle through to
//! callers, so the atomicity has to live in the statement itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entities::{Game, GameResult, GameStatus};
use crate::domain::errors::AppError;
use crate::domain::ports::{GameRepo, GameResultRepo, GameResultWithType, Statistics};

pub struct PostgresGameRepo {
    pub pool: PgPool,
}

fn map_sqlx_err(err: sqlx::Error) -> AppError {
    tracing::error!(error = %err, "postgres error");
    AppError::Unknown
}

#[async_trait]
impl GameRepo for PostgresGameRepo {
    async fn create(&self) -> Result<Game, AppError> {
        sqlx::query_as::<_, Game>(
            r#"
            INSERT INTO games (status, game_type, player_count, finish_count)
            VALUES ('LOBBY', 'MULTI', 0, 0)
            RETURNING *
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn get_joinable_for_update(&self, player_limit: i64) -> Result<Option<Game>, AppError> {
        sqlx::query_as::<_, Game>(
            r#"
            SELECT * FROM games
            WHERE status = 'LOBBY' AND player_count < $1
            ORDER BY id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(player_limit as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn get_for_update(&self, id: i64) -> Result<Option<Game>, AppError> {
        sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn get(&self, id: i64) -> Result<Option<Game>, AppError> {
        sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn increase_player_count(&self, id: i64) -> Result<Game, AppError> {
        sqlx::query_as::<_, Game>(
            "UPDATE games SET player_count = player_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(AppError::GameNotFound)
    }

    async fn decrease_player_count(&self, id: i64) -> Result<Game, AppError> {
        sqlx::query_as::<_, Game>(
            "UPDATE games SET player_count = player_count - 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(AppError::GameNotFound)
    }

    async fn start_game(&self, id: i64, now: DateTime<Utc>) -> Result<Game, AppError> {
        sqlx::query_as::<_, Game>(
            "UPDATE games SET status = 'IN_GAME', start_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(AppError::GameNotFound)
    }

    async fn increase_finish_count(&self, id: i64) -> Result<Option<Game>, AppError> {
        sqlx::query_as::<_, Game>(
            "UPDATE games SET finish_count = finish_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn set_finished(&self, id: i64, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE games SET status = 'FINISHED', end_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn status(&self, id: i64) -> Result<Option<GameStatus>, AppError> {
        Ok(self.get(id).await?.map(|g| g.status))
    }
}

pub struct PostgresGameResultRepo {
    pub pool: PgPool,
}

#[async_trait]
impl GameResultRepo for PostgresGameResultRepo {
    async fn create(&self, result: GameResult) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO game_results (game_id, user_id, rank, wpm_raw, wpm_correct, accuracy, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(result.game_id)
        .bind(result.user_id)
        .bind(result.rank)
        .bind(result.wpm_raw)
        .bind(result.wpm_correct)
        .bind(result.accuracy)
        .bind(result.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn total_games(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM game_results WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(count)
    }

    async fn statistics(&self, user_id: &str) -> Result<Statistics, AppError> {
        let row: (i64, f64, f64, f64) = sqlx::query_as(
            r#"
            WITH total_cte AS (
                SELECT COUNT(wpm_correct) AS total_games,
                       COALESCE(AVG(wpm_correct), 0) AS avg_wpm,
                       COALESCE(MAX(wpm_correct), 0) AS best_wpm
                FROM game_results WHERE user_id = $1
            ), last_10_cte AS (
                SELECT COALESCE(AVG(wpm_correct), 0) AS avg_10
                FROM (
                    SELECT wpm_correct FROM game_results
                    WHERE user_id = $1
                    ORDER BY finished_at DESC
                    LIMIT 10
                ) recent
            )
            SELECT total_cte.total_games, total_cte.best_wpm, total_cte.avg_wpm, last_10_cte.avg_10
            FROM total_cte, last_10_cte
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Statistics {
            total_games: row.0,
            best: row.1,
            average: row.2,
            last_10: row.3,
        })
    }

    async fn history(
        &self,
        user_id: &str,
        size: i64,
        page: i64,
    ) -> Result<Vec<GameResultWithType>, AppError> {
        let offset = (page - 1) * size;
        let rows: Vec<(i64, f64, f64, f64, DateTime<Utc>, i32)> = sqlx::query_as(
            r#"
            SELECT game_id, wpm_correct, wpm_raw, accuracy, finished_at, rank
            FROM game_results
            WHERE user_id = $1
            ORDER BY finished_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows
            .into_iter()
            .map(|(game_id, wpm, wpm_raw, accuracy, finished_at, rank)| GameResultWithType {
                game_id,
                wpm,
                wpm_raw,
                accuracy,
                finished_at,
                rank,
            })
            .collect())
    }
}
