use chrono::{DateTime, Utc};

use crate::domain::entities::GameUserInfo;
use crate::domain::errors::AppError;
use crate::domain::ports::{Clock, GameCacheRepo, GameRepo, GameResultRepo};
use token_layer::UserType;

#[derive(Debug, Clone, Copy)]
pub struct GameStatisticsInput {
    pub game_id: i64,
    pub wpm: f64,
    pub wpm_raw: f64,
    pub acc: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GetResultResult {
    /// Sorted ascending by `rank`.
    pub ranking: Vec<GameUserInfo>,
}

pub struct GameService<'a, G, R, C> {
    pub game_repo: &'a G,
    pub game_result_repo: &'a R,
    pub game_cache_repo: &'a C,
    pub clock: &'a dyn Clock,
}

impl<'a, G, R, C> GameService<'a, G, R, C>
where
    G: GameRepo,
    R: GameResultRepo,
    C: GameCacheRepo,
{
    pub async fn get_countdown(&self, game_id: i64) -> Result<f64, AppError> {
        let start_time = self
            .game_cache_repo
            .get_start_time(game_id)
            .await?
            .ok_or(AppError::GameNotFound)?;

        let seconds_left = (start_time - self.clock.now()).num_milliseconds() as f64 / 1000.0;
        Ok(seconds_left.max(0.0))
    }

    pub async fn get_words(&self, game_id: i64) -> Result<String, AppError> {
        self.game_cache_repo
            .get_words(game_id)
            .await?
            .ok_or(AppError::WordsNotFound)
    }

    pub async fn write_statistics(
        &self,
        statistics: GameStatisticsInput,
        user_id: &str,
        username: &str,
        user_type: UserType,
    ) -> Result<(), AppError> {
        let players = self
            .game_cache_repo
            .get_players(statistics.game_id)
            .await?
            .ok_or(AppError::GameNotFound)?;
        if !players.iter().any(|p| p.id == user_id) {
            return Err(AppError::NotAParticipant);
        }

        let game = self
            .game_repo
            .increase_finish_count(statistics.game_id)
            .await?
            .ok_or(AppError::GameNotFound)?;

        let finished_at = self.clock.now();
        let rank = game.finish_count;

        if user_type == UserType::Registered {
            self.game_result_repo
                .create(crate::domain::entities::GameResult {
                    game_id: statistics.game_id,
                    user_id: user_id.to_string(),
                    rank,
                    wpm_raw: statistics.wpm_raw,
                    wpm_correct: statistics.wpm,
                    accuracy: statistics.acc,
                    finished_at,
                })
                .await?;
        }

        let _lock = self.game_cache_repo.lock(statistics.game_id).await?;
        self.game_cache_repo
            .update_player_cache(
                statistics.game_id,
                GameUserInfo {
                    id: user_id.to_string(),
                    name: username.to_string(),
                    finished: Some(finished_at),
                    rank,
                    wpm: Some(statistics.wpm),
                    wpm_raw: Some(statistics.wpm_raw),
                    acc: Some(statistics.acc),
                },
            )
            .await?;

        Ok(())
    }

    pub async fn get_result(&self, game_id: i64) -> Result<GetResultResult, AppError> {
        let mut players = self
            .game_cache_repo
            .get_players(game_id)
            .await?
            .ok_or(AppError::GameNotFound)?;
        players.sort_by_key(|p| p.rank);
        Ok(GetResultResult { ranking: players })
    }
}
