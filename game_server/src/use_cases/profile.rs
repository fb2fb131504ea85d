use token_layer::UserType;

use crate::domain::errors::AppError;
use crate::domain::ports::{GameResultRepo, GameResultWithType, Statistics};

#[derive(Debug, Clone, Default)]
pub struct HistoryResult {
    pub total: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub data: Vec<GameResultWithType>,
}

/// Guests have no persisted history, so every method below short-circuits
/// to an empty result for them rather than querying at all.
pub struct ProfileService<'a, R> {
    pub game_result_repo: &'a R,
}

impl<'a, R> ProfileService<'a, R>
where
    R: GameResultRepo,
{
    pub async fn statistics(&self, user_id: &str, user_type: UserType) -> Result<Statistics, AppError> {
        if user_type == UserType::Guest {
            return Ok(Statistics::default());
        }
        self.game_result_repo.statistics(user_id).await
    }

    pub async fn graph(
        &self,
        user_id: &str,
        user_type: UserType,
        size: i64,
    ) -> Result<Vec<GameResultWithType>, AppError> {
        if user_type == UserType::Guest {
            return Ok(Vec::new());
        }
        self.game_result_repo.history(user_id, size, 1).await
    }

    pub async fn history(
        &self,
        user_id: &str,
        user_type: UserType,
        size: i64,
        page: i64,
    ) -> Result<HistoryResult, AppError> {
        if user_type == UserType::Guest {
            return Ok(HistoryResult::default());
        }

        let data = self.game_result_repo.history(user_id, size, page).await?;
        let total = self.game_result_repo.total_games(user_id).await?;

        Ok(HistoryResult {
            total,
            has_prev_page: page > 1,
            has_next_page: total > page * size,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FakeGameResultRepo {
        total: i64,
    }

    #[async_trait]
    impl GameResultRepo for FakeGameResultRepo {
        async fn create(&self, _result: crate::domain::entities::GameResult) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn total_games(&self, _user_id: &str) -> Result<i64, AppError> {
            Ok(self.total)
        }
        async fn statistics(&self, _user_id: &str) -> Result<Statistics, AppError> {
            Ok(Statistics {
                total_games: self.total,
                best: 90.0,
                last_10: 80.0,
                average: 75.0,
            })
        }
        async fn history(&self, _user_id: &str, size: i64, page: i64) -> Result<Vec<GameResultWithType>, AppError> {
            Ok((0..size)
                .map(|i| GameResultWithType {
                    game_id: page * 100 + i,
                    wpm: 80.0,
                    wpm_raw: 85.0,
                    accuracy: 0.95,
                    finished_at: Utc::now(),
                    rank: 1,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn when_guest_requests_statistics_then_empty_default_is_returned_without_querying() {
        let repo = FakeGameResultRepo { total: 42 };
        let service = ProfileService { game_result_repo: &repo };

        let stats = service.statistics("guest-1", UserType::Guest).await.unwrap();
        assert_eq!(stats, Statistics::default());
    }

    #[tokio::test]
    async fn when_registered_user_is_on_the_last_page_then_has_next_page_is_false() {
        let repo = FakeGameResultRepo { total: 10 };
        let service = ProfileService { game_result_repo: &repo };

        let history = service.history("u1", UserType::Registered, 10, 1).await.unwrap();

        assert_eq!(history.total, 10);
        assert!(!history.has_prev_page);
        assert!(!history.has_next_page);
    }

    #[tokio::test]
    async fn when_registered_user_is_on_page_two_of_more_then_has_prev_page_is_true() {
        let repo = FakeGameResultRepo { total: 25 };
        let service = ProfileService { game_result_repo: &repo };

        let history = service.history("u1", UserType::Registered, 10, 2).await.unwrap();

        assert!(history.has_prev_page);
        assert!(history.has_next_page);
    }
}
