use crate::domain::entities::LobbyUserInfo;
use crate::domain::errors::AppError;
use crate::domain::ports::{GameRepo, LobbyCacheRepo};

#[derive(Debug, Clone, Default)]
pub struct GetPlayersResult {
    pub me: Option<LobbyUserInfo>,
    pub others: Vec<LobbyUserInfo>,
}

/// Read-side of the lobby: who's waiting, and leaving before the game starts.
pub struct LobbyService<'a, G, L> {
    pub game_repo: &'a G,
    pub lobby_cache_repo: &'a L,
}

impl<'a, G, L> LobbyService<'a, G, L>
where
    G: GameRepo,
    L: LobbyCacheRepo,
{
    pub async fn leave(&self, user_id: &str, game_id: i64) -> Result<(), AppError> {
        self.game_repo.decrease_player_count(game_id).await?;
        self.lobby_cache_repo.remove_player(game_id, user_id).await?;
        Ok(())
    }

    pub async fn get_players(&self, user_id: &str, game_id: i64) -> Result<GetPlayersResult, AppError> {
        let players = self.lobby_cache_repo.get_players(game_id).await?.unwrap_or_default();

        let mut result = GetPlayersResult::default();
        for info in players {
            if info.id == user_id {
                result.me = Some(info);
            } else {
                result.others.push(info);
            }
        }
        if result.me.is_none() {
            return Err(AppError::NotAParticipant);
        }
        Ok(result)
    }
}
