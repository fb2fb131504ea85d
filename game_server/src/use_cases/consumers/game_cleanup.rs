use crate::domain::errors::AppError;
use crate::domain::ports::{Clock, GameCacheRepo, GameRepo, LobbyCacheRepo};
use crate::interface_adapters::protocol::GameCleanupMsg;

use super::AckDecision;

/// Fires once the post-game wait-queue delay expires: clears both caches and
/// flips the row to `FINISHED`. Safe to run twice — clearing an
/// already-cleared cache and finishing an already-finished game are both
/// no-ops at the repo layer.
pub struct GameCleanupConsumer<'a, G, L, C> {
    pub game_repo: &'a G,
    pub lobby_cache_repo: &'a L,
    pub game_cache_repo: &'a C,
    pub clock: &'a dyn Clock,
}

impl<'a, G, L, C> GameCleanupConsumer<'a, G, L, C>
where
    G: GameRepo,
    L: LobbyCacheRepo,
    C: GameCacheRepo,
{
    async fn process(&self, msg: &GameCleanupMsg) -> Result<(), AppError> {
        self.lobby_cache_repo.clear_cache(msg.game_id).await?;
        self.game_cache_repo.clear_cache(msg.game_id).await?;
        self.game_repo.set_finished(msg.game_id, self.clock.now()).await?;
        Ok(())
    }

    pub async fn handle(&self, body: &[u8]) -> AckDecision {
        let msg: GameCleanupMsg = match serde_json::from_slice(body) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "drop bad game-cleanup message");
                return AckDecision::Ack;
            }
        };

        match self.process(&msg).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                tracing::error!(error = %err, game_id = msg.game_id, "game cleanup failed");
                AckDecision::Nack
            }
        }
    }
}
