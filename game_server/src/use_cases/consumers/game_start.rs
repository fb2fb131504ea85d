use std::sync::Arc;

use crate::interface_adapters::protocol::{GameEvent, GameFrame, GameStartMsg};
use crate::use_cases::session::SessionManager;

use super::AckDecision;

/// Fires once the lobby's wait-queue countdown expires: pushes `START` to
/// whoever is already connected to the game's `SessionGroup`. Clients who
/// join later derive their own countdown from `/game/countdown` instead.
pub struct GameStartConsumer {
    pub session_manager: Arc<SessionManager<GameFrame>>,
}

impl GameStartConsumer {
    pub async fn handle(&self, body: &[u8]) -> AckDecision {
        let msg: GameStartMsg = match serde_json::from_slice(body) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "drop bad game-start message");
                return AckDecision::Ack;
            }
        };

        let frame = GameFrame {
            event: GameEvent::Start,
            game_id: msg.game_id,
            user_id: None,
            word_index: None,
            char_index: None,
        };
        self.session_manager.broadcast(msg.game_id, frame);

        AckDecision::Ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_manager() -> Arc<SessionManager<GameFrame>> {
        let (manager, _supervisor) = SessionManager::new(Duration::from_secs(3600), Arc::new(|| GameFrame {
            event: GameEvent::Ping,
            game_id: 0,
            user_id: None,
            word_index: None,
            char_index: None,
        }));
        manager
    }

    #[tokio::test]
    async fn when_bad_json_then_message_is_acked_and_dropped() {
        let consumer = GameStartConsumer { session_manager: make_manager() };
        assert_eq!(consumer.handle(b"garbage").await, AckDecision::Ack);
    }

    #[tokio::test]
    async fn when_game_start_fires_then_connected_players_get_the_start_frame() {
        use crate::use_cases::session::SessionConnection;

        let manager = make_manager();
        let group = manager.get_or_create(5);
        let (conn, mut rx) = SessionConnection::new("u1".into());
        group.add(conn, None);

        let consumer = GameStartConsumer { session_manager: manager };
        let body = serde_json::to_vec(&GameStartMsg { game_id: 5 }).unwrap();
        consumer.handle(&body).await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, GameEvent::Start);
        assert_eq!(frame.game_id, 5);
    }

    #[tokio::test]
    async fn when_no_one_is_connected_then_broadcast_is_a_noop() {
        let consumer = GameStartConsumer { session_manager: make_manager() };
        let body = serde_json::to_vec(&GameStartMsg { game_id: 99 }).unwrap();
        assert_eq!(consumer.handle(&body).await, AckDecision::Ack);
    }
}
