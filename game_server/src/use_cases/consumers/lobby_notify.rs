use std::sync::Arc;

use crate::interface_adapters::protocol::{LobbyEvent, LobbyFrame, LobbyNotifyMsg, LobbyNotifyType};
use crate::use_cases::session::SessionManager;

use super::AckDecision;

/// Just forwards notifications to the right lobby `SessionGroup` — the
/// interesting logic (who's in a group, when it gets reaped) lives in
/// `SessionManager`/`SessionGroup` themselves.
pub struct LobbyNotifyConsumer {
    pub session_manager: Arc<SessionManager<LobbyFrame>>,
}

impl LobbyNotifyConsumer {
    pub async fn handle(&self, body: &[u8]) -> AckDecision {
        let msg: LobbyNotifyMsg = match serde_json::from_slice(body) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "drop bad lobby-notify message");
                return AckDecision::Ack;
            }
        };

        let frame = LobbyFrame {
            event: translate(msg.notify_type),
            game_id: Some(msg.game_id),
            user_id: msg.user_id,
            guest_token_key: msg.guest_token_key,
        };

        if msg.notify_type == LobbyNotifyType::GameStart {
            tracing::debug!(game_id = msg.game_id, "game started, tearing down lobby group");
            self.session_manager.remove_game(msg.game_id, Some(frame));
        } else if let Some(group) = self.session_manager.get(msg.game_id) {
            group.broadcast(frame);
        }

        AckDecision::Ack
    }
}

fn translate(notify_type: LobbyNotifyType) -> LobbyEvent {
    match notify_type {
        LobbyNotifyType::UserJoined => LobbyEvent::UserJoined,
        LobbyNotifyType::UserLeft => LobbyEvent::UserLeft,
        LobbyNotifyType::GetToken => LobbyEvent::GetToken,
        LobbyNotifyType::GameStart => LobbyEvent::GameStart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::session::SessionConnection;
    use std::time::Duration;

    fn make_manager() -> Arc<SessionManager<LobbyFrame>> {
        let (manager, _supervisor) = SessionManager::new(Duration::from_secs(3600), Arc::new(|| LobbyFrame {
            event: LobbyEvent::Ping,
            game_id: None,
            user_id: None,
            guest_token_key: None,
        }));
        manager
    }

    #[tokio::test]
    async fn when_bad_json_then_message_is_acked_and_dropped() {
        let consumer = LobbyNotifyConsumer { session_manager: make_manager() };
        let decision = consumer.handle(b"not json").await;
        assert_eq!(decision, AckDecision::Ack);
    }

    #[tokio::test]
    async fn when_user_joined_is_notified_then_group_members_receive_it() {
        let manager = make_manager();
        let group = manager.get_or_create(1);
        let (conn, mut rx) = SessionConnection::new("u1".into());
        group.add(conn, None);

        let consumer = LobbyNotifyConsumer { session_manager: manager.clone() };
        let body = serde_json::to_vec(&LobbyNotifyMsg {
            notify_type: LobbyNotifyType::UserJoined,
            game_id: 1,
            user_id: Some("u2".into()),
            guest_token_key: None,
        })
        .unwrap();

        let decision = consumer.handle(&body).await;
        assert_eq!(decision, AckDecision::Ack);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, LobbyEvent::UserJoined);
    }

    #[tokio::test]
    async fn when_game_start_is_notified_then_lobby_group_is_torn_down() {
        let manager = make_manager();
        let group = manager.get_or_create(2);
        let (conn, mut rx) = SessionConnection::new("u1".into());
        group.add(conn, None);

        let consumer = LobbyNotifyConsumer { session_manager: manager.clone() };
        let body = serde_json::to_vec(&LobbyNotifyMsg {
            notify_type: LobbyNotifyType::GameStart,
            game_id: 2,
            user_id: None,
            guest_token_key: None,
        })
        .unwrap();

        consumer.handle(&body).await;
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, LobbyEvent::GameStart);
        assert!(manager.get(2).is_none());
    }
}
