use std::sync::Arc;

use crate::interface_adapters::protocol::{GameEvent, GameFrame, KeystrokeMsg};
use crate::use_cases::session::SessionManager;

use super::AckDecision;

/// Broadcasts keystrokes to the local `SessionGroup`. Every publish also
/// carries a `source` header naming the publishing instance; when
/// `suppress_echo` is on, a message whose `source` is this instance is
/// dropped rather than re-broadcast to players already updated locally.
pub struct KeystrokeConsumer {
    pub session_manager: Arc<SessionManager<GameFrame>>,
    pub server_name: String,
    pub suppress_echo: bool,
}

impl KeystrokeConsumer {
    pub async fn handle(&self, body: &[u8], header_source: Option<&str>) -> AckDecision {
        let msg: KeystrokeMsg = match serde_json::from_slice(body) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "drop bad keystroke message");
                return AckDecision::Ack;
            }
        };

        if self.suppress_echo && header_source == Some(self.server_name.as_str()) {
            return AckDecision::Ack;
        }

        let frame = GameFrame {
            event: GameEvent::KeyStoke,
            game_id: msg.game_id,
            user_id: Some(msg.user_id),
            word_index: Some(msg.word_index),
            char_index: Some(msg.char_index),
        };
        self.session_manager.broadcast(msg.game_id, frame);

        AckDecision::Ack
    }
}
