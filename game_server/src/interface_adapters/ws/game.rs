//! `/game/ws`. Requires a valid `TP_AT` cookie — there's no anonymous path
//! into a running game the way there is into the lobby queue-in. Inbound
//! `KEY_STOKE` frames are published to the keystroke fanout rather than
//! broadcast locally; the local `SessionGroup` only ever learns about a
//! keystroke by consuming it back off that exchange, same as every other
//! instance.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::ports::BrokerPort;
use crate::interface_adapters::http::{authenticate, read_error};
use crate::interface_adapters::protocol::{GameEvent, GameFrame};
use crate::interface_adapters::state::AppState;
use crate::use_cases::session::SessionConnection;

#[derive(Deserialize)]
pub struct GameWsQuery {
    pub game_id: i64,
}

pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<GameWsQuery>,
    headers: axum::http::HeaderMap,
) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return read_error(err),
    };

    let game_id = query.game_id;
    let user_id = claims.sub;

    ws.on_upgrade(move |socket| run(socket, state, game_id, user_id))
}

async fn run(mut socket: WebSocket, state: AppState, game_id: i64, user_id: String) {
    let (conn, mut outbound_rx) = SessionConnection::<GameFrame>::new(user_id.clone());
    state.game_sessions.get_or_create(game_id).add(conn, None);

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<GameFrame>(&text) {
                            if frame.event == GameEvent::KeyStoke {
                                let word_index = frame.word_index.unwrap_or(0);
                                let char_index = frame.char_index.unwrap_or(0);
                                if let Err(err) = state
                                    .broker
                                    .publish_keystroke(game_id, &user_id, word_index, char_index)
                                    .await
                                {
                                    warn!(game_id, %user_id, error = ?err, "failed to publish keystroke");
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {
                        continue;
                    }
                    Some(Err(err)) => {
                        debug!(game_id, error = %err, "game websocket recv error");
                        break;
                    }
                    None => {
                        debug!(game_id, "game websocket closed by peer");
                        break;
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        let txt = match serde_json::to_string(&frame) {
                            Ok(txt) => txt,
                            Err(err) => {
                                warn!(error = %err, "failed to serialize game frame");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(txt.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = socket
        .send(Message::Close(Some(CloseFrame { code: close_code::NORMAL, reason: "bye".into() })))
        .await;
    let _ = socket.close().await;

    if let Some(group) = state.game_sessions.get(game_id) {
        group.remove(&user_id, None);
    }

    info!(game_id, %user_id, "game connection closed");
}
