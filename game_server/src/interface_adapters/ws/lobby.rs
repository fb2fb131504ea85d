//! `/lobby/queue-in/ws`. The upgrade always happens first — a rejected
//! join (bad token, nothing joinable) is reported as a WS close frame
//! whose reason is the failing `AppError`'s code (e.g. `INVALID_TOKEN`),
//! not an HTTP error, since the client has no way to read a pre-upgrade
//! body. Once joined, the inbound loop only watches for the client's own
//! `Close`: that's the one disconnect cause treated as an intentional
//! leave and routed through `LobbyService::leave`. Every other exit
//! (dropped connection, transport error, failed healthcheck ping) leaves
//! `LobbyCache` untouched — the healthcheck path already removed the
//! `SessionConnection` via the supervisor before the socket loop even
//! notices.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::errors::AppError;
use crate::domain::ports::{BrokerPort, Clock, SystemClock};
use crate::interface_adapters::http::{cookie, ACCESS_TOKEN_COOKIE};
use crate::interface_adapters::protocol::{LobbyEvent, LobbyFrame, QueueInType};
use crate::interface_adapters::state::AppState;
use crate::use_cases::lobby::LobbyService;
use crate::use_cases::queue_in::QueueInService;
use crate::use_cases::session::SessionConnection;

#[derive(Deserialize)]
pub struct QueueInQuery {
    #[serde(default = "default_queue_in_type")]
    pub queue_in_type: QueueInType,
    #[serde(default)]
    pub prev_game_id: Option<i64>,
}

fn default_queue_in_type() -> QueueInType {
    QueueInType::New
}

pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<QueueInQuery>,
    headers: axum::http::HeaderMap,
) -> Response {
    let access_token = cookie(&headers, ACCESS_TOKEN_COOKIE);
    ws.on_upgrade(move |socket| run(socket, state, access_token, query))
}

async fn reject(mut socket: WebSocket, err: AppError) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame { code: close_code::POLICY, reason: err.code().into() })))
        .await;
    let _ = socket.close().await;
}

async fn run(socket: WebSocket, state: AppState, access_token: Option<String>, query: QueueInQuery) {
    let clock = SystemClock;
    let service = QueueInService {
        game_repo: state.game_repo.as_ref(),
        lobby_cache_repo: state.lobby_cache_repo.as_ref(),
        game_cache_repo: state.game_cache_repo.as_ref(),
        guest_token_repo: state.guest_token_repo.as_ref(),
        broker: state.broker.as_ref(),
        word_generator: state.word_generator.as_ref(),
        clock: &clock,
        token_generator: state.token_generator.as_ref(),
        token_validator: state.token_validator.as_ref(),
        player_limit: state.settings.game.player_limit,
        lobby_countdown_secs: state.settings.game.lobby_countdown,
        start_countdown_secs: state.settings.game.start_countdown,
    };

    let outcome = match service.join(access_token.as_deref(), query.queue_in_type, query.prev_game_id).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = ?err, "lobby join rejected");
            return reject(socket, err).await;
        }
    };

    run_session(socket, state, outcome).await;
}

async fn run_session(mut socket: WebSocket, state: AppState, outcome: crate::use_cases::queue_in::QueueInOutcome) {
    let user_id = outcome.user_info.id.clone();
    let game_id = outcome.game_id;

    let (conn, mut outbound_rx) = SessionConnection::<LobbyFrame>::new(user_id.clone());
    let init_msg = LobbyFrame {
        event: LobbyEvent::Init,
        game_id: Some(game_id),
        user_id: Some(user_id.clone()),
        guest_token_key: outcome.guest_token_key,
    };
    state.lobby_sessions.get_or_create(game_id).add(conn, Some(init_msg));

    let mut explicit_leave = false;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) => {
                        explicit_leave = true;
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Binary(_))) => {
                        continue;
                    }
                    Some(Err(err)) => {
                        debug!(game_id, error = %err, "lobby websocket recv error");
                        break;
                    }
                    None => {
                        debug!(game_id, "lobby websocket closed by peer");
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
                                warn!(error = %err, "failed to serialize lobby frame");
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

    if let Some(group) = state.lobby_sessions.get(game_id) {
        group.remove(&user_id, None);
    }

    if explicit_leave {
        let service = LobbyService {
            game_repo: state.game_repo.as_ref(),
            lobby_cache_repo: state.lobby_cache_repo.as_ref(),
        };
        if let Err(err) = service.leave(&user_id, game_id).await {
            warn!(game_id, %user_id, error = ?err, "failed to process lobby leave");
        } else if let Err(err) = state.broker.notify_user_left(game_id).await {
            warn!(game_id, %user_id, error = ?err, "failed to notify user left");
        }
    }

    info!(game_id, %user_id, explicit_leave, "lobby connection closed");
}
