use serde::{Deserialize, Serialize};

// --- Broker message schemas (JSON bodies published/consumed over AMQP) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyCountdownMsg {
    pub game_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LobbyNotifyType {
    UserJoined,
    UserLeft,
    GetToken,
    GameStart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyNotifyMsg {
    pub notify_type: LobbyNotifyType,
    pub game_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_token_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartMsg {
    pub game_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCleanupMsg {
    pub game_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystrokeMsg {
    pub game_id: i64,
    pub user_id: String,
    pub word_index: u32,
    pub char_index: u32,
}

/// Published alongside every `KeystrokeMsg` as the AMQP message header, so
/// a consumer can tell whether a message originated on its own instance.
/// Mandatory, per the source's recommendation, so self-echo suppression is reliable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystrokeHeader {
    pub source: String,
}

// --- Client streaming frames ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LobbyEvent {
    Ping,
    Pong,
    Reconnect,
    Init,
    UserJoined,
    UserLeft,
    GetToken,
    GameStart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyFrame {
    pub event: LobbyEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_token_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameEvent {
    Ping,
    Pong,
    Reconnect,
    #[serde(rename = "KEY_STOKE")]
    KeyStoke,
    Start,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameFrame {
    pub event: GameEvent,
    pub game_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueInType {
    Reconnect,
    New,
}
