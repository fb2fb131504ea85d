use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

text_enum!(GameStatus {
    Lobby => "LOBBY",
    InGame => "IN_GAME",
    Finished => "FINISHED",
});

text_enum!(GameType {
    Single => "SINGLE",
    Multi => "MULTI",
    Team => "TEAM",
});

pub use token_layer::UserType;

/// Persistent source-of-truth row for a single game's lifecycle.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Game {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: GameStatus,
    pub invite_token: Option<String>,
    pub game_type: GameType,
    pub player_count: i32,
    pub finish_count: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameResult {
    pub game_id: i64,
    pub user_id: String,
    pub rank: i32,
    pub wpm_raw: f64,
    pub wpm_correct: f64,
    pub accuracy: f64,
    pub finished_at: DateTime<Utc>,
}

/// Cache entry shape for LobbyCache's `user_id -> info` map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LobbyUserInfo {
    pub id: String,
    pub name: String,
}

/// Cache entry shape for GameCache's `user_id -> info` map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameUserInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default = "default_rank")]
    pub rank: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wpm_raw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<f64>,
}

fn default_rank() -> i32 {
    -1
}

impl GameUserInfo {
    pub fn from_lobby_cache(info: &LobbyUserInfo) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            finished: None,
            rank: -1,
            wpm: None,
            wpm_raw: None,
            acc: None,
        }
    }
}
