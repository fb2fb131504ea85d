// Error taxonomy shared by services, consumers, and HTTP handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("unknown error")]
    Unknown,
    #[error("invalid token")]
    InvalidToken,
    #[error("guest token key not found")]
    KeyNotFound,
    #[error("game not found")]
    GameNotFound,
    #[error("not a participant")]
    NotAParticipant,
    #[error("words not found")]
    WordsNotFound,
    #[error("validation error")]
    ValidationError,
    #[error("publish not acknowledged")]
    PublishNotAcknowledged,
    #[error("broker not ready")]
    AmqpNotReady,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unknown => "UNKNOWN_ERROR",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::KeyNotFound => "KEY_NOT_FOUND",
            AppError::GameNotFound => "GAME_NOT_FOUND",
            AppError::NotAParticipant => "NOT_A_PARTICIPANT",
            AppError::WordsNotFound => "WORDS_NOT_FOUND",
            AppError::ValidationError => "VALIDATION_ERROR",
            AppError::PublishNotAcknowledged => "PUBLISH_NOT_ACKNOWLEDGED",
            AppError::AmqpNotReady => "AMQP_NOT_READY",
        }
    }
}
