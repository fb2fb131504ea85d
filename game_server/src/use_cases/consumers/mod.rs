pub mod game_cleanup;
pub mod game_start;
pub mod keystroke;
pub mod lobby_countdown;
pub mod lobby_notify;

/// What a consumer tells the AMQP transport to do with the delivery it just
/// handled: drop-on-bad-input, retry-on-processing-failure, done-on-success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    Nack,
}
