//! Broker topology: exchange/queue names and the wait-queue argument hash.
//! Declaring the topology against a real connection, and publishing onto
//! it, are adapter concerns (`interface_adapters::repos::amqp`) — this
//! module only names things so both sides agree.

use sha2::{Digest, Sha256};

pub const LOBBY_NOTIFY_EXCHANGE: &str = "lobby.notify";
pub const LOBBY_COUNTDOWN_EXCHANGE: &str = "lobby.countdown";
pub const GAME_START_EXCHANGE: &str = "game.start";
pub const GAME_KEYSTROKE_EXCHANGE: &str = "game.keystroke";
pub const GAME_CLEANUP_EXCHANGE: &str = "game.cleanup";

pub const LOBBY_COUNTDOWN_ROUTING_KEY: &str = "lobby.countdown";
pub const GAME_CLEANUP_ROUTING_KEY: &str = "game.cleanup";
pub const GAME_START_ROUTING_KEY: &str = "game.start";

pub const LOBBY_COUNTDOWN_QUEUE: &str = "lobby.countdown";
pub const GAME_CLEANUP_QUEUE: &str = "game.cleanup";

/// Active, instance-scoped queues: one per consumer per running instance, so
/// a fan-out exchange gives every instance its own copy of every event.
pub fn lobby_notify_queue(server_name: &str) -> String {
    format!("lobby.notify.{server_name}")
}

pub fn game_start_queue(server_name: &str) -> String {
    format!("game.start.{server_name}")
}

pub fn game_keystroke_queue(server_name: &str) -> String {
    format!("game.keystroke.{server_name}")
}

/// The declaration arguments of a wait queue: `x-message-ttl` plus its
/// dead-letter target. Queue declarations are immutable once created, so
/// these are folded into the queue name rather than relied on to redeclare
/// cleanly after a config change.
#[derive(Debug, Clone, Copy)]
pub struct WaitQueueArgs<'a> {
    pub ttl_ms: i64,
    pub dead_letter_exchange: &'a str,
    pub dead_letter_routing_key: &'a str,
}

/// `<base>.<8-hex-char digest of the declaration args>`.
pub fn wait_queue_name(base: &str, args: WaitQueueArgs<'_>) -> String {
    let repr = format!(
        "{}|{}|{}",
        args.ttl_ms, args.dead_letter_exchange, args.dead_letter_routing_key
    );
    let digest = Sha256::digest(repr.as_bytes());
    format!("{base}.{}", hex::encode(&digest[..4]))
}

pub fn lobby_countdown_wait_queue(lobby_countdown_secs: i64) -> String {
    wait_queue_name(
        "lobby.countdown.wait",
        WaitQueueArgs {
            ttl_ms: lobby_countdown_secs * 1000,
            dead_letter_exchange: LOBBY_COUNTDOWN_EXCHANGE,
            dead_letter_routing_key: LOBBY_COUNTDOWN_ROUTING_KEY,
        },
    )
}

pub fn game_cleanup_wait_queue(cleanup_countdown_secs: i64) -> String {
    wait_queue_name(
        "game.cleanup.wait",
        WaitQueueArgs {
            ttl_ms: cleanup_countdown_secs * 1000,
            dead_letter_exchange: GAME_CLEANUP_EXCHANGE,
            dead_letter_routing_key: GAME_CLEANUP_ROUTING_KEY,
        },
    )
}

pub fn game_start_wait_queue(start_countdown_secs: i64) -> String {
    wait_queue_name(
        "game.start.wait",
        WaitQueueArgs {
            ttl_ms: start_countdown_secs * 1000,
            dead_letter_exchange: GAME_START_EXCHANGE,
            dead_letter_routing_key: GAME_START_ROUTING_KEY,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_ttl_changes_then_wait_queue_name_changes() {
        let a = lobby_countdown_wait_queue(5);
        let b = lobby_countdown_wait_queue(10);
        assert_ne!(a, b);
        assert!(a.starts_with("lobby.countdown.wait."));
    }

    #[test]
    fn when_same_args_are_hashed_twice_then_name_is_stable() {
        assert_eq!(game_start_wait_queue(7), game_start_wait_queue(7));
    }
}
