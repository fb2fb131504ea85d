//! Topology declaration, the `BrokerPort` publisher, and the generic
//! consumer-loop runner every consumer module in `use_cases::consumers`
//! is wired up with from `frameworks::server`.
//!
//! Wait queues are plain queues declared with `x-message-ttl` plus a
//! dead-letter target; nothing ever consumes them directly — a message
//! sits until its TTL expires and RabbitMQ dead-letters it onto the real
//! exchange. Scheduling one is therefore a publish onto the *default*
//! exchange with the wait queue's own name as the routing key.

use std::future::Future;

use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::domain::errors::AppError;
use crate::frameworks::config::{GameSettings, Settings};
use crate::interface_adapters::protocol::{
    GameCleanupMsg, GameStartMsg, KeystrokeHeader, KeystrokeMsg, LobbyCountdownMsg, LobbyNotifyMsg,
    LobbyNotifyType,
};
use crate::use_cases::broker::{self, WaitQueueArgs};

pub async fn connect(settings: &Settings) -> Result<Connection, lapin::Error> {
    Connection::connect(&settings.amqp.url(), ConnectionProperties::default()).await
}

async fn declare_exchange(channel: &Channel, name: &str, kind: ExchangeKind) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(name, kind, ExchangeDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
        .await
}

async fn declare_active_queue(channel: &Channel, name: &str, exchange: &str, routing_key: &str) -> Result<(), lapin::Error> {
    channel
        .queue_declare(name, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
        .await?;
    channel
        .queue_bind(name, exchange, routing_key, QueueBindOptions::default(), FieldTable::default())
        .await
}

async fn declare_wait_queue(channel: &Channel, name: &str, args: WaitQueueArgs<'_>) -> Result<(), lapin::Error> {
    let mut table = FieldTable::default();
    table.insert(ShortString::from("x-message-ttl"), AMQPValue::LongInt(args.ttl_ms as i32));
    table.insert(
        ShortString::from("x-dead-letter-exchange"),
        AMQPValue::LongString(args.dead_letter_exchange.into()),
    );
    table.insert(
        ShortString::from("x-dead-letter-routing-key"),
        AMQPValue::LongString(args.dead_letter_routing_key.into()),
    );
    channel
        .queue_declare(name, QueueDeclareOptions { durable: true, ..Default::default() }, table)
        .await?;
    Ok(())
}

/// Declares every exchange, this instance's active queues, and the three
/// wait queues. Idempotent: redeclaring with identical arguments is a
/// no-op against an already-running broker.
pub async fn declare_topology(channel: &Channel, server_name: &str, game: &GameSettings) -> Result<(), lapin::Error> {
    declare_exchange(channel, broker::LOBBY_NOTIFY_EXCHANGE, ExchangeKind::Fanout).await?;
    declare_exchange(channel, broker::LOBBY_COUNTDOWN_EXCHANGE, ExchangeKind::Direct).await?;
    declare_exchange(channel, broker::GAME_START_EXCHANGE, ExchangeKind::Fanout).await?;
    declare_exchange(channel, broker::GAME_KEYSTROKE_EXCHANGE, ExchangeKind::Fanout).await?;
    declare_exchange(channel, broker::GAME_CLEANUP_EXCHANGE, ExchangeKind::Direct).await?;

    declare_active_queue(
        channel,
        &broker::lobby_notify_queue(server_name),
        broker::LOBBY_NOTIFY_EXCHANGE,
        "",
    )
    .await?;
    declare_active_queue(
        channel,
        &broker::game_start_queue(server_name),
        broker::GAME_START_EXCHANGE,
        "",
    )
    .await?;
    declare_active_queue(
        channel,
        &broker::game_keystroke_queue(server_name),
        broker::GAME_KEYSTROKE_EXCHANGE,
        "",
    )
    .await?;
    declare_active_queue(
        channel,
        broker::LOBBY_COUNTDOWN_QUEUE,
        broker::LOBBY_COUNTDOWN_EXCHANGE,
        broker::LOBBY_COUNTDOWN_ROUTING_KEY,
    )
    .await?;
    declare_active_queue(
        channel,
        broker::GAME_CLEANUP_QUEUE,
        broker::GAME_CLEANUP_EXCHANGE,
        broker::GAME_CLEANUP_ROUTING_KEY,
    )
    .await?;

    declare_wait_queue(
        channel,
        &broker::lobby_countdown_wait_queue(game.lobby_countdown),
        WaitQueueArgs {
            ttl_ms: game.lobby_countdown * 1000,
            dead_letter_exchange: broker::LOBBY_COUNTDOWN_EXCHANGE,
            dead_letter_routing_key: broker::LOBBY_COUNTDOWN_ROUTING_KEY,
        },
    )
    .await?;
    declare_wait_queue(
        channel,
        &broker::game_cleanup_wait_queue(game.cleanup_countdown),
        WaitQueueArgs {
            ttl_ms: game.cleanup_countdown * 1000,
            dead_letter_exchange: broker::GAME_CLEANUP_EXCHANGE,
            dead_letter_routing_key: broker::GAME_CLEANUP_ROUTING_KEY,
        },
    )
    .await?;
    declare_wait_queue(
        channel,
        &broker::game_start_wait_queue(game.start_countdown),
        WaitQueueArgs {
            ttl_ms: game.start_countdown * 1000,
            dead_letter_exchange: broker::GAME_START_EXCHANGE,
            dead_letter_routing_key: broker::GAME_START_ROUTING_KEY,
        },
    )
    .await?;

    Ok(())
}

pub struct AmqpBroker {
    pub channel: Channel,
    pub server_name: String,
    pub lobby_countdown_wait_queue: String,
    pub game_cleanup_wait_queue: String,
    pub game_start_wait_queue: String,
}

impl AmqpBroker {
    pub fn new(channel: Channel, server_name: String, game: &GameSettings) -> Self {
        Self {
            lobby_countdown_wait_queue: broker::lobby_countdown_wait_queue(game.lobby_countdown),
            game_cleanup_wait_queue: broker::game_cleanup_wait_queue(game.cleanup_countdown),
            game_start_wait_queue: broker::game_start_wait_queue(game.start_countdown),
            channel,
            server_name,
        }
    }

    /// A live AMQP channel is the readiness probe's signal that this
    /// instance can actually publish and consume.
    pub fn is_ready(&self) -> bool {
        self.channel.status().connected()
    }

    async fn publish_default(&self, queue: &str, body: &[u8]) -> Result<(), AppError> {
        self.publish("", queue, body).await
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), AppError> {
        let confirm = self
            .channel
            .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, BasicProperties::default())
            .await
            .map_err(|err| {
                tracing::error!(error = %err, exchange, routing_key, "amqp publish failed");
                AppError::Unknown
            })?
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "amqp publisher confirm failed");
                AppError::Unknown
            })?;

        if confirm.is_nack() {
            tracing::error!(exchange, routing_key, "publish not acknowledged");
            return Err(AppError::PublishNotAcknowledged);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::domain::ports::BrokerPort for AmqpBroker {
    async fn schedule_lobby_countdown(&self, game_id: i64) -> Result<(), AppError> {
        let body = serde_json::to_vec(&LobbyCountdownMsg { game_id }).map_err(|_| AppError::Unknown)?;
        self.publish_default(&self.lobby_countdown_wait_queue, &body).await
    }

    async fn schedule_game_cleanup(&self, game_id: i64) -> Result<(), AppError> {
        let body = serde_json::to_vec(&GameCleanupMsg { game_id }).map_err(|_| AppError::Unknown)?;
        self.publish_default(&self.game_cleanup_wait_queue, &body).await
    }

    async fn schedule_game_start(&self, game_id: i64) -> Result<(), AppError> {
        let body = serde_json::to_vec(&GameStartMsg { game_id }).map_err(|_| AppError::Unknown)?;
        self.publish_default(&self.game_start_wait_queue, &body).await
    }

    async fn notify_user_joined(&self, game_id: i64) -> Result<(), AppError> {
        let body = serde_json::to_vec(&LobbyNotifyMsg {
            notify_type: LobbyNotifyType::UserJoined,
            game_id,
            user_id: None,
            guest_token_key: None,
        })
        .map_err(|_| AppError::Unknown)?;
        self.publish(broker::LOBBY_NOTIFY_EXCHANGE, "", &body).await
    }

    async fn notify_user_left(&self, game_id: i64) -> Result<(), AppError> {
        let body = serde_json::to_vec(&LobbyNotifyMsg {
            notify_type: LobbyNotifyType::UserLeft,
            game_id,
            user_id: None,
            guest_token_key: None,
        })
        .map_err(|_| AppError::Unknown)?;
        self.publish(broker::LOBBY_NOTIFY_EXCHANGE, "", &body).await
    }

    async fn notify_game_start(&self, game_id: i64) -> Result<(), AppError> {
        let body = serde_json::to_vec(&GameStartMsg { game_id }).map_err(|_| AppError::Unknown)?;
        self.publish(broker::GAME_START_EXCHANGE, "", &body).await
    }

    async fn publish_keystroke(&self, game_id: i64, user_id: &str, word_index: u32, char_index: u32) -> Result<(), AppError> {
        let body = serde_json::to_vec(&KeystrokeMsg {
            game_id,
            user_id: user_id.to_string(),
            word_index,
            char_index,
        })
        .map_err(|_| AppError::Unknown)?;

        let header = serde_json::to_string(&KeystrokeHeader { source: self.server_name.clone() })
            .map_err(|_| AppError::Unknown)?;
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from("source"), AMQPValue::LongString(header.into()));
        let props = BasicProperties::default().with_headers(headers);

        let confirm = self
            .channel
            .basic_publish(broker::GAME_KEYSTROKE_EXCHANGE, "", BasicPublishOptions::default(), &body, props)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "amqp publish failed");
                AppError::Unknown
            })?
            .await
            .map_err(|_| AppError::Unknown)?;

        if confirm.is_nack() {
            return Err(AppError::PublishNotAcknowledged);
        }
        Ok(())
    }
}

/// Drives `basic_consume` on `queue`, handing each delivery's body (and, for
/// keystroke deliveries, its `source` header) to `handler`, then acking or
/// nacking per the returned `AckDecision`. Runs until the channel closes.
pub async fn run_consumer<F, Fut>(channel: Channel, queue: String, consumer_tag: String, handler: F)
where
    F: Fn(Vec<u8>, Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = crate::use_cases::consumers::AckDecision> + Send,
{
    let mut consumer = match channel
        .basic_consume(&queue, &consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
        .await
    {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, queue, "failed to start amqp consumer");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(err) => {
                tracing::error!(error = %err, queue, "amqp delivery error");
                continue;
            }
        };

        let source = delivery
            .properties
            .headers()
            .as_ref()
            .and_then(|headers| headers.inner().get("source"))
            .and_then(|value| value.as_long_string().map(|s| s.to_string()));

        let decision = handler(delivery.data.clone(), source).await;
        let ack_result = match decision {
            crate::use_cases::consumers::AckDecision::Ack => {
                delivery.ack(BasicAckOptions::default()).await
            }
            crate::use_cases::consumers::AckDecision::Nack => {
                delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await
            }
        };
        if let Err(err) = ack_result {
            tracing::error!(error = %err, queue, "failed to ack/nack amqp delivery");
        }
    }
}
