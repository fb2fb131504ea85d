use crate::domain::entities::GameUserInfo;
use crate::domain::errors::AppError;
use crate::domain::ports::{BrokerPort, Clock, GameCacheRepo, GameRepo, LobbyCacheRepo, WordGenerator};
use crate::interface_adapters::protocol::LobbyCountdownMsg;

use super::AckDecision;

const GENERATED_WORD_COUNT: usize = 25;

/// Fires once the lobby's own countdown wait-queue delay expires. Idempotent
/// against the `QueueIn` fast path filling the last seat first: both paths
/// flip the row to `IN_GAME` under the same `start_at IS NOT NULL` guard, so
/// whichever gets there first wins and this one quietly no-ops.
pub struct LobbyCountdownConsumer<'a, G, L, C, B> {
    pub game_repo: &'a G,
    pub lobby_cache_repo: &'a L,
    pub game_cache_repo: &'a C,
    pub broker: &'a B,
    pub word_generator: &'a dyn WordGenerator,
    pub clock: &'a dyn Clock,
    pub start_countdown_secs: i64,
}

impl<'a, G, L, C, B> LobbyCountdownConsumer<'a, G, L, C, B>
where
    G: GameRepo,
    L: LobbyCacheRepo,
    C: GameCacheRepo,
    B: BrokerPort,
{
    async fn set_game_status(&self, game_id: i64) -> Result<bool, AppError> {
        let game = match self.game_repo.get(game_id).await? {
            Some(game) => game,
            None => {
                tracing::warn!(game_id, "game doesn't exist");
                return Ok(false);
            }
        };
        if game.start_at.is_some() {
            tracing::debug!(game_id, "game already started");
            return Ok(false);
        }

        self.game_repo.start_game(game_id, self.clock.now()).await?;
        Ok(true)
    }

    async fn populate_game_cache(&self, game_id: i64, words: &str) -> Result<(), AppError> {
        let players = self.lobby_cache_repo.get_players(game_id).await?.unwrap_or_default();
        for info in players {
            self.game_cache_repo
                .update_player_cache(game_id, GameUserInfo::from_lobby_cache(&info))
                .await?;
        }
        self.game_cache_repo.set_words(game_id, words).await?;

        if let Some(lobby_start) = self.lobby_cache_repo.get_start_time(game_id).await? {
            let start_time = lobby_start + chrono::Duration::seconds(self.start_countdown_secs);
            self.game_cache_repo.set_start_time(game_id, start_time).await?;
        }

        self.lobby_cache_repo.clear_cache(game_id).await?;
        Ok(())
    }

    async fn process(&self, msg: &LobbyCountdownMsg) -> Result<(), AppError> {
        // Generated up front, same as the source: a wasted shuffle on the
        // no-op path is cheaper than a query before we know we need it.
        let words = self.word_generator.generate(GENERATED_WORD_COUNT);

        if !self.set_game_status(msg.game_id).await? {
            return Ok(());
        }

        self.populate_game_cache(msg.game_id, &words).await?;
        self.broker.schedule_game_start(msg.game_id).await?;
        self.broker.notify_game_start(msg.game_id).await?;
        Ok(())
    }

    pub async fn handle(&self, body: &[u8]) -> AckDecision {
        let msg: LobbyCountdownMsg = match serde_json::from_slice(body) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "drop bad lobby-countdown message");
                return AckDecision::Ack;
            }
        };

        match self.process(&msg).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                tracing::error!(error = %err, game_id = msg.game_id, "lobby countdown processing failed");
                AckDecision::Nack
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Game, GameStatus, GameType, LobbyUserInfo};
    use crate::domain::ports::CacheLockGuard;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    struct NoopLock;
    impl CacheLockGuard for NoopLock {}

    struct FakeClock(DateTime<Utc>);
    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct FixedWords;
    impl WordGenerator for FixedWords {
        fn generate(&self, word_count: usize) -> String {
            vec!["word"; word_count].join(" ")
        }
    }

    struct FakeGameRepo {
        game: Mutex<Game>,
    }

    #[async_trait]
    impl GameRepo for FakeGameRepo {
        async fn create(&self) -> Result<Game, AppError> {
            unimplemented!()
        }
        async fn get_joinable_for_update(&self, _: i64) -> Result<Option<Game>, AppError> {
            unimplemented!()
        }
        async fn get_for_update(&self, _: i64) -> Result<Option<Game>, AppError> {
            unimplemented!()
        }
        async fn get(&self, id: i64) -> Result<Option<Game>, AppError> {
            let game = self.game.lock().unwrap();
            Ok((game.id == id).then(|| game.clone()))
        }
        async fn increase_player_count(&self, _: i64) -> Result<Game, AppError> {
            unimplemented!()
        }
        async fn decrease_player_count(&self, _: i64) -> Result<Game, AppError> {
            unimplemented!()
        }
        async fn start_game(&self, _id: i64, now: DateTime<Utc>) -> Result<Game, AppError> {
            let mut game = self.game.lock().unwrap();
            game.status = GameStatus::InGame;
            game.start_at = Some(now);
            Ok(game.clone())
        }
        async fn increase_finish_count(&self, _: i64) -> Result<Option<Game>, AppError> {
            unimplemented!()
        }
        async fn set_finished(&self, _: i64, _: DateTime<Utc>) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn status(&self, _: i64) -> Result<Option<GameStatus>, AppError> {
            unimplemented!()
        }
    }

    struct FakeLobbyCache {
        players: Vec<LobbyUserInfo>,
        start_time: Option<DateTime<Utc>>,
        cleared: Mutex<bool>,
    }

    #[async_trait]
    impl LobbyCacheRepo for FakeLobbyCache {
        async fn add_player(&self, _: i64, _: LobbyUserInfo) -> Result<bool, AppError> {
            unimplemented!()
        }
        async fn is_new_player(&self, _: i64, _: &str) -> Result<bool, AppError> {
            unimplemented!()
        }
        async fn remove_player(&self, _: i64, _: &str) -> Result<bool, AppError> {
            unimplemented!()
        }
        async fn get_players(&self, _: i64) -> Result<Option<Vec<LobbyUserInfo>>, AppError> {
            Ok(Some(self.players.clone()))
        }
        async fn set_start_time(&self, _: i64, _: DateTime<Utc>) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn get_start_time(&self, _: i64) -> Result<Option<DateTime<Utc>>, AppError> {
            Ok(self.start_time)
        }
        async fn clear_cache(&self, _: i64) -> Result<(), AppError> {
            *self.cleared.lock().unwrap() = true;
            Ok(())
        }
        async fn lock(&self, _: i64) -> Result<Box<dyn CacheLockGuard>, AppError> {
            Ok(Box::new(NoopLock))
        }
    }

    #[derive(Default)]
    struct FakeGameCache {
        words: Mutex<Option<String>>,
        start_time: Mutex<Option<DateTime<Utc>>>,
        players: Mutex<Vec<GameUserInfo>>,
    }

    #[async_trait]
    impl GameCacheRepo for FakeGameCache {
        async fn update_player_cache(&self, _: i64, info: GameUserInfo) -> Result<(), AppError> {
            self.players.lock().unwrap().push(info);
            Ok(())
        }
        async fn get_players(&self, _: i64) -> Result<Option<Vec<GameUserInfo>>, AppError> {
            Ok(Some(self.players.lock().unwrap().clone()))
        }
        async fn get_words(&self, _: i64) -> Result<Option<String>, AppError> {
            Ok(self.words.lock().unwrap().clone())
        }
        async fn set_words(&self, _: i64, words: &str) -> Result<(), AppError> {
            *self.words.lock().unwrap() = Some(words.to_string());
            Ok(())
        }
        async fn get_start_time(&self, _: i64) -> Result<Option<DateTime<Utc>>, AppError> {
            Ok(*self.start_time.lock().unwrap())
        }
        async fn set_start_time(&self, _: i64, at: DateTime<Utc>) -> Result<(), AppError> {
            *self.start_time.lock().unwrap() = Some(at);
            Ok(())
        }
        async fn clear_cache(&self, _: i64) -> Result<(), AppError> {
            Ok(())
        }
        async fn lock(&self, _: i64) -> Result<Box<dyn CacheLockGuard>, AppError> {
            Ok(Box::new(NoopLock))
        }
    }

    #[derive(Default)]
    struct FakeBroker {
        scheduled_starts: Mutex<Vec<i64>>,
        game_starts: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl BrokerPort for FakeBroker {
        async fn schedule_lobby_countdown(&self, _: i64) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn schedule_game_cleanup(&self, _: i64) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn schedule_game_start(&self, game_id: i64) -> Result<(), AppError> {
            self.scheduled_starts.lock().unwrap().push(game_id);
            Ok(())
        }
        async fn notify_user_joined(&self, _: i64) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn notify_user_left(&self, _: i64) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn notify_game_start(&self, game_id: i64) -> Result<(), AppError> {
            self.game_starts.lock().unwrap().push(game_id);
            Ok(())
        }
        async fn publish_keystroke(&self, _: i64, _: &str, _: u32, _: u32) -> Result<(), AppError> {
            unimplemented!()
        }
    }

    fn new_game(id: i64) -> Game {
        Game {
            id,
            created_at: Utc::now(),
            start_at: None,
            end_at: None,
            status: GameStatus::Lobby,
            invite_token: None,
            game_type: GameType::Multi,
            player_count: 3,
            finish_count: 0,
        }
    }

    #[tokio::test]
    async fn when_countdown_fires_for_a_still_open_lobby_then_game_starts_and_cache_is_populated() {
        let now = Utc::now();
        let game_repo = FakeGameRepo { game: Mutex::new(new_game(1)) };
        let lobby_cache = FakeLobbyCache {
            players: vec![LobbyUserInfo { id: "u1".into(), name: "alice".into() }],
            start_time: Some(now),
            cleared: Mutex::new(false),
        };
        let game_cache = FakeGameCache::default();
        let broker = FakeBroker::default();
        let clock = FakeClock(now);
        let words = FixedWords;

        let consumer = LobbyCountdownConsumer {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            start_countdown_secs: 5,
        };

        let body = serde_json::to_vec(&LobbyCountdownMsg { game_id: 1 }).unwrap();
        let decision = consumer.handle(&body).await;

        assert_eq!(decision, AckDecision::Ack);
        assert_eq!(game_repo.game.lock().unwrap().status, GameStatus::InGame);
        assert_eq!(game_cache.players.lock().unwrap().len(), 1);
        assert!(game_cache.words.lock().unwrap().is_some());
        assert_eq!(
            *game_cache.start_time.lock().unwrap(),
            Some(now + chrono::Duration::seconds(5))
        );
        assert!(*lobby_cache.cleared.lock().unwrap());
        assert_eq!(broker.scheduled_starts.lock().unwrap().as_slice(), &[1]);
        assert_eq!(broker.game_starts.lock().unwrap().as_slice(), &[1]);
    }

    #[tokio::test]
    async fn when_game_already_started_then_countdown_is_a_noop() {
        let now = Utc::now();
        let mut game = new_game(2);
        game.status = GameStatus::InGame;
        game.start_at = Some(now);
        let game_repo = FakeGameRepo { game: Mutex::new(game) };
        let lobby_cache = FakeLobbyCache {
            players: Vec::new(),
            start_time: None,
            cleared: Mutex::new(false),
        };
        let game_cache = FakeGameCache::default();
        let broker = FakeBroker::default();
        let clock = FakeClock(now);
        let words = FixedWords;

        let consumer = LobbyCountdownConsumer {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            start_countdown_secs: 5,
        };

        let body = serde_json::to_vec(&LobbyCountdownMsg { game_id: 2 }).unwrap();
        let decision = consumer.handle(&body).await;

        assert_eq!(decision, AckDecision::Ack);
        assert!(!*lobby_cache.cleared.lock().unwrap());
        assert!(broker.scheduled_starts.lock().unwrap().is_empty());
        assert!(broker.game_starts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn when_body_is_not_json_then_message_is_acked_and_dropped() {
        let game_repo = FakeGameRepo { game: Mutex::new(new_game(3)) };
        let lobby_cache = FakeLobbyCache {
            players: Vec::new(),
            start_time: None,
            cleared: Mutex::new(false),
        };
        let game_cache = FakeGameCache::default();
        let broker = FakeBroker::default();
        let clock = FakeClock(Utc::now());
        let words = FixedWords;

        let consumer = LobbyCountdownConsumer {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            start_countdown_secs: 5,
        };

        assert_eq!(consumer.handle(b"not json").await, AckDecision::Ack);
    }
}
