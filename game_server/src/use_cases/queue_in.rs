use chrono::Duration;
use token_layer::{TokenGenerator, TokenValidator, UserType};
use uuid::Uuid;

use crate::domain::entities::{GameStatus, GameType, GameUserInfo, LobbyUserInfo};
use crate::domain::errors::AppError;
use crate::domain::ports::{BrokerPort, Clock, GameCacheRepo, GameRepo, GuestTokenRepo, LobbyCacheRepo, WordGenerator};
use crate::interface_adapters::protocol::QueueInType;

const GENERATED_WORD_COUNT: usize = 25;

struct ProcessTokenRet {
    user_info: LobbyUserInfo,
    guest_token_key: Option<String>,
}

/// Result of a successful join, handed to `interface_adapters::ws` so it can
/// register the caller's `SessionConnection` in the right `SessionGroup`.
pub struct QueueInOutcome {
    pub user_info: LobbyUserInfo,
    pub game_id: i64,
    pub guest_token_key: Option<String>,
}

fn gen_guest_user_info() -> LobbyUserInfo {
    let id = Uuid::new_v4().simple().to_string();
    LobbyUserInfo {
        id: format!("guest-{id}"),
        name: format!("guest-{}", &id[..8]),
    }
}

pub struct QueueInService<'a, G, L, C, T, B> {
    pub game_repo: &'a G,
    pub lobby_cache_repo: &'a L,
    pub game_cache_repo: &'a C,
    pub guest_token_repo: &'a T,
    pub broker: &'a B,
    pub word_generator: &'a dyn WordGenerator,
    pub clock: &'a dyn Clock,
    pub token_generator: &'a TokenGenerator,
    pub token_validator: &'a TokenValidator,
    pub player_limit: i64,
    pub lobby_countdown_secs: i64,
    pub start_countdown_secs: i64,
}

impl<'a, G, L, C, T, B> QueueInService<'a, G, L, C, T, B>
where
    G: GameRepo,
    L: LobbyCacheRepo,
    C: GameCacheRepo,
    T: GuestTokenRepo,
    B: BrokerPort,
{
    async fn process_token(&self, access_token: Option<&str>) -> Result<ProcessTokenRet, AppError> {
        match access_token {
            None => {
                let user_info = gen_guest_user_info();
                let token = self
                    .token_generator
                    .gen_access_token(&user_info.id, &user_info.name, UserType::Guest)
                    .map_err(|_| AppError::Unknown)?;
                let guest_token_key = self
                    .guest_token_repo
                    .store(&token)
                    .await
                    .map_err(|_| AppError::Unknown)?;
                Ok(ProcessTokenRet {
                    user_info,
                    guest_token_key: Some(guest_token_key),
                })
            }
            Some(token) => {
                let claims = self.token_validator.validate(token).map_err(|_| AppError::InvalidToken)?;
                Ok(ProcessTokenRet {
                    user_info: LobbyUserInfo {
                        id: claims.sub,
                        name: claims.name,
                    },
                    guest_token_key: None,
                })
            }
        }
    }

    async fn find_game(
        &self,
        queue_in_type: QueueInType,
        prev_game_id: Option<i64>,
        user_id: &str,
    ) -> Result<Option<crate::domain::entities::Game>, AppError> {
        if let (QueueInType::Reconnect, Some(prev_game_id)) = (queue_in_type, prev_game_id) {
            let new_player = self.lobby_cache_repo.is_new_player(prev_game_id, user_id).await?;
            let game = self.game_repo.get_for_update(prev_game_id).await?;
            // A known cache member is let back in even at capacity. A new
            // player (stale reconnect, cache forgot them) only gets in if
            // there's still room; otherwise this returns `None` so the
            // caller falls through to `create_game`, same as the original —
            // never reroute into some other, unrelated lobby.
            return Ok(game.filter(|g| !new_player || (g.player_count as i64) < self.player_limit));
        }
        self.game_repo.get_joinable_for_update(self.player_limit).await
    }

    async fn join_game(&self, game_id: i64, user_info: &LobbyUserInfo) -> Result<bool, AppError> {
        let _lock = self.lobby_cache_repo.lock(game_id).await?;
        let new_player = self.lobby_cache_repo.add_player(game_id, user_info.clone()).await?;
        drop(_lock);

        if !new_player {
            return Ok(false);
        }

        let game = self.game_repo.increase_player_count(game_id).await?;
        Ok(game.player_count >= self.player_limit as i32)
    }

    async fn create_game(&self) -> Result<i64, AppError> {
        let game = self.game_repo.create().await?;
        debug_assert_eq!(game.status, GameStatus::Lobby);
        debug_assert_eq!(game.game_type, GameType::Multi);

        self.broker.schedule_lobby_countdown(game.id).await?;

        let start_time = self.clock.now() + Duration::seconds(self.lobby_countdown_secs);
        self.lobby_cache_repo.set_start_time(game.id, start_time).await?;

        Ok(game.id)
    }

    async fn populate_game_cache(&self, game_id: i64, words: &str) -> Result<(), AppError> {
        let players = self
            .lobby_cache_repo
            .get_players(game_id)
            .await?
            .unwrap_or_default();
        for info in players {
            self.game_cache_repo
                .update_player_cache(game_id, GameUserInfo::from_lobby_cache(&info))
                .await?;
        }
        self.game_cache_repo.set_words(game_id, words).await?;

        if let Some(lobby_start) = self.lobby_cache_repo.get_start_time(game_id).await? {
            let start_time = lobby_start + Duration::seconds(self.start_countdown_secs);
            self.game_cache_repo.set_start_time(game_id, start_time).await?;
        }

        self.lobby_cache_repo.clear_cache(game_id).await?;
        Ok(())
    }

    /// Runs the full join algorithm: validate/mint token, find-or-create a
    /// joinable game under a row lock, join it, and — if this join fills the
    /// game — flip it to `IN_GAME` and kick off the game-start timer.
    ///
    /// Registering the resulting `SessionConnection` and accepting the
    /// transport is the caller's job; this only decides game membership.
    pub async fn join(
        &self,
        access_token: Option<&str>,
        queue_in_type: QueueInType,
        prev_game_id: Option<i64>,
    ) -> Result<QueueInOutcome, AppError> {
        let processed = self.process_token(access_token).await?;

        let game = self
            .find_game(queue_in_type, prev_game_id, &processed.user_info.id)
            .await?;

        let game_id = match game {
            Some(game) => game.id,
            None => self.create_game().await?,
        };
        let game_full = self.join_game(game_id, &processed.user_info).await?;

        if game_full {
            // Flips the row to IN_GAME and populates GameCache right away. This
            // races the `lobby_countdown` consumer's slow path; whichever gets
            // there first wins, and `lobby_countdown` no-ops once `start_at` is
            // already set. Both paths do the same three things: populate
            // GameCache with the word list, schedule the game-start wait
            // message, and publish the game-start notification.
            let words = self.word_generator.generate(GENERATED_WORD_COUNT);
            self.game_repo.start_game(game_id, self.clock.now()).await?;
            self.populate_game_cache(game_id, &words).await?;
            self.broker.schedule_game_start(game_id).await?;
            self.broker.notify_game_start(game_id).await?;
        }

        self.broker.notify_user_joined(game_id).await?;

        Ok(QueueInOutcome {
            user_info: processed.user_info,
            game_id,
            guest_token_key: processed.guest_token_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Game, GameStatus, GameType};
    use crate::domain::ports::CacheLockGuard;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;
    use token_layer::{TokenDurations, TokenKeys};

    struct NoopLock;
    impl CacheLockGuard for NoopLock {}

    struct FakeClock(DateTime<Utc>);
    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct FixedWords;
    impl crate::domain::ports::WordGenerator for FixedWords {
        fn generate(&self, word_count: usize) -> String {
            vec!["word"; word_count].join(" ")
        }
    }

    struct FakeGameRepo {
        games: Mutex<Vec<Game>>,
        next_id: Mutex<i64>,
    }

    impl FakeGameRepo {
        fn empty() -> Self {
            Self {
                games: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
            }
        }

        fn with_open_game(player_count: i32) -> Self {
            let repo = Self::empty();
            repo.games.lock().unwrap().push(Game {
                id: 1,
                created_at: Utc::now(),
                start_at: None,
                end_at: None,
                status: GameStatus::Lobby,
                invite_token: None,
                game_type: GameType::Multi,
                player_count,
                finish_count: 0,
            });
            *repo.next_id.lock().unwrap() = 2;
            repo
        }
    }

    #[async_trait]
    impl GameRepo for FakeGameRepo {
        async fn create(&self) -> Result<Game, AppError> {
            let mut id_guard = self.next_id.lock().unwrap();
            let id = *id_guard;
            *id_guard += 1;
            let game = Game {
                id,
                created_at: Utc::now(),
                start_at: None,
                end_at: None,
                status: GameStatus::Lobby,
                invite_token: None,
                game_type: GameType::Multi,
                player_count: 0,
                finish_count: 0,
            };
            self.games.lock().unwrap().push(game.clone());
            Ok(game)
        }

        async fn get_joinable_for_update(&self, player_limit: i64) -> Result<Option<Game>, AppError> {
            Ok(self
                .games
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.status == GameStatus::Lobby && (g.player_count as i64) < player_limit)
                .cloned())
        }

        async fn get_for_update(&self, id: i64) -> Result<Option<Game>, AppError> {
            self.get(id).await
        }

        async fn get(&self, id: i64) -> Result<Option<Game>, AppError> {
            Ok(self.games.lock().unwrap().iter().find(|g| g.id == id).cloned())
        }

        async fn increase_player_count(&self, id: i64) -> Result<Game, AppError> {
            let mut games = self.games.lock().unwrap();
            let game = games.iter_mut().find(|g| g.id == id).ok_or(AppError::GameNotFound)?;
            game.player_count += 1;
            Ok(game.clone())
        }

        async fn decrease_player_count(&self, id: i64) -> Result<Game, AppError> {
            let mut games = self.games.lock().unwrap();
            let game = games.iter_mut().find(|g| g.id == id).ok_or(AppError::GameNotFound)?;
            game.player_count -= 1;
            Ok(game.clone())
        }

        async fn start_game(&self, id: i64, now: DateTime<Utc>) -> Result<Game, AppError> {
            let mut games = self.games.lock().unwrap();
            let game = games.iter_mut().find(|g| g.id == id).ok_or(AppError::GameNotFound)?;
            game.status = GameStatus::InGame;
            game.start_at = Some(now);
            Ok(game.clone())
        }

        async fn increase_finish_count(&self, _id: i64) -> Result<Option<Game>, AppError> {
            unimplemented!("not exercised by queue_in tests")
        }

        async fn set_finished(&self, _id: i64, _now: DateTime<Utc>) -> Result<(), AppError> {
            unimplemented!("not exercised by queue_in tests")
        }

        async fn status(&self, id: i64) -> Result<Option<GameStatus>, AppError> {
            Ok(self.get(id).await?.map(|g| g.status))
        }
    }

    struct FakeLobbyCache {
        players: Mutex<std::collections::HashMap<i64, Vec<LobbyUserInfo>>>,
    }

    impl FakeLobbyCache {
        fn new() -> Self {
            Self {
                players: Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl LobbyCacheRepo for FakeLobbyCache {
        async fn add_player(&self, game_id: i64, info: LobbyUserInfo) -> Result<bool, AppError> {
            let mut players = self.players.lock().unwrap();
            let entry = players.entry(game_id).or_default();
            if entry.iter().any(|p| p.id == info.id) {
                return Ok(false);
            }
            entry.push(info);
            Ok(true)
        }

        async fn is_new_player(&self, game_id: i64, user_id: &str) -> Result<bool, AppError> {
            let players = self.players.lock().unwrap();
            Ok(players
                .get(&game_id)
                .map(|p| !p.iter().any(|x| x.id == user_id))
                .unwrap_or(true))
        }

        async fn remove_player(&self, game_id: i64, user_id: &str) -> Result<bool, AppError> {
            let mut players = self.players.lock().unwrap();
            if let Some(entry) = players.get_mut(&game_id) {
                let before = entry.len();
                entry.retain(|p| p.id != user_id);
                return Ok(entry.len() != before);
            }
            Ok(false)
        }

        async fn get_players(&self, game_id: i64) -> Result<Option<Vec<LobbyUserInfo>>, AppError> {
            Ok(self.players.lock().unwrap().get(&game_id).cloned())
        }

        async fn set_start_time(&self, _game_id: i64, _at: DateTime<Utc>) -> Result<(), AppError> {
            Ok(())
        }

        async fn get_start_time(&self, _game_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
            Ok(None)
        }

        async fn clear_cache(&self, game_id: i64) -> Result<(), AppError> {
            self.players.lock().unwrap().remove(&game_id);
            Ok(())
        }

        async fn lock(&self, _game_id: i64) -> Result<Box<dyn CacheLockGuard>, AppError> {
            Ok(Box::new(NoopLock))
        }
    }

    struct FakeGameCache {
        updated: Mutex<Vec<(i64, String)>>,
        words: Mutex<Option<String>>,
    }

    impl FakeGameCache {
        fn new() -> Self {
            Self {
                updated: Mutex::new(Vec::new()),
                words: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl GameCacheRepo for FakeGameCache {
        async fn update_player_cache(&self, game_id: i64, info: GameUserInfo) -> Result<(), AppError> {
            self.updated.lock().unwrap().push((game_id, info.id));
            Ok(())
        }

        async fn get_players(&self, _game_id: i64) -> Result<Option<Vec<GameUserInfo>>, AppError> {
            Ok(None)
        }

        async fn get_words(&self, _game_id: i64) -> Result<Option<String>, AppError> {
            Ok(self.words.lock().unwrap().clone())
        }

        async fn set_words(&self, _game_id: i64, words: &str) -> Result<(), AppError> {
            *self.words.lock().unwrap() = Some(words.to_string());
            Ok(())
        }

        async fn get_start_time(&self, _game_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
            Ok(None)
        }

        async fn set_start_time(&self, _game_id: i64, _at: DateTime<Utc>) -> Result<(), AppError> {
            Ok(())
        }

        async fn clear_cache(&self, _game_id: i64) -> Result<(), AppError> {
            Ok(())
        }

        async fn lock(&self, _game_id: i64) -> Result<Box<dyn CacheLockGuard>, AppError> {
            Ok(Box::new(NoopLock))
        }
    }

    struct FakeGuestTokens {
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GuestTokenRepo for FakeGuestTokens {
        async fn store(&self, token: &str) -> Result<String, String> {
            self.stored.lock().unwrap().push(token.to_string());
            Ok("guest-key-1".to_string())
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, String> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct FakeBroker {
        user_joined: Mutex<Vec<i64>>,
        game_starts: Mutex<Vec<i64>>,
        scheduled_starts: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl BrokerPort for FakeBroker {
        async fn schedule_lobby_countdown(&self, _game_id: i64) -> Result<(), AppError> {
            Ok(())
        }
        async fn schedule_game_cleanup(&self, _game_id: i64) -> Result<(), AppError> {
            Ok(())
        }
        async fn schedule_game_start(&self, game_id: i64) -> Result<(), AppError> {
            self.scheduled_starts.lock().unwrap().push(game_id);
            Ok(())
        }
        async fn notify_user_joined(&self, game_id: i64) -> Result<(), AppError> {
            self.user_joined.lock().unwrap().push(game_id);
            Ok(())
        }
        async fn notify_user_left(&self, _game_id: i64) -> Result<(), AppError> {
            Ok(())
        }
        async fn notify_game_start(&self, game_id: i64) -> Result<(), AppError> {
            self.game_starts.lock().unwrap().push(game_id);
            Ok(())
        }
        async fn publish_keystroke(
            &self,
            _game_id: i64,
            _user_id: &str,
            _word_index: u32,
            _char_index: u32,
        ) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn test_token_layer() -> (TokenGenerator, TokenValidator) {
        use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
        use rsa::{RsaPrivateKey, RsaPublicKey};

        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        let keys = TokenKeys {
            private_key_pem: private.to_pkcs1_pem(Default::default()).unwrap().as_bytes().to_vec(),
            public_key_pem: public.to_pkcs1_pem(Default::default()).unwrap().into_bytes(),
        };
        let durations = TokenDurations {
            access_seconds: 900,
            refresh_seconds: 86400,
        };
        (
            TokenGenerator::new(keys.clone(), durations),
            TokenValidator::new(keys),
        )
    }

    #[tokio::test]
    async fn when_guest_joins_a_new_lobby_then_a_game_is_created_and_not_started() {
        let game_repo = FakeGameRepo::empty();
        let lobby_cache = FakeLobbyCache::new();
        let game_cache = FakeGameCache::new();
        let guest_tokens = FakeGuestTokens { stored: Mutex::new(Vec::new()) };
        let broker = FakeBroker::default();
        let clock = FakeClock(Utc::now());
        let words = FixedWords;
        let (token_generator, token_validator) = test_token_layer();

        let service = QueueInService {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            guest_token_repo: &guest_tokens,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            token_generator: &token_generator,
            token_validator: &token_validator,
            player_limit: 5,
            lobby_countdown_secs: 5,
            start_countdown_secs: 5,
        };

        let outcome = service.join(None, QueueInType::New, None).await.unwrap();

        assert_eq!(outcome.game_id, 1);
        assert!(outcome.guest_token_key.is_some());
        assert_eq!(broker.user_joined.lock().unwrap().as_slice(), &[1]);
        assert!(broker.game_starts.lock().unwrap().is_empty());
        assert_eq!(
            game_repo.get(1).await.unwrap().unwrap().status,
            GameStatus::Lobby
        );
    }

    #[tokio::test]
    async fn when_the_last_seat_is_filled_then_game_starts_and_cache_is_populated() {
        let game_repo = FakeGameRepo::with_open_game(4);
        let lobby_cache = FakeLobbyCache::new();
        lobby_cache
            .add_player(
                1,
                LobbyUserInfo {
                    id: "u1".into(),
                    name: "alice".into(),
                },
            )
            .await
            .unwrap();
        let game_cache = FakeGameCache::new();
        let guest_tokens = FakeGuestTokens { stored: Mutex::new(Vec::new()) };
        let broker = FakeBroker::default();
        let clock = FakeClock(Utc::now());
        let words = FixedWords;
        let (token_generator, token_validator) = test_token_layer();

        let service = QueueInService {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            guest_token_repo: &guest_tokens,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            token_generator: &token_generator,
            token_validator: &token_validator,
            player_limit: 5,
            lobby_countdown_secs: 5,
            start_countdown_secs: 5,
        };

        let outcome = service.join(None, QueueInType::New, None).await.unwrap();

        assert_eq!(outcome.game_id, 1);
        assert_eq!(broker.game_starts.lock().unwrap().as_slice(), &[1]);
        assert_eq!(broker.scheduled_starts.lock().unwrap().as_slice(), &[1]);
        assert_eq!(
            game_repo.get(1).await.unwrap().unwrap().status,
            GameStatus::InGame
        );
        assert!(!game_cache.updated.lock().unwrap().is_empty());
        assert!(game_cache.words.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn when_a_known_member_reconnects_to_a_full_game_then_they_are_let_back_in() {
        let game_repo = FakeGameRepo::with_open_game(5);
        let lobby_cache = FakeLobbyCache::new();
        lobby_cache
            .add_player(1, LobbyUserInfo { id: "u1".into(), name: "alice".into() })
            .await
            .unwrap();
        let game_cache = FakeGameCache::new();
        let guest_tokens = FakeGuestTokens { stored: Mutex::new(Vec::new()) };
        let broker = FakeBroker::default();
        let clock = FakeClock(Utc::now());
        let words = FixedWords;
        let (token_generator, token_validator) = test_token_layer();
        let token = token_generator.gen_access_token("u1", "alice", UserType::Registered).unwrap();

        let service = QueueInService {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            guest_token_repo: &guest_tokens,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            token_generator: &token_generator,
            token_validator: &token_validator,
            player_limit: 5,
            lobby_countdown_secs: 5,
            start_countdown_secs: 5,
        };

        let outcome = service
            .join(Some(&token), QueueInType::Reconnect, Some(1))
            .await
            .unwrap();

        assert_eq!(outcome.game_id, 1);
    }

    #[tokio::test]
    async fn when_a_stale_reconnect_targets_a_full_game_then_a_new_game_is_created() {
        let game_repo = FakeGameRepo::with_open_game(5);
        let lobby_cache = FakeLobbyCache::new();
        let game_cache = FakeGameCache::new();
        let guest_tokens = FakeGuestTokens { stored: Mutex::new(Vec::new()) };
        let broker = FakeBroker::default();
        let clock = FakeClock(Utc::now());
        let words = FixedWords;
        let (token_generator, token_validator) = test_token_layer();
        let token = token_generator.gen_access_token("u2", "bob", UserType::Registered).unwrap();

        let service = QueueInService {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            guest_token_repo: &guest_tokens,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            token_generator: &token_generator,
            token_validator: &token_validator,
            player_limit: 5,
            lobby_countdown_secs: 5,
            start_countdown_secs: 5,
        };

        // u2 isn't a cache member of game 1 (full), and is advertised as a
        // reconnect to it — must not be rerouted into some other lobby.
        let outcome = service
            .join(Some(&token), QueueInType::Reconnect, Some(1))
            .await
            .unwrap();

        assert_eq!(outcome.game_id, 2);
    }

    #[tokio::test]
    async fn when_registered_user_presents_an_invalid_token_then_invalid_token_error() {
        let game_repo = FakeGameRepo::empty();
        let lobby_cache = FakeLobbyCache::new();
        let game_cache = FakeGameCache::new();
        let guest_tokens = FakeGuestTokens { stored: Mutex::new(Vec::new()) };
        let broker = FakeBroker::default();
        let clock = FakeClock(Utc::now());
        let words = FixedWords;
        let (token_generator, token_validator) = test_token_layer();

        let service = QueueInService {
            game_repo: &game_repo,
            lobby_cache_repo: &lobby_cache,
            game_cache_repo: &game_cache,
            guest_token_repo: &guest_tokens,
            broker: &broker,
            word_generator: &words,
            clock: &clock,
            token_generator: &token_generator,
            token_validator: &token_validator,
            player_limit: 5,
            lobby_countdown_secs: 5,
            start_countdown_secs: 5,
        };

        let result = service.join(Some("not-a-jwt"), QueueInType::New, None).await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }
}
