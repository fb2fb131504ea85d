use rand::RngCore;
use sha2::{Digest, Sha256};
use url::Url;

use token_layer::{GenTokenPair, TokenGenerator, UserType};

use crate::domain::errors::AuthError;
use crate::domain::ports::{OauthStateRepo, UserRepo};

pub struct GoogleOauthConfig {
    pub client_id: String,
    pub redirect_url: String,
}

/// `login()`: stashes a random `state` guarded by `SETNX` and returns the
/// provider authorization URL. Grounded on `services/auth.py::login`.
pub struct OauthLoginUseCase<'a, St> {
    pub state_repo: &'a St,
    pub google: &'a GoogleOauthConfig,
}

impl<'a, St> OauthLoginUseCase<'a, St>
where
    St: OauthStateRepo,
{
    pub async fn execute(&self) -> Result<Url, AuthError> {
        let mut bytes = [0u8; 1024];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = hex::encode(Sha256::digest(bytes));

        let stored = self
            .state_repo
            .set_nx(&state)
            .await
            .map_err(|_| AuthError::Unknown)?;
        if !stored {
            return Err(AuthError::Unknown);
        }

        let mut url = Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
            .expect("static provider URL");
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.google.client_id)
            .append_pair("scope", "openid email profile")
            .append_pair("redirect_uri", &self.google.redirect_url)
            .append_pair("state", &state)
            .append_pair("prompt", "select_account");

        Ok(url)
    }
}

/// Resolved identity handed back by whatever provider-exchange client
/// performed the authorization-code exchange.
pub struct ProviderProfile {
    pub provider: &'static str,
    pub provider_uid: String,
    pub name: String,
}

/// `login-redirect`: consumes the one-shot `state`, upserts the user row,
/// and mints a token pair.
pub struct OauthCallbackUseCase<'a, St, U> {
    pub state_repo: &'a St,
    pub user_repo: &'a U,
    pub token_generator: &'a TokenGenerator,
}

impl<'a, St, U> OauthCallbackUseCase<'a, St, U>
where
    St: OauthStateRepo,
    U: UserRepo,
{
    pub async fn execute(
        &self,
        state: &str,
        profile: ProviderProfile,
    ) -> Result<GenTokenPair, AuthError> {
        let valid = self
            .state_repo
            .consume(state)
            .await
            .map_err(|_| AuthError::Unknown)?;
        if !valid {
            return Err(AuthError::InvalidToken);
        }

        let user_id = format!("{}-{}", profile.provider, profile.provider_uid);
        self.user_repo
            .register(&user_id, &profile.name, UserType::Registered)
            .await
            .map_err(|_| AuthError::Unknown)?;

        let pair = self
            .token_generator
            .gen_token_pair(&user_id, &profile.name)
            .map_err(|_| AuthError::Unknown)?;

        self.user_repo
            .set_refresh_token(&user_id, Some(&pair.refresh_token))
            .await
            .map_err(|_| AuthError::Unknown)?;

        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeStateRepo {
        seen: Mutex<std::collections::HashSet<String>>,
    }

    #[async_trait::async_trait]
    impl OauthStateRepo for FakeStateRepo {
        async fn set_nx(&self, state: &str) -> Result<bool, String> {
            Ok(self.seen.lock().unwrap().insert(state.to_string()))
        }

        async fn consume(&self, state: &str) -> Result<bool, String> {
            Ok(self.seen.lock().unwrap().remove(state))
        }
    }

    #[tokio::test]
    async fn when_login_builds_url_then_it_carries_state_and_client_id() {
        let repo = FakeStateRepo {
            seen: Mutex::new(Default::default()),
        };
        let google = GoogleOauthConfig {
            client_id: "client-123".to_string(),
            redirect_url: "https://typephoon.example/callback".to_string(),
        };
        let use_case = OauthLoginUseCase {
            state_repo: &repo,
            google: &google,
        };

        let url = use_case.execute().await.unwrap();

        assert!(url.query_pairs().any(|(k, v)| k == "client_id" && v == "client-123"));
        assert!(url.query_pairs().any(|(k, _)| k == "state"));
    }

    #[tokio::test]
    async fn when_callback_state_was_already_consumed_then_invalid_token() {
        let repo = FakeStateRepo {
            seen: Mutex::new(Default::default()),
        };
        struct FakeUserRepo;
        #[async_trait::async_trait]
        impl UserRepo for FakeUserRepo {
            async fn register(
                &self,
                _id: &str,
                _name: &str,
                _user_type: UserType,
            ) -> Result<(), String> {
                Ok(())
            }
            async fn get(&self, _id: &str) -> Result<Option<crate::domain::User>, String> {
                Ok(None)
            }
            async fn set_refresh_token(&self, _id: &str, _token: Option<&str>) -> Result<(), String> {
                Ok(())
            }
        }

        use token_layer::{TokenDurations, TokenKeys};
        let generator = TokenGenerator::new(
            TokenKeys {
                private_key_pem: Vec::new(),
                public_key_pem: Vec::new(),
            },
            TokenDurations {
                access_seconds: 900,
                refresh_seconds: 3600,
            },
        );

        let use_case = OauthCallbackUseCase {
            state_repo: &repo,
            user_repo: &FakeUserRepo,
            token_generator: &generator,
        };

        let result = use_case
            .execute(
                "never-issued",
                ProviderProfile {
                    provider: "google",
                    provider_uid: "1".to_string(),
                    name: "Ada".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
