use token_layer::{GuestTokenRepo, TokenGenerator, UserType};

use crate::domain::errors::AuthError;

/// Mints a fresh guest identity and a one-shot key the client exchanges
/// for the token via `GET /auth/guest-token?key=`.
pub struct GuestLoginResponse {
    pub guest_token_key: String,
}

pub struct GuestLoginUseCase<'a, S> {
    pub token_generator: &'a TokenGenerator,
    pub guest_token_repo: &'a S,
}

impl<'a, S> GuestLoginUseCase<'a, S>
where
    S: GuestTokenRepo,
{
    pub async fn execute(&self, guest_id: &str) -> Result<GuestLoginResponse, AuthError> {
        let token = self
            .token_generator
            .gen_access_token(guest_id, guest_id, UserType::Guest)
            .map_err(|_| AuthError::Unknown)?;

        let key = self
            .guest_token_repo
            .store(&token)
            .await
            .map_err(|_| AuthError::Unknown)?;

        Ok(GuestLoginResponse {
            guest_token_key: key,
        })
    }
}

/// Redeems a one-shot guest-token key minted by `GuestLoginUseCase`
/// (or by `game_server`'s QueueIn join path) for the actual token.
pub struct RedeemGuestTokenUseCase<'a, S> {
    pub guest_token_repo: &'a S,
}

impl<'a, S> RedeemGuestTokenUseCase<'a, S>
where
    S: GuestTokenRepo,
{
    pub async fn execute(&self, key: &str) -> Result<String, AuthError> {
        self.guest_token_repo
            .get(key)
            .await
            .map_err(|_| AuthError::Unknown)?
            .ok_or(AuthError::KeyNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeGuestTokenRepo {
        store: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait::async_trait]
    impl GuestTokenRepo for FakeGuestTokenRepo {
        async fn store(&self, token: &str) -> Result<String, String> {
            let key = format!("guest-token-{}", self.store.lock().unwrap().len());
            self.store
                .lock()
                .unwrap()
                .insert(key.clone(), token.to_string());
            Ok(key)
        }

        async fn get(&self, key: &str) -> Result<Option<String>, String> {
            Ok(self.store.lock().unwrap().remove(key))
        }
    }

    #[tokio::test]
    async fn when_guest_token_key_is_redeemed_then_second_redeem_returns_key_not_found() {
        let repo = FakeGuestTokenRepo {
            store: Mutex::new(std::collections::HashMap::from([(
                "k1".to_string(),
                "tok".to_string(),
            )])),
        };
        let use_case = RedeemGuestTokenUseCase {
            guest_token_repo: &repo,
        };

        let first = use_case.execute("k1").await.unwrap();
        assert_eq!(first, "tok");

        let second = use_case.execute("k1").await;
        assert!(matches!(second, Err(AuthError::KeyNotFound)));
    }
}
