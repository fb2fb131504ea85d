use token_layer::{GenTokenPair, TokenGenerator, TokenValidator};

use crate::domain::errors::AuthError;
use crate::domain::ports::UserRepo;

/// Validates the refresh cookie, checks it still matches the stored
/// `users.refresh_token` (a stale/rotated cookie is a mismatch, not an
/// invalid signature), and mints a fresh pair.
pub struct TokenRefreshUseCase<'a, U> {
    pub token_validator: &'a TokenValidator,
    pub token_generator: &'a TokenGenerator,
    pub user_repo: &'a U,
}

impl<'a, U> TokenRefreshUseCase<'a, U>
where
    U: UserRepo,
{
    pub async fn execute(&self, refresh_token: &str) -> Result<GenTokenPair, AuthError> {
        let claims = self
            .token_validator
            .validate(refresh_token)
            .map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .user_repo
            .get(&claims.sub)
            .await
            .map_err(|_| AuthError::Unknown)?
            .ok_or(AuthError::InvalidToken)?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            return Err(AuthError::RefreshTokenMismatch);
        }

        let pair = self
            .token_generator
            .gen_token_pair(&user.id, &user.name)
            .map_err(|_| AuthError::Unknown)?;

        self.user_repo
            .set_refresh_token(&user.id, Some(&pair.refresh_token))
            .await
            .map_err(|_| AuthError::Unknown)?;

        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;
    use chrono::Utc;
    use std::sync::Mutex;
    use token_layer::{TokenDurations, TokenKeys};

    struct FakeUserRepo {
        user: Mutex<User>,
    }

    #[async_trait::async_trait]
    impl UserRepo for FakeUserRepo {
        async fn register(
            &self,
            _id: &str,
            _name: &str,
            _user_type: token_layer::UserType,
        ) -> Result<(), String> {
            Ok(())
        }

        async fn get(&self, id: &str) -> Result<Option<User>, String> {
            let user = self.user.lock().unwrap();
            if user.id == id {
                Ok(Some(user.clone()))
            } else {
                Ok(None)
            }
        }

        async fn set_refresh_token(&self, _id: &str, token: Option<&str>) -> Result<(), String> {
            self.user.lock().unwrap().refresh_token = token.map(str::to_string);
            Ok(())
        }
    }

    fn keys() -> TokenKeys {
        use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
        use rsa::{RsaPrivateKey, RsaPublicKey};
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        TokenKeys {
            private_key_pem: private.to_pkcs1_pem(Default::default()).unwrap().as_bytes().to_vec(),
            public_key_pem: public.to_pkcs1_pem(Default::default()).unwrap().into_bytes(),
        }
    }

    #[tokio::test]
    async fn when_refresh_token_no_longer_matches_stored_value_then_mismatch() {
        let keys = keys();
        let generator = TokenGenerator::new(
            keys.clone(),
            TokenDurations {
                access_seconds: 900,
                refresh_seconds: 3600,
            },
        );
        let validator = TokenValidator::new(keys);

        let stale = generator.gen_refresh_token("u-1", "Ada").unwrap();
        let current = generator.gen_refresh_token("u-1", "Ada").unwrap();

        let repo = FakeUserRepo {
            user: Mutex::new(User {
                id: "u-1".to_string(),
                name: "Ada".to_string(),
                registered_at: Utc::now(),
                refresh_token: Some(current),
            }),
        };

        let use_case = TokenRefreshUseCase {
            token_validator: &validator,
            token_generator: &generator,
            user_repo: &repo,
        };

        let result = use_case.execute(&stale).await;
        assert!(matches!(result, Err(AuthError::RefreshTokenMismatch)));
    }
}
