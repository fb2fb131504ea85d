use crate::domain::errors::AuthError;
use crate::domain::ports::UserRepo;

/// Clears `users.refresh_token` so the refresh cookie no longer works.
/// Always succeeds for an unknown user — logging out twice is not an error.
pub struct LogoutUseCase<'a, U> {
    pub user_repo: &'a U,
}

impl<'a, U> LogoutUseCase<'a, U>
where
    U: UserRepo,
{
    pub async fn execute(&self, user_id: &str) -> Result<(), AuthError> {
        self.user_repo
            .set_refresh_token(user_id, None)
            .await
            .map_err(|_| AuthError::Unknown)
    }
}
