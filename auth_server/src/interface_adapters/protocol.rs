use serde::{Deserialize, Serialize};

/// Query params on the OAuth provider callback, `GET /auth/{provider}/login-redirect`.
#[derive(Debug, Deserialize)]
pub struct OauthCallbackQuery {
    pub code: String,
    pub state: String,
}

/// Query params on `GET /auth/guest-token`.
#[derive(Debug, Deserialize)]
pub struct GuestTokenQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub ok: bool,
}

impl Default for SuccessResponse {
    fn default() -> Self {
        Self { ok: true }
    }
}

// Error envelope shared by every handler; `code` is the taxonomy tag from
// the shared error taxonomy (e.g. `INVALID_TOKEN`), `message` is for logs/UI.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
