use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use token_layer::UserType;

/// Persistent user row. `id` is namespaced `"<provider>-<provider-uid>"`.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
}
