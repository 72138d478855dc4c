//! Types for authentication

use patrol_rust_storage::CachedUser;
use serde::{Deserialize, Serialize};

/// User data returned by the backend
pub type User = CachedUser;

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// The access token
    pub access_token: String,

    /// The token type, normally `bearer`
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// The authenticated user
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}
