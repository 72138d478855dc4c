//! Authentication and session handling for the patrol backend

mod session;
mod types;

use log::{debug, info, warn};
use reqwest::Client;
use std::sync::Arc;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;
use patrol_rust_storage::OfflineStore;

pub use session::*;
pub use types::*;

/// Client for patrol authentication
pub struct Auth {
    /// The base URL of the backend
    url: String,

    /// HTTP client used for requests
    client: Client,

    /// The current access token
    token: SessionToken,

    /// Where the token and the user survive restarts
    store: Arc<OfflineStore>,

    /// Client options
    options: ClientOptions,
}

impl Auth {
    /// Create a new Auth client
    pub(crate) fn new(
        url: &str,
        client: Client,
        token: SessionToken,
        store: Arc<OfflineStore>,
        options: ClientOptions,
    ) -> Self {
        Self {
            url: url.to_string(),
            client,
            token,
            store,
            options,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth{}", self.url, path)
    }

    /// Sign in with email and password
    ///
    /// The token is kept in memory and persisted; the user is cached for
    /// offline display.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, Error> {
        let url = self.get_auth_url("/login");

        let result = Fetch::post(&self.client, &url)
            .header("X-Client-Info", &self.options.client_info)
            .json(&LoginRequest { email, password })?
            .execute::<LoginResponse>()
            .await?;

        self.token.set(Some(result.access_token.clone()));
        self.store.save_token(&result.access_token).await;
        self.store.save_user(&result.user).await;

        info!("Logged in as {}", result.user.email);
        Ok(result)
    }

    /// Get the user for the current token and refresh the cached copy
    ///
    /// A 401 means the token is no longer accepted, so it is forgotten.
    pub async fn current_user(&self) -> Result<User, Error> {
        let url = self.get_auth_url("/me");
        let token = self.require_token()?;

        let result = Fetch::get(&self.client, &url)
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&token)
            .execute::<User>()
            .await;

        match result {
            Ok(user) => {
                self.store.save_user(&user).await;
                Ok(user)
            }
            Err(e) => {
                if e.status() == Some(401) {
                    warn!("Session rejected by the server, clearing token");
                    self.token.set(None);
                    self.store.clear_token().await;
                }
                Err(e)
            }
        }
    }

    /// Load the persisted token and cached user
    ///
    /// Returns the cached user when a usable token was found. A token whose
    /// `exp` has passed is discarded. Tokens that cannot be decoded are kept
    /// and left for the server to judge.
    pub async fn restore_session(&self) -> Option<User> {
        let token = self.store.load_token().await?;

        match TokenClaims::decode(&token) {
            Ok(claims) if claims.is_expired() => {
                info!("Stored session has expired, discarding it");
                self.store.clear_token().await;
                return None;
            }
            Ok(_) => {}
            Err(e) => debug!("Stored token is not a readable JWT: {}", e),
        }

        self.token.set(Some(token));
        self.store.load_user().await
    }

    /// Sign out
    ///
    /// Clears the token, the cached user and the offline queue.
    pub async fn logout(&self) {
        self.token.set(None);
        self.store.clear_all().await;
        info!("Logged out");
    }

    /// Decoded claims of the current token
    pub fn session_claims(&self) -> Result<TokenClaims, Error> {
        let token = self.require_token()?;
        Ok(TokenClaims::decode(&token)?)
    }

    /// Get the current token
    pub fn get_token(&self) -> Option<String> {
        self.token.get()
    }

    /// Set the token, e.g. one obtained out of band
    pub async fn set_token(&self, token: &str) {
        self.token.set(Some(token.to_string()));
        self.store.save_token(token).await;
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_set()
    }

    fn require_token(&self) -> Result<String, Error> {
        self.token.get().ok_or_else(|| Error::auth("Not logged in"))
    }
}
