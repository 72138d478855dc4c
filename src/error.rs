//! Error handling for the patrol client

use patrol_rust_storage::StorageError;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

const DEFAULT_API_MESSAGE: &str = "Request failed";

/// Unified error type for the patrol client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// QR or GPS validation refused the visit
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Build an API error from a failed response body
    ///
    /// Uses the body's `detail` (or `message`) field when present, otherwise
    /// the raw text.
    pub fn api(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                let field = value.get("detail").or_else(|| value.get("message"))?;
                Some(match field.as_str() {
                    Some(text) => text.to_string(),
                    None => field.to_string(),
                })
            })
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    DEFAULT_API_MESSAGE.to_string()
                } else {
                    trimmed.to_string()
                }
            });

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying later could succeed: connection failures, timeouts
    /// and 5xx answers. A body that fails to decode is not transient, the
    /// server may already have stored the record.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.is_request()
                    || e.status().map_or(false, |s| s.is_server_error())
            }
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result alias used across the client
pub type Result<T> = std::result::Result<T, Error>;
