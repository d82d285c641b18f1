//! Identity service adapter: session verification and account metadata.
//!
//! Sessions are bearer JWTs verified locally; plan and private metadata live
//! with the identity provider and are read/written over its backend API.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod clerk;

pub use clerk::ClerkClient;

use crate::quota::Plan;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub plan: Plan,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_session(&self, token: &str) -> Result<Session, IdentityError>;

    /// Server-only metadata attached to the account. Missing metadata is an empty map.
    async fn private_metadata(&self, user_id: &str) -> Result<Map<String, Value>, IdentityError>;

    /// Merges `patch` into the account's private metadata.
    async fn merge_private_metadata(
        &self,
        user_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), IdentityError>;
}
