use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{IdentityError, IdentityProvider, Session};
use crate::quota::Plan;

/// Session token claims we rely on.
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    /// Active plan, e.g. `u:premium` for a user-level subscription.
    #[serde(default)]
    pla: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResource {
    #[serde(default)]
    private_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ClerkErrors {
    errors: Vec<ClerkErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ClerkErrorItem {
    message: String,
}

/// Clerk-compatible identity provider: networkless JWT verification plus the
/// users backend API.
#[derive(Clone)]
pub struct ClerkClient {
    client: Client,
    api_url: String,
    secret_key: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl ClerkClient {
    /// Builds a client verifying RS256 session tokens against `jwt_public_key_pem`.
    pub fn new(
        api_url: String,
        secret_key: String,
        jwt_public_key_pem: &str,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let decoding_key = DecodingKey::from_rsa_pem(jwt_public_key_pem.as_bytes())
            .map_err(|e| IdentityError::Config(format!("invalid session public key: {e}")))?;
        Self::with_key(api_url, secret_key, decoding_key, Algorithm::RS256, timeout)
    }

    pub fn with_key(
        api_url: String,
        secret_key: String,
        decoding_key: DecodingKey,
        algorithm: Algorithm,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key,
            decoding_key,
            validation: Validation::new(algorithm),
        })
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/users/{}", self.api_url, user_id)
    }

    fn decode_session(&self, token: &str) -> Result<Session, IdentityError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| IdentityError::InvalidSession(e.to_string()))?;
        Ok(Session {
            user_id: data.claims.sub,
            plan: Plan::from_claim(data.claims.pla.as_deref()),
        })
    }
}

async fn api_error(response: reqwest::Response) -> IdentityError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ClerkErrors>(&body)
        .ok()
        .and_then(|e| e.errors.into_iter().next())
        .map(|e| e.message)
        .unwrap_or(body);
    IdentityError::Api { status, message }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn verify_session(&self, token: &str) -> Result<Session, IdentityError> {
        self.decode_session(token)
    }

    async fn private_metadata(&self, user_id: &str) -> Result<Map<String, Value>, IdentityError> {
        let response = self
            .client
            .get(self.user_url(user_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let user: UserResource = response.json().await?;
        Ok(user.private_metadata.unwrap_or_default())
    }

    async fn merge_private_metadata(
        &self,
        user_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), IdentityError> {
        let response = self
            .client
            .patch(format!("{}/metadata", self.user_url(user_id)))
            .bearer_auth(&self.secret_key)
            .json(&json!({ "private_metadata": patch }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        debug!("Updated private metadata for {user_id}");
        Ok(())
    }
}
