use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart::Form, Client};
use tracing::debug;

use super::{error_body, ProviderError};

pub(crate) const PROVIDER: &str = "ClipDrop";
const TEXT_TO_IMAGE_URL: &str = "https://clipdrop-api.co/text-to-image/v1";

/// Text-to-image generation. Returns the raw encoded image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Bytes, ProviderError>;
}

#[derive(Clone)]
pub struct ClipDropClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl ClipDropClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .map_err(ProviderError::http(PROVIDER))?,
            api_key,
            endpoint: TEXT_TO_IMAGE_URL.to_string(),
        })
    }
}

#[async_trait]
impl ImageGenerator for ClipDropClient {
    async fn generate(&self, prompt: &str) -> Result<Bytes, ProviderError> {
        let form = Form::new().text("prompt", prompt.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(ProviderError::http(PROVIDER))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        let image = response
            .bytes()
            .await
            .map_err(ProviderError::http(PROVIDER))?;
        if image.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "empty image body".to_string(),
            });
        }

        debug!("Generated image of {} bytes", image.len());
        Ok(image)
    }
}
