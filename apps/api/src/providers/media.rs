//! Image hosting and transformation (Cloudinary-compatible signed uploads).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    multipart::{Form, Part},
    Client, Url,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{error_body, ProviderError};

pub(crate) const PROVIDER: &str = "Cloudinary";
const UPLOAD_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Named transformation applied to a hosted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEffect {
    BackgroundRemoval,
    /// Generative removal of the named object.
    GenerativeRemove(String),
}

impl ImageEffect {
    /// The transformation directive understood by the delivery and upload APIs.
    pub fn directive(&self) -> String {
        match self {
            ImageEffect::BackgroundRemoval => "e_background_removal".to_string(),
            ImageEffect::GenerativeRemove(object) => format!("e_gen_remove:{}", object.trim()),
        }
    }
}

/// What to upload.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// A `data:` URI, as produced for generated images.
    DataUri(String),
    /// Raw bytes of a client upload.
    File { bytes: Bytes, filename: String },
}

/// The stored asset as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostedAsset {
    pub public_id: String,
    pub secure_url: String,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Uploads an image, optionally transforming it on ingest.
    async fn upload(
        &self,
        source: MediaSource,
        effect: Option<ImageEffect>,
    ) -> Result<HostedAsset, ProviderError>;

    /// Delivery URL for an already-hosted image with `effect` applied on the fly.
    fn effect_url(&self, public_id: &str, effect: &ImageEffect) -> Result<String, ProviderError>;
}

#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(
        cloud_name: String,
        api_key: String,
        api_secret: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .map_err(ProviderError::http(PROVIDER))?,
            cloud_name,
            api_key,
            api_secret,
        })
    }

    fn upload_url(&self) -> String {
        format!("{UPLOAD_API_BASE}/{}/image/upload", self.cloud_name)
    }
}

/// Signs upload parameters: `k=v` pairs sorted by key, joined with `&`,
/// followed by the API secret, hashed with SHA-256.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    async fn upload(
        &self,
        source: MediaSource,
        effect: Option<ImageEffect>,
    ) -> Result<HostedAsset, ProviderError> {
        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        if let Some(effect) = &effect {
            params.insert("transformation", effect.directive());
        }
        let signature = sign_params(&params, &self.api_secret);

        let mut form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }
        form = match source {
            MediaSource::DataUri(uri) => form.text("file", uri),
            MediaSource::File { bytes, filename } => {
                form.part("file", Part::bytes(bytes.to_vec()).file_name(filename))
            }
        };

        let response = self
            .client
            .post(self.upload_url())
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

        let asset: HostedAsset = response
            .json()
            .await
            .map_err(ProviderError::http(PROVIDER))?;
        debug!("Uploaded image as {}", asset.public_id);
        Ok(asset)
    }

    fn effect_url(&self, public_id: &str, effect: &ImageEffect) -> Result<String, ProviderError> {
        let invalid = |message: String| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message,
        };

        let mut url = Url::parse(DELIVERY_BASE).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("delivery base cannot carry a path".to_string()))?;
            segments
                .pop_if_empty()
                .extend([self.cloud_name.as_str(), "image", "upload"]);
            segments.push(&effect.directive());
            // public ids may contain folders
            segments.extend(public_id.split('/'));
        }
        Ok(url.to_string())
    }
}
