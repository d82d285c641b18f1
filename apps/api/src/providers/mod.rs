//! External provider adapters: image generation, image hosting/transformation,
//! and document text extraction.
//!
//! Each adapter sits behind a trait so handlers can be exercised without the
//! network. Production implementations share one `reqwest::Client` each,
//! built once at startup with a bounded timeout. Nothing here retries.

use thiserror::Error;

pub mod document;
pub mod image_gen;
pub mod media;

pub use document::{DocumentExtractor, PdfExtractor};
pub use image_gen::{ClipDropClient, ImageGenerator};
pub use media::{CloudinaryClient, HostedAsset, ImageEffect, MediaHost, MediaSource};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} HTTP error: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("Document extraction failed: {0}")]
    Extraction(String),
}

impl ProviderError {
    pub(crate) fn http(provider: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ProviderError::Http { provider, source }
    }

    /// Message safe to show to the caller. Upstream bodies stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProviderError::Extraction(_) => "Could not read the uploaded document",
            ProviderError::Http { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::InvalidResponse { provider, .. } => match *provider {
                image_gen::PROVIDER => "Image generation failed. Please try again.",
                media::PROVIDER => "Image processing failed. Please try again.",
                _ => "An upstream provider failed. Please try again.",
            },
        }
    }
}

/// Reads an upstream error body without failing on unreadable payloads.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
