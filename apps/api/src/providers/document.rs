use async_trait::async_trait;
use bytes::Bytes;

use super::ProviderError;

/// Extracts plain text from an uploaded document.
///
/// An empty string is a valid result (scanned PDFs, image-only pages); callers
/// decide how to degrade.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract_text(&self, document: Bytes) -> Result<String, ProviderError>;
}

/// In-process PDF text extraction. Parsing is CPU-bound, so it runs on the
/// blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract_text(&self, document: Bytes) -> Result<String, ProviderError> {
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
            .await
            .map_err(|e| ProviderError::Extraction(format!("extraction task failed: {e}")))?
            .map_err(|e| ProviderError::Extraction(e.to_string()))
    }
}
