//! In-memory fakes for every external seam, plus a harness that wires them
//! into an `AppState` and router.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::creations::CreationLog;
use crate::identity::{IdentityError, IdentityProvider, Session};
use crate::llm_client::{LlmError, TextGenerator};
use crate::models::creation::{CreationRow, NewCreation};
use crate::providers::{
    DocumentExtractor, HostedAsset, ImageEffect, ImageGenerator, MediaHost, MediaSource,
    ProviderError,
};
use crate::quota::{Consumption, Plan, UsageLedger, FREE_USAGE_KEY};
use crate::routes::build_router;
use crate::state::AppState;

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        db_max_connections: 1,
        text_api_key: "text-key".into(),
        text_api_base_url: "https://text.test/v1".into(),
        text_model: "test-model".into(),
        clipdrop_api_key: "clipdrop-key".into(),
        cloudinary_cloud_name: "demo".into(),
        cloudinary_api_key: "cloud-key".into(),
        cloudinary_api_secret: "cloud-secret".into(),
        clerk_secret_key: "sk_test".into(),
        clerk_jwt_key: String::new(),
        clerk_api_url: "https://clerk.test/v1".into(),
        free_usage_limit: 10,
        provider_timeout_secs: 5,
        max_resume_bytes: 5 * 1024 * 1024,
        port: 0,
        rust_log: "debug".into(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Identity
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeIdentity {
    sessions: Mutex<HashMap<String, Session>>,
    metadata: Mutex<HashMap<String, Map<String, Value>>>,
    metadata_down: AtomicBool,
}

impl FakeIdentity {
    pub fn fail_metadata(&self) {
        self.metadata_down.store(true, Ordering::SeqCst);
    }

    pub fn stored_usage(&self, user_id: &str) -> Option<Value> {
        self.metadata
            .lock()
            .unwrap()
            .get(user_id)
            .and_then(|m| m.get(FREE_USAGE_KEY).cloned())
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_session(&self, token: &str) -> Result<Session, IdentityError> {
        self.sessions
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidSession("unknown token".into()))
    }

    async fn private_metadata(&self, user_id: &str) -> Result<Map<String, Value>, IdentityError> {
        if self.metadata_down.load(Ordering::SeqCst) {
            return Err(IdentityError::Api {
                status: 503,
                message: "identity service unavailable".into(),
            });
        }
        Ok(self
            .metadata
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn merge_private_metadata(
        &self,
        user_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), IdentityError> {
        if self.metadata_down.load(Ordering::SeqCst) {
            return Err(IdentityError::Api {
                status: 503,
                message: "identity service unavailable".into(),
            });
        }
        self.metadata
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .extend(patch);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ledger & creation log
// ────────────────────────────────────────────────────────────────────────────

/// Same contract as the Postgres ledger; the mutex stands in for row locking.
#[derive(Default)]
pub struct MemoryLedger {
    counts: Mutex<HashMap<String, u32>>,
}

impl MemoryLedger {
    pub fn count(&self, user_id: &str) -> Option<u32> {
        self.counts.lock().unwrap().get(user_id).copied()
    }

    pub fn set(&self, user_id: &str, count: u32) {
        self.counts
            .lock()
            .unwrap()
            .insert(user_id.to_string(), count);
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn seed(&self, user_id: &str, observed: u32) -> Result<u32> {
        Ok(*self
            .counts
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_insert(observed))
    }

    async fn current(&self, user_id: &str) -> Result<Option<u32>> {
        Ok(self.count(user_id))
    }

    async fn try_consume(&self, user_id: &str, limit: u32) -> Result<Consumption> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(user_id.to_string()).or_insert(0);
        if *count >= limit {
            return Ok(Consumption::Exhausted);
        }
        *count += 1;
        Ok(Consumption::Granted(*count))
    }

    async fn release(&self, user_id: &str) -> Result<u32> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(user_id.to_string()).or_insert(0);
        *count = count.saturating_sub(1);
        Ok(*count)
    }
}

#[derive(Default)]
pub struct MemoryCreations {
    rows: Mutex<Vec<CreationRow>>,
    down: AtomicBool,
}

impl MemoryCreations {
    pub fn rows(&self) -> Vec<CreationRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_writes(&self) {
        self.down.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CreationLog for MemoryCreations {
    async fn append(&self, creation: NewCreation) -> Result<CreationRow> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("creations table unavailable");
        }
        let row = CreationRow {
            id: Uuid::new_v4(),
            user_id: creation.user_id,
            prompt: creation.prompt,
            content: creation.content,
            kind: creation.kind.as_str().to_string(),
            publish: creation.publish,
            created_at: chrono::Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<CreationRow>> {
        let mut rows: Vec<_> = self
            .rows()
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn list_published(&self) -> Result<Vec<CreationRow>> {
        let mut rows: Vec<_> = self.rows().into_iter().filter(|r| r.publish).collect();
        rows.reverse();
        Ok(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Providers
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeText {
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, u32)>>,
    reply: Mutex<Option<String>>,
}

impl Default for FakeText {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            reply: Mutex::new(Some("Generated text".to_string())),
        }
    }
}

impl FakeText {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, u32)> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Makes every following call fail as an upstream error.
    pub fn fail(&self) {
        *self.reply.lock().unwrap() = None;
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_tokens));
        self.reply.lock().unwrap().clone().ok_or(LlmError::Api {
            status: 500,
            message: "upstream exploded".into(),
        })
    }
}

#[derive(Default)]
pub struct FakeImages {
    calls: AtomicUsize,
}

impl FakeImages {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, _prompt: &str) -> Result<Bytes, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"\x89PNG fake"))
    }
}

/// What a fake upload received.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadedKind {
    DataUri(String),
    File { filename: String, len: usize },
}

#[derive(Default)]
pub struct FakeMedia {
    uploads: Mutex<Vec<(UploadedKind, Option<ImageEffect>)>>,
}

impl FakeMedia {
    pub fn uploads(&self) -> Vec<(UploadedKind, Option<ImageEffect>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaHost for FakeMedia {
    async fn upload(
        &self,
        source: MediaSource,
        effect: Option<ImageEffect>,
    ) -> Result<HostedAsset, ProviderError> {
        let kind = match source {
            MediaSource::DataUri(uri) => UploadedKind::DataUri(uri),
            MediaSource::File { bytes, filename } => UploadedKind::File {
                filename,
                len: bytes.len(),
            },
        };
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((kind, effect));
        let public_id = format!("asset_{}", uploads.len());
        Ok(HostedAsset {
            secure_url: format!("https://media.test/{public_id}.png"),
            public_id,
        })
    }

    fn effect_url(&self, public_id: &str, effect: &ImageEffect) -> Result<String, ProviderError> {
        Ok(format!("https://media.test/{}/{public_id}", effect.directive()))
    }
}

pub struct FakeDocuments {
    calls: AtomicUsize,
    text: Mutex<String>,
}

impl Default for FakeDocuments {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            text: Mutex::new("Jane Doe. Built a payments platform in Rust.".to_string()),
        }
    }
}

impl FakeDocuments {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }
}

#[async_trait]
impl DocumentExtractor for FakeDocuments {
    async fn extract_text(&self, _document: Bytes) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.lock().unwrap().clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Harness
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct TestHarness {
    pub identity: Arc<FakeIdentity>,
    pub ledger: Arc<MemoryLedger>,
    pub creations: Arc<MemoryCreations>,
    pub text: Arc<FakeText>,
    pub images: Arc<FakeImages>,
    pub media: Arc<FakeMedia>,
    pub documents: Arc<FakeDocuments>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: test_config(),
            identity: self.identity.clone(),
            usage: self.ledger.clone(),
            creations: self.creations.clone(),
            text: self.text.clone(),
            images: self.images.clone(),
            media: self.media.clone(),
            documents: self.documents.clone(),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state())
    }

    /// Registers a session for `user_id` and returns its bearer token.
    /// `usage` is stored verbatim as the account's `free_usage` metadata.
    fn user(&self, user_id: &str, plan: Plan, usage: Option<Value>) -> String {
        let token = format!("token-{user_id}");
        self.identity.sessions.lock().unwrap().insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                plan,
            },
        );
        if let Some(usage) = usage {
            let mut metadata = Map::new();
            metadata.insert(FREE_USAGE_KEY.to_string(), usage);
            self.identity
                .metadata
                .lock()
                .unwrap()
                .insert(user_id.to_string(), metadata);
        }
        token
    }

    pub fn free_user(&self, user_id: &str, usage: Option<Value>) -> String {
        self.user(user_id, Plan::Free, usage)
    }

    pub fn premium_user(&self, user_id: &str, usage: Option<Value>) -> String {
        self.user(user_id, Plan::Premium, usage)
    }

    /// Total provider calls of any kind.
    pub fn provider_calls(&self) -> usize {
        self.text.calls()
            + self.images.calls()
            + self.media.uploads().len()
            + self.documents.calls()
    }
}
