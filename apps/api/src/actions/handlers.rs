//! Axum route handlers for the Action API.

use std::future::Future;

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Extension, Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use tracing::{info, warn};

use crate::actions::upload::UploadForm;
use crate::actions::ActionKind;
use crate::envelope::ApiResponse;
use crate::errors::AppError;
use crate::llm_client::prompts::{
    resume_review_prompt, EMPTY_RESUME_PLACEHOLDER, RESUME_REVIEW_RECORD_PROMPT,
};
use crate::models::creation::NewCreation;
use crate::providers::{ImageEffect, MediaSource};
use crate::quota::{AccountContext, QuotaGate};
use crate::state::AppState;

const DEFAULT_ARTICLE_LENGTH: u32 = 800;
const MAX_ARTICLE_LENGTH: u32 = 4000;
const BLOG_TITLE_MAX_TOKENS: u32 = 2000;
const RESUME_REVIEW_MAX_TOKENS: u32 = 2000;

pub const NO_IMAGE_MESSAGE: &str = "No image provided";
pub const NO_OBJECT_MESSAGE: &str = "No object specified";
pub const NO_RESUME_MESSAGE: &str = "No resume provided";

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ArticleRequest {
    pub prompt: String,
    /// Requested article length; the token budget is twice this.
    #[serde(default)]
    pub length: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BlogTitleRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub publish: Option<bool>,
}

// ────────────────────────────────────────────────────────────────────────────
// Shared steps
// ────────────────────────────────────────────────────────────────────────────

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(format!("Invalid request: {}", rejection.body_text())))
}

fn require_prompt(prompt: &str) -> Result<&str, AppError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }
    Ok(prompt)
}

fn article_token_budget(length: Option<u32>) -> u32 {
    length
        .unwrap_or(DEFAULT_ARTICLE_LENGTH)
        .clamp(1, MAX_ARTICLE_LENGTH)
        * 2
}

/// Plan and limit refusals take precedence over request validation.
fn precheck(state: &AppState, account: &AccountContext, action: ActionKind) -> Result<(), AppError> {
    QuotaGate::new(state).check(account, action.policy())
}

/// Runs `work` under the quota gate and wraps its content in the success envelope.
async fn gated<F>(
    state: &AppState,
    account: &AccountContext,
    action: ActionKind,
    work: F,
) -> Result<Json<ApiResponse>, AppError>
where
    F: Future<Output = Result<String, AppError>>,
{
    let content = QuotaGate::new(state)
        .run(account, action.policy(), work)
        .await?;
    info!("{} completed for {}", action.label(), account.user_id);
    Ok(Json(ApiResponse::content(content)))
}

/// Appends the creation record and returns the stored content, which is what
/// the caller receives.
async fn record(
    state: &AppState,
    account: &AccountContext,
    action: ActionKind,
    prompt: String,
    content: String,
    publish: bool,
) -> Result<String, AppError> {
    let row = state
        .creations
        .append(NewCreation {
            user_id: account.user_id.clone(),
            prompt,
            content,
            kind: action.creation_type(),
            publish,
        })
        .await?;
    Ok(row.content)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/ai/generate-article
pub async fn handle_generate_article(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
    payload: Result<Json<ArticleRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    precheck(&state, &account, ActionKind::Article)?;
    let request = json_body(payload)?;
    let prompt = require_prompt(&request.prompt)?;
    let max_tokens = article_token_budget(request.length);

    gated(&state, &account, ActionKind::Article, async {
        let content = state.text.complete(prompt, max_tokens).await?;
        record(&state, &account, ActionKind::Article, prompt.to_string(), content, false).await
    })
    .await
}

/// POST /api/ai/generate-blog-title
pub async fn handle_generate_blog_title(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
    payload: Result<Json<BlogTitleRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    precheck(&state, &account, ActionKind::BlogTitle)?;
    let request = json_body(payload)?;
    let prompt = require_prompt(&request.prompt)?;

    gated(&state, &account, ActionKind::BlogTitle, async {
        let content = state.text.complete(prompt, BLOG_TITLE_MAX_TOKENS).await?;
        record(&state, &account, ActionKind::BlogTitle, prompt.to_string(), content, false).await
    })
    .await
}

/// POST /api/ai/generate-image
///
/// Generates a PNG, hosts it, and records the hosted URL.
pub async fn handle_generate_image(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    precheck(&state, &account, ActionKind::Image)?;
    let request = json_body(payload)?;
    let prompt = require_prompt(&request.prompt)?;
    let publish = request.publish.unwrap_or(false);

    gated(&state, &account, ActionKind::Image, async {
        let image = state.images.generate(prompt).await?;
        let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&image));
        let asset = state.media.upload(MediaSource::DataUri(data_uri), None).await?;
        record(&state, &account, ActionKind::Image, prompt.to_string(), asset.secure_url, publish)
            .await
    })
    .await
}

/// POST /api/ai/remove-image-background (multipart: `image`)
pub async fn handle_remove_background(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    gated(&state, &account, ActionKind::RemoveBackground, async {
        let mut form = UploadForm::read(multipart).await?;
        let image = form
            .take_file("image")
            .ok_or_else(|| AppError::Validation(NO_IMAGE_MESSAGE.to_string()))?;

        let asset = state
            .media
            .upload(
                MediaSource::File {
                    bytes: image.bytes,
                    filename: image.filename,
                },
                Some(ImageEffect::BackgroundRemoval),
            )
            .await?;

        record(
            &state,
            &account,
            ActionKind::RemoveBackground,
            "Remove background from image".to_string(),
            asset.secure_url,
            false,
        )
        .await
    })
    .await
}

/// POST /api/ai/remove-image-object (multipart: `image`, `object`)
///
/// The original is hosted untouched; the returned URL applies generative
/// removal at delivery time.
pub async fn handle_remove_object(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    gated(&state, &account, ActionKind::RemoveObject, async {
        let mut form = UploadForm::read(multipart).await?;
        let image = form
            .take_file("image")
            .ok_or_else(|| AppError::Validation(NO_IMAGE_MESSAGE.to_string()))?;
        let object = form
            .field("object")
            .ok_or_else(|| AppError::Validation(NO_OBJECT_MESSAGE.to_string()))?
            .to_string();

        let asset = state
            .media
            .upload(
                MediaSource::File {
                    bytes: image.bytes,
                    filename: image.filename,
                },
                None,
            )
            .await?;
        let url = state
            .media
            .effect_url(&asset.public_id, &ImageEffect::GenerativeRemove(object.clone()))?;

        record(
            &state,
            &account,
            ActionKind::RemoveObject,
            format!("Removed {object} from image"),
            url,
            false,
        )
        .await
    })
    .await
}

/// POST /api/ai/resume-review (multipart: `resume`)
///
/// Size is checked before extraction. Empty extraction degrades to a
/// placeholder instead of failing.
pub async fn handle_resume_review(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    gated(&state, &account, ActionKind::ResumeReview, async {
        let mut form = UploadForm::read(multipart).await?;
        let resume = form
            .take_file("resume")
            .ok_or_else(|| AppError::Validation(NO_RESUME_MESSAGE.to_string()))?;

        let max_bytes = state.config.max_resume_bytes;
        if resume.bytes.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "Resume file size exceeds allowed size ({}MB).",
                max_bytes / (1024 * 1024)
            )));
        }

        let extracted = state.documents.extract_text(resume.bytes).await?;
        let resume_text = if extracted.trim().is_empty() {
            warn!(
                "Resume text extraction returned empty for {} ({})",
                account.user_id, resume.filename
            );
            EMPTY_RESUME_PLACEHOLDER.to_string()
        } else {
            extracted
        };

        let content = state
            .text
            .complete(&resume_review_prompt(&resume_text), RESUME_REVIEW_MAX_TOKENS)
            .await?;

        record(
            &state,
            &account,
            ActionKind::ResumeReview,
            RESUME_REVIEW_RECORD_PROMPT.to_string(),
            content,
            false,
        )
        .await
    })
    .await
}
