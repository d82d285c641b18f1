use std::sync::Arc;

use crate::config::Config;
use crate::creations::CreationLog;
use crate::identity::IdentityProvider;
use crate::llm_client::TextGenerator;
use crate::providers::{DocumentExtractor, ImageGenerator, MediaHost};
use crate::quota::UsageLedger;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external dependency sits behind a trait object so the router can be
/// driven against in-memory fakes. Production wiring lives in `main`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    /// Authoritative free-usage counters.
    pub usage: Arc<dyn UsageLedger>,
    pub creations: Arc<dyn CreationLog>,
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub media: Arc<dyn MediaHost>,
    pub documents: Arc<dyn DocumentExtractor>,
}
