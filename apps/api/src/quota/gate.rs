use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map};
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{
    evaluate, parse_free_usage, AccessPolicy, AccountContext, Consumption, Plan, QuotaDecision,
    UsageLedger, FREE_USAGE_KEY,
};
use crate::errors::AppError;
use crate::identity::IdentityProvider;
use crate::state::AppState;

/// Route middleware: authenticates the caller, resolves plan and usage, and
/// attaches an [`AccountContext`] to the request. Any failure ends the request
/// with the failure envelope.
pub async fn require_account(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_account(&state, request.headers()).await {
        Ok(account) => {
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Steps: verify session → fetch private metadata → normalize the stored
/// counter (initializing it to 0 for free accounts with none) → seed the
/// ledger, whose count is authoritative.
pub async fn resolve_account(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AccountContext, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let session = state.identity.verify_session(token).await?;
    let user_id = session.user_id;

    let metadata = state.identity.private_metadata(&user_id).await?;
    let stored = parse_free_usage(metadata.get(FREE_USAGE_KEY));

    let free_usage = match (session.plan, stored) {
        (Plan::Premium, stored) => stored.unwrap_or(0),
        (Plan::Free, Some(observed)) => state.usage.seed(&user_id, observed).await?,
        (Plan::Free, None) => {
            let mut patch = Map::new();
            patch.insert(FREE_USAGE_KEY.to_string(), json!(0));
            state
                .identity
                .merge_private_metadata(&user_id, patch)
                .await?;
            state.usage.seed(&user_id, 0).await?
        }
    };

    Ok(AccountContext {
        user_id,
        plan: session.plan,
        free_usage,
    })
}

/// One unit of free usage taken from the ledger for an in-flight action.
///
/// A reservation that is dropped without being settled (the request was
/// cancelled or the client went away mid-call) hands its unit back on a
/// detached task.
pub struct Reservation {
    ledger: Arc<dyn UsageLedger>,
    user_id: String,
    count: u32,
    settled: bool,
}

impl Reservation {
    /// Ledger count right after this unit was taken.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let ledger = self.ledger.clone();
        let user_id = std::mem::take(&mut self.user_id);
        match Handle::try_current() {
            Ok(runtime) => {
                warn!("Action for {user_id} ended unsettled; releasing reserved usage");
                runtime.spawn(async move {
                    if let Err(e) = ledger.release(&user_id).await {
                        warn!("Could not release usage for {user_id}: {e:?}");
                    }
                });
            }
            Err(_) => warn!("No runtime to release reserved usage for {user_id}"),
        }
    }
}

/// A granted admission. Metered admissions hold a [`Reservation`] that must
/// be settled.
pub enum Admission {
    Unmetered,
    Metered(Reservation),
}

/// Per-action quota enforcement over the shared ledger.
pub struct QuotaGate<'a> {
    ledger: Arc<dyn UsageLedger>,
    identity: &'a dyn IdentityProvider,
    limit: u32,
}

impl<'a> QuotaGate<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            ledger: state.usage.clone(),
            identity: state.identity.as_ref(),
            limit: state.config.free_usage_limit,
        }
    }

    /// Plan and limit check against the resolved context. Touches nothing.
    pub fn check(&self, account: &AccountContext, policy: AccessPolicy) -> Result<(), AppError> {
        match evaluate(account.plan, account.free_usage, policy, self.limit) {
            QuotaDecision::LimitReached => {
                info!(
                    "Refused {}: free usage {}/{}",
                    account.user_id, account.free_usage, self.limit
                );
                Err(AppError::LimitReached)
            }
            QuotaDecision::PremiumRequired => {
                info!("Refused {}: premium required", account.user_id);
                Err(AppError::PremiumRequired)
            }
            QuotaDecision::Allowed => Ok(()),
        }
    }

    /// Decides whether `account` may run an action under `policy`. For free
    /// metered actions one unit is reserved atomically before returning.
    pub async fn admit(
        &self,
        account: &AccountContext,
        policy: AccessPolicy,
    ) -> Result<Admission, AppError> {
        self.check(account, policy)?;

        if account.plan == Plan::Premium || policy != AccessPolicy::Metered {
            return Ok(Admission::Unmetered);
        }

        match self.ledger.try_consume(&account.user_id, self.limit).await? {
            Consumption::Granted(count) => Ok(Admission::Metered(Reservation {
                ledger: self.ledger.clone(),
                user_id: account.user_id.clone(),
                count,
                settled: false,
            })),
            Consumption::Exhausted => {
                info!("Refused {}: free usage exhausted concurrently", account.user_id);
                Err(AppError::LimitReached)
            }
        }
    }

    /// Completes an admission. A successful metered action keeps its unit and
    /// mirrors the ledger's current count to the identity provider; a failed
    /// one returns it.
    pub async fn settle(&self, account: &AccountContext, admission: Admission, succeeded: bool) {
        let Admission::Metered(mut reservation) = admission else {
            return;
        };
        reservation.settled = true;

        if !succeeded {
            if let Err(e) = self.ledger.release(&account.user_id).await {
                warn!("Could not release usage for {}: {e:?}", account.user_id);
            }
            return;
        }

        // Actions admitted later may have finished first
        let count = match self.ledger.current(&account.user_id).await {
            Ok(Some(count)) => count,
            Ok(None) => reservation.count(),
            Err(e) => {
                warn!("Could not read usage for {}: {e:?}", account.user_id);
                reservation.count()
            }
        };

        let mut patch = Map::new();
        patch.insert(FREE_USAGE_KEY.to_string(), json!(count));
        if let Err(e) = self
            .identity
            .merge_private_metadata(&account.user_id, patch)
            .await
        {
            warn!("Could not mirror free usage for {}: {e}", account.user_id);
        }
    }

    /// Runs `work` under the gate: admit, await, settle.
    /// `work` is not polled unless the caller is admitted; if this future is
    /// dropped mid-`work`, the reservation is released.
    pub async fn run<T, F>(
        &self,
        account: &AccountContext,
        policy: AccessPolicy,
        work: F,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let admission = self.admit(account, policy).await?;
        let outcome = work.await;
        self.settle(account, admission, outcome.is_ok()).await;
        outcome
    }
}
