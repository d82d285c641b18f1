//! Plan & usage-quota gate.
//!
//! Free accounts may run a fixed number of metered actions; premium accounts
//! are never metered. Premium-only actions are refused for free accounts
//! regardless of usage.
//!
//! The usage counter is consumed atomically at the persistence boundary
//! (`UsageLedger::try_consume`) so two concurrent requests can never both take
//! the last free slot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod gate;
pub mod ledger;

pub use gate::{require_account, Admission, QuotaGate, Reservation};
pub use ledger::{Consumption, PgUsageLedger, UsageLedger};

/// Private-metadata key holding the free usage counter.
pub const FREE_USAGE_KEY: &str = "free_usage";

/// Subscription tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    /// Resolves the plan from a session `pla` claim such as `u:premium`.
    /// Anything other than a premium plan, including no claim at all, is free.
    pub fn from_claim(claim: Option<&str>) -> Self {
        let Some(claim) = claim else {
            return Plan::Free;
        };
        let name = claim
            .split_once(':')
            .map(|(_, name)| name)
            .unwrap_or(claim);
        if name.trim().eq_ignore_ascii_case("premium") {
            Plan::Premium
        } else {
            Plan::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }
}

/// Resolved plan and usage for the authenticated caller, attached to the
/// request by [`require_account`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub user_id: String,
    pub plan: Plan,
    pub free_usage: u32,
}

/// How an action is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Open to every plan; free accounts consume one unit of usage.
    Metered,
    /// Premium accounts only; never metered.
    PremiumOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    LimitReached,
    PremiumRequired,
}

/// Pure gate decision from plan, observed usage and the action's policy.
pub fn evaluate(plan: Plan, free_usage: u32, policy: AccessPolicy, limit: u32) -> QuotaDecision {
    match (plan, policy) {
        (Plan::Premium, _) => QuotaDecision::Allowed,
        (Plan::Free, AccessPolicy::PremiumOnly) => QuotaDecision::PremiumRequired,
        (Plan::Free, AccessPolicy::Metered) if free_usage >= limit => QuotaDecision::LimitReached,
        (Plan::Free, AccessPolicy::Metered) => QuotaDecision::Allowed,
    }
}

/// Normalizes a stored usage counter of unknown shape.
///
/// Returns `None` when no usable value is stored (absent, null, empty string),
/// which callers treat as first use. Numbers are truncated and clamped to be
/// non-negative; strings are read like `parseInt` (leading digits only). Any
/// other garbage reads as 0 rather than failing the request.
pub fn parse_free_usage(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Null => None,
        Value::Number(n) => Some(clamp_count(
            n.as_i64()
                .or_else(|| n.as_u64().map(|u| u.min(i64::MAX as u64) as i64))
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .unwrap_or(0),
        )),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(parse_leading_int(s)),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Some(0),
    }
}

fn parse_leading_int(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if negative || digits.is_empty() {
        return 0;
    }
    digits.parse::<u32>().unwrap_or(u32::MAX)
}

fn clamp_count(n: i64) -> u32 {
    n.clamp(0, u32::MAX as i64) as u32
}
