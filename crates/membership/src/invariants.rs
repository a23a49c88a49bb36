//! Membership Invariants Module
//!
//! Runnable consistency checks for listing status and featured flags.
//! They run over the same snapshot a sweep reads, after a sweep or on demand,
//! and report what is still inconsistent.
//!
//! ## Design Principles
//!
//! 1. **Explanatory**: Violations include enough context to debug
//! 2. **Non-destructive**: Checks only read, never write
//! 3. **Complete**: One check per listing invariant the reconciler maintains

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::decisions::{compute_featured_status, compute_studio_status, StatusReason};
use crate::models::StudioSnapshot;
use crate::policy::AdminAllowlist;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    pub listing_id: Uuid,
    pub account_id: Uuid,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - premium features are being given away
    Critical,
    /// High - a paying or exempt customer is hidden
    High,
    /// Medium - stale promotional state
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub checked_at: OffsetDateTime,
    pub listings_checked: usize,
    /// PREMIUM accounts with a lapsed subscription that still await a downgrade
    pub pending_downgrades: usize,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

pub const ADMIN_LISTING_ACTIVE: &str = "admin_listing_active";
pub const BASIC_LISTING_ACTIVE: &str = "basic_listing_active";
pub const PREMIUM_STATUS_MATCHES_SUBSCRIPTION: &str = "premium_status_matches_subscription";
pub const FEATURED_NOT_EXPIRED: &str = "featured_not_expired";

pub struct InvariantChecker {
    admins: AdminAllowlist,
}

impl InvariantChecker {
    pub fn new(admins: AdminAllowlist) -> Self {
        Self { admins }
    }

    /// Run all invariant checks against a snapshot
    pub fn check(&self, studios: &[StudioSnapshot], now: OffsetDateTime) -> InvariantCheckSummary {
        let mut violations = Vec::new();
        for studio in studios {
            violations.extend(self.check_status(studio, now));
            violations.extend(self.check_featured_not_expired(studio, now));
        }

        let pending_downgrades = studios
            .iter()
            .filter(|s| is_pending_downgrade(s, &self.admins, now))
            .count();

        let checks_run = Self::available_checks().len();
        let checks_failed = violations
            .iter()
            .map(|v| v.invariant.as_str())
            .collect::<HashSet<_>>()
            .len();

        InvariantCheckSummary {
            checked_at: now,
            listings_checked: studios.len(),
            pending_downgrades,
            checks_run,
            checks_passed: checks_run - checks_failed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        }
    }

    /// Listing status agrees with admin override, tier and subscription
    fn check_status(&self, studio: &StudioSnapshot, now: OffsetDateTime) -> Option<InvariantViolation> {
        let computed = compute_studio_status(&studio.account, &self.admins, now);
        if computed.desired_status == studio.status {
            return None;
        }

        let (invariant, severity, description) = match computed.reason {
            StatusReason::AdminOverride => (
                ADMIN_LISTING_ACTIVE,
                ViolationSeverity::High,
                "Admin-owned listing is not ACTIVE".to_string(),
            ),
            StatusReason::BasicTier => (
                BASIC_LISTING_ACTIVE,
                ViolationSeverity::High,
                "BASIC listing is not ACTIVE".to_string(),
            ),
            StatusReason::Active => (
                PREMIUM_STATUS_MATCHES_SUBSCRIPTION,
                ViolationSeverity::High,
                "PREMIUM listing with a running subscription is INACTIVE".to_string(),
            ),
            StatusReason::Expired => (
                PREMIUM_STATUS_MATCHES_SUBSCRIPTION,
                ViolationSeverity::Critical,
                "PREMIUM listing is ACTIVE without a running subscription".to_string(),
            ),
        };

        Some(InvariantViolation {
            invariant: invariant.to_string(),
            listing_id: studio.listing_id,
            account_id: studio.account.id,
            description,
            context: serde_json::json!({
                "status": studio.status,
                "expected_status": computed.desired_status,
                "reason": computed.reason,
                "membership_tier": studio.account.membership_tier,
                "current_period_end": studio
                    .account
                    .latest_subscription()
                    .and_then(|s| s.current_period_end)
                    .map(|t| t.unix_timestamp()),
            }),
            severity,
        })
    }

    /// Featured flag never outlives `featured_until`
    fn check_featured_not_expired(
        &self,
        studio: &StudioSnapshot,
        now: OffsetDateTime,
    ) -> Option<InvariantViolation> {
        if !compute_featured_status(studio, now).should_unfeature {
            return None;
        }

        Some(InvariantViolation {
            invariant: FEATURED_NOT_EXPIRED.to_string(),
            listing_id: studio.listing_id,
            account_id: studio.account.id,
            description: "Listing is still featured after featured_until".to_string(),
            context: serde_json::json!({
                "featured_until": studio.featured_until.map(|t| t.unix_timestamp()),
            }),
            severity: ViolationSeverity::Medium,
        })
    }

    /// Get list of all available invariant checks
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            ADMIN_LISTING_ACTIVE,
            BASIC_LISTING_ACTIVE,
            PREMIUM_STATUS_MATCHES_SUBSCRIPTION,
            FEATURED_NOT_EXPIRED,
        ]
    }
}

/// True when the owner is still PREMIUM but has no running subscription
pub fn is_pending_downgrade(
    studio: &StudioSnapshot,
    admins: &AdminAllowlist,
    now: OffsetDateTime,
) -> bool {
    compute_studio_status(&studio.account, admins, now).reason == StatusReason::Expired
}
