//! Decision engine
//!
//! Pure functions that turn billing facts into the work a sweep must do.
//! Nothing here performs I/O, so the same snapshot always yields the same
//! decisions. A sweep that failed halfway is repaired by simply running again.
//!
//! Precedence for the desired listing status is admin override, then basic
//! tier, then subscription expiry.

use serde::Serialize;
use studiodir_shared::{MembershipTier, StudioStatus};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{AccountSnapshot, StudioSnapshot};
use crate::policy::AdminAllowlist;

/// Why a listing should have the status it should have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    AdminOverride,
    BasicTier,
    Active,
    Expired,
}

impl StatusReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusReason::AdminOverride => "admin_override",
            StatusReason::BasicTier => "basic_tier",
            StatusReason::Active => "active",
            StatusReason::Expired => "expired",
        }
    }
}

impl std::fmt::Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusComputation {
    pub desired_status: StudioStatus,
    pub reason: StatusReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeaturedComputation {
    pub should_unfeature: bool,
}

/// Status change a decision asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub from: StudioStatus,
    pub to: StudioStatus,
    pub reason: StatusReason,
}

/// Work needed on one listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcementDecision {
    pub listing_id: Uuid,
    pub account_id: Uuid,
    pub status_update: Option<StatusUpdate>,
    pub unfeature: bool,
    pub trigger_downgrade: bool,
}

impl EnforcementDecision {
    /// A decision with nothing to do is never emitted
    pub fn has_work(&self) -> bool {
        self.status_update.is_some() || self.unfeature || self.trigger_downgrade
    }
}

/// Desired status of a listing given its owner's billing state
pub fn compute_studio_status(
    account: &AccountSnapshot,
    admins: &AdminAllowlist,
    now: OffsetDateTime,
) -> StatusComputation {
    if admins.contains(&account.email) {
        return StatusComputation {
            desired_status: StudioStatus::Active,
            reason: StatusReason::AdminOverride,
        };
    }

    if account.membership_tier == MembershipTier::Basic {
        return StatusComputation {
            desired_status: StudioStatus::Active,
            reason: StatusReason::BasicTier,
        };
    }

    let period_end = account
        .latest_subscription()
        .and_then(|s| s.current_period_end);

    match period_end {
        Some(end) if end > now => StatusComputation {
            desired_status: StudioStatus::Active,
            reason: StatusReason::Active,
        },
        _ => StatusComputation {
            desired_status: StudioStatus::Inactive,
            reason: StatusReason::Expired,
        },
    }
}

/// Whether a listing's featured window has lapsed
pub fn compute_featured_status(studio: &StudioSnapshot, now: OffsetDateTime) -> FeaturedComputation {
    let should_unfeature =
        studio.is_featured && studio.featured_until.is_some_and(|until| until < now);
    FeaturedComputation { should_unfeature }
}

/// Decision for a single listing, `None` when it is already consistent
pub fn compute_decision(
    studio: &StudioSnapshot,
    admins: &AdminAllowlist,
    now: OffsetDateTime,
) -> Option<EnforcementDecision> {
    let status = compute_studio_status(&studio.account, admins, now);
    let featured = compute_featured_status(studio, now);

    let status_update = (status.desired_status != studio.status).then_some(StatusUpdate {
        from: studio.status,
        to: status.desired_status,
        reason: status.reason,
    });

    // Evaluated independently of `status_update`: an already INACTIVE listing
    // whose owner was never downgraded still needs the downgrade.
    let trigger_downgrade = status.reason == StatusReason::Expired;

    let decision = EnforcementDecision {
        listing_id: studio.listing_id,
        account_id: studio.account.id,
        status_update,
        unfeature: featured.should_unfeature,
        trigger_downgrade,
    };

    decision.has_work().then_some(decision)
}

/// Decisions for every listing that needs work, in snapshot order
pub fn compute_enforcement_decisions(
    studios: &[StudioSnapshot],
    admins: &AdminAllowlist,
    now: OffsetDateTime,
) -> Vec<EnforcementDecision> {
    studios
        .iter()
        .filter_map(|studio| compute_decision(studio, admins, now))
        .collect()
}
