//! Read model consumed by the reconciler and records used by the downgrade

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use studiodir_shared::{MembershipTier, StudioStatus, StudioType};
use time::OffsetDateTime;
use uuid::Uuid;

/// Billing facts for one subscription, most recent first in `AccountSnapshot::subscriptions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub current_period_end: Option<OffsetDateTime>,
}

/// Owner of a studio listing as seen by a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: Uuid,
    pub email: String,
    pub membership_tier: MembershipTier,
    /// Ordered most recent first
    pub subscriptions: Vec<SubscriptionSnapshot>,
}

impl AccountSnapshot {
    pub fn latest_subscription(&self) -> Option<&SubscriptionSnapshot> {
        self.subscriptions.first()
    }
}

/// One listing plus its owner, the unit the decision engine works on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioSnapshot {
    pub listing_id: Uuid,
    pub status: StudioStatus,
    pub is_featured: bool,
    pub featured_until: Option<OffsetDateTime>,
    pub account: AccountSnapshot,
}

/// Account row as loaded inside a downgrade transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub membership_tier: MembershipTier,
}

/// Listing row as loaded inside a downgrade transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub status: StudioStatus,
    pub is_featured: bool,
    pub featured_until: Option<OffsetDateTime>,
    pub show_phone: bool,
    pub show_directions: bool,
    pub is_verified: bool,
    pub is_premium: bool,
    pub studio_types: BTreeSet<StudioType>,
}
