//! Persistence seams used by the reconciler
//!
//! The reconciler never talks to a database directly. It reads a snapshot,
//! runs each downgrade inside a [`MembershipTransaction`], and issues bulk
//! listing updates through [`MembershipStore`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use studiodir_shared::{MembershipTier, StudioStatus, StudioType};
use uuid::Uuid;

use crate::error::EnforcementResult;
use crate::models::{AccountRecord, ListingRecord, StudioSnapshot};

/// Audit entry written alongside a tier change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierChangeRecord {
    pub account_id: Uuid,
    pub from_tier: MembershipTier,
    pub to_tier: MembershipTier,
    pub source: &'static str,
    pub reason: &'static str,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Every listing with its owner's billing facts
    async fn load_snapshot(&self) -> EnforcementResult<Vec<StudioSnapshot>>;

    /// Start an all-or-nothing unit of work
    async fn begin(&self) -> EnforcementResult<Box<dyn MembershipTransaction>>;

    /// Single-row status update, returns rows affected
    async fn set_listing_status(&self, listing_id: Uuid, status: StudioStatus)
        -> EnforcementResult<u64>;

    /// Bulk status update, returns rows affected
    async fn set_listing_status_many(
        &self,
        listing_ids: &[Uuid],
        status: StudioStatus,
    ) -> EnforcementResult<u64>;

    /// Bulk `is_featured = false`, returns rows affected
    async fn unfeature_listings(&self, listing_ids: &[Uuid]) -> EnforcementResult<u64>;
}

/// A unit of work. Dropping it without `commit` persists nothing.
#[async_trait]
pub trait MembershipTransaction: Send {
    /// Load the account and hold it for the rest of the transaction
    async fn lock_account(&mut self, account_id: Uuid) -> EnforcementResult<Option<AccountRecord>>;

    async fn listing_for_account(
        &mut self,
        account_id: Uuid,
    ) -> EnforcementResult<Option<ListingRecord>>;

    async fn set_membership_tier(
        &mut self,
        account_id: Uuid,
        tier: MembershipTier,
    ) -> EnforcementResult<()>;

    /// Clear phone, directions, verified, featured, premium flags and `featured_until`
    async fn strip_premium_listing_fields(&mut self, listing_id: Uuid) -> EnforcementResult<()>;

    /// Replace the listing's type tags
    async fn set_studio_types(
        &mut self,
        listing_id: Uuid,
        studio_types: &BTreeSet<StudioType>,
    ) -> EnforcementResult<()>;

    /// Delete the account's metadata entries with the given keys, returns rows removed
    async fn delete_account_metadata(
        &mut self,
        account_id: Uuid,
        keys: &[String],
    ) -> EnforcementResult<u64>;

    async fn record_tier_change(&mut self, change: &TierChangeRecord) -> EnforcementResult<()>;

    async fn commit(self: Box<Self>) -> EnforcementResult<()>;

    async fn rollback(self: Box<Self>) -> EnforcementResult<()>;
}
