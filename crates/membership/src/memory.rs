//! In-memory membership store
//!
//! Suitable for tests, local runs and dry runs against fixture data.
//! A transaction holds the store lock for its whole life and stages its
//! writes on a copy of the state, so it is fully isolated and a transaction
//! that is dropped, rolled back or fails to commit leaves no trace.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use studiodir_shared::{MembershipTier, StudioStatus, StudioType};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{EnforcementError, EnforcementResult};
use crate::models::{
    AccountRecord, AccountSnapshot, ListingRecord, StudioSnapshot, SubscriptionSnapshot,
};
use crate::store::{MembershipStore, MembershipTransaction, TierChangeRecord};

/// Account plus everything hanging off it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub record: AccountRecord,
    /// Most recent first
    pub subscriptions: Vec<SubscriptionSnapshot>,
    pub metadata: BTreeMap<String, String>,
}

/// Full contents of the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub accounts: HashMap<Uuid, StoredAccount>,
    /// Kept in insertion order so snapshots are stable
    pub listings: Vec<ListingRecord>,
    pub tier_changes: Vec<TierChangeRecord>,
}

impl MemoryState {
    fn listing_mut(&mut self, listing_id: Uuid) -> Option<&mut ListingRecord> {
        self.listings.iter_mut().find(|l| l.id == listing_id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryMembershipStore {
    state: Arc<Mutex<MemoryState>>,
    failing_accounts: Arc<Mutex<HashSet<Uuid>>>,
    failing_steps: Arc<Mutex<HashSet<Uuid>>>,
    failing_listing_writes: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(&self, record: AccountRecord, subscriptions: Vec<SubscriptionSnapshot>) {
        let mut state = self.state.lock().await;
        state.accounts.insert(
            record.id,
            StoredAccount {
                record,
                subscriptions,
                metadata: BTreeMap::new(),
            },
        );
    }

    pub async fn insert_listing(&self, listing: ListingRecord) {
        let mut state = self.state.lock().await;
        state.listings.retain(|l| l.id != listing.id);
        state.listings.push(listing);
    }

    pub async fn set_metadata(&self, account_id: Uuid, key: &str, value: &str) {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.metadata.insert(key.to_string(), value.to_string());
        }
    }

    /// Make every transaction that locked this account fail at commit
    pub async fn fail_commits_for(&self, account_id: Uuid) {
        self.failing_accounts.lock().await.insert(account_id);
    }

    pub async fn clear_commit_failures(&self) {
        self.failing_accounts.lock().await.clear();
    }

    /// Make the premium metadata cleanup fail mid-transaction for this account.
    /// Earlier downgrade steps are already staged when it fails.
    pub async fn fail_steps_for(&self, account_id: Uuid) {
        self.failing_steps.lock().await.insert(account_id);
    }

    /// Make status and featured writes outside a transaction fail
    pub fn fail_listing_writes(&self, fail: bool) {
        self.failing_listing_writes.store(fail, Ordering::SeqCst);
    }

    fn check_listing_writes(&self) -> EnforcementResult<()> {
        if self.failing_listing_writes.load(Ordering::SeqCst) {
            return Err(EnforcementError::Database(
                "listing write rejected".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn account(&self, account_id: Uuid) -> Option<StoredAccount> {
        self.state.lock().await.accounts.get(&account_id).cloned()
    }

    pub async fn listing(&self, listing_id: Uuid) -> Option<ListingRecord> {
        self.state
            .lock()
            .await
            .listings
            .iter()
            .find(|l| l.id == listing_id)
            .cloned()
    }

    pub async fn state(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Number of transactions committed so far
    pub fn committed_transactions(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn load_snapshot(&self) -> EnforcementResult<Vec<StudioSnapshot>> {
        let state = self.state.lock().await;
        let snapshot = state
            .listings
            .iter()
            .filter_map(|listing| {
                let Some(owner) = state.accounts.get(&listing.account_id) else {
                    tracing::debug!(listing_id = %listing.id, "Skipping listing without owner");
                    return None;
                };
                Some(StudioSnapshot {
                    listing_id: listing.id,
                    status: listing.status,
                    is_featured: listing.is_featured,
                    featured_until: listing.featured_until,
                    account: AccountSnapshot {
                        id: owner.record.id,
                        email: owner.record.email.clone(),
                        membership_tier: owner.record.membership_tier,
                        subscriptions: owner.subscriptions.clone(),
                    },
                })
            })
            .collect();
        Ok(snapshot)
    }

    async fn begin(&self) -> EnforcementResult<Box<dyn MembershipTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            locked_accounts: Vec::new(),
            failing_accounts: self.failing_accounts.clone(),
            failing_steps: self.failing_steps.clone(),
            commits: self.commits.clone(),
        }))
    }

    async fn set_listing_status(
        &self,
        listing_id: Uuid,
        status: StudioStatus,
    ) -> EnforcementResult<u64> {
        self.check_listing_writes()?;
        let mut state = self.state.lock().await;
        Ok(match state.listing_mut(listing_id) {
            Some(listing) => {
                listing.status = status;
                1
            }
            None => 0,
        })
    }

    async fn set_listing_status_many(
        &self,
        listing_ids: &[Uuid],
        status: StudioStatus,
    ) -> EnforcementResult<u64> {
        self.check_listing_writes()?;
        let wanted: HashSet<&Uuid> = listing_ids.iter().collect();
        let mut state = self.state.lock().await;
        let mut affected = 0;
        for listing in state.listings.iter_mut().filter(|l| wanted.contains(&l.id)) {
            listing.status = status;
            affected += 1;
        }
        Ok(affected)
    }

    async fn unfeature_listings(&self, listing_ids: &[Uuid]) -> EnforcementResult<u64> {
        self.check_listing_writes()?;
        let wanted: HashSet<&Uuid> = listing_ids.iter().collect();
        let mut state = self.state.lock().await;
        let mut affected = 0;
        for listing in state.listings.iter_mut().filter(|l| wanted.contains(&l.id)) {
            listing.is_featured = false;
            affected += 1;
        }
        Ok(affected)
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    locked_accounts: Vec<Uuid>,
    failing_accounts: Arc<Mutex<HashSet<Uuid>>>,
    failing_steps: Arc<Mutex<HashSet<Uuid>>>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryTransaction {
    fn staged_listing(&mut self, listing_id: Uuid) -> EnforcementResult<&mut ListingRecord> {
        self.staged
            .listing_mut(listing_id)
            .ok_or_else(|| EnforcementError::NotFound(format!("Listing {} not found", listing_id)))
    }
}

#[async_trait]
impl MembershipTransaction for InMemoryTransaction {
    async fn lock_account(&mut self, account_id: Uuid) -> EnforcementResult<Option<AccountRecord>> {
        self.locked_accounts.push(account_id);
        Ok(self
            .staged
            .accounts
            .get(&account_id)
            .map(|a| a.record.clone()))
    }

    async fn listing_for_account(
        &mut self,
        account_id: Uuid,
    ) -> EnforcementResult<Option<ListingRecord>> {
        Ok(self
            .staged
            .listings
            .iter()
            .find(|l| l.account_id == account_id)
            .cloned())
    }

    async fn set_membership_tier(
        &mut self,
        account_id: Uuid,
        tier: MembershipTier,
    ) -> EnforcementResult<()> {
        let account = self.staged.accounts.get_mut(&account_id).ok_or_else(|| {
            EnforcementError::NotFound(format!("Account {} not found", account_id))
        })?;
        account.record.membership_tier = tier;
        Ok(())
    }

    async fn strip_premium_listing_fields(&mut self, listing_id: Uuid) -> EnforcementResult<()> {
        let listing = self.staged_listing(listing_id)?;
        listing.show_phone = false;
        listing.show_directions = false;
        listing.is_verified = false;
        listing.is_featured = false;
        listing.is_premium = false;
        listing.featured_until = None;
        Ok(())
    }

    async fn set_studio_types(
        &mut self,
        listing_id: Uuid,
        studio_types: &BTreeSet<StudioType>,
    ) -> EnforcementResult<()> {
        let listing = self.staged_listing(listing_id)?;
        listing.studio_types = studio_types.clone();
        Ok(())
    }

    async fn delete_account_metadata(
        &mut self,
        account_id: Uuid,
        keys: &[String],
    ) -> EnforcementResult<u64> {
        if self.failing_steps.lock().await.contains(&account_id) {
            return Err(EnforcementError::Database(format!(
                "metadata cleanup failed for account {}",
                account_id
            )));
        }
        let Some(account) = self.staged.accounts.get_mut(&account_id) else {
            return Ok(0);
        };
        let before = account.metadata.len();
        account.metadata.retain(|k, _| !keys.contains(k));
        Ok((before - account.metadata.len()) as u64)
    }

    async fn record_tier_change(&mut self, change: &TierChangeRecord) -> EnforcementResult<()> {
        self.staged.tier_changes.push(change.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EnforcementResult<()> {
        let InMemoryTransaction {
            mut guard,
            staged,
            locked_accounts,
            failing_accounts,
            commits,
            ..
        } = *self;

        let failing = failing_accounts.lock().await;
        if let Some(account_id) = locked_accounts.iter().find(|id| failing.contains(*id)) {
            return Err(EnforcementError::Database(format!(
                "commit rejected for account {}",
                account_id
            )));
        }

        *guard = staged;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> EnforcementResult<()> {
        Ok(())
    }
}
