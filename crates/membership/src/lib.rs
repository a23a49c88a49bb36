// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! StudioDir Membership Enforcement
//!
//! Keeps studio listings consistent with their owners' membership and billing state.
//!
//! ## Features
//!
//! - **Decisions**: Pure computation of the work a sweep must do
//! - **Downgrades**: Transactional PREMIUM to BASIC moves with premium features stripped
//! - **Applier**: Ordered application that never activates a listing on a failed downgrade
//! - **Invariants**: Read-only consistency checks over a snapshot
//! - **Stores**: Postgres (sqlx) and in-memory implementations

pub mod applier;
pub mod decisions;
pub mod downgrade;
pub mod error;
pub mod invariants;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod policy;
pub mod postgres;
pub mod store;

#[cfg(test)]
mod edge_case_tests;

// Applier
pub use applier::{EnforcementApplier, EnforcementSummary};

// Decisions
pub use decisions::{
    compute_decision, compute_enforcement_decisions, compute_featured_status,
    compute_studio_status, EnforcementDecision, FeaturedComputation, StatusComputation,
    StatusReason, StatusUpdate,
};

// Downgrade
pub use downgrade::{DowngradeExecutor, DowngradeOutcome};

// Error
pub use error::{EnforcementError, EnforcementResult};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Models
pub use models::{AccountRecord, AccountSnapshot, ListingRecord, StudioSnapshot, SubscriptionSnapshot};

// Notifications
pub use notifications::{
    DowngradeNotice, LogNotificationSender, NotificationSender, WebhookNotificationSender,
    DOWNGRADE_CONFIRMATION_TEMPLATE,
};

// Policy
pub use policy::{AdminAllowlist, EnforcementPolicy, PremiumFeaturePolicy};

// Stores
pub use memory::InMemoryMembershipStore;
pub use postgres::PgMembershipStore;
pub use store::{MembershipStore, MembershipTransaction, TierChangeRecord};

use std::sync::Arc;

use sqlx::PgPool;
use time::OffsetDateTime;

/// Main enforcement service that combines all enforcement functionality
#[derive(Clone)]
pub struct EnforcementService {
    store: Arc<dyn MembershipStore>,
    admins: AdminAllowlist,
    pub downgrades: DowngradeExecutor,
    pub applier: EnforcementApplier,
}

impl EnforcementService {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        notifier: Arc<dyn NotificationSender>,
        policy: EnforcementPolicy,
    ) -> Self {
        let downgrades = DowngradeExecutor::new(store.clone(), notifier, policy.premium_features);
        let applier = EnforcementApplier::new(store.clone(), downgrades.clone());

        Self {
            store,
            admins: policy.admins,
            downgrades,
            applier,
        }
    }

    /// Create a service backed by Postgres
    pub fn postgres(
        pool: PgPool,
        notifier: Arc<dyn NotificationSender>,
        policy: EnforcementPolicy,
    ) -> Self {
        Self::new(Arc::new(PgMembershipStore::new(pool)), notifier, policy)
    }

    /// Decisions a sweep at `now` would apply, without applying them
    pub async fn preview(&self, now: OffsetDateTime) -> EnforcementResult<Vec<EnforcementDecision>> {
        let snapshot = self.store.load_snapshot().await?;
        Ok(compute_enforcement_decisions(&snapshot, &self.admins, now))
    }

    /// One reconciliation sweep. Only a failed snapshot read is an error.
    pub async fn run_sweep(&self, now: OffsetDateTime) -> EnforcementResult<EnforcementSummary> {
        let snapshot = self.store.load_snapshot().await?;
        let decisions = compute_enforcement_decisions(&snapshot, &self.admins, now);

        tracing::info!(
            listings = snapshot.len(),
            decisions = decisions.len(),
            "Running membership enforcement sweep"
        );

        let summary = self.applier.apply(&decisions).await;

        tracing::info!(
            status_updates = summary.status_updates,
            unfeatured_updates = summary.unfeatured_updates,
            downgrades = summary.downgrades,
            failed_downgrades = summary.failed_downgrades,
            failed_updates = summary.failed_updates,
            "Membership enforcement sweep complete"
        );

        Ok(summary)
    }

    /// Run the invariant checks against the current state
    pub async fn check_invariants(&self, now: OffsetDateTime) -> EnforcementResult<InvariantCheckSummary> {
        let snapshot = self.store.load_snapshot().await?;
        Ok(InvariantChecker::new(self.admins.clone()).check(&snapshot, now))
    }
}
