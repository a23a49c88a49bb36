//! Enforcement applier
//!
//! Runs decisions against the store in a fixed order:
//!
//! 1. Downgrades, one account at a time.
//! 2. Bulk `ACTIVE` for listings whose downgrade committed. A listing whose
//!    downgrade failed is left exactly as it was, so an account still on
//!    PREMIUM with a lapsed subscription never gets a live listing from here.
//! 3. Remaining status changes and featured resets, issued concurrently.
//!
//! Nothing escapes as an error. Failures are logged and counted, and the
//! next sweep recomputes the same decisions for anything left inconsistent.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use studiodir_shared::StudioStatus;
use uuid::Uuid;

use crate::decisions::{EnforcementDecision, StatusUpdate};
use crate::downgrade::{DowngradeExecutor, DowngradeOutcome};
use crate::store::MembershipStore;

/// Counts reported back to the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnforcementSummary {
    /// Successful downgrades plus status changes not tied to a downgrade
    pub status_updates: usize,
    pub unfeatured_updates: usize,
    pub downgrades: usize,
    pub failed_downgrades: usize,
    /// Store writes that returned an error
    pub failed_updates: usize,
}

/// Decisions split by how they are applied
#[derive(Debug, Default)]
struct Partitioned {
    downgrades: Vec<(Uuid, Uuid)>,
    status_updates: Vec<(Uuid, StatusUpdate)>,
    unfeature: Vec<Uuid>,
}

fn partition(decisions: &[EnforcementDecision]) -> Partitioned {
    let mut parts = Partitioned::default();
    for decision in decisions {
        if decision.trigger_downgrade {
            parts.downgrades.push((decision.listing_id, decision.account_id));
        } else if let Some(update) = decision.status_update {
            parts.status_updates.push((decision.listing_id, update));
        }
        if decision.unfeature {
            parts.unfeature.push(decision.listing_id);
        }
    }
    parts
}

#[derive(Clone)]
pub struct EnforcementApplier {
    store: Arc<dyn MembershipStore>,
    downgrades: DowngradeExecutor,
}

impl EnforcementApplier {
    pub fn new(store: Arc<dyn MembershipStore>, downgrades: DowngradeExecutor) -> Self {
        Self { store, downgrades }
    }

    pub async fn apply(&self, decisions: &[EnforcementDecision]) -> EnforcementSummary {
        for decision in decisions {
            tracing::debug!(
                listing_id = %decision.listing_id,
                account_id = %decision.account_id,
                status_to = ?decision.status_update.map(|u| u.to),
                reason = ?decision.status_update.map(|u| u.reason),
                unfeature = decision.unfeature,
                trigger_downgrade = decision.trigger_downgrade,
                "Applying enforcement decision"
            );
        }

        let parts = partition(decisions);
        let mut summary = EnforcementSummary::default();

        // Sequential on purpose: one account's failure must not touch another's
        let mut activated = Vec::new();
        for (listing_id, account_id) in &parts.downgrades {
            let outcome = self.downgrades.perform_downgrade(*account_id).await;
            match &outcome {
                DowngradeOutcome::Downgraded { .. } => activated.push(*listing_id),
                DowngradeOutcome::AlreadyBasic { .. } => {}
                DowngradeOutcome::NotFound { .. } | DowngradeOutcome::Failed { .. } => {
                    summary.failed_downgrades += 1;
                    tracing::error!(
                        listing_id = %listing_id,
                        account_id = %account_id,
                        error = outcome.error().unwrap_or_default(),
                        "Downgrade failed, listing left unchanged"
                    );
                }
            }
        }

        if !activated.is_empty() {
            match self
                .store
                .set_listing_status_many(&activated, StudioStatus::Active)
                .await
            {
                Ok(rows) => {
                    tracing::debug!(rows = rows, "Activated listings of downgraded accounts");
                }
                Err(e) => {
                    summary.failed_updates += 1;
                    tracing::error!(
                        count = activated.len(),
                        error = %e,
                        "Failed to activate listings after downgrade"
                    );
                }
            }
        }

        let (status_failures, unfeature_failures) = tokio::join!(
            self.apply_status_updates(&parts.status_updates),
            self.apply_unfeature(&parts.unfeature),
        );
        summary.failed_updates += status_failures + unfeature_failures;

        summary.downgrades = activated.len();
        summary.status_updates = activated.len() + parts.status_updates.len();
        summary.unfeatured_updates = parts.unfeature.len();
        summary
    }

    /// Independent single-row updates; returns how many failed
    async fn apply_status_updates(&self, updates: &[(Uuid, StatusUpdate)]) -> usize {
        let results = join_all(updates.iter().map(|(listing_id, update)| async move {
            let result = self.store.set_listing_status(*listing_id, update.to).await;
            if let Err(e) = &result {
                tracing::error!(
                    listing_id = %listing_id,
                    to = %update.to,
                    reason = %update.reason,
                    error = %e,
                    "Failed to update listing status"
                );
            }
            result
        }))
        .await;

        results.iter().filter(|r| r.is_err()).count()
    }

    /// One bulk reset; returns 1 if it failed
    async fn apply_unfeature(&self, listing_ids: &[Uuid]) -> usize {
        if listing_ids.is_empty() {
            return 0;
        }

        match self.store.unfeature_listings(listing_ids).await {
            Ok(_) => 0,
            Err(e) => {
                tracing::error!(
                    count = listing_ids.len(),
                    error = %e,
                    "Failed to clear expired featured flags"
                );
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::StatusReason;

    fn decision(
        status_update: Option<StatusUpdate>,
        unfeature: bool,
        trigger_downgrade: bool,
    ) -> EnforcementDecision {
        EnforcementDecision {
            listing_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            status_update,
            unfeature,
            trigger_downgrade,
        }
    }

    #[test]
    fn test_partition_routes_each_kind() {
        let expire = StatusUpdate {
            from: StudioStatus::Active,
            to: StudioStatus::Inactive,
            reason: StatusReason::Expired,
        };
        let reactivate = StatusUpdate {
            from: StudioStatus::Inactive,
            to: StudioStatus::Active,
            reason: StatusReason::AdminOverride,
        };
        let decisions = vec![
            decision(Some(expire), true, true),
            decision(None, false, true),
            decision(Some(reactivate), false, false),
            decision(None, true, false),
        ];

        let parts = partition(&decisions);
        assert_eq!(parts.downgrades.len(), 2);
        // The expiry status change travels with its downgrade, not on its own
        assert_eq!(parts.status_updates.len(), 1);
        assert_eq!(parts.status_updates[0].0, decisions[2].listing_id);
        assert_eq!(parts.unfeature, vec![decisions[0].listing_id, decisions[3].listing_id]);
    }
}
