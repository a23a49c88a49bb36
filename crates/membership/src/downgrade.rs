//! Premium to Basic downgrade
//!
//! All database writes of a downgrade happen in one transaction:
//! tier change, premium listing flags, premium-only type tags, premium
//! metadata and the audit row. The confirmation notification is sent only
//! after commit and its failure never turns a committed downgrade into a
//! reported failure.

use std::sync::Arc;

use serde::Serialize;
use studiodir_shared::MembershipTier;
use uuid::Uuid;

use crate::error::EnforcementResult;
use crate::notifications::{DowngradeNotice, NotificationSender, DOWNGRADE_CONFIRMATION_TEMPLATE};
use crate::policy::PremiumFeaturePolicy;
use crate::store::{MembershipStore, MembershipTransaction, TierChangeRecord};

const TIER_CHANGE_SOURCE: &str = "enforcement";
const TIER_CHANGE_REASON: &str = "subscription_expired";

/// Result of one downgrade attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DowngradeOutcome {
    /// Committed; `notified` is false if the confirmation could not be sent
    Downgraded {
        account_id: Uuid,
        listing_id: Option<Uuid>,
        notified: bool,
    },
    /// Account was already BASIC, nothing written
    AlreadyBasic { account_id: Uuid },
    NotFound { account_id: Uuid },
    /// Transaction failed, nothing persisted
    Failed { account_id: Uuid, error: String },
}

impl DowngradeOutcome {
    pub fn downgraded(&self) -> bool {
        matches!(self, DowngradeOutcome::Downgraded { .. })
    }

    pub fn account_id(&self) -> Uuid {
        match self {
            DowngradeOutcome::Downgraded { account_id, .. }
            | DowngradeOutcome::AlreadyBasic { account_id }
            | DowngradeOutcome::NotFound { account_id }
            | DowngradeOutcome::Failed { account_id, .. } => *account_id,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DowngradeOutcome::NotFound { .. } => Some("not found"),
            DowngradeOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// What the transaction staged before commit
enum Staged {
    NotFound,
    AlreadyBasic,
    Applied {
        listing_id: Option<Uuid>,
        notice: DowngradeNotice,
    },
}

#[derive(Clone)]
pub struct DowngradeExecutor {
    store: Arc<dyn MembershipStore>,
    notifier: Arc<dyn NotificationSender>,
    policy: Arc<PremiumFeaturePolicy>,
}

impl DowngradeExecutor {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        notifier: Arc<dyn NotificationSender>,
        policy: PremiumFeaturePolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy: Arc::new(policy),
        }
    }

    /// Downgrade one account. Never returns an error; failures are in the outcome.
    pub async fn perform_downgrade(&self, account_id: Uuid) -> DowngradeOutcome {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!(account_id = %account_id, error = %e, "Failed to start downgrade transaction");
                return DowngradeOutcome::Failed {
                    account_id,
                    error: e.to_string(),
                };
            }
        };

        let staged = match self.stage(tx.as_mut(), account_id).await {
            Ok(staged) => staged,
            Err(e) => {
                rollback(tx, account_id).await;
                tracing::error!(account_id = %account_id, error = %e, "Downgrade failed, nothing persisted");
                return DowngradeOutcome::Failed {
                    account_id,
                    error: e.to_string(),
                };
            }
        };

        let (listing_id, notice) = match staged {
            Staged::NotFound => {
                rollback(tx, account_id).await;
                tracing::warn!(account_id = %account_id, "Downgrade skipped: account not found");
                return DowngradeOutcome::NotFound { account_id };
            }
            Staged::AlreadyBasic => {
                rollback(tx, account_id).await;
                tracing::debug!(account_id = %account_id, "Downgrade skipped: account already BASIC");
                return DowngradeOutcome::AlreadyBasic { account_id };
            }
            Staged::Applied { listing_id, notice } => (listing_id, notice),
        };

        if let Err(e) = tx.commit().await {
            tracing::error!(account_id = %account_id, error = %e, "Downgrade commit failed, nothing persisted");
            return DowngradeOutcome::Failed {
                account_id,
                error: e.to_string(),
            };
        }

        tracing::info!(
            account_id = %account_id,
            listing_id = ?listing_id,
            "Account downgraded from PREMIUM to BASIC"
        );

        let notified = match self
            .notifier
            .send(account_id, DOWNGRADE_CONFIRMATION_TEMPLATE, &notice.variables())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    account_id = %account_id,
                    error = %e,
                    "Failed to send downgrade confirmation"
                );
                false
            }
        };

        DowngradeOutcome::Downgraded {
            account_id,
            listing_id,
            notified,
        }
    }

    async fn stage(
        &self,
        tx: &mut dyn MembershipTransaction,
        account_id: Uuid,
    ) -> EnforcementResult<Staged> {
        // Tier is re-read under the row lock, the snapshot may be stale
        let Some(account) = tx.lock_account(account_id).await? else {
            return Ok(Staged::NotFound);
        };
        if account.membership_tier == MembershipTier::Basic {
            return Ok(Staged::AlreadyBasic);
        }

        let listing = tx.listing_for_account(account_id).await?;

        tx.set_membership_tier(account_id, MembershipTier::Basic)
            .await?;

        if let Some(listing) = &listing {
            tx.strip_premium_listing_fields(listing.id).await?;

            if let Some(types) = self.policy.downgraded_studio_types(&listing.studio_types) {
                tx.set_studio_types(listing.id, &types).await?;
            }
        }

        let removed = tx
            .delete_account_metadata(account_id, &self.policy.premium_metadata_keys)
            .await?;
        if removed > 0 {
            tracing::debug!(account_id = %account_id, removed = removed, "Removed premium metadata");
        }

        tx.record_tier_change(&TierChangeRecord {
            account_id,
            from_tier: account.membership_tier,
            to_tier: MembershipTier::Basic,
            source: TIER_CHANGE_SOURCE,
            reason: TIER_CHANGE_REASON,
        })
        .await?;

        Ok(Staged::Applied {
            listing_id: listing.as_ref().map(|l| l.id),
            notice: DowngradeNotice {
                email: account.email,
                display_name: account.display_name,
                studio_name: listing.map(|l| l.name),
            },
        })
    }
}

/// Roll back a transaction that will not be committed
async fn rollback(tx: Box<dyn MembershipTransaction>, account_id: Uuid) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(
            account_id = %account_id,
            error = %e,
            "Failed to roll back downgrade transaction"
        );
    }
}
