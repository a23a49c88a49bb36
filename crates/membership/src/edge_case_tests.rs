// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for Membership Enforcement
//!
//! Exercises the downgrade executor, the applier and whole sweeps against the
//! in-memory store:
//! - Downgrade contents, idempotence and failure atomicity
//! - Notification failures after commit
//! - Partial failure isolation across accounts
//! - End-to-end sweeps and convergence

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use studiodir_shared::{MembershipTier, StudioStatus, StudioType};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::applier::EnforcementSummary;
use crate::decisions::{EnforcementDecision, StatusReason, StatusUpdate};
use crate::downgrade::DowngradeOutcome;
use crate::error::{EnforcementError, EnforcementResult};
use crate::memory::InMemoryMembershipStore;
use crate::models::{AccountRecord, ListingRecord, SubscriptionSnapshot};
use crate::notifications::{NotificationSender, TemplateVariables, DOWNGRADE_CONFIRMATION_TEMPLATE};
use crate::policy::{AdminAllowlist, EnforcementPolicy};
use crate::EnforcementService;

const ADMIN_EMAIL: &str = "ops@studiodir.example";

// =============================================================================
// Test doubles and fixtures
// =============================================================================

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, String, TemplateVariables)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(Uuid, String, TemplateVariables)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(
        &self,
        account_id: Uuid,
        template_key: &str,
        variables: &TemplateVariables,
    ) -> EnforcementResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EnforcementError::Notification("mail relay unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((account_id, template_key.to_string(), variables.clone()));
        Ok(())
    }
}

struct StudioSpec {
    email: String,
    tier: MembershipTier,
    /// Most recent first
    period_ends: Vec<Option<OffsetDateTime>>,
    status: StudioStatus,
    is_featured: bool,
    featured_until: Option<OffsetDateTime>,
    studio_types: BTreeSet<StudioType>,
}

impl StudioSpec {
    fn premium(email: &str, period_end: Option<OffsetDateTime>) -> Self {
        Self {
            email: email.to_string(),
            tier: MembershipTier::Premium,
            period_ends: vec![period_end],
            status: StudioStatus::Active,
            is_featured: false,
            featured_until: None,
            studio_types: BTreeSet::from([StudioType::Recording]),
        }
    }

    fn basic(email: &str) -> Self {
        Self {
            tier: MembershipTier::Basic,
            period_ends: Vec::new(),
            ..Self::premium(email, None)
        }
    }
}

struct Fixture {
    store: InMemoryMembershipStore,
    notifier: Arc<RecordingNotifier>,
    service: EnforcementService,
}

impl Fixture {
    fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    fn with_notifier(notifier: RecordingNotifier) -> Self {
        let store = InMemoryMembershipStore::new();
        let notifier = Arc::new(notifier);
        let policy = EnforcementPolicy::new(AdminAllowlist::new([ADMIN_EMAIL]));
        let service = EnforcementService::new(Arc::new(store.clone()), notifier.clone(), policy);
        Self {
            store,
            notifier,
            service,
        }
    }

    /// Returns (account_id, listing_id)
    async fn add(&self, spec: StudioSpec) -> (Uuid, Uuid) {
        let account_id = Uuid::new_v4();
        let listing_id = Uuid::new_v4();

        self.store
            .insert_account(
                AccountRecord {
                    id: account_id,
                    email: spec.email,
                    display_name: Some("Sam Booth".to_string()),
                    membership_tier: spec.tier,
                },
                spec.period_ends
                    .into_iter()
                    .map(|end| SubscriptionSnapshot {
                        current_period_end: end,
                    })
                    .collect(),
            )
            .await;

        self.store
            .insert_listing(ListingRecord {
                id: listing_id,
                account_id,
                name: "Booth One".to_string(),
                status: spec.status,
                is_featured: spec.is_featured,
                featured_until: spec.featured_until,
                show_phone: true,
                show_directions: true,
                is_verified: true,
                is_premium: spec.tier == MembershipTier::Premium,
                studio_types: spec.studio_types,
            })
            .await;

        (account_id, listing_id)
    }

    async fn tier(&self, account_id: Uuid) -> MembershipTier {
        self.store.account(account_id).await.unwrap().record.membership_tier
    }

    async fn status(&self, listing_id: Uuid) -> StudioStatus {
        self.store.listing(listing_id).await.unwrap().status
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

// =============================================================================
// Downgrade executor
// =============================================================================

#[tokio::test]
async fn test_downgrade_strips_premium_features() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            is_featured: true,
            featured_until: Some(now() + Duration::days(3)),
            studio_types: BTreeSet::from([StudioType::Voiceover, StudioType::Podcast]),
            ..StudioSpec::premium("owner@x.example", Some(now() - Duration::days(1)))
        })
        .await;
    fx.store.set_metadata(account_id, "custom_meta_title", "Best Booth").await;
    fx.store.set_metadata(account_id, "tagline", "Quiet rooms").await;

    let outcome = fx.service.downgrades.perform_downgrade(account_id).await;
    assert_eq!(
        outcome,
        DowngradeOutcome::Downgraded {
            account_id,
            listing_id: Some(listing_id),
            notified: true,
        }
    );

    let account = fx.store.account(account_id).await.unwrap();
    assert_eq!(account.record.membership_tier, MembershipTier::Basic);
    assert!(!account.metadata.contains_key("custom_meta_title"));
    assert_eq!(account.metadata.get("tagline").map(String::as_str), Some("Quiet rooms"));

    let listing = fx.store.listing(listing_id).await.unwrap();
    assert!(!listing.show_phone);
    assert!(!listing.show_directions);
    assert!(!listing.is_verified);
    assert!(!listing.is_featured);
    assert!(!listing.is_premium);
    assert_eq!(listing.featured_until, None);
    assert_eq!(listing.studio_types, BTreeSet::from([StudioType::Podcast]));
    // Status is the applier's job, not the executor's
    assert_eq!(listing.status, StudioStatus::Active);

    let state = fx.store.state().await;
    assert_eq!(state.tier_changes.len(), 1);
    assert_eq!(state.tier_changes[0].from_tier, MembershipTier::Premium);
    assert_eq!(state.tier_changes[0].to_tier, MembershipTier::Basic);
}

#[tokio::test]
async fn test_downgrade_sends_confirmation_with_variables() {
    let fx = Fixture::new();
    let (account_id, _) = fx
        .add(StudioSpec::premium("owner@x.example", None))
        .await;

    fx.service.downgrades.perform_downgrade(account_id).await;

    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1);
    let (to, template, vars) = &sent[0];
    assert_eq!(*to, account_id);
    assert_eq!(template, DOWNGRADE_CONFIRMATION_TEMPLATE);
    let expected: HashMap<&str, &str> = HashMap::from([
        ("email", "owner@x.example"),
        ("display_name", "Sam Booth"),
        ("studio_name", "Booth One"),
    ]);
    for (key, value) in expected {
        assert_eq!(vars.get(key).map(String::as_str), Some(value), "variable {key}");
    }
}

#[tokio::test]
async fn test_downgrade_is_idempotent() {
    let fx = Fixture::new();
    let (account_id, _) = fx.add(StudioSpec::basic("basic@x.example")).await;
    let before = fx.store.state().await;

    let first = fx.service.downgrades.perform_downgrade(account_id).await;
    let second = fx.service.downgrades.perform_downgrade(account_id).await;

    assert_eq!(first, DowngradeOutcome::AlreadyBasic { account_id });
    assert_eq!(second, DowngradeOutcome::AlreadyBasic { account_id });
    assert!(!second.downgraded());
    assert_eq!(fx.store.state().await, before);
    assert_eq!(fx.store.committed_transactions(), 0);
    assert!(fx.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_second_downgrade_after_success_is_noop() {
    let fx = Fixture::new();
    let (account_id, _) = fx.add(StudioSpec::premium("p@x.example", None)).await;

    assert!(fx.service.downgrades.perform_downgrade(account_id).await.downgraded());
    let after_first = fx.store.state().await;

    let again = fx.service.downgrades.perform_downgrade(account_id).await;
    assert_eq!(again, DowngradeOutcome::AlreadyBasic { account_id });
    assert_eq!(fx.store.state().await, after_first);
    assert_eq!(fx.store.committed_transactions(), 1);
    assert_eq!(fx.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_downgrade_unknown_account_reports_not_found() {
    let fx = Fixture::new();
    let missing = Uuid::new_v4();

    let outcome = fx.service.downgrades.perform_downgrade(missing).await;
    assert_eq!(outcome, DowngradeOutcome::NotFound { account_id: missing });
    assert_eq!(outcome.error(), Some("not found"));
    assert!(!outcome.downgraded());
}

#[tokio::test]
async fn test_downgrade_commit_failure_persists_nothing() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            studio_types: BTreeSet::from([StudioType::Voiceover]),
            ..StudioSpec::premium("p@x.example", None)
        })
        .await;
    fx.store.set_metadata(account_id, "custom_meta_title", "Keep me").await;
    fx.store.fail_commits_for(account_id).await;
    let before = fx.store.state().await;

    let outcome = fx.service.downgrades.perform_downgrade(account_id).await;
    assert!(matches!(outcome, DowngradeOutcome::Failed { .. }));
    assert!(outcome.error().is_some());

    assert_eq!(fx.store.state().await, before);
    assert_eq!(fx.tier(account_id).await, MembershipTier::Premium);
    let listing = fx.store.listing(listing_id).await.unwrap();
    assert!(listing.is_premium);
    assert_eq!(listing.studio_types, BTreeSet::from([StudioType::Voiceover]));
    assert!(fx.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_downgrade_step_failure_rolls_back_staged_changes() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            status: StudioStatus::Inactive,
            studio_types: BTreeSet::from([StudioType::Voiceover]),
            ..StudioSpec::premium("p@x.example", Some(now() - Duration::days(1)))
        })
        .await;
    fx.store.set_metadata(account_id, "custom_meta_title", "Keep me").await;
    // Tier, listing flags and tags are staged before the metadata cleanup fails
    fx.store.fail_steps_for(account_id).await;
    let before = fx.store.state().await;

    let outcome = fx.service.downgrades.perform_downgrade(account_id).await;
    assert!(matches!(outcome, DowngradeOutcome::Failed { .. }));
    assert!(outcome.error().unwrap().contains("metadata cleanup failed"));

    assert_eq!(fx.store.state().await, before);
    assert_eq!(fx.store.committed_transactions(), 0);
    assert!(fx.notifier.sent().is_empty());

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(summary.downgrades, 0);
    assert_eq!(summary.failed_downgrades, 1);
    assert_eq!(fx.status(listing_id).await, StudioStatus::Inactive);
    assert_eq!(fx.store.state().await, before);
}

#[tokio::test]
async fn test_account_without_listing_is_still_downgraded() {
    let fx = Fixture::new();
    let account_id = Uuid::new_v4();
    fx.store
        .insert_account(
            AccountRecord {
                id: account_id,
                email: "nolisting@x.example".to_string(),
                display_name: None,
                membership_tier: MembershipTier::Premium,
            },
            Vec::new(),
        )
        .await;

    let outcome = fx.service.downgrades.perform_downgrade(account_id).await;
    assert_eq!(
        outcome,
        DowngradeOutcome::Downgraded {
            account_id,
            listing_id: None,
            notified: true,
        }
    );
    assert_eq!(fx.tier(account_id).await, MembershipTier::Basic);

    let (_, _, vars) = &fx.notifier.sent()[0];
    assert!(!vars.contains_key("display_name"));
    assert!(!vars.contains_key("studio_name"));
}

#[tokio::test]
async fn test_notification_failure_keeps_downgrade_successful() {
    let fx = Fixture::with_notifier(RecordingNotifier::failing());
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            status: StudioStatus::Inactive,
            ..StudioSpec::premium("p@x.example", Some(now() - Duration::days(1)))
        })
        .await;

    let summary = fx.service.run_sweep(now()).await.unwrap();

    assert_eq!(summary.downgrades, 1);
    assert_eq!(summary.failed_downgrades, 0);
    assert_eq!(fx.tier(account_id).await, MembershipTier::Basic);
    assert_eq!(fx.status(listing_id).await, StudioStatus::Active);
}

// =============================================================================
// Applier
// =============================================================================

#[tokio::test]
async fn test_partial_failure_only_activates_successful_downgrades() {
    let fx = Fixture::new();
    let lapsed = Some(now() - Duration::days(1));
    let mut ids = Vec::new();
    for email in ["one@x.example", "two@x.example", "three@x.example"] {
        ids.push(
            fx.add(StudioSpec {
                status: StudioStatus::Inactive,
                ..StudioSpec::premium(email, lapsed)
            })
            .await,
        );
    }
    let (failing_account, failing_listing) = ids[1];
    fx.store.fail_commits_for(failing_account).await;

    let decisions = fx.service.preview(now()).await.unwrap();
    assert_eq!(decisions.len(), 3);
    assert!(decisions.iter().all(|d| d.trigger_downgrade));

    let summary = fx.service.applier.apply(&decisions).await;
    assert_eq!(summary.downgrades, 2);
    assert_eq!(summary.status_updates, 2);
    assert_eq!(summary.failed_downgrades, 1);

    assert_eq!(fx.status(ids[0].1).await, StudioStatus::Active);
    assert_eq!(fx.status(ids[2].1).await, StudioStatus::Active);
    assert_eq!(fx.status(failing_listing).await, StudioStatus::Inactive);
    assert_eq!(fx.tier(failing_account).await, MembershipTier::Premium);

    let notified: Vec<Uuid> = fx.notifier.sent().into_iter().map(|(id, _, _)| id).collect();
    assert_eq!(notified, vec![ids[0].0, ids[2].0]);
}

#[tokio::test]
async fn test_failed_downgrade_leaves_active_listing_untouched() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec::premium("p@x.example", Some(now() - Duration::days(1))))
        .await;
    fx.store.fail_commits_for(account_id).await;

    let summary = fx.service.run_sweep(now()).await.unwrap();

    assert_eq!(summary.downgrades, 0);
    assert_eq!(summary.status_updates, 0);
    assert_eq!(summary.failed_downgrades, 1);
    assert_eq!(fx.status(listing_id).await, StudioStatus::Active);
}

#[tokio::test]
async fn test_stale_decision_for_basic_account_does_not_activate() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            status: StudioStatus::Inactive,
            ..StudioSpec::basic("raced@x.example")
        })
        .await;

    // Decision computed while the account still looked PREMIUM
    let stale = EnforcementDecision {
        listing_id,
        account_id,
        status_update: None,
        unfeature: false,
        trigger_downgrade: true,
    };
    let summary = fx.service.applier.apply(&[stale]).await;

    assert_eq!(summary.downgrades, 0);
    assert_eq!(summary.failed_downgrades, 0);
    assert_eq!(fx.status(listing_id).await, StudioStatus::Inactive);

    // The next sweep sees a BASIC account and fixes the listing
    fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(fx.status(listing_id).await, StudioStatus::Active);
}

#[tokio::test]
async fn test_unknown_listing_update_is_not_an_error() {
    let fx = Fixture::new();
    let decision = EnforcementDecision {
        listing_id: Uuid::new_v4(),
        account_id: Uuid::new_v4(),
        status_update: Some(StatusUpdate {
            from: StudioStatus::Inactive,
            to: StudioStatus::Active,
            reason: StatusReason::BasicTier,
        }),
        unfeature: true,
        trigger_downgrade: false,
    };

    let summary = fx.service.applier.apply(&[decision]).await;
    assert_eq!(summary.status_updates, 1);
    assert_eq!(summary.unfeatured_updates, 1);
    assert_eq!(summary.failed_updates, 0);
}

#[tokio::test]
async fn test_failed_listing_writes_are_counted_and_retried() {
    let fx = Fixture::new();
    let (expired_account, expired_listing) = fx
        .add(StudioSpec {
            status: StudioStatus::Inactive,
            ..StudioSpec::premium("expired@x.example", Some(now() - Duration::days(1)))
        })
        .await;
    let (_, basic_listing) = fx
        .add(StudioSpec {
            status: StudioStatus::Inactive,
            is_featured: true,
            featured_until: Some(now() - Duration::hours(2)),
            ..StudioSpec::basic("hidden@x.example")
        })
        .await;
    fx.store.fail_listing_writes(true);

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(
        summary,
        EnforcementSummary {
            status_updates: 2,
            unfeatured_updates: 1,
            downgrades: 1,
            failed_downgrades: 0,
            // bulk activation, single status update, bulk unfeature
            failed_updates: 3,
        }
    );
    assert_eq!(fx.tier(expired_account).await, MembershipTier::Basic);
    assert_eq!(fx.status(expired_listing).await, StudioStatus::Inactive);

    // Work that did not land comes back, without a second downgrade
    let pending = fx.service.preview(now()).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|d| !d.trigger_downgrade));
    assert!(pending
        .iter()
        .all(|d| d.status_update.map(|u| u.reason) == Some(StatusReason::BasicTier)));
    let unfeature: Vec<Uuid> = pending
        .iter()
        .filter(|d| d.unfeature)
        .map(|d| d.listing_id)
        .collect();
    assert_eq!(unfeature, vec![basic_listing]);

    fx.store.fail_listing_writes(false);
    let retry = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(retry.failed_updates, 0);
    assert_eq!(retry.downgrades, 0);
    assert_eq!(retry.status_updates, 2);
    assert_eq!(fx.status(expired_listing).await, StudioStatus::Active);
    assert!(!fx.store.listing(basic_listing).await.unwrap().is_featured);
    assert!(fx.service.preview(now()).await.unwrap().is_empty());
    assert_eq!(fx.notifier.sent().len(), 1);
}

// =============================================================================
// End-to-end sweeps
// =============================================================================

#[tokio::test]
async fn test_scenario_expired_premium_is_downgraded_and_stays_live() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            status: StudioStatus::Active,
            is_featured: true,
            featured_until: None,
            studio_types: BTreeSet::from([StudioType::Voiceover]),
            ..StudioSpec::premium("s1@x.example", Some(now() - Duration::days(1)))
        })
        .await;

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(summary.downgrades, 1);
    assert_eq!(summary.unfeatured_updates, 0);

    assert_eq!(fx.tier(account_id).await, MembershipTier::Basic);
    let listing = fx.store.listing(listing_id).await.unwrap();
    assert!(!listing.show_phone);
    assert!(!listing.is_verified);
    assert!(!listing.is_featured);
    assert!(!listing.is_premium);
    assert_eq!(listing.status, StudioStatus::Active);
    assert_eq!(listing.studio_types, BTreeSet::from([StudioType::Home]));
}

#[tokio::test]
async fn test_scenario_admin_listing_is_reactivated_without_downgrade() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec {
            period_ends: Vec::new(),
            status: StudioStatus::Inactive,
            ..StudioSpec::premium(ADMIN_EMAIL, None)
        })
        .await;

    let decisions = fx.service.preview(now()).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(
        decisions[0].status_update.map(|u| u.reason),
        Some(StatusReason::AdminOverride)
    );
    assert!(!decisions[0].trigger_downgrade);

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(summary.status_updates, 1);
    assert_eq!(summary.downgrades, 0);
    assert_eq!(fx.status(listing_id).await, StudioStatus::Active);
    assert_eq!(fx.tier(account_id).await, MembershipTier::Premium);
    assert!(fx.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_scenario_expired_feature_is_cleared_on_basic_listing() {
    let fx = Fixture::new();
    let (_, listing_id) = fx
        .add(StudioSpec {
            is_featured: true,
            featured_until: Some(datetime!(2020-01-01 0:00 UTC)),
            ..StudioSpec::basic("s3@x.example")
        })
        .await;

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(summary.unfeatured_updates, 1);
    assert_eq!(summary.status_updates, 0);
    assert_eq!(summary.downgrades, 0);

    let listing = fx.store.listing(listing_id).await.unwrap();
    assert!(!listing.is_featured);
    assert_eq!(listing.status, StudioStatus::Active);
}

#[tokio::test]
async fn test_live_premium_listing_is_left_alone() {
    let fx = Fixture::new();
    let (account_id, listing_id) = fx
        .add(StudioSpec::premium("live@x.example", Some(now() + Duration::days(20))))
        .await;
    let before = fx.store.state().await;

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(summary, Default::default());
    assert_eq!(fx.store.state().await, before);
    assert_eq!(fx.tier(account_id).await, MembershipTier::Premium);
    assert_eq!(fx.status(listing_id).await, StudioStatus::Active);
}

#[tokio::test]
async fn test_sweeps_converge_after_failure_clears() {
    let fx = Fixture::new();
    let lapsed = Some(now() - Duration::days(2));
    let (ok_account, _) = fx.add(StudioSpec::premium("ok@x.example", lapsed)).await;
    let (flaky_account, flaky_listing) = fx
        .add(StudioSpec::premium("flaky@x.example", lapsed))
        .await;
    fx.store.fail_commits_for(flaky_account).await;

    let first = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(first.downgrades, 1);
    assert_eq!(fx.tier(ok_account).await, MembershipTier::Basic);

    // Same decision comes back for the account that is still inconsistent
    let pending = fx.service.preview(now()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].account_id, flaky_account);
    assert!(pending[0].trigger_downgrade);

    let report = fx.service.check_invariants(now()).await.unwrap();
    assert_eq!(report.pending_downgrades, 1);

    fx.store.clear_commit_failures().await;

    let second = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(second.downgrades, 1);
    assert_eq!(fx.tier(flaky_account).await, MembershipTier::Basic);
    assert_eq!(fx.status(flaky_listing).await, StudioStatus::Active);

    assert!(fx.service.preview(now()).await.unwrap().is_empty());
    let report = fx.service.check_invariants(now()).await.unwrap();
    assert!(report.healthy);
    assert_eq!(report.pending_downgrades, 0);
}

#[tokio::test]
async fn test_mixed_sweep_counts() {
    let fx = Fixture::new();
    let lapsed = Some(now() - Duration::days(1));
    fx.add(StudioSpec::premium("expired@x.example", lapsed)).await;
    fx.add(StudioSpec {
        status: StudioStatus::Inactive,
        ..StudioSpec::basic("hidden-basic@x.example")
    })
    .await;
    fx.add(StudioSpec {
        is_featured: true,
        featured_until: Some(now() - Duration::hours(1)),
        ..StudioSpec::premium("featured@x.example", Some(now() + Duration::days(9)))
    })
    .await;
    fx.add(StudioSpec::basic("fine@x.example")).await;

    let summary = fx.service.run_sweep(now()).await.unwrap();
    assert_eq!(summary.downgrades, 1);
    assert_eq!(summary.status_updates, 2);
    assert_eq!(summary.unfeatured_updates, 1);
    assert_eq!(summary.failed_updates, 0);

    let report = fx.service.check_invariants(now()).await.unwrap();
    assert!(report.healthy, "violations: {:?}", report.violations);
}
