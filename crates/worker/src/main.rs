//! StudioDir Background Worker
//!
//! Handles scheduled jobs including:
//! - Membership enforcement sweep (hourly by default, `ENFORCEMENT_CRON`)
//! - Invariant check after every sweep
//! - Health check heartbeat (every 5 minutes)

mod config;

use std::sync::Arc;
use std::time::Duration;

use studiodir_membership::{
    EnforcementPolicy, EnforcementService, LogNotificationSender, NotificationSender,
    WebhookNotificationSender,
};
use studiodir_shared::create_pool;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;

/// Pick the notification channel for downgrade confirmations
fn build_notifier(config: &WorkerConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    match &config.notification_webhook_url {
        Some(url) => {
            info!(url = %url, "Sending downgrade notifications via webhook");
            Ok(Arc::new(WebhookNotificationSender::new(
                url.clone(),
                config.notification_webhook_token.clone(),
            )?))
        }
        None => {
            warn!("NOTIFICATION_WEBHOOK_URL not set - downgrade notifications will only be logged");
            Ok(Arc::new(LogNotificationSender))
        }
    }
}

/// One enforcement cycle: sweep (or preview in dry-run mode), then check invariants
async fn run_enforcement(service: &EnforcementService, dry_run: bool) {
    let now = OffsetDateTime::now_utc();

    if dry_run {
        match service.preview(now).await {
            Ok(decisions) => {
                for decision in &decisions {
                    info!(
                        listing_id = %decision.listing_id,
                        account_id = %decision.account_id,
                        status_update = ?decision.status_update,
                        unfeature = decision.unfeature,
                        trigger_downgrade = decision.trigger_downgrade,
                        "Dry run: would apply decision"
                    );
                }
                info!(decisions = decisions.len(), "Dry run enforcement complete");
            }
            Err(e) => error!(error = %e, "Failed to load enforcement snapshot"),
        }
        return;
    }

    if let Err(e) = service.run_sweep(now).await {
        error!(error = %e, "Membership enforcement sweep failed");
        return;
    }

    match service.check_invariants(OffsetDateTime::now_utc()).await {
        Ok(report) if report.healthy => {
            info!(
                listings = report.listings_checked,
                checks = report.checks_run,
                "Membership invariants hold"
            );
        }
        Ok(report) => {
            for violation in &report.violations {
                warn!(
                    invariant = %violation.invariant,
                    severity = %violation.severity,
                    listing_id = %violation.listing_id,
                    account_id = %violation.account_id,
                    "{}",
                    violation.description
                );
            }
            warn!(
                violations = report.violations.len(),
                pending_downgrades = report.pending_downgrades,
                "Membership invariants violated after sweep"
            );
        }
        Err(e) => error!(error = %e, "Failed to run membership invariant checks"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting StudioDir Worker");

    let config = WorkerConfig::from_env()?;
    if config.admins.is_empty() {
        warn!("ADMIN_EMAILS is empty - no listings are exempt from enforcement");
    }

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    let notifier = build_notifier(&config)?;
    let service = EnforcementService::postgres(
        pool,
        notifier,
        EnforcementPolicy::new(config.admins.clone()),
    );

    if config.run_on_startup {
        info!(dry_run = config.dry_run, "Running startup enforcement sweep");
        run_enforcement(&service, config.dry_run).await;
    }

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Job 1: Membership enforcement
    let enforcement_service = service.clone();
    let dry_run = config.dry_run;
    scheduler
        .add(Job::new_async(
            config.enforcement_cron.as_str(),
            move |_uuid, _l| {
                let service = enforcement_service.clone();
                Box::pin(async move {
                    info!("Running scheduled membership enforcement");
                    run_enforcement(&service, dry_run).await;
                })
            },
        )?)
        .await?;
    info!(cron = %config.enforcement_cron, "Scheduled: Membership enforcement");

    // Job 2: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("StudioDir Worker started successfully with {} scheduled jobs", 2);

    // The scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
