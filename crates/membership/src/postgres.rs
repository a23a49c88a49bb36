//! Postgres implementation of the membership store
//!
//! Tables read and written:
//!
//! - `accounts` (`id`, `email`, `display_name`, `membership_tier`)
//! - `subscriptions` (`account_id`, `current_period_end`, `created_at`)
//! - `studios` (`id`, `account_id`, `name`, `status`, `is_featured`,
//!   `featured_until`, `show_phone`, `show_directions`, `is_verified`, `is_premium`)
//! - `studio_types` (`studio_id`, `studio_type`)
//! - `account_metadata` (`account_id`, `key`, `value`)
//! - `membership_tier_changes` (audit)

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use studiodir_shared::{MembershipTier, StudioStatus, StudioType};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{EnforcementError, EnforcementResult};
use crate::models::{
    AccountRecord, AccountSnapshot, ListingRecord, StudioSnapshot, SubscriptionSnapshot,
};
use crate::store::{MembershipStore, MembershipTransaction, TierChangeRecord};

/// Row type for the sweep snapshot
#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    listing_id: Uuid,
    status: String,
    is_featured: bool,
    featured_until: Option<OffsetDateTime>,
    account_id: Uuid,
    email: String,
    membership_tier: String,
    has_subscription: bool,
    current_period_end: Option<OffsetDateTime>,
}

impl TryFrom<SnapshotRow> for StudioSnapshot {
    type Error = EnforcementError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        // Only the latest subscription is loaded, it is all the decision engine reads
        let subscriptions = if row.has_subscription {
            vec![SubscriptionSnapshot {
                current_period_end: row.current_period_end,
            }]
        } else {
            Vec::new()
        };

        Ok(StudioSnapshot {
            listing_id: row.listing_id,
            status: row.status.parse()?,
            is_featured: row.is_featured,
            featured_until: row.featured_until,
            account: AccountSnapshot {
                id: row.account_id,
                email: row.email,
                membership_tier: row.membership_tier.parse()?,
                subscriptions,
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    display_name: Option<String>,
    membership_tier: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    account_id: Uuid,
    name: String,
    status: String,
    is_featured: bool,
    featured_until: Option<OffsetDateTime>,
    show_phone: bool,
    show_directions: bool,
    is_verified: bool,
    is_premium: bool,
}

/// sqlx-backed store
#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn load_snapshot(&self) -> EnforcementResult<Vec<StudioSnapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT
                s.id AS listing_id,
                s.status,
                s.is_featured,
                s.featured_until,
                a.id AS account_id,
                a.email,
                a.membership_tier,
                (latest.account_id IS NOT NULL) AS has_subscription,
                latest.current_period_end
            FROM studios s
            JOIN accounts a ON a.id = s.account_id
            LEFT JOIN LATERAL (
                SELECT sub.account_id, sub.current_period_end
                FROM subscriptions sub
                WHERE sub.account_id = a.id
                ORDER BY sub.created_at DESC
                LIMIT 1
            ) latest ON true
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StudioSnapshot::try_from).collect()
    }

    async fn begin(&self) -> EnforcementResult<Box<dyn MembershipTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMembershipTransaction { tx }))
    }

    async fn set_listing_status(
        &self,
        listing_id: Uuid,
        status: StudioStatus,
    ) -> EnforcementResult<u64> {
        let result = sqlx::query("UPDATE studios SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(listing_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_listing_status_many(
        &self,
        listing_ids: &[Uuid],
        status: StudioStatus,
    ) -> EnforcementResult<u64> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        let result =
            sqlx::query("UPDATE studios SET status = $1, updated_at = NOW() WHERE id = ANY($2)")
                .bind(status.as_str())
                .bind(listing_ids)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn unfeature_listings(&self, listing_ids: &[Uuid]) -> EnforcementResult<u64> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE studios SET is_featured = false, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(listing_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Open Postgres transaction; rolled back by sqlx if dropped uncommitted
pub struct PgMembershipTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MembershipTransaction for PgMembershipTransaction {
    async fn lock_account(&mut self, account_id: Uuid) -> EnforcementResult<Option<AccountRecord>> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, email, display_name, membership_tier
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> EnforcementResult<AccountRecord> {
            Ok(AccountRecord {
                id: row.id,
                email: row.email,
                display_name: row.display_name,
                membership_tier: row.membership_tier.parse()?,
            })
        })
        .transpose()
    }

    async fn listing_for_account(
        &mut self,
        account_id: Uuid,
    ) -> EnforcementResult<Option<ListingRecord>> {
        let row: Option<ListingRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, name, status, is_featured, featured_until,
                   show_phone, show_directions, is_verified, is_premium
            FROM studios
            WHERE account_id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags: Vec<String> =
            sqlx::query_scalar("SELECT studio_type FROM studio_types WHERE studio_id = $1")
                .bind(row.id)
                .fetch_all(&mut *self.tx)
                .await?;
        let studio_types = tags
            .iter()
            .map(|t| t.parse::<StudioType>())
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Some(ListingRecord {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            status: row.status.parse()?,
            is_featured: row.is_featured,
            featured_until: row.featured_until,
            show_phone: row.show_phone,
            show_directions: row.show_directions,
            is_verified: row.is_verified,
            is_premium: row.is_premium,
            studio_types,
        }))
    }

    async fn set_membership_tier(
        &mut self,
        account_id: Uuid,
        tier: MembershipTier,
    ) -> EnforcementResult<()> {
        let rows = sqlx::query(
            "UPDATE accounts SET membership_tier = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(tier.as_str())
        .bind(account_id)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(EnforcementError::NotFound(format!(
                "Account {} not found",
                account_id
            )));
        }
        Ok(())
    }

    async fn strip_premium_listing_fields(&mut self, listing_id: Uuid) -> EnforcementResult<()> {
        sqlx::query(
            r#"
            UPDATE studios SET
                show_phone = false,
                show_directions = false,
                is_verified = false,
                is_featured = false,
                is_premium = false,
                featured_until = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(listing_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_studio_types(
        &mut self,
        listing_id: Uuid,
        studio_types: &BTreeSet<StudioType>,
    ) -> EnforcementResult<()> {
        let tags: Vec<&'static str> = studio_types.iter().map(|t| t.as_str()).collect();

        sqlx::query("DELETE FROM studio_types WHERE studio_id = $1")
            .bind(listing_id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query(
            "INSERT INTO studio_types (studio_id, studio_type) SELECT $1, UNNEST($2::text[])",
        )
        .bind(listing_id)
        .bind(&tags)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_account_metadata(
        &mut self,
        account_id: Uuid,
        keys: &[String],
    ) -> EnforcementResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let result =
            sqlx::query("DELETE FROM account_metadata WHERE account_id = $1 AND key = ANY($2)")
                .bind(account_id)
                .bind(keys)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn record_tier_change(&mut self, change: &TierChangeRecord) -> EnforcementResult<()> {
        sqlx::query(
            r#"
            INSERT INTO membership_tier_changes
                (id, account_id, from_tier, to_tier, source, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(change.account_id)
        .bind(change.from_tier.as_str())
        .bind(change.to_tier.as_str())
        .bind(change.source)
        .bind(change.reason)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EnforcementResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> EnforcementResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
