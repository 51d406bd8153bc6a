use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::account::{NewAccount, UserAccount};
use crate::plans::Plan;

/// key: account-store -> atomic ledger mutations
///
/// The account record is the only shared mutable state in the system. Every
/// mutation goes through one of these operations, each of which is atomic
/// relative to other mutations on the same record, so a generation request
/// racing a billing webhook never loses an update.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<UserAccount>>;

    /// Idempotent creation. When the record already exists (including a lost
    /// creation race) the existing record is returned untouched.
    async fn create_if_absent(&self, new: NewAccount) -> Result<UserAccount>;

    /// Conditional increment of `usage_count`, gated on the record still
    /// carrying `expected_version`. Returns false when a concurrent writer
    /// got there first; the caller re-reads and retries.
    async fn increment_usage(&self, id: &str, expected_version: i64) -> Result<bool>;

    /// Applies a completed checkout: plan, billing refs, `plan_updated_at`.
    /// Returns None when no account with `id` exists.
    async fn apply_checkout(
        &self,
        id: &str,
        plan: Plan,
        customer_ref: &str,
        subscription_ref: &str,
    ) -> Result<Option<UserAccount>>;

    /// Downgrades whichever account holds `subscription_ref` back to free and
    /// clears the ref. Returns None when no account matches.
    async fn clear_subscription(&self, subscription_ref: &str) -> Result<Option<UserAccount>>;
}

/// key: account-store-postgres -> sqlx implementation
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &PgRow) -> Result<UserAccount> {
    let plan_raw: String = row.get("plan");
    let plan = Plan::parse(&plan_raw).map_err(|e| anyhow!("stored plan is invalid: {e}"))?;
    Ok(UserAccount {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        plan,
        usage_count: row.get("usage_count"),
        last_used_at: row.get("last_used_at"),
        billing_customer_ref: row.get("billing_customer_ref"),
        billing_subscription_ref: row.get("billing_subscription_ref"),
        plan_updated_at: row.get("plan_updated_at"),
        created_at: row.get("created_at"),
        version: row.get("version"),
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get(&self, id: &str) -> Result<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM user_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn create_if_absent(&self, new: NewAccount) -> Result<UserAccount> {
        sqlx::query(
            r#"
            INSERT INTO user_accounts (id, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&new.id)
        .bind(&new.email)
        .bind(&new.display_name)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM user_accounts WHERE id = $1")
            .bind(&new.id)
            .fetch_one(&self.pool)
            .await?;
        account_from_row(&row)
    }

    async fn increment_usage(&self, id: &str, expected_version: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_accounts
            SET usage_count = usage_count + 1,
                last_used_at = NOW(),
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn apply_checkout(
        &self,
        id: &str,
        plan: Plan,
        customer_ref: &str,
        subscription_ref: &str,
    ) -> Result<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            UPDATE user_accounts
            SET plan = $2,
                billing_customer_ref = $3,
                billing_subscription_ref = $4,
                plan_updated_at = NOW(),
                version = version + 1
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(plan.as_str())
        .bind(customer_ref)
        .bind(subscription_ref)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn clear_subscription(&self, subscription_ref: &str) -> Result<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            UPDATE user_accounts
            SET plan = 'free',
                billing_subscription_ref = NULL,
                plan_updated_at = NOW(),
                version = version + 1
            WHERE billing_subscription_ref = $1
            RETURNING *
            "#,
        )
        .bind(subscription_ref)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }
}

/// key: account-store-memory -> dashmap implementation
///
/// Backs local development (`ACCOUNT_STORE=memory`) and the integration
/// tests. DashMap's per-entry locking gives the same atomicity as the
/// conditional UPDATEs in the Postgres store.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, UserAccount>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, id: &str) -> Result<Option<UserAccount>> {
        Ok(self.accounts.get(id).map(|entry| entry.clone()))
    }

    async fn create_if_absent(&self, new: NewAccount) -> Result<UserAccount> {
        let entry = self
            .accounts
            .entry(new.id.clone())
            .or_insert_with(|| new.into_account(Utc::now()));
        Ok(entry.clone())
    }

    async fn increment_usage(&self, id: &str, expected_version: i64) -> Result<bool> {
        let Some(mut entry) = self.accounts.get_mut(id) else {
            return Ok(false);
        };
        if entry.version != expected_version {
            return Ok(false);
        }
        entry.usage_count += 1;
        entry.last_used_at = Some(Utc::now());
        entry.version += 1;
        Ok(true)
    }

    async fn apply_checkout(
        &self,
        id: &str,
        plan: Plan,
        customer_ref: &str,
        subscription_ref: &str,
    ) -> Result<Option<UserAccount>> {
        let Some(mut entry) = self.accounts.get_mut(id) else {
            return Ok(None);
        };
        entry.plan = plan;
        entry.billing_customer_ref = Some(customer_ref.to_string());
        entry.billing_subscription_ref = Some(subscription_ref.to_string());
        entry.plan_updated_at = Some(Utc::now());
        entry.version += 1;
        Ok(Some(entry.clone()))
    }

    async fn clear_subscription(&self, subscription_ref: &str) -> Result<Option<UserAccount>> {
        for mut entry in self.accounts.iter_mut() {
            if entry.billing_subscription_ref.as_deref() == Some(subscription_ref) {
                entry.plan = Plan::Free;
                entry.billing_subscription_ref = None;
                entry.plan_updated_at = Some(Utc::now());
                entry.version += 1;
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }
}
