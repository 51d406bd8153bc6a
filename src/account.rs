use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plans::Plan;

/// key: usage-ledger -> per-account plan,usage record
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub plan: Plan,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub billing_customer_ref: Option<String>,
    pub billing_subscription_ref: Option<String>,
    pub plan_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency token; bumped on every mutation.
    pub version: i64,
}

impl UserAccount {
    pub fn remaining(&self) -> i64 {
        (self.plan.quota() - self.usage_count).max(0)
    }
}

/// Defaults applied on first sign-in for an unseen identity.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl NewAccount {
    pub fn into_account(self, now: DateTime<Utc>) -> UserAccount {
        UserAccount {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            plan: Plan::Free,
            usage_count: 0,
            last_used_at: None,
            billing_customer_ref: None,
            billing_subscription_ref: None,
            plan_updated_at: None,
            created_at: now,
            version: 0,
        }
    }
}
