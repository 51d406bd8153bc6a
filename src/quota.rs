use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::account::UserAccount;
use crate::store::AccountStore;

/// Retry budget for the version-check loop. Contention on a single account is
/// a handful of concurrent requests at most, so hitting this is a bug signal.
const MAX_CAS_RETRIES: usize = 8;

#[derive(Debug)]
pub enum ConsumeOutcome {
    Allowed(UserAccount),
    Denied(UserAccount),
    AccountNotFound,
}

/// key: quota-enforcer -> check-then-increment without lost updates
///
/// Reads the ledger, computes the limit from the plan catalog, and commits the
/// increment only if the record is unchanged since the read. The enforcer
/// never touches `plan`; plan transitions belong to the billing webhook
/// handler.
#[derive(Clone)]
pub struct QuotaEnforcer {
    store: Arc<dyn AccountStore>,
}

impl QuotaEnforcer {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub async fn try_consume(&self, account_id: &str) -> Result<ConsumeOutcome> {
        for _ in 0..MAX_CAS_RETRIES {
            let Some(account) = self.store.get(account_id).await? else {
                return Ok(ConsumeOutcome::AccountNotFound);
            };

            let limit = account.plan.quota();
            if account.usage_count >= limit {
                return Ok(ConsumeOutcome::Denied(account));
            }

            if self
                .store
                .increment_usage(account_id, account.version)
                .await?
            {
                let mut updated = account;
                updated.usage_count += 1;
                updated.last_used_at = Some(Utc::now());
                updated.version += 1;
                return Ok(ConsumeOutcome::Allowed(updated));
            }
            // Version moved under us (concurrent consume or plan change);
            // re-read and re-decide against the fresh record.
        }

        Err(anyhow!(
            "account {account_id}: contention exceeded retry budget"
        ))
    }
}
