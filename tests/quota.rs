use std::sync::Arc;

use postspark::account::NewAccount;
use postspark::plans::Plan;
use postspark::quota::{ConsumeOutcome, QuotaEnforcer};
use postspark::store::{AccountStore, MemoryAccountStore};
use tokio::sync::Barrier;
use tokio::task::JoinSet;

fn new_account(id: &str) -> NewAccount {
    NewAccount {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: id.to_string(),
    }
}

// key: quota-tests -> enforcement under sequential and concurrent load

#[tokio::test]
async fn first_sign_in_creates_free_zero_usage_account() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    let account = store.create_if_absent(new_account("acct-1")).await.unwrap();

    assert_eq!(account.plan, Plan::Free);
    assert_eq!(account.usage_count, 0);
    assert!(account.last_used_at.is_none());
    assert!(account.billing_subscription_ref.is_none());
}

#[tokio::test]
async fn repeated_binding_returns_existing_record_untouched() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    store.create_if_absent(new_account("acct-1")).await.unwrap();

    let enforcer = QuotaEnforcer::new(store.clone());
    assert!(matches!(
        enforcer.try_consume("acct-1").await.unwrap(),
        ConsumeOutcome::Allowed(_)
    ));

    let mut rebound = new_account("acct-1");
    rebound.email = "changed@example.com".to_string();
    let account = store.create_if_absent(rebound).await.unwrap();
    assert_eq!(account.usage_count, 1, "rebinding must not reset usage");
    assert_eq!(account.email, "acct-1@example.com");
}

#[tokio::test]
async fn free_plan_allows_five_then_denies() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    store.create_if_absent(new_account("acct-1")).await.unwrap();
    let enforcer = QuotaEnforcer::new(store.clone());

    for attempt in 1..=5 {
        match enforcer.try_consume("acct-1").await.unwrap() {
            ConsumeOutcome::Allowed(account) => {
                assert_eq!(account.usage_count, attempt);
                assert!(account.last_used_at.is_some());
            }
            other => panic!("attempt {attempt} should be allowed, got {other:?}"),
        }
    }

    let sixth = enforcer.try_consume("acct-1").await.unwrap();
    let ConsumeOutcome::Denied(account) = sixth else {
        panic!("sixth call should be denied, got {sixth:?}");
    };
    assert_eq!(account.usage_count, 5);
}

#[tokio::test]
async fn denial_leaves_ledger_untouched() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    store.create_if_absent(new_account("acct-1")).await.unwrap();
    let enforcer = QuotaEnforcer::new(store.clone());

    for _ in 0..5 {
        enforcer.try_consume("acct-1").await.unwrap();
    }
    let before = store.get("acct-1").await.unwrap().unwrap();

    for _ in 0..3 {
        assert!(matches!(
            enforcer.try_consume("acct-1").await.unwrap(),
            ConsumeOutcome::Denied(_)
        ));
    }

    let after = store.get("acct-1").await.unwrap().unwrap();
    assert_eq!(after.usage_count, before.usage_count);
    assert_eq!(after.version, before.version);
    assert_eq!(after.last_used_at, before.last_used_at);
}

#[tokio::test]
async fn missing_account_is_reported_not_created() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    let enforcer = QuotaEnforcer::new(store.clone());

    assert!(matches!(
        enforcer.try_consume("ghost").await.unwrap(),
        ConsumeOutcome::AccountNotFound
    ));
    assert!(store.get("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn last_unit_race_yields_one_allowed_one_denied() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    store.create_if_absent(new_account("acct-1")).await.unwrap();
    let enforcer = QuotaEnforcer::new(store.clone());

    // Burn down to usage == quota - 1.
    for _ in 0..4 {
        enforcer.try_consume("acct-1").await.unwrap();
    }

    let barrier = Arc::new(Barrier::new(2));
    let mut set = JoinSet::new();
    for _ in 0..2 {
        let enforcer = enforcer.clone();
        let barrier = barrier.clone();
        set.spawn(async move {
            barrier.wait().await;
            enforcer.try_consume("acct-1").await.unwrap()
        });
    }

    let mut allowed = 0;
    let mut denied = 0;
    while let Some(outcome) = set.join_next().await {
        match outcome.unwrap() {
            ConsumeOutcome::Allowed(_) => allowed += 1,
            ConsumeOutcome::Denied(_) => denied += 1,
            ConsumeOutcome::AccountNotFound => panic!("account exists"),
        }
    }
    assert_eq!((allowed, denied), (1, 1));

    let account = store.get("acct-1").await.unwrap().unwrap();
    assert_eq!(account.usage_count, 5);
}

#[tokio::test]
async fn usage_never_exceeds_quota_under_concurrency() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    store.create_if_absent(new_account("acct-1")).await.unwrap();
    let enforcer = QuotaEnforcer::new(store.clone());

    let barrier = Arc::new(Barrier::new(20));
    let mut set = JoinSet::new();
    for _ in 0..20 {
        let enforcer = enforcer.clone();
        let barrier = barrier.clone();
        set.spawn(async move {
            barrier.wait().await;
            enforcer.try_consume("acct-1").await.unwrap()
        });
    }

    let mut allowed = 0;
    while let Some(outcome) = set.join_next().await {
        if matches!(outcome.unwrap(), ConsumeOutcome::Allowed(_)) {
            allowed += 1;
        }
    }

    let account = store.get("acct-1").await.unwrap().unwrap();
    assert_eq!(allowed, Plan::Free.quota());
    assert_eq!(account.usage_count, Plan::Free.quota());
}

#[tokio::test]
async fn concurrent_upgrade_loses_no_updates() {
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    store.create_if_absent(new_account("acct-1")).await.unwrap();
    let enforcer = QuotaEnforcer::new(store.clone());

    for _ in 0..4 {
        enforcer.try_consume("acct-1").await.unwrap();
    }

    // A checkout-completed upgrade races one more consume attempt.
    let barrier = Arc::new(Barrier::new(2));
    let consume = {
        let enforcer = enforcer.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            enforcer.try_consume("acct-1").await.unwrap()
        })
    };
    let upgrade = {
        let store = store.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            store
                .apply_checkout("acct-1", Plan::Pro, "cus_1", "sub_1")
                .await
                .unwrap()
        })
    };

    let outcome = consume.await.unwrap();
    upgrade.await.unwrap().expect("account exists");

    let account = store.get("acct-1").await.unwrap().unwrap();
    assert_eq!(account.plan, Plan::Pro);
    let consumed = matches!(outcome, ConsumeOutcome::Allowed(_));
    // Whatever the interleaving, the ledger reflects exactly the operations
    // that logically completed.
    assert_eq!(account.usage_count, 4 + i64::from(consumed));
    assert_eq!(account.billing_subscription_ref.as_deref(), Some("sub_1"));
}
