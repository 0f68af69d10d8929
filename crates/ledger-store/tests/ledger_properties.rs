//! Ledger properties that every `Store` backend must satisfy.
//!
//! The in-memory backend always runs. The PostgreSQL backend runs when the
//! ignored tests are requested and `DATABASE_URL` points at a scratch database.

use std::sync::Arc;

use futures::future::join_all;
use ledger_core::{CompanyId, TransactionKind};
use ledger_store::{AdjustmentMode, MemoryStore, PgStore, Store, StoreError};

fn unique_company(prefix: &str) -> CompanyId {
    CompanyId::new(format!("{prefix}-{}", uuid::Uuid::new_v4())).unwrap()
}

async fn assert_balanced<S: Store + ?Sized>(store: &S, company_id: &CompanyId) {
    let account = store.get_account(company_id).await.unwrap().unwrap();
    assert_eq!(
        account.balance,
        account.purchased_total - account.spent_total,
        "balance drifted from totals: {account:?}"
    );
    assert!(account.balance >= 0, "negative balance: {account:?}");
}

// =============================================================================
// Shared scenarios
// =============================================================================

async fn totals_hold_after_every_operation<S: Store + ?Sized>(store: &S) {
    let company = unique_company("totals");
    let event = format!("evt-{company}");

    store.credit(&company, 40, &event, &event).await.unwrap();
    assert_balanced(store, &company).await;

    store.debit(&company, 15, "lead-1").await.unwrap();
    assert_balanced(store, &company).await;

    store
        .adjust(&company, 5, "goodwill", AdjustmentMode::Standard)
        .await
        .unwrap();
    assert_balanced(store, &company).await;

    store
        .adjust(&company, -10, "partial chargeback", AdjustmentMode::Standard)
        .await
        .unwrap();
    assert_balanced(store, &company).await;

    let _ = store.debit(&company, 1_000, "lead-2").await.unwrap_err();
    assert_balanced(store, &company).await;

    store.refund(&company, 15, "lead-1").await.unwrap();
    assert_balanced(store, &company).await;

    assert_eq!(store.get_balance(&company).await.unwrap(), 35);
}

async fn redelivered_event_credits_once<S: Store + ?Sized>(store: &S) {
    let company = unique_company("redeliver");
    let event = format!("evt-{company}");

    for attempt in 0..3 {
        let result = store.credit(&company, 10, &event, &event).await;
        if attempt == 0 {
            assert_eq!(result.unwrap(), 10);
        } else {
            assert!(matches!(result, Err(StoreError::DuplicateEvent { .. })));
        }
    }

    assert_eq!(store.get_balance(&company).await.unwrap(), 10);
    let purchases = store
        .list_transactions(&company, 100, 0)
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.kind == TransactionKind::Purchase)
        .count();
    assert_eq!(purchases, 1);
}

async fn concurrent_duplicate_credits_apply_once<S: Store + ?Sized>(store: Arc<S>) {
    let company = unique_company("race");
    let event = format!("evt-{company}");

    let results = join_all((0..8).map(|_| {
        let store = Arc::clone(&store);
        let company = company.clone();
        let event = event.clone();
        async move { store.credit(&company, 10, &event, &event).await }
    }))
    .await;

    let applied = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::DuplicateEvent { .. })))
        .count();

    assert_eq!(applied, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(store.get_balance(&company).await.unwrap(), 10);
}

async fn concurrent_distinct_events_all_apply<S: Store + ?Sized>(store: Arc<S>) {
    let company = unique_company("fanin");
    let events: Vec<String> = (0..8).map(|i| format!("evt-{company}-{i}")).collect();

    let results = join_all(events.iter().map(|event| {
        let store = Arc::clone(&store);
        let company = company.clone();
        async move { store.credit(&company, 10, event, event).await }
    }))
    .await;
    assert!(results.iter().all(Result::is_ok), "{results:?}");

    assert_eq!(store.get_balance(&company).await.unwrap(), 80);
    let purchases = store
        .list_transactions(&company, 100, 0)
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.kind == TransactionKind::Purchase)
        .count();
    assert_eq!(purchases, 8);
    for event in &events {
        assert!(store.has_processed_event(event).await.unwrap());
    }
    let account = store.get_account(&company).await.unwrap().unwrap();
    assert_eq!(account.purchased_total, 80);
    assert_balanced(store.as_ref(), &company).await;
}

async fn overflowing_adjustment_is_refused<S: Store + ?Sized>(store: &S) {
    let company = unique_company("overflow");
    let event = format!("evt-{company}");
    store.credit(&company, 10, &event, &event).await.unwrap();

    for delta in [i64::MIN, i64::MAX] {
        assert!(matches!(
            store
                .adjust(&company, delta, "bad", AdjustmentMode::Corrective)
                .await,
            Err(StoreError::InvalidAmount(_))
        ));
    }

    assert_eq!(store.get_balance(&company).await.unwrap(), 10);
    assert_eq!(store.list_transactions(&company, 10, 0).await.unwrap().len(), 1);
    assert_balanced(store, &company).await;
}

async fn concurrent_debits_never_overdraw<S: Store + ?Sized + 'static>(store: Arc<S>) {
    let company = unique_company("overdraw");
    let event = format!("evt-{company}");
    store.credit(&company, 10, &event, &event).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = Arc::clone(&store);
            let company = company.clone();
            tokio::spawn(async move { store.debit(&company, 3, &format!("lead-{i}")).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(balance) => {
                assert!(balance >= 0);
                succeeded += 1;
            }
            Err(StoreError::InsufficientCredits { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(store.get_balance(&company).await.unwrap(), 1);
    assert_balanced(store.as_ref(), &company).await;
}

// =============================================================================
// In-memory backend
// =============================================================================

#[tokio::test]
async fn memory_totals_hold_after_every_operation() {
    totals_hold_after_every_operation(&MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_redelivered_event_credits_once() {
    redelivered_event_credits_once(&MemoryStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_duplicate_credits_apply_once() {
    concurrent_duplicate_credits_apply_once(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_distinct_events_all_apply() {
    concurrent_distinct_events_all_apply(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn memory_overflowing_adjustment_is_refused() {
    overflowing_adjustment_is_refused(&MemoryStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_debits_never_overdraw() {
    concurrent_debits_never_overdraw(Arc::new(MemoryStore::new())).await;
}

// =============================================================================
// PostgreSQL backend
// =============================================================================

async fn pg_store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let store = PgStore::connect(&url, 16).await.unwrap();
    store.migrate().await.unwrap();
    store
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn pg_totals_hold_after_every_operation() {
    totals_hold_after_every_operation(&pg_store().await).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn pg_redelivered_event_credits_once() {
    redelivered_event_credits_once(&pg_store().await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn pg_concurrent_duplicate_credits_apply_once() {
    concurrent_duplicate_credits_apply_once(Arc::new(pg_store().await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn pg_concurrent_distinct_events_all_apply() {
    concurrent_distinct_events_all_apply(Arc::new(pg_store().await)).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn pg_overflowing_adjustment_is_refused() {
    overflowing_adjustment_is_refused(&pg_store().await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn pg_concurrent_debits_never_overdraw() {
    concurrent_debits_never_overdraw(Arc::new(pg_store().await)).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn pg_corrective_adjustment_blocks_automated_mutation() {
    let store = pg_store().await;
    let company = unique_company("corrective");
    let event = format!("evt-{company}");
    store.credit(&company, 5, &event, &event).await.unwrap();

    store
        .adjust(&company, -8, "disputed", AdjustmentMode::Corrective)
        .await
        .unwrap();

    assert!(matches!(
        store.debit(&company, 1, "lead-1").await,
        Err(StoreError::ConsistencyViolation { .. })
    ));

    store
        .adjust(&company, 3, "repair", AdjustmentMode::Standard)
        .await
        .unwrap();
    let account = store.reconcile(&company).await.unwrap();
    assert!(!account.needs_reconciliation);

    store.wipe_company(&company).await.unwrap();
    assert!(store.get_account(&company).await.unwrap().is_none());
}
