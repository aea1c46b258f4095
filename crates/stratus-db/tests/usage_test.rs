mod helpers;

use futures::future::join_all;
use helpers::{setup_test_db, stored_file};
use stratus_core::{AppError, FileMetadataStore, QuotaService};
use stratus_db::{FileRepository, PgFileMetadataStore, UsageRepository};
use uuid::Uuid;

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let db = setup_test_db().await;
    let usage = UsageRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    let tasks = (0..20).map(|_| {
        let usage = usage.clone();
        tokio::spawn(async move { usage.increment(org_id, 1_000, 1).await })
    });
    for outcome in join_all(tasks).await {
        outcome.unwrap().unwrap();
    }

    let totals = usage.get(org_id).await.unwrap();
    assert_eq!(totals.used_storage_bytes, 20_000);
    assert_eq!(totals.file_count, 20);
}

#[tokio::test]
async fn test_unknown_org_has_zero_usage_and_no_limit() {
    let db = setup_test_db().await;
    let usage = UsageRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    let totals = usage.get(org_id).await.unwrap();
    assert_eq!(totals.used_storage_bytes, 0);
    assert_eq!(totals.file_count, 0);

    let decision = usage.check(org_id, u64::MAX).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.available(), None);
}

#[tokio::test]
async fn test_quota_allows_exactly_the_limit() {
    let db = setup_test_db().await;
    let usage = UsageRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    usage.increment(org_id, 600, 2).await.unwrap();
    usage.set_limit(org_id, Some(1_000)).await.unwrap();

    let at_limit = usage.check(org_id, 400).await.unwrap();
    assert!(at_limit.allowed);

    let over = usage.check(org_id, 401).await.unwrap();
    assert!(!over.allowed);
    assert_eq!(over.available(), Some(400));
    assert!(over.reason.is_some());

    // Setting a limit leaves the counters alone
    assert_eq!(usage.get(org_id).await.unwrap().used_storage_bytes, 600);
}

#[tokio::test]
async fn test_clearing_the_limit_makes_org_unlimited() {
    let db = setup_test_db().await;
    let usage = UsageRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    usage.set_limit(org_id, Some(10)).await.unwrap();
    assert!(!usage.check(org_id, 11).await.unwrap().allowed);

    usage.set_limit(org_id, None).await.unwrap();
    let decision = usage.check(org_id, 1_000_000).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit, None);
}

#[tokio::test]
async fn test_bulk_insert_returns_row_count() {
    let db = setup_test_db().await;
    let files = FileRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    let records = vec![
        stored_file(org_id, "a.txt", 10),
        stored_file(org_id, "b.txt", 20),
        stored_file(org_id, "c.txt", 30),
    ];
    assert_eq!(files.insert_many(&records).await.unwrap(), 3);
    assert_eq!(files.count_for_org(org_id).await.unwrap(), 3);
    assert_eq!(files.count_for_org(Uuid::new_v4()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_bulk_insert_is_all_or_nothing() {
    let db = setup_test_db().await;
    let files = FileRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    let first = stored_file(org_id, "a.txt", 10);
    let mut duplicate = stored_file(org_id, "b.txt", 20);
    duplicate.file_id = first.file_id;
    let records = vec![first, stored_file(org_id, "c.txt", 30), duplicate];

    let err = files.insert_many(&records).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(files.count_for_org(org_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_reconcile_repairs_drift() {
    let db = setup_test_db().await;
    let store = PgFileMetadataStore::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    let records = vec![stored_file(org_id, "a.txt", 100), stored_file(org_id, "b.txt", 50)];
    store.insert_many(&records).await.unwrap();
    store.increment_usage(org_id, 150, 2).await.unwrap();
    // Accounting for a batch whose files never made it to the table
    store.increment_usage(org_id, 9_999, 7).await.unwrap();

    let drifted = store.usage().get(org_id).await.unwrap();
    assert_eq!(drifted.used_storage_bytes, 10_149);

    let repaired = store.usage().reconcile(org_id).await.unwrap();
    assert_eq!(repaired.used_storage_bytes, 150);
    assert_eq!(repaired.file_count, 2);
    assert_eq!(store.usage().get(org_id).await.unwrap(), repaired);
}

#[tokio::test]
async fn test_reconcile_keeps_the_limit() {
    let db = setup_test_db().await;
    let usage = UsageRepository::new(db.pool.clone());
    let org_id = Uuid::new_v4();

    usage.set_limit(org_id, Some(500)).await.unwrap();
    usage.increment(org_id, 300, 3).await.unwrap();
    usage.reconcile(org_id).await.unwrap();

    let decision = usage.check(org_id, 501).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.current_usage, 0);
    assert_eq!(decision.limit, Some(500));
}
