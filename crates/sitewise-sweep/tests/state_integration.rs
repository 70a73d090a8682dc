//! Record store persistence through SQLite

mod test_utils;

use sitewise_sweep::api::AssociationRecord;
use sitewise_sweep::state::{RecordStore, SqliteRecordStore, open_db, setup_schema};
use sitewise_sweep::testing::InstantSleeper;
use sitewise_sweep::{CleanupScope, Sweeper};
use sitewise_sweep_test_utils::open_test_db;
use test_utils::{fast_options, plant};

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.db");
    let key = AssociationRecord::new("p", "h", "c").store_key();

    {
        let pool = open_db(Some(&path)).await.unwrap();
        let store = SqliteRecordStore::new(pool.clone());
        store.put(&key, "{\"removed_at\":\"now\"}").await.unwrap();
        pool.close().await;
    }

    let store = SqliteRecordStore::new(open_db(Some(&path)).await.unwrap());
    assert_eq!(
        store.get(&key).await.unwrap().as_deref(),
        Some("{\"removed_at\":\"now\"}")
    );
    assert_eq!(store.get("run/missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_schema_setup_is_idempotent() {
    let pool = open_test_db().await.unwrap();
    setup_schema(&pool).await.unwrap();
    setup_schema(&pool).await.unwrap();

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='records'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_cleanup_persists_to_sqlite() {
    let pool = open_test_db().await.unwrap();
    setup_schema(&pool).await.unwrap();
    let store = SqliteRecordStore::new(pool);
    let fake = plant();
    let sleeper = InstantSleeper::new();
    let sweeper = Sweeper::new(&fake, &sleeper, &store, fast_options());

    let report = sweeper.run_cleanup(&CleanupScope::default()).await.unwrap();

    assert!(store.get(&report.store_key()).await.unwrap().is_some());
    for record in &report.disassociated {
        assert!(store.get(&record.store_key()).await.unwrap().is_some());
    }
}
