use super::*;
use serde_json::json;
use std::time::Duration;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("leasebook_test_store");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn open(name: &str) -> Arc<Store> {
    let path = test_wal_path(name);
    Arc::new(Store::open(path, Arc::new(NotifyHub::new())).unwrap())
}

fn doc(path: &str) -> DocPath {
    DocPath::parse(path).unwrap()
}

fn coll(path: &str) -> CollectionPath {
    CollectionPath::parse(path).unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn set_get_and_delete() {
    let store = open("set_get.wal");
    let path = doc("bookings/B1");

    let seq = store
        .set(&path, fields([("bookingStatus", json!("pending"))]))
        .await
        .unwrap();
    assert_eq!(seq, 1);

    let got = store.get(&path).unwrap();
    assert_eq!(got.version, 1);
    assert_eq!(got.get("bookingStatus"), Some(&json!("pending")));
    assert!(store.exists(&path));

    store.delete(&path).await.unwrap();
    assert!(store.get(&path).is_none());
    assert!(store.list(&coll("bookings")).is_empty());
    // Deleting again is fine.
    store.delete(&path).await.unwrap();
}

#[tokio::test]
async fn update_merges_and_requires_existing() {
    let store = open("update_merge.wal");
    let path = doc("bookings/B1");
    store
        .set(&path, fields([("a", json!(1)), ("b", json!(2))]))
        .await
        .unwrap();

    store.update(&path, fields([("b", json!(3))])).await.unwrap();
    let got = store.get(&path).unwrap();
    assert_eq!(got.get("a"), Some(&json!(1)));
    assert_eq!(got.get("b"), Some(&json!(3)));

    let missing = store
        .update(&doc("bookings/B2"), fields([("a", json!(1))]))
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn list_query_and_collection_group() {
    let store = open("query.wal");
    let mut txn = store.begin();
    txn.set(
        &doc("owner_properties/o@x.com/properties/P1/bookings/B1"),
        fields([("bookingStatus", json!("confirmed"))]),
    );
    txn.set(
        &doc("owner_properties/o@x.com/properties/P2/bookings/B2"),
        fields([("bookingStatus", json!("approved"))]),
    );
    txn.set(
        &doc("owner_properties/q@x.com/properties/P3/bookings/B3"),
        fields([("bookingStatus", json!("confirmed"))]),
    );
    txn.set(&doc("bookings/B1"), fields([("bookingStatus", json!("confirmed"))]));
    txn.commit().await.unwrap();

    let p1 = store.list(&coll("owner_properties/o@x.com/properties/P1/bookings"));
    assert_eq!(p1.len(), 1);
    assert_eq!(p1[0].id(), "B1");

    let confirmed = store.collection_group("bookings", &Filter::all().eq("bookingStatus", "confirmed"));
    let ids: Vec<&str> = confirmed.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec!["B1", "B1", "B3"]);

    let approved = store.query(&coll("bookings"), &Filter::all().eq("bookingStatus", "approved"));
    assert!(approved.is_empty());
    assert!(store.list(&coll("nothing_here")).is_empty());
}

#[tokio::test]
async fn transaction_is_all_or_nothing() {
    let store = open("txn_atomic.wal");
    let existing = doc("a/1");
    store.set(&existing, fields([("v", json!(0))])).await.unwrap();

    let mut txn = store.begin();
    txn.create(&doc("a/2"), fields([("v", json!(1))])).unwrap();
    assert!(matches!(
        txn.create(&existing, fields([("v", json!(9))])),
        Err(StoreError::AlreadyExists(_))
    ));
    drop(txn);
    assert!(store.get(&doc("a/2")).is_none());

    let mut txn = store.begin();
    txn.set(&doc("a/2"), fields([("v", json!(2))]));
    txn.delete(&existing);
    assert_eq!(txn.write_count(), 2);
    let seq = txn.commit().await.unwrap();
    assert_eq!(store.get(&doc("a/2")).unwrap().version, seq);
    assert!(store.get(&existing).is_none());
}

#[tokio::test]
async fn transaction_reads_its_own_writes() {
    let store = open("txn_own_writes.wal");
    let path = doc("a/1");
    let mut txn = store.begin();
    assert!(txn.get(&path).is_none());
    txn.set(&path, fields([("v", json!(1))]));
    assert_eq!(txn.get(&path).unwrap().get("v"), Some(&json!(1)));
    txn.update(&path, fields([("w", json!(2))])).unwrap();
    txn.commit().await.unwrap();

    let got = store.get(&path).unwrap();
    assert_eq!(got.get("v"), Some(&json!(1)));
    assert_eq!(got.get("w"), Some(&json!(2)));
}

#[tokio::test]
async fn stale_read_conflicts() {
    let store = open("txn_conflict.wal");
    let path = doc("Properties/o/Available/P1");
    store.set(&path, fields([("isAvailable", json!(true))])).await.unwrap();

    let mut first = store.begin();
    let mut second = store.begin();
    first.require(&path).unwrap();
    second.require(&path).unwrap();

    first.delete(&path);
    first.commit().await.unwrap();

    second.update(&path, fields([("title", json!("x"))])).unwrap();
    let err = second.commit().await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(p) if p == path));
    assert!(store.get(&path).is_none());
}

#[tokio::test]
async fn repeated_read_returns_first_snapshot() {
    let store = open("txn_repeatable.wal");
    let path = doc("Properties/o/Unavailable/P1");
    store.set(&path, fields([("isAvailable", json!(false))])).await.unwrap();

    let mut txn = store.begin();
    let first = txn.require(&path).unwrap();
    store.delete(&path).await.unwrap();

    // The concurrent delete is invisible until commit, where it conflicts.
    let again = txn.require(&path).unwrap();
    assert_eq!(again, first);
    txn.set(&doc("bookings/B1"), fields([("bookingStatus", json!("cancelled"))]));
    assert!(matches!(txn.commit().await, Err(StoreError::Conflict(p)) if p == path));
    assert!(store.get(&doc("bookings/B1")).is_none());
}

#[tokio::test]
async fn absent_read_conflicts_with_create() {
    let store = open("txn_absent_conflict.wal");
    let path = doc("chats/C1");

    let mut txn = store.begin();
    assert!(txn.get(&path).is_none());
    store.set(&path, fields([("by", json!("other"))])).await.unwrap();

    txn.set(&path, fields([("by", json!("me"))]));
    assert!(matches!(txn.commit().await, Err(StoreError::Conflict(_))));
    assert_eq!(store.get(&path).unwrap().get("by"), Some(&json!("other")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_transaction_retries_on_conflict() {
    let store = open("txn_retry.wal");
    let path = doc("counters/c");
    store.set(&path, fields([("n", json!(0))])).await.unwrap();

    let mut attempts = 0;
    let n: i64 = store
        .run_transaction(|txn| {
            attempts += 1;
            let current = txn.require(&path)?.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            if attempts == 1 {
                // Sneak a commit in between this read and our commit.
                let mut other = store.begin();
                other.set(&path, fields([("n", json!(10))]));
                futures::executor::block_on(other.commit())?;
            }
            txn.update(&path, fields([("n", json!(current + 1))]))?;
            Ok::<_, StoreError>(current + 1)
        })
        .await
        .unwrap();

    assert_eq!(attempts, 2);
    assert_eq!(n, 11);
    assert_eq!(store.get(&path).unwrap().get("n"), Some(&json!(11)));
}

#[tokio::test]
async fn concurrent_increments_all_land() {
    let store = open("txn_concurrent.wal");
    let path = doc("counters/c");
    store.set(&path, fields([("n", json!(0))])).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let path = path.clone();
        handles.push(tokio::spawn(async move {
            store
                .run_transaction(|txn| {
                    let n = txn.require(&path)?.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                    txn.update(&path, fields([("n", json!(n + 1))]))
                })
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(store.get(&path).unwrap().get("n"), Some(&json!(4)));
}

#[tokio::test]
async fn write_limit_is_enforced() {
    let store = open("txn_limit.wal");
    let mut txn = store.begin();
    for i in 0..=MAX_WRITES_PER_COMMIT {
        txn.set(&doc(&format!("bulk/{i}")), fields([("i", json!(i))]));
    }
    assert!(matches!(
        txn.commit().await,
        Err(StoreError::LimitExceeded(_))
    ));
    assert_eq!(store.doc_count(), 0);
}

#[tokio::test]
async fn replay_restores_state() {
    let path = test_wal_path("replay.wal");
    {
        let store = Store::open(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        store.set(&doc("bookings/B1"), fields([("s", json!("pending"))])).await.unwrap();
        store.set(&doc("bookings/B2"), fields([("s", json!("pending"))])).await.unwrap();
        store.update(&doc("bookings/B1"), fields([("s", json!("confirmed"))])).await.unwrap();
        store.delete(&doc("bookings/B2")).await.unwrap();
    }

    let store = Store::open(path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(store.last_seq(), 4);
    assert_eq!(store.doc_count(), 1);
    assert_eq!(store.get(&doc("bookings/B1")).unwrap().get("s"), Some(&json!("confirmed")));
    assert_eq!(store.list(&coll("bookings")).len(), 1);
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compact.wal");
    {
        let store = Store::open(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        for i in 0..10 {
            store.set(&doc("a/1"), fields([("n", json!(i))])).await.unwrap();
        }
        store.set(&doc("a/2"), fields([("n", json!(0))])).await.unwrap();
        assert_eq!(store.wal_appends_since_compact().await, 11);

        store.compact_wal().await.unwrap();
        assert_eq!(store.wal_appends_since_compact().await, 0);

        store.set(&doc("a/3"), fields([("n", json!(0))])).await.unwrap();
    }

    let store = Store::open(path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(store.doc_count(), 3);
    assert_eq!(store.get(&doc("a/1")).unwrap().get("n"), Some(&json!(9)));
    assert!(store.exists(&doc("a/3")));
}

#[tokio::test]
async fn subscription_snapshots_then_changes() {
    let store = open("subscribe.wal");
    let path = doc("chats/C1/messages/M1");
    store.set(&path, fields([("text", json!("hi"))])).await.unwrap();

    let mut sub = store.subscribe::<Fields>(coll("chats/C1/messages"), Filter::all());
    let first = sub.next().await.unwrap();
    assert_eq!(first.len(), 1);

    store
        .set(&doc("chats/C1/messages/M2"), fields([("text", json!("yo"))]))
        .await
        .unwrap();
    let second = sub.next().await.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[1].get("text"), Some(&json!("yo")));
}

#[tokio::test]
async fn subscription_filter_applies() {
    let store = open("subscribe_filter.wal");
    let mut sub = store.subscribe::<Fields>(
        coll("bookings"),
        Filter::all().eq("tenantEmail", "t@x.com"),
    );
    assert!(sub.next().await.unwrap().is_empty());

    store
        .set(&doc("bookings/B1"), fields([("tenantEmail", json!("u@x.com"))]))
        .await
        .unwrap();
    assert!(sub.next().await.unwrap().is_empty());

    store
        .set(&doc("bookings/B2"), fields([("tenantEmail", json!("t@x.com"))]))
        .await
        .unwrap();
    let snap = sub.next().await.unwrap();
    assert_eq!(snap.len(), 1);
}

#[tokio::test]
async fn dropping_subscription_releases_listener() {
    let store = open("subscribe_drop.wal");
    let collection = coll("chats");
    let mut sub = store.subscribe::<Fields>(collection.clone(), Filter::all());
    sub.next().await.unwrap();
    assert_eq!(store.notify().listener_count(&collection), 1);

    drop(sub);
    assert!(eventually(|| store.notify().listener_count(&collection) == 0).await);

    // The next commit prunes the idle channel.
    store.set(&doc("chats/C1"), fields([("x", json!(1))])).await.unwrap();
    assert_eq!(store.notify().channel_count(), 0);
}

#[tokio::test]
async fn subscription_ends_when_store_dropped() {
    let store = open("subscribe_store_gone.wal");
    let mut sub = store.subscribe::<Fields>(coll("chats"), Filter::all());
    sub.next().await.unwrap();
    drop(store);
    // The hub's sender goes with the store, closing the channel.
    assert!(sub.next().await.is_none());
}
