use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;

use leasebook::booking::{
    build_booking, BookingBuckets, BookingGateway, BookingRequest, BookingViews, CheckoutRequest,
    Lifecycle, PaymentHandler, PaymentOutcome, StatusFilter,
};
use leasebook::config::Config;
use leasebook::model::{BookingStatus, Partition};
use leasebook::notify::NotifyHub;
use leasebook::property::{BrowseFilter, NewListing, PropertyCatalog};
use leasebook::session::{Identity, Session, UserRole};
use leasebook::store::paths;
use leasebook::{Error, Store};

// ── Test infrastructure ──────────────────────────────────────

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("leasebook_int_booking_flow");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn open(path: &PathBuf) -> Arc<Store> {
    Arc::new(Store::open(path.clone(), Arc::new(NotifyHub::new())).unwrap())
}

fn owner() -> Session {
    Session::signed_in(Identity::new("meera@homes.in", "Meera", "+919000000001", UserRole::Owner))
}

fn tenant(n: u32) -> Session {
    Session::signed_in(Identity::new(
        &format!("tenant{n}@mail.com"),
        &format!("Tenant {n}"),
        "+919000000100",
        UserRole::Tenant,
    ))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn exactly_one_partition(store: &Store, owner: &str, property_id: &str) -> Option<Partition> {
    let available = store.exists(&paths::property(owner, Partition::Available, property_id).unwrap());
    let unavailable =
        store.exists(&paths::property(owner, Partition::Unavailable, property_id).unwrap());
    match (available, unavailable) {
        (true, false) => Some(Partition::Available),
        (false, true) => Some(Partition::Unavailable),
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn list_book_pay_approve_cancel() {
    let path = test_wal_path("full_flow.wal");
    let store = open(&path);
    let catalog = PropertyCatalog::new(store.clone());
    let gateway = BookingGateway::new(store.clone());
    let payments = PaymentHandler::new(gateway.clone());
    let lifecycle = Lifecycle::new(store.clone());
    let views = BookingViews::new(store.clone());

    let property = catalog
        .create_listing(
            &owner(),
            NewListing {
                title: "Lakeview 1BHK".into(),
                kind: "Flat".into(),
                price: 10_000,
                location: "Powai".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Tenant finds it and books six months from June.
    let found = catalog.browse_available(&BrowseFilter::default()).unwrap();
    assert_eq!(found.len(), 1);
    let request = BookingRequest::new(date(2025, 6, 1), 6, 2, "two adults").unwrap();
    let booking = build_booking(&tenant(1), &found[0], request, date(2025, 5, 1)).unwrap();
    assert_eq!(booking.end_date, Some(date(2025, 12, 1)));
    assert_eq!(booking.total_amount, 60_000);
    assert_eq!(booking.security_deposit, 10_000);
    gateway.save(&booking).await.unwrap();

    // Checkout for the advance, then the gateway calls back.
    let checkout = CheckoutRequest::for_booking(&booking, &Config::default());
    assert_eq!(checkout.amount, 2_000);
    let confirmation = payments
        .handle(&booking, PaymentOutcome::success("pay_abc"))
        .await
        .unwrap();
    assert_eq!(confirmation.booking.booking_status, BookingStatus::Confirmed);

    let pending = views.pending_for_owner(&owner()).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, booking.id);

    // Approve: booking and partition move together.
    lifecycle.approve(&owner(), &booking.id).await.unwrap();
    assert_eq!(
        exactly_one_partition(&store, "meera@homes.in", &property.id),
        Some(Partition::Unavailable)
    );
    assert!(catalog.browse_available(&BrowseFilter::default()).unwrap().is_empty());

    let buckets = BookingBuckets::new(views.list_for_tenant(&tenant(1)).unwrap());
    assert_eq!(buckets.get(StatusFilter::Approved).len(), 1);
    assert!(buckets.get(StatusFilter::Pending).is_empty());

    // Cancel restores the original partition.
    lifecycle.cancel(&tenant(1), &booking.id, "moving abroad").await.unwrap();
    assert_eq!(
        exactly_one_partition(&store, "meera@homes.in", &property.id),
        Some(Partition::Available)
    );
    assert!(catalog.get("meera@homes.in", &property.id).unwrap().is_available);
}

#[tokio::test]
async fn state_survives_reopen() {
    let path = test_wal_path("reopen.wal");
    let (property_id, booking_id) = {
        let store = open(&path);
        let catalog = PropertyCatalog::new(store.clone());
        let gateway = BookingGateway::new(store.clone());
        let property = catalog
            .create_listing(
                &owner(),
                NewListing {
                    title: "Garden Studio".into(),
                    kind: "Studio".into(),
                    price: 8_000,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let request = BookingRequest::new(date(2030, 1, 1), 12, 1, "").unwrap();
        let booking = build_booking(&tenant(1), &property, request, date(2030, 1, 1)).unwrap();
        gateway.save(&booking).await.unwrap();
        PaymentHandler::new(gateway)
            .handle(&booking, PaymentOutcome::success("pay_1"))
            .await
            .unwrap();
        Lifecycle::new(store)
            .approve(&owner(), &booking.id)
            .await
            .unwrap();
        (property.id, booking.id)
    };

    let store = open(&path);
    let booking = BookingGateway::new(store.clone()).get(&booking_id).await.unwrap();
    assert_eq!(booking.booking_status, BookingStatus::Approved);
    assert_eq!(booking.payment_id, "pay_1");
    assert_eq!(
        exactly_one_partition(&store, "meera@homes.in", &property_id),
        Some(Partition::Unavailable)
    );

    // And the lattice still holds after replay.
    let again = Lifecycle::new(store).approve(&owner(), &booking_id).await;
    assert!(matches!(again, Err(Error::PreconditionFailed(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_tenants_one_approval() {
    let path = test_wal_path("competing.wal");
    let store = open(&path);
    let catalog = PropertyCatalog::new(store.clone());
    let gateway = BookingGateway::new(store.clone());
    let payments = PaymentHandler::new(gateway.clone());
    let lifecycle = Lifecycle::new(store.clone());

    let property = catalog
        .create_listing(
            &owner(),
            NewListing {
                title: "Corner 3BHK".into(),
                kind: "Flat".into(),
                price: 30_000,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut ids = Vec::new();
    for n in 0..4 {
        let request = BookingRequest::new(date(2030, 3, 1), 1, 1, "").unwrap();
        let b = build_booking(&tenant(n), &property, request, date(2030, 1, 1)).unwrap();
        gateway.save(&b).await.unwrap();
        payments.handle(&b, PaymentOutcome::success(&format!("pay_{n}"))).await.unwrap();
        ids.push(b.id);
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let lifecycle = lifecycle.clone();
        handles.push(tokio::spawn(async move { lifecycle.approve(&owner(), &id).await }));
    }
    let mut won = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(Error::PreconditionFailed(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(
        exactly_one_partition(&store, "meera@homes.in", &property.id),
        Some(Partition::Unavailable)
    );

    // The losers are still waiting and can be rejected.
    let views = BookingViews::new(store);
    let waiting = views.pending_for_owner(&owner()).unwrap();
    assert_eq!(waiting.len(), 3);
    for b in waiting {
        lifecycle.reject(&owner(), &b.id, "already let").await.unwrap();
    }
    let buckets = BookingBuckets::new(views.list_for_owner(&owner()).unwrap());
    assert_eq!(buckets.get(StatusFilter::Rejected).len(), 3);
    assert_eq!(buckets.get(StatusFilter::Approved).len(), 1);
}
