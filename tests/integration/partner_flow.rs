use std::sync::Arc;

use experiences_partner_lib::db::repositories::partner_repository::PartnerRepository;
use experiences_partner_lib::db::store::{PartnerStore, SqliteStore};
use experiences_partner_lib::db::DbPool;
use experiences_partner_lib::models::partner::{PartnerRecord, PartnerRegistration, PuntiLabel};
use experiences_partner_lib::services::partner_service::PartnerService;
use tempfile::tempdir;

fn setup() -> (PartnerService, DbPool, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("partners.sqlite")).expect("db pool");
    let store = Arc::new(SqliteStore::new(pool.clone()));
    (PartnerService::new(store), pool, dir)
}

#[test]
fn partner_lifecycle_against_sqlite() {
    let (service, _pool, _dir) = setup();

    let registered = service
        .register(PartnerRegistration {
            listing_id: "kayak-tour".into(),
            owner_id: "host-17".into(),
        })
        .expect("register");
    assert_eq!((registered.punti, registered.commission), (0, 15));

    let raised = service.set_punti("kayak-tour", 45.0).expect("set punti");
    assert_eq!(raised.commission, 37);
    assert_eq!(raised.label, PuntiLabel::TopRate);
    assert_eq!(raised.share_display, "41%");

    let adjusted = service.adjust_punti("kayak-tour", 40.0).expect("adjust");
    assert_eq!(adjusted.punti, 85);
    assert_eq!(adjusted.commission, 50);
    assert_eq!(adjusted.label, PuntiLabel::Relevant);

    let lowered = service.set_commission("kayak-tour", 20.0).expect("set commission");
    assert_eq!((lowered.punti, lowered.commission), (10, 20));
    assert!((lowered.host_share - 0.8).abs() < 1e-12);

    let reread = service.standing("kayak-tour").expect("standing");
    assert_eq!(reread, lowered);
}

#[test]
fn duplicate_listing_surfaces_as_conflict() {
    let (service, _pool, _dir) = setup();
    let registration = PartnerRegistration {
        listing_id: "wine-tasting".into(),
        owner_id: "host-1".into(),
    };
    service.register(registration.clone()).expect("first");
    let err = service.register(registration).expect_err("second must fail");
    assert!(err.is_conflict());
}

#[test]
fn reconciliation_repairs_rows_written_outside_the_service() {
    let (service, pool, _dir) = setup();
    let now = chrono::Utc::now().to_rfc3339();

    pool.with_connection(|conn| {
        for (listing_id, punti, commission) in [
            ("legacy-a", 30, 40),
            ("legacy-b", -12, 15),
            ("legacy-c", 20, 25),
        ] {
            PartnerRepository::insert(
                conn,
                &PartnerRecord {
                    listing_id: listing_id.into(),
                    owner_id: "host-legacy".into(),
                    punti,
                    commission,
                    created_at: now.clone(),
                    updated_at: now.clone(),
                },
            )?;
        }
        Ok(())
    })
    .expect("seed legacy rows");

    let report = service.reconcile().expect("reconcile");
    assert_eq!(report.inspected, 3);
    let corrected: Vec<_> = report
        .corrected
        .iter()
        .map(|entry| (entry.listing_id.as_str(), entry.punti, entry.commission))
        .collect();
    assert_eq!(corrected, vec![("legacy-a", 30, 30), ("legacy-b", 0, 15)]);

    let reconciled_count: i64 = pool
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM partners WHERE reconciled_at IS NOT NULL",
                [],
                |row| row.get(0),
            )?)
        })
        .expect("count");
    assert_eq!(reconciled_count, 3);

    let store = SqliteStore::new(pool.clone());
    let stored = store.read_punti("legacy-b").expect("read").expect("row");
    assert_eq!((stored.punti, stored.commission), (0, 15));
}

#[test]
fn owner_listing_only_returns_that_owner() {
    let (service, _pool, _dir) = setup();
    for (listing_id, owner_id) in [("a", "host-1"), ("b", "host-2"), ("c", "host-1")] {
        service
            .register(PartnerRegistration {
                listing_id: listing_id.into(),
                owner_id: owner_id.into(),
            })
            .expect("register");
    }

    let owned = service.standings_for_owner("host-1").expect("list");
    assert_eq!(owned.len(), 2);
    assert!(owned.iter().all(|standing| standing.owner_id == "host-1"));
}
