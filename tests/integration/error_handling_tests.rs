// Boundary validation and storage failure paths

use std::sync::Arc;

use chrono::Utc;
use experiences_partner_lib::db::migrations::{get_migration_history, rollback_to_version};
use experiences_partner_lib::db::store::{SqliteStore, TotalsStore};
use experiences_partner_lib::db::DbPool;
use experiences_partner_lib::error::AppError;
use experiences_partner_lib::models::totals::{AggregateTotals, TotalsDelta};
use experiences_partner_lib::services::partner_service::PartnerService;
use experiences_partner_lib::utils::coerce::coerce_number;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn non_finite_deltas_are_rejected_before_folding() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = TotalsDelta::new([1.0, bad, 0.0, 0.0]).expect_err("must reject");
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(err.validation_details().expect("details")["slot"], 1);
    }
}

#[test]
fn stale_totals_version_is_a_conflict() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("stale.sqlite")).expect("db pool");
    let store = SqliteStore::new(pool);

    let first = store
        .write_totals("listing", &AggregateTotals::default(), 0)
        .expect("first write");
    assert_eq!(first.version, 1);

    let again = store.write_totals("listing", &AggregateTotals::default(), 0);
    assert!(matches!(again, Err(AppError::Conflict { .. })));

    let stale = store.write_totals("listing", &AggregateTotals::default(), 7);
    assert!(matches!(stale, Err(AppError::Conflict { .. })));

    let second = store
        .write_totals("listing", &AggregateTotals::default(), 1)
        .expect("second write");
    assert_eq!(second.version, 2);
}

#[test]
fn garbage_payload_values_fail_fast() {
    let err = coerce_number("punti", &json!({ "value": 3 })).expect_err("object");
    assert!(matches!(err, AppError::Validation { .. }));
    assert!(coerce_number("punti", &json!("12abc")).is_err());
}

#[test]
fn writing_punti_for_unknown_listing_is_not_found() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("missing.sqlite")).expect("db pool");
    let service = PartnerService::new(Arc::new(SqliteStore::new(pool)));

    assert!(matches!(
        service.set_commission("ghost", 30.0),
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        service.adjust_punti("ghost", 1.0),
        Err(AppError::NotFound)
    ));
}

#[test]
fn migrations_are_recorded_and_can_roll_back() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("migrations.sqlite")).expect("db pool");
    let conn = pool.get_connection().expect("connection");

    let history = get_migration_history(&conn).expect("history");
    let versions: Vec<_> = history.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert!(history.iter().all(|entry| entry.applied_at <= Utc::now()));

    rollback_to_version(&conn, 0).expect("rollback");
    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'aggregate_totals'",
            [],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(table_count, 0);
    drop(conn);

    // Reopening replays the migrations.
    let conn = pool.get_connection().expect("reopen");
    assert_eq!(get_migration_history(&conn).expect("history").len(), 3);
}
