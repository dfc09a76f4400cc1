use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use experiences_partner_lib::db::store::SqliteStore;
use experiences_partner_lib::db::DbPool;
use experiences_partner_lib::error::AppError;
use experiences_partner_lib::models::settings::TotalsSettingsUpdate;
use experiences_partner_lib::models::totals::{BucketGranularity, CounterTuple, TotalsDelta};
use experiences_partner_lib::services::settings_service::SettingsService;
use experiences_partner_lib::services::totals_service::TotalsService;
use tempfile::tempdir;

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn setup() -> (TotalsService, Arc<SettingsService>, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("totals.sqlite")).expect("db pool");
    let settings = Arc::new(SettingsService::new(pool.clone()));
    let service = TotalsService::new(Arc::new(SqliteStore::new(pool)), settings.clone());
    (service, settings, dir)
}

#[test]
fn single_event_lands_in_all_three_buckets() {
    let (service, _settings, _dir) = setup();
    let snapshot = service
        .record_event(
            "listing-1",
            at("2024-03-15T00:00:00Z"),
            TotalsDelta::new([0.0, 0.0, 0.0, 1.0]).expect("delta"),
        )
        .expect("record");

    let expected = CounterTuple([0.0, 0.0, 0.0, 1.0]);
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.totals.daily.get("2024-03-15"), Some(&expected));
    assert_eq!(snapshot.totals.monthly.get("2024-03"), Some(&expected));
    assert_eq!(snapshot.totals.yearly.get("2024"), Some(&expected));
    assert_eq!(snapshot.totals.daily.len(), 1);

    let reread = service.snapshot("listing-1").expect("snapshot");
    assert_eq!(reread.totals, snapshot.totals);
}

#[test]
fn bucket_time_zone_comes_from_settings() {
    let (service, settings, _dir) = setup();
    settings
        .update(TotalsSettingsUpdate {
            bucket_timezone: Some("America/New_York".into()),
            ..Default::default()
        })
        .expect("settings");

    let snapshot = service
        .record_event(
            "listing-1",
            at("2024-01-01T03:00:00Z"),
            TotalsDelta::single_count(),
        )
        .expect("record");

    assert!(snapshot.totals.daily.contains_key("2023-12-31"));
    assert!(snapshot.totals.yearly.contains_key("2023"));
}

#[test]
fn concurrent_writers_do_not_lose_events() {
    let (service, settings, _dir) = setup();
    settings
        .update(TotalsSettingsUpdate {
            max_write_attempts: Some(20),
            ..Default::default()
        })
        .expect("settings");
    let service = Arc::new(service);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..5 {
                    service
                        .record_event(
                            "busy-listing",
                            Utc.with_ymd_and_hms(2024, 6, 1, worker, 0, 0).unwrap(),
                            TotalsDelta::new([1.0, 0.0, 10.0, 1.0]).expect("delta"),
                        )
                        .expect("record under contention");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }

    let snapshot = service.snapshot("busy-listing").expect("snapshot");
    assert_eq!(snapshot.version, 20);
    assert_eq!(
        snapshot.totals.daily.get("2024-06-01"),
        Some(&CounterTuple([20.0, 0.0, 200.0, 20.0]))
    );
}

#[test]
fn yearly_series_is_ordered_and_survives_retention() {
    let (service, settings, _dir) = setup();
    for stamp in [
        "2023-05-01T12:00:00Z",
        "2021-02-01T12:00:00Z",
        "2022-09-09T12:00:00Z",
    ] {
        service
            .record_event("listing-9", at(stamp), TotalsDelta::single_count())
            .expect("record");
    }

    settings
        .update(TotalsSettingsUpdate {
            daily_retention_days: Some(Some(1)),
            ..Default::default()
        })
        .expect("settings");
    let pruned = service
        .apply_retention(at("2023-05-01T18:00:00Z"))
        .expect("retention");
    assert_eq!(pruned, vec!["listing-9".to_string()]);

    let days = service
        .series("listing-9", BucketGranularity::Day)
        .expect("daily series");
    assert_eq!(days.points.len(), 1);
    assert_eq!(days.points[0].key, "2023-05-01");

    let years = service
        .series("listing-9", BucketGranularity::Year)
        .expect("yearly series");
    let keys: Vec<_> = years.points.iter().map(|point| point.key.clone()).collect();
    assert_eq!(keys, vec!["2021", "2022", "2023"]);
}

#[test]
fn overflowing_event_is_rejected_before_it_reaches_the_row() {
    let (service, _settings, _dir) = setup();
    let huge = TotalsDelta::new([0.0, 0.0, 1e308, 1.0]).expect("finite delta");

    let first = service
        .record_event("listing-big", at("2024-03-15T08:00:00Z"), huge)
        .expect("first record");
    assert_eq!(first.version, 1);

    let err = service
        .record_event("listing-big", at("2024-03-15T09:00:00Z"), huge)
        .expect_err("overflow");
    assert!(matches!(err, AppError::Validation { .. }));

    let stored = service.snapshot("listing-big").expect("still readable");
    assert_eq!(stored.version, 1);
    assert_eq!(
        stored.totals.daily.get("2024-03-15"),
        Some(&CounterTuple([0.0, 0.0, 1e308, 1.0]))
    );

    let next = service
        .record_event(
            "listing-big",
            at("2024-03-15T10:00:00Z"),
            TotalsDelta::single_count(),
        )
        .expect("subject keeps accepting events");
    assert_eq!(next.version, 2);
    assert_eq!(
        next.totals.daily.get("2024-03-15"),
        Some(&CounterTuple([0.0, 0.0, 1e308, 2.0]))
    );
}

#[test]
fn undecodable_row_is_reported_and_left_untouched() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("totals.sqlite")).expect("db pool");
    pool.with_connection(|conn| {
        conn.execute(
            "INSERT INTO aggregate_totals (subject_id, daily, monthly, yearly, version, updated_at)
             VALUES ('listing-bad', '{\"2024-03-15\":[0,0,null,1]}', '{}', '{}', 3, '2024-03-15T00:00:00Z')",
            [],
        )?;
        Ok(())
    })
    .expect("seed corrupt row");

    let service = TotalsService::new(
        Arc::new(SqliteStore::new(pool.clone())),
        Arc::new(SettingsService::new(pool.clone())),
    );

    let err = service
        .record_event(
            "listing-bad",
            at("2024-03-16T00:00:00Z"),
            TotalsDelta::single_count(),
        )
        .expect_err("undecodable row");
    assert!(matches!(err, AppError::Serialization(_)));
    assert!(matches!(
        service.snapshot("listing-bad"),
        Err(AppError::Serialization(_))
    ));

    let (version, daily): (i64, String) = pool
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT version, daily FROM aggregate_totals WHERE subject_id = 'listing-bad'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .expect("raw row");
    assert_eq!(version, 3);
    assert_eq!(daily, r#"{"2024-03-15":[0,0,null,1]}"#);
}
