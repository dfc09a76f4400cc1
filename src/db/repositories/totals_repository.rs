use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::totals::{AggregateTotals, BucketMap, TotalsSnapshot};

#[derive(Debug, Clone)]
pub struct TotalsRow {
    pub subject_id: String,
    pub daily: String,
    pub monthly: String,
    pub yearly: String,
    pub version: i64,
    pub updated_at: String,
}

impl TotalsRow {
    pub fn from_totals(
        subject_id: &str,
        totals: &AggregateTotals,
        version: i64,
        updated_at: String,
    ) -> AppResult<Self> {
        ensure_finite("daily", &totals.daily)?;
        ensure_finite("monthly", &totals.monthly)?;
        ensure_finite("yearly", &totals.yearly)?;
        Ok(Self {
            subject_id: subject_id.to_string(),
            daily: serialize_json(&totals.daily)?,
            monthly: serialize_json(&totals.monthly)?,
            yearly: serialize_json(&totals.yearly)?,
            version,
            updated_at,
        })
    }

    pub fn into_snapshot(self) -> AppResult<TotalsSnapshot> {
        Ok(TotalsSnapshot {
            subject_id: self.subject_id,
            totals: AggregateTotals {
                daily: deserialize_json::<BucketMap>(&self.daily)?,
                monthly: deserialize_json::<BucketMap>(&self.monthly)?,
                yearly: deserialize_json::<BucketMap>(&self.yearly)?,
            },
            version: self.version,
            updated_at: Some(self.updated_at),
        })
    }
}

impl TryFrom<&Row<'_>> for TotalsRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            subject_id: row.get("subject_id")?,
            daily: row.get("daily")?,
            monthly: row.get("monthly")?,
            yearly: row.get("yearly")?,
            version: row.get("version")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct TotalsRepository;

impl TotalsRepository {
    pub fn find(conn: &Connection, subject_id: &str) -> AppResult<Option<TotalsSnapshot>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT subject_id, daily, monthly, yearly, version, updated_at
                FROM aggregate_totals
                WHERE subject_id = :subject_id
            "#,
        )?;

        let row = stmt
            .query_row(named_params! {":subject_id": subject_id}, |row| {
                TotalsRow::try_from(row)
            })
            .optional()?;

        row.map(TotalsRow::into_snapshot).transpose()
    }

    /// Inserts the first snapshot for a subject. A concurrent insert for the
    /// same subject surfaces as a primary-key `Conflict`.
    pub fn insert(conn: &Connection, row: &TotalsRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO aggregate_totals (
                    subject_id, daily, monthly, yearly, version, updated_at
                ) VALUES (
                    :subject_id, :daily, :monthly, :yearly, :version, :updated_at
                )
            "#,
            named_params! {
                ":subject_id": &row.subject_id,
                ":daily": &row.daily,
                ":monthly": &row.monthly,
                ":yearly": &row.yearly,
                ":version": row.version,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    /// Compare-and-swap on `version`. Returns the number of rows written;
    /// zero means another writer got there first.
    pub fn update_if_version(
        conn: &Connection,
        row: &TotalsRow,
        expected_version: i64,
    ) -> AppResult<usize> {
        let changed = conn.execute(
            r#"
                UPDATE aggregate_totals
                SET daily = :daily,
                    monthly = :monthly,
                    yearly = :yearly,
                    version = :version,
                    updated_at = :updated_at
                WHERE subject_id = :subject_id AND version = :expected_version
            "#,
            named_params! {
                ":subject_id": &row.subject_id,
                ":daily": &row.daily,
                ":monthly": &row.monthly,
                ":yearly": &row.yearly,
                ":version": row.version,
                ":updated_at": &row.updated_at,
                ":expected_version": expected_version,
            },
        )?;

        Ok(changed)
    }

    pub fn list_subjects(conn: &Connection) -> AppResult<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT subject_id FROM aggregate_totals ORDER BY subject_id ASC")?;

        let subjects = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(subjects)
    }
}

/// JSON has no infinities; serde_json would silently write them as `null`
/// and the row could never be read back.
fn ensure_finite(granularity: &str, buckets: &BucketMap) -> AppResult<()> {
    match buckets.iter().find(|(_, counters)| !counters.is_finite()) {
        Some((key, _)) => Err(AppError::validation_with_details(
            "refusing to store non-finite bucket counters",
            json!({ "granularity": granularity, "bucket": key }),
        )),
        None => Ok(()),
    }
}

fn serialize_json<T: Serialize>(value: &T) -> AppResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn deserialize_json<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
    if raw.trim().is_empty() {
        return Ok(serde_json::from_str("{}")?);
    }
    Ok(serde_json::from_str(raw)?)
}
