//! Persistence ports consumed by the partner and totals services, and their
//! SQLite implementation.

use chrono::Utc;
use tracing::debug;

use crate::db::repositories::partner_repository::PartnerRepository;
use crate::db::repositories::totals_repository::{TotalsRepository, TotalsRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::partner::PartnerRecord;
use crate::models::totals::{AggregateTotals, TotalsSnapshot};

pub trait PartnerStore: Send + Sync {
    /// Fails with `Conflict` when the listing is already registered.
    fn insert_partner(&self, record: &PartnerRecord) -> AppResult<()>;

    fn read_punti(&self, listing_id: &str) -> AppResult<Option<PartnerRecord>>;

    /// Fails with `NotFound` when the listing is unknown.
    fn write_punti(&self, listing_id: &str, punti: i64, commission: i64)
        -> AppResult<PartnerRecord>;

    fn list_partners(&self) -> AppResult<Vec<PartnerRecord>>;

    /// Called once a reconciliation pass has checked the listing.
    fn mark_reconciled(&self, _listing_id: &str) -> AppResult<()> {
        Ok(())
    }
}

pub trait TotalsStore: Send + Sync {
    fn read_totals(&self, subject_id: &str) -> AppResult<Option<TotalsSnapshot>>;

    /// Stores `totals` only if the stored version still equals
    /// `expected_version` (0 when nothing was stored). Otherwise returns
    /// `Conflict` and leaves storage untouched.
    fn write_totals(
        &self,
        subject_id: &str,
        totals: &AggregateTotals,
        expected_version: i64,
    ) -> AppResult<TotalsSnapshot>;

    fn list_subjects(&self) -> AppResult<Vec<String>>;
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl PartnerStore for SqliteStore {
    fn insert_partner(&self, record: &PartnerRecord) -> AppResult<()> {
        self.pool
            .with_connection(|conn| PartnerRepository::insert(conn, record))
    }

    fn read_punti(&self, listing_id: &str) -> AppResult<Option<PartnerRecord>> {
        self.pool
            .with_connection(|conn| PartnerRepository::find_by_listing(conn, listing_id))
    }

    fn write_punti(
        &self,
        listing_id: &str,
        punti: i64,
        commission: i64,
    ) -> AppResult<PartnerRecord> {
        self.pool.with_transaction(|conn| {
            let now = Utc::now().to_rfc3339();
            let changed = PartnerRepository::update_punti(conn, listing_id, punti, commission, &now)?;
            if changed == 0 {
                return Err(AppError::not_found());
            }
            PartnerRepository::find_by_listing(conn, listing_id)?.ok_or_else(AppError::not_found)
        })
    }

    fn list_partners(&self) -> AppResult<Vec<PartnerRecord>> {
        self.pool.with_connection(PartnerRepository::list_all)
    }

    fn mark_reconciled(&self, listing_id: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        self.pool
            .with_connection(|conn| PartnerRepository::mark_reconciled(conn, listing_id, &now))
    }
}

impl TotalsStore for SqliteStore {
    fn read_totals(&self, subject_id: &str) -> AppResult<Option<TotalsSnapshot>> {
        self.pool
            .with_connection(|conn| TotalsRepository::find(conn, subject_id))
    }

    fn write_totals(
        &self,
        subject_id: &str,
        totals: &AggregateTotals,
        expected_version: i64,
    ) -> AppResult<TotalsSnapshot> {
        let next_version = expected_version + 1;
        let row = TotalsRow::from_totals(subject_id, totals, next_version, Utc::now().to_rfc3339())?;

        self.pool.with_connection(|conn| {
            if expected_version == 0 {
                TotalsRepository::insert(conn, &row)?;
            } else {
                let changed = TotalsRepository::update_if_version(conn, &row, expected_version)?;
                if changed == 0 {
                    debug!(
                        target: "app::totals",
                        subject_id,
                        expected_version,
                        "stale totals version"
                    );
                    return Err(AppError::conflict(format!(
                        "totals for {subject_id} changed since version {expected_version}"
                    )));
                }
            }
            Ok(())
        })?;

        row.into_snapshot()
    }

    fn list_subjects(&self) -> AppResult<Vec<String>> {
        self.pool.with_connection(TotalsRepository::list_subjects)
    }
}
