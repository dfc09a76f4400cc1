use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::db::store::{PartnerStore, TotalsStore};
use crate::error::{AppError, AppResult};
use crate::models::partner::PartnerRecord;
use crate::models::totals::{AggregateTotals, TotalsSnapshot};

/// Process-local store with the same conflict semantics as the SQLite one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partners: Mutex<BTreeMap<String, PartnerRecord>>,
    totals: Mutex<BTreeMap<String, TotalsSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::other("memory store lock poisoned"))
}

impl PartnerStore for MemoryStore {
    fn insert_partner(&self, record: &PartnerRecord) -> AppResult<()> {
        let mut partners = lock(&self.partners)?;
        if partners.contains_key(&record.listing_id) {
            return Err(AppError::conflict(format!(
                "listing {} already registered",
                record.listing_id
            )));
        }
        partners.insert(record.listing_id.clone(), record.clone());
        Ok(())
    }

    fn read_punti(&self, listing_id: &str) -> AppResult<Option<PartnerRecord>> {
        Ok(lock(&self.partners)?.get(listing_id).cloned())
    }

    fn write_punti(
        &self,
        listing_id: &str,
        punti: i64,
        commission: i64,
    ) -> AppResult<PartnerRecord> {
        let mut partners = lock(&self.partners)?;
        let record = partners.get_mut(listing_id).ok_or_else(AppError::not_found)?;
        record.punti = punti;
        record.commission = commission;
        record.updated_at = Utc::now().to_rfc3339();
        Ok(record.clone())
    }

    fn list_partners(&self) -> AppResult<Vec<PartnerRecord>> {
        Ok(lock(&self.partners)?.values().cloned().collect())
    }
}

impl TotalsStore for MemoryStore {
    fn read_totals(&self, subject_id: &str) -> AppResult<Option<TotalsSnapshot>> {
        Ok(lock(&self.totals)?.get(subject_id).cloned())
    }

    fn write_totals(
        &self,
        subject_id: &str,
        totals: &AggregateTotals,
        expected_version: i64,
    ) -> AppResult<TotalsSnapshot> {
        let mut stored = lock(&self.totals)?;
        let current_version = stored.get(subject_id).map_or(0, |snapshot| snapshot.version);
        if current_version != expected_version {
            return Err(AppError::conflict(format!(
                "totals for {subject_id} changed since version {expected_version}"
            )));
        }

        let snapshot = TotalsSnapshot {
            subject_id: subject_id.to_string(),
            totals: totals.clone(),
            version: expected_version + 1,
            updated_at: Some(Utc::now().to_rfc3339()),
        };
        stored.insert(subject_id.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    fn list_subjects(&self) -> AppResult<Vec<String>> {
        Ok(lock(&self.totals)?.keys().cloned().collect())
    }
}
