use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::store::TotalsStore;
use crate::error::{AppError, AppResult};
use crate::models::totals::{
    AggregateTotals, BucketGranularity, BucketPoint, TotalsDelta, TotalsSeriesResponse,
    TotalsSnapshot,
};
use crate::services::settings_service::{parse_timezone, TotalsSettingsSource};
use crate::services::totals_accumulator::{fold_totals, prune_buckets};

/// Read-fold-write loop around the pure accumulator. Writes are versioned;
/// a stale write is retried against a fresh read.
pub struct TotalsService {
    store: Arc<dyn TotalsStore>,
    settings: Arc<dyn TotalsSettingsSource>,
}

impl TotalsService {
    pub fn new(store: Arc<dyn TotalsStore>, settings: Arc<dyn TotalsSettingsSource>) -> Self {
        Self { store, settings }
    }

    pub fn record_event(
        &self,
        subject_id: &str,
        event_time: DateTime<Utc>,
        delta: TotalsDelta,
    ) -> AppResult<TotalsSnapshot> {
        let subject_id = required_subject(subject_id)?;
        let settings = self.settings.totals_settings()?;
        let tz = parse_timezone(&settings.bucket_timezone)?;
        let retention = settings.retention();
        let max_attempts = settings.max_write_attempts.max(1);

        for attempt in 1..=max_attempts {
            let current = self.read_or_empty(&subject_id)?;
            let folded = fold_totals(&current.totals, event_time, tz, &delta)?;
            let reference = event_time.max(Utc::now());
            let next = prune_buckets(&folded, reference, tz, &retention);
            log_evictions(&subject_id, &folded, &next);

            match self.store.write_totals(&subject_id, &next, current.version) {
                Ok(snapshot) => {
                    debug!(
                        target: "app::totals",
                        subject_id = %subject_id,
                        version = snapshot.version,
                        attempt,
                        "event folded into totals"
                    );
                    return Ok(snapshot);
                }
                Err(err) if err.is_conflict() && attempt < max_attempts => {
                    warn!(
                        target: "app::totals",
                        subject_id = %subject_id,
                        attempt,
                        "totals write raced, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(AppError::conflict(format!(
            "gave up writing totals for {subject_id} after {max_attempts} attempts"
        )))
    }

    pub fn snapshot(&self, subject_id: &str) -> AppResult<TotalsSnapshot> {
        let subject_id = required_subject(subject_id)?;
        self.read_or_empty(&subject_id)
    }

    /// Buckets of one granularity in chronological order.
    pub fn series(
        &self,
        subject_id: &str,
        granularity: BucketGranularity,
    ) -> AppResult<TotalsSeriesResponse> {
        let snapshot = self.snapshot(subject_id)?;
        let points = snapshot
            .totals
            .buckets(granularity)
            .iter()
            .map(|(key, counters)| BucketPoint {
                key: key.clone(),
                counters: *counters,
            })
            .collect();

        Ok(TotalsSeriesResponse {
            subject_id: snapshot.subject_id,
            granularity,
            points,
        })
    }

    /// Applies the configured retention to every stored subject without
    /// folding anything. Returns the subjects whose totals shrank.
    pub fn apply_retention(&self, reference: DateTime<Utc>) -> AppResult<Vec<String>> {
        let settings = self.settings.totals_settings()?;
        let tz = parse_timezone(&settings.bucket_timezone)?;
        let retention = settings.retention();
        let mut pruned_subjects = Vec::new();

        for subject_id in self.store.list_subjects()? {
            let Some(current) = self.store.read_totals(&subject_id)? else {
                continue;
            };
            let next = prune_buckets(&current.totals, reference, tz, &retention);
            if next == current.totals {
                continue;
            }
            log_evictions(&subject_id, &current.totals, &next);

            match self.store.write_totals(&subject_id, &next, current.version) {
                Ok(_) => pruned_subjects.push(subject_id),
                // A concurrent fold prunes on its own write; nothing to redo.
                Err(err) if err.is_conflict() => {
                    debug!(target: "app::totals", subject_id = %subject_id, "retention pass lost race");
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            target: "app::totals",
            pruned = pruned_subjects.len(),
            "retention pass finished"
        );
        Ok(pruned_subjects)
    }

    fn read_or_empty(&self, subject_id: &str) -> AppResult<TotalsSnapshot> {
        Ok(self
            .store
            .read_totals(subject_id)?
            .unwrap_or_else(|| TotalsSnapshot::empty(subject_id)))
    }
}

fn log_evictions(subject_id: &str, before: &AggregateTotals, after: &AggregateTotals) {
    let evicted = (before.daily.len() - after.daily.len())
        + (before.monthly.len() - after.monthly.len())
        + (before.yearly.len() - after.yearly.len());
    if evicted > 0 {
        debug!(target: "app::totals", %subject_id, evicted, "buckets evicted by retention");
    }
}

fn required_subject(subject_id: &str) -> AppResult<String> {
    let trimmed = subject_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("subjectId must not be empty"));
    }
    Ok(trimmed.to_string())
}
