use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};

pub const COUNTER_SLOTS: usize = 4;

/// Four counters kept per bucket. Slot meaning (scans, bookings, revenue,
/// reservations, ...) is a caller convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterTuple(pub [f64; COUNTER_SLOTS]);

impl CounterTuple {
    pub fn zero() -> Self {
        Self([0.0; COUNTER_SLOTS])
    }

    pub fn values(&self) -> [f64; COUNTER_SLOTS] {
        self.0
    }

    /// Slot-wise sum. Fails instead of letting a counter overflow to
    /// infinity, which JSON cannot represent.
    pub fn plus(&self, delta: &TotalsDelta) -> AppResult<Self> {
        let mut next = self.0;
        for (slot, amount) in next.iter_mut().zip(delta.values()) {
            *slot += amount;
        }
        if let Some(index) = next.iter().position(|value| !value.is_finite()) {
            return Err(AppError::validation_with_details(
                "bucket counter would overflow",
                json!({
                    "slot": index,
                    "current": self.0[index],
                    "delta": delta.values()[index],
                }),
            ));
        }
        Ok(Self(next))
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|value| value.is_finite())
    }
}

/// Bucket key -> counters. Keys are `YYYY-MM-DD`, `YYYY-MM` or `YYYY`, so the
/// map's lexical order is chronological.
pub type BucketMap = BTreeMap<String, CounterTuple>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTotals {
    #[serde(default)]
    pub daily: BucketMap,
    #[serde(default)]
    pub monthly: BucketMap,
    #[serde(default)]
    pub yearly: BucketMap,
}

impl AggregateTotals {
    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.monthly.is_empty() && self.yearly.is_empty()
    }

    pub fn buckets(&self, granularity: BucketGranularity) -> &BucketMap {
        match granularity {
            BucketGranularity::Day => &self.daily,
            BucketGranularity::Month => &self.monthly,
            BucketGranularity::Year => &self.yearly,
        }
    }
}

/// Validated increment for one event. Only finite amounts get through
/// [`TotalsDelta::new`], so folds never see NaN or infinities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalsDelta([f64; COUNTER_SLOTS]);

impl TotalsDelta {
    pub fn new(slots: [f64; COUNTER_SLOTS]) -> AppResult<Self> {
        if let Some(index) = slots.iter().position(|value| !value.is_finite()) {
            return Err(AppError::validation_with_details(
                "totals delta must contain finite numbers",
                json!({ "slot": index, "value": slots[index].to_string() }),
            ));
        }
        Ok(Self(slots))
    }

    /// One unit in the last slot, the plain "one more event" increment.
    pub fn single_count() -> Self {
        Self([0.0, 0.0, 0.0, 1.0])
    }

    pub fn values(&self) -> [f64; COUNTER_SLOTS] {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketGranularity {
    Day,
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketKeys {
    pub day: String,
    pub month: String,
    pub year: String,
}

/// How many most-recent periods each granularity keeps, counting the
/// reference period. `None` keeps every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub daily_days: Option<u32>,
    pub monthly_months: Option<u32>,
    pub yearly_years: Option<u32>,
}

impl RetentionPolicy {
    pub fn keep_all() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsSnapshot {
    pub subject_id: String,
    pub totals: AggregateTotals,
    /// Optimistic concurrency token; 0 means nothing stored yet.
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl TotalsSnapshot {
    pub fn empty(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            totals: AggregateTotals::default(),
            version: 0,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPoint {
    pub key: String,
    pub counters: CounterTuple,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsSeriesResponse {
    pub subject_id: String,
    pub granularity: BucketGranularity,
    pub points: Vec<BucketPoint>,
}
