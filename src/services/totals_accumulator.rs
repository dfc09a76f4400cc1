//! Day/month/year bucketed counters.
//!
//! `fold_event` never mutates its inputs: it clones the three maps, updates
//! the one bucket per map that the event falls into and hands the copies
//! back. Retention is applied separately through `prune_buckets`.

use chrono::{DateTime, Datelike, Days, Utc};
use chrono_tz::Tz;

use crate::error::AppResult;
use crate::models::totals::{
    AggregateTotals, BucketKeys, BucketMap, CounterTuple, RetentionPolicy, TotalsDelta,
};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";
const MONTH_KEY_FORMAT: &str = "%Y-%m";
const YEAR_KEY_FORMAT: &str = "%Y";

/// Bucket keys for `event_time` as seen in `tz`.
pub fn bucket_keys(event_time: DateTime<Utc>, tz: Tz) -> BucketKeys {
    let local = event_time.with_timezone(&tz);
    BucketKeys {
        day: local.format(DAY_KEY_FORMAT).to_string(),
        month: local.format(MONTH_KEY_FORMAT).to_string(),
        year: local.format(YEAR_KEY_FORMAT).to_string(),
    }
}

/// Fails only when a touched counter would overflow to infinity; the inputs
/// are left as they were.
pub fn fold_event(
    daily: &BucketMap,
    monthly: &BucketMap,
    yearly: &BucketMap,
    event_time: DateTime<Utc>,
    tz: Tz,
    delta: &TotalsDelta,
) -> AppResult<(BucketMap, BucketMap, BucketMap)> {
    let keys = bucket_keys(event_time, tz);
    Ok((
        add_to_bucket(daily, keys.day, delta)?,
        add_to_bucket(monthly, keys.month, delta)?,
        add_to_bucket(yearly, keys.year, delta)?,
    ))
}

/// [`fold_event`] over a whole [`AggregateTotals`] value.
pub fn fold_totals(
    totals: &AggregateTotals,
    event_time: DateTime<Utc>,
    tz: Tz,
    delta: &TotalsDelta,
) -> AppResult<AggregateTotals> {
    let (daily, monthly, yearly) = fold_event(
        &totals.daily,
        &totals.monthly,
        &totals.yearly,
        event_time,
        tz,
        delta,
    )?;
    Ok(AggregateTotals {
        daily,
        monthly,
        yearly,
    })
}

fn add_to_bucket(buckets: &BucketMap, key: String, delta: &TotalsDelta) -> AppResult<BucketMap> {
    let current = buckets.get(&key).copied().unwrap_or_else(CounterTuple::zero);
    let updated = current.plus(delta)?;
    let mut next = buckets.clone();
    next.insert(key, updated);
    Ok(next)
}

/// Drops buckets older than the retention windows, measured back from the
/// period that contains `reference`.
pub fn prune_buckets(
    totals: &AggregateTotals,
    reference: DateTime<Utc>,
    tz: Tz,
    retention: &RetentionPolicy,
) -> AggregateTotals {
    let local = reference.with_timezone(&tz);
    let date = local.date_naive();

    let daily_cutoff = retention.daily_days.and_then(|days| {
        date.checked_sub_days(Days::new(u64::from(days.max(1) - 1)))
            .map(|cutoff| cutoff.format(DAY_KEY_FORMAT).to_string())
    });

    let monthly_cutoff = retention.monthly_months.and_then(|months| {
        let index = i64::from(date.year()) * 12 + i64::from(date.month0());
        let cutoff = index - i64::from(months.max(1) - 1);
        (cutoff >= 0).then(|| format!("{:04}-{:02}", cutoff / 12, cutoff % 12 + 1))
    });

    let yearly_cutoff = retention.yearly_years.and_then(|years| {
        let cutoff = i64::from(date.year()) - i64::from(years.max(1) - 1);
        (cutoff >= 0).then(|| format!("{cutoff:04}"))
    });

    AggregateTotals {
        daily: keep_from(&totals.daily, daily_cutoff.as_deref()),
        monthly: keep_from(&totals.monthly, monthly_cutoff.as_deref()),
        yearly: keep_from(&totals.yearly, yearly_cutoff.as_deref()),
    }
}

fn keep_from(buckets: &BucketMap, cutoff: Option<&str>) -> BucketMap {
    match cutoff {
        Some(cutoff) => buckets
            .range(cutoff.to_string()..)
            .map(|(key, counters)| (key.clone(), *counters))
            .collect(),
        None => buckets.clone(),
    }
}
