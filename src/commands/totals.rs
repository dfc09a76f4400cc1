use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::{AppError, AppResult};
use crate::models::totals::{
    BucketGranularity, TotalsDelta, TotalsSeriesResponse, TotalsSnapshot, COUNTER_SLOTS,
};
use crate::utils::coerce::{coerce_optional_number, parse_event_time};

use super::{run_blocking, AppState, CommandError, CommandResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsEventPayload {
    pub subject_id: String,
    /// RFC 3339; defaults to now.
    #[serde(default)]
    pub event_time: Option<String>,
    /// Positional deltas, up to four. Missing slots count as zero.
    #[serde(default)]
    pub deltas: Vec<JsonValue>,
}

impl TotalsEventPayload {
    fn parse_delta(&self) -> AppResult<TotalsDelta> {
        if self.deltas.is_empty() || self.deltas.len() > COUNTER_SLOTS {
            return Err(AppError::validation_with_details(
                format!("deltas must hold between 1 and {COUNTER_SLOTS} values"),
                json!({ "field": "deltas", "count": self.deltas.len() }),
            ));
        }

        let mut slots = [0.0; COUNTER_SLOTS];
        for (index, slot) in slots.iter_mut().enumerate() {
            *slot = coerce_optional_number(&format!("deltas[{index}]"), self.deltas.get(index), 0.0)?;
        }
        TotalsDelta::new(slots)
    }
}

pub async fn totals_record_event(
    state: &AppState,
    payload: TotalsEventPayload,
) -> CommandResult<TotalsSnapshot> {
    let delta = payload.parse_delta().map_err(CommandError::from)?;
    let event_time = match payload.event_time.as_deref() {
        Some(raw) => parse_event_time("eventTime", raw).map_err(CommandError::from)?,
        None => Utc::now(),
    };

    let app_state = state.clone();
    run_blocking(move || {
        app_state
            .totals()
            .record_event(&payload.subject_id, event_time, delta)
    })
    .await
}

pub async fn totals_snapshot(
    state: &AppState,
    subject_id: String,
) -> CommandResult<TotalsSnapshot> {
    let app_state = state.clone();
    run_blocking(move || app_state.totals().snapshot(&subject_id)).await
}

pub async fn totals_series(
    state: &AppState,
    subject_id: String,
    granularity: Option<BucketGranularity>,
) -> CommandResult<TotalsSeriesResponse> {
    let app_state = state.clone();
    let granularity = granularity.unwrap_or(BucketGranularity::Day);
    run_blocking(move || app_state.totals().series(&subject_id, granularity)).await
}

pub async fn totals_apply_retention(state: &AppState) -> CommandResult<Vec<String>> {
    let app_state = state.clone();
    run_blocking(move || app_state.totals().apply_retention(Utc::now())).await
}
