use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::models::partner::{
    CommissionPreview, PartnerRegistration, PartnerStanding, ReconciliationReport,
};
use crate::services::commission;
use crate::utils::coerce::coerce_number;

use super::{run_blocking, AppState, CommandError, CommandResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuntiUpdatePayload {
    pub listing_id: String,
    pub punti: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuntiAdjustPayload {
    pub listing_id: String,
    pub delta: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionUpdatePayload {
    pub listing_id: String,
    pub commission: JsonValue,
}

pub async fn partner_register(
    state: &AppState,
    payload: PartnerRegistration,
) -> CommandResult<PartnerStanding> {
    let app_state = state.clone();
    run_blocking(move || app_state.partners().register(payload)).await
}

pub async fn partner_standing(
    state: &AppState,
    listing_id: String,
) -> CommandResult<PartnerStanding> {
    let app_state = state.clone();
    run_blocking(move || app_state.partners().standing(&listing_id)).await
}

pub async fn partner_standings_for_owner(
    state: &AppState,
    owner_id: String,
) -> CommandResult<Vec<PartnerStanding>> {
    let app_state = state.clone();
    run_blocking(move || app_state.partners().standings_for_owner(&owner_id)).await
}

pub async fn partner_set_punti(
    state: &AppState,
    payload: PuntiUpdatePayload,
) -> CommandResult<PartnerStanding> {
    let punti = coerce_number("punti", &payload.punti).map_err(CommandError::from)?;
    let app_state = state.clone();
    run_blocking(move || app_state.partners().set_punti(&payload.listing_id, punti)).await
}

pub async fn partner_adjust_punti(
    state: &AppState,
    payload: PuntiAdjustPayload,
) -> CommandResult<PartnerStanding> {
    let delta = coerce_number("delta", &payload.delta).map_err(CommandError::from)?;
    let app_state = state.clone();
    run_blocking(move || app_state.partners().adjust_punti(&payload.listing_id, delta)).await
}

pub async fn partner_set_commission(
    state: &AppState,
    payload: CommissionUpdatePayload,
) -> CommandResult<PartnerStanding> {
    let commission =
        coerce_number("commission", &payload.commission).map_err(CommandError::from)?;
    let app_state = state.clone();
    run_blocking(move || {
        app_state
            .partners()
            .set_commission(&payload.listing_id, commission)
    })
    .await
}

pub async fn partner_reconcile(state: &AppState) -> CommandResult<ReconciliationReport> {
    let app_state = state.clone();
    run_blocking(move || app_state.partners().reconcile()).await
}

/// Pure engine call; no storage involved.
pub fn commission_preview(punti: &JsonValue) -> CommandResult<CommissionPreview> {
    let punti = coerce_number("punti", punti)?;
    Ok(commission::preview(punti))
}
