use crate::models::settings::{TotalsSettings, TotalsSettingsUpdate};

use super::{run_blocking, AppState, CommandResult};

pub async fn settings_get(state: &AppState) -> CommandResult<TotalsSettings> {
    let app_state = state.clone();
    run_blocking(move || app_state.settings().get()).await
}

pub async fn settings_update(
    state: &AppState,
    input: TotalsSettingsUpdate,
) -> CommandResult<TotalsSettings> {
    let app_state = state.clone();
    run_blocking(move || app_state.settings().update(input)).await
}

pub async fn settings_reset(state: &AppState) -> CommandResult<TotalsSettings> {
    let app_state = state.clone();
    run_blocking(move || app_state.settings().reset()).await
}
