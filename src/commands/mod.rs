pub mod partner;
pub mod settings;
pub mod totals;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::error;

use crate::db::store::SqliteStore;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::partner_service::PartnerService;
use crate::services::settings_service::SettingsService;
use crate::services::totals_service::TotalsService;

/// Services shared by every command handler.
#[derive(Clone)]
pub struct AppState {
    partner_service: Arc<PartnerService>,
    totals_service: Arc<TotalsService>,
    settings_service: Arc<SettingsService>,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> AppResult<Self> {
        let store = Arc::new(SqliteStore::new(db_pool.clone()));
        let settings_service = Arc::new(SettingsService::new(db_pool));
        settings_service.get()?;

        let partner_service = Arc::new(PartnerService::new(store.clone()));
        let totals_service = Arc::new(TotalsService::new(store, settings_service.clone()));

        Ok(Self {
            partner_service,
            totals_service,
            settings_service,
        })
    }

    pub fn partners(&self) -> Arc<PartnerService> {
        Arc::clone(&self.partner_service)
    }

    pub fn totals(&self) -> Arc<TotalsService> {
        Arc::clone(&self.totals_service)
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings_service)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::NotFound => {
                CommandError::new("NOT_FOUND", "requested record does not exist", None)
            }
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "serialization failed", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "file system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

/// Services are synchronous and touch SQLite, so handlers hop onto the
/// blocking pool.
async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, AppError> + Send + 'static,
) -> CommandResult<T> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| CommandError::new("UNKNOWN", format!("command task failed: {err}"), None))?
        .map_err(CommandError::from)
}
