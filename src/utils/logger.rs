use std::path::Path;

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::{
    fmt, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{AppError, AppResult};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

const DEFAULT_LOG_DIRECTIVES: &str = "info,app::db=info,app::totals=debug";
const LOG_FILE_PREFIX: &str = "experiences-partner.log";

/// Installs the global subscriber: a daily-rolling file under
/// `<data_dir>/logs` plus stdout. Later calls are no-ops, and so is the first
/// one when the process already has a global subscriber.
pub fn init_logging(data_dir: &Path) -> AppResult<()> {
    LOGGER_INIT
        .get_or_try_init(|| {
            let log_dir = data_dir.join("logs");
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
                .map_err(|err| AppError::other(format!("invalid log directives: {err}")))?;

            let installed = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .try_init();

            match installed {
                Ok(()) => {
                    let _ = LOGGER_GUARD.set(guard);
                }
                // Host process installed its own subscriber first.
                Err(err) => {
                    debug!(target: "app::logger", error = %err, "global subscriber already installed");
                }
            }

            Ok(())
        })
        .map(|_| ())
}
