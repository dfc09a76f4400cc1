use std::str::FromStr;
use std::sync::{RwLock, RwLockWriteGuard};

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{AppSettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::{TotalsSettings, TotalsSettingsUpdate};

const KEY_BUCKET_TIMEZONE: &str = "bucket_timezone";
const KEY_DAILY_RETENTION: &str = "daily_retention_days";
const KEY_MONTHLY_RETENTION: &str = "monthly_retention_months";
const KEY_YEARLY_RETENTION: &str = "yearly_retention_years";
const KEY_MAX_WRITE_ATTEMPTS: &str = "max_write_attempts";
const ALL_KEYS: [&str; 5] = [
    KEY_BUCKET_TIMEZONE,
    KEY_DAILY_RETENTION,
    KEY_MONTHLY_RETENTION,
    KEY_YEARLY_RETENTION,
    KEY_MAX_WRITE_ATTEMPTS,
];

pub const DEFAULT_BUCKET_TIMEZONE: &str = "UTC";
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;
const MAX_WRITE_ATTEMPTS_LIMIT: u32 = 20;
/// Stored in place of a number when a retention window is switched off.
const UNBOUNDED: &str = "unbounded";

/// Anything that can hand the totals pipeline its current configuration.
pub trait TotalsSettingsSource: Send + Sync {
    fn totals_settings(&self) -> AppResult<TotalsSettings>;
}

impl TotalsSettingsSource for TotalsSettings {
    fn totals_settings(&self) -> AppResult<TotalsSettings> {
        Ok(self.clone())
    }
}

impl Default for TotalsSettings {
    fn default() -> Self {
        Self {
            bucket_timezone: DEFAULT_BUCKET_TIMEZONE.to_string(),
            daily_retention_days: None,
            monthly_retention_months: None,
            yearly_retention_years: None,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    Tz::from_str(name.trim())
        .map_err(|err| AppError::validation(format!("unknown time zone '{name}': {err}")))
}

pub struct SettingsService {
    db: DbPool,
    cache: RwLock<Option<TotalsSettings>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    pub fn get(&self) -> AppResult<TotalsSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    /// Validates and persists `input`. The cache write lock is held for the
    /// whole read-modify-write so concurrent updates cannot drop each other.
    pub fn update(&self, input: TotalsSettingsUpdate) -> AppResult<TotalsSettings> {
        let mut guard = self.lock_cache();
        let mut current = match guard.as_ref() {
            Some(settings) => settings.clone(),
            None => self.load_settings_from_db()?,
        };
        let mut entries: Vec<(&str, String)> = Vec::new();

        if let Some(zone) = input.bucket_timezone.as_ref() {
            let tz = parse_timezone(zone)?;
            current.bucket_timezone = tz.name().to_string();
            entries.push((KEY_BUCKET_TIMEZONE, current.bucket_timezone.clone()));
        }

        if let Some(days) = input.daily_retention_days {
            ensure_positive_window(KEY_DAILY_RETENTION, days)?;
            current.daily_retention_days = days;
            entries.push((KEY_DAILY_RETENTION, encode_window(days)));
        }

        if let Some(months) = input.monthly_retention_months {
            ensure_positive_window(KEY_MONTHLY_RETENTION, months)?;
            current.monthly_retention_months = months;
            entries.push((KEY_MONTHLY_RETENTION, encode_window(months)));
        }

        if let Some(years) = input.yearly_retention_years {
            ensure_positive_window(KEY_YEARLY_RETENTION, years)?;
            current.yearly_retention_years = years;
            entries.push((KEY_YEARLY_RETENTION, encode_window(years)));
        }

        if let Some(attempts) = input.max_write_attempts {
            if !(1..=MAX_WRITE_ATTEMPTS_LIMIT).contains(&attempts) {
                return Err(AppError::validation(format!(
                    "max_write_attempts must be between 1 and {MAX_WRITE_ATTEMPTS_LIMIT}"
                )));
            }
            current.max_write_attempts = attempts;
            entries.push((KEY_MAX_WRITE_ATTEMPTS, attempts.to_string()));
        }

        self.db.with_transaction(|conn| {
            for (key, value) in &entries {
                SettingsRepository::upsert(conn, key, value)?;
            }
            Ok(())
        })?;
        current.updated_at = Utc::now().to_rfc3339();
        info!(target: "app::settings", changed = entries.len(), "totals settings updated");

        *guard = Some(current.clone());
        Ok(current)
    }

    /// Drops every stored override so the defaults apply again.
    pub fn reset(&self) -> AppResult<TotalsSettings> {
        let mut guard = self.lock_cache();
        self.db.with_transaction(|conn| {
            let entries: Vec<(&str, Option<String>)> =
                ALL_KEYS.iter().map(|key| (*key, None)).collect();
            SettingsRepository::apply(conn, &entries)
        })?;

        let settings = self.load_settings_from_db()?;
        *guard = Some(settings.clone());
        Ok(settings)
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        parse_timezone(&self.get()?.bucket_timezone)
    }

    fn lock_cache(&self) -> RwLockWriteGuard<'_, Option<TotalsSettings>> {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_settings_from_db(&self) -> AppResult<TotalsSettings> {
        self.db.with_connection(|conn| {
            let mut settings = TotalsSettings::default();
            let mut latest_update: Option<String> = None;

            for key in ALL_KEYS {
                let Some(row) = SettingsRepository::get(conn, key)? else {
                    continue;
                };
                if latest_update.as_deref() < Some(row.updated_at.as_str()) {
                    latest_update = Some(row.updated_at.clone());
                }
                apply_stored_value(&mut settings, &row);
            }

            if let Some(updated_at) = latest_update {
                settings.updated_at = updated_at;
            }
            Ok(settings)
        })
    }
}

impl TotalsSettingsSource for SettingsService {
    fn totals_settings(&self) -> AppResult<TotalsSettings> {
        self.get()
    }
}

fn apply_stored_value(settings: &mut TotalsSettings, row: &AppSettingRow) {
    let value = row.value.trim();
    match row.key.as_str() {
        KEY_BUCKET_TIMEZONE => match parse_timezone(value) {
            Ok(tz) => settings.bucket_timezone = tz.name().to_string(),
            Err(_) => ignore_stored(row),
        },
        KEY_DAILY_RETENTION => match decode_window(value) {
            Some(days) => settings.daily_retention_days = days,
            None => ignore_stored(row),
        },
        KEY_MONTHLY_RETENTION => match decode_window(value) {
            Some(months) => settings.monthly_retention_months = months,
            None => ignore_stored(row),
        },
        KEY_YEARLY_RETENTION => match decode_window(value) {
            Some(years) => settings.yearly_retention_years = years,
            None => ignore_stored(row),
        },
        KEY_MAX_WRITE_ATTEMPTS => match value.parse::<u32>() {
            Ok(attempts) if (1..=MAX_WRITE_ATTEMPTS_LIMIT).contains(&attempts) => {
                settings.max_write_attempts = attempts
            }
            _ => ignore_stored(row),
        },
        _ => {}
    }
}

fn ignore_stored(row: &AppSettingRow) {
    warn!(
        target: "app::settings",
        key = %row.key,
        value = %row.value,
        "ignoring invalid stored setting"
    );
}

fn ensure_positive_window(key: &str, window: Option<u32>) -> AppResult<()> {
    if window == Some(0) {
        return Err(AppError::validation(format!(
            "{key} must be positive; use null to keep every bucket"
        )));
    }
    Ok(())
}

fn encode_window(window: Option<u32>) -> String {
    window.map_or_else(|| UNBOUNDED.to_string(), |value| value.to_string())
}

/// Outer `None` means the stored text is unusable.
fn decode_window(raw: &str) -> Option<Option<u32>> {
    if raw.eq_ignore_ascii_case(UNBOUNDED) {
        return Some(None);
    }
    match raw.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(value) => Some(Some(value)),
    }
}
