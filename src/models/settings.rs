use serde::{Deserialize, Deserializer, Serialize};

use crate::models::totals::RetentionPolicy;

/// Runtime configuration of the totals pipeline.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TotalsSettings {
    /// IANA zone used to derive day/month/year bucket keys.
    pub bucket_timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_retention_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_retention_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_retention_years: Option<u32>,
    pub max_write_attempts: u32,
    pub updated_at: String,
}

impl TotalsSettings {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            daily_days: self.daily_retention_days,
            monthly_months: self.monthly_retention_months,
            yearly_years: self.yearly_retention_years,
        }
    }
}

/// Partial update. The outer `Option` means "leave unchanged", the inner one
/// on retention fields means "keep every bucket".
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsSettingsUpdate {
    #[serde(default)]
    pub bucket_timezone: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub daily_retention_days: Option<Option<u32>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub monthly_retention_months: Option<Option<u32>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub yearly_retention_years: Option<Option<u32>>,
    #[serde(default)]
    pub max_write_attempts: Option<u32>,
}

fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
