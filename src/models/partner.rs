use std::fmt;

use serde::{Deserialize, Serialize};

/// Display tier derived from a punti value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PuntiLabel {
    #[serde(rename = "PUMP")]
    Pump,
    #[serde(rename = "TOP RATE")]
    TopRate,
    #[serde(rename = "Relevant")]
    Relevant,
}

impl PuntiLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PuntiLabel::Pump => "PUMP",
            PuntiLabel::TopRate => "TOP RATE",
            PuntiLabel::Relevant => "Relevant",
        }
    }
}

impl fmt::Display for PuntiLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partner row as stored. `punti` and `commission` are kept raw so that
/// reconciliation can see values written outside the clamped domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRecord {
    pub listing_id: String,
    pub owner_id: String,
    pub punti: i64,
    pub commission: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRegistration {
    pub listing_id: String,
    pub owner_id: String,
}

/// Everything a listing page needs to render the partner badge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerStanding {
    pub listing_id: String,
    pub owner_id: String,
    pub punti: u8,
    pub commission: u8,
    pub punti_share: f64,
    pub share_display: String,
    pub label: PuntiLabel,
    pub host_share: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledPartner {
    pub listing_id: String,
    pub previous_punti: i64,
    pub previous_commission: i64,
    pub punti: u8,
    pub commission: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub inspected: usize,
    pub corrected: Vec<ReconciledPartner>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.corrected.is_empty()
    }
}

/// Engine output for an arbitrary punti value, without touching storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionPreview {
    pub punti: u8,
    pub commission: u8,
    pub punti_share: f64,
    pub share_display: String,
    pub label: PuntiLabel,
    pub host_share: f64,
}
