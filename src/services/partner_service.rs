use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::store::PartnerStore;
use crate::error::{AppError, AppResult};
use crate::models::partner::{
    PartnerRecord, PartnerRegistration, PartnerStanding, ReconciledPartner, ReconciliationReport,
};
use crate::services::commission::{
    clamp_punti, commission_from_punti, format_share_percentage, host_share_from_commission,
    punti_from_commission, punti_label, punti_share, sanitize_commission, COMMISSION_MIN,
    PUNTI_MIN,
};

/// Reads and writes partner punti through a [`PartnerStore`], keeping the
/// stored commission in step with the punti scale.
pub struct PartnerService {
    store: Arc<dyn PartnerStore>,
}

impl PartnerService {
    pub fn new(store: Arc<dyn PartnerStore>) -> Self {
        Self { store }
    }

    pub fn register(&self, input: PartnerRegistration) -> AppResult<PartnerStanding> {
        let listing_id = required_id("listingId", &input.listing_id)?;
        let owner_id = required_id("ownerId", &input.owner_id)?;

        let now = Utc::now().to_rfc3339();
        let record = PartnerRecord {
            listing_id,
            owner_id,
            punti: i64::from(PUNTI_MIN),
            commission: i64::from(COMMISSION_MIN),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.insert_partner(&record)?;
        info!(target: "app::partner", listing_id = %record.listing_id, "partner registered");

        Ok(standing_from_record(&record))
    }

    pub fn standing(&self, listing_id: &str) -> AppResult<PartnerStanding> {
        self.load(listing_id).map(|record| standing_from_record(&record))
    }

    pub fn standings_for_owner(&self, owner_id: &str) -> AppResult<Vec<PartnerStanding>> {
        let owner_id = required_id("ownerId", owner_id)?;
        Ok(self
            .store
            .list_partners()?
            .iter()
            .filter(|record| record.owner_id == owner_id)
            .map(standing_from_record)
            .collect())
    }

    /// Stores `punti` clamped to `[0, 111]` together with the commission it
    /// implies.
    pub fn set_punti(&self, listing_id: &str, punti: f64) -> AppResult<PartnerStanding> {
        let listing_id = required_id("listingId", listing_id)?;
        let punti = clamp_punti(punti);
        self.write(&listing_id, punti, commission_from_punti(f64::from(punti)))
    }

    /// Adds `delta` to the current punti. A non-finite delta leaves the value
    /// unchanged.
    pub fn adjust_punti(&self, listing_id: &str, delta: f64) -> AppResult<PartnerStanding> {
        let record = self.load(listing_id)?;
        let delta = if delta.is_finite() { delta } else { 0.0 };
        let current = f64::from(clamp_punti(record.punti as f64));
        let punti = clamp_punti(current + delta);
        debug!(
            target: "app::partner",
            listing_id = %record.listing_id,
            from = current,
            to = punti,
            "adjusting punti"
        );
        self.write(&record.listing_id, punti, commission_from_punti(f64::from(punti)))
    }

    /// Stores the sanitized commission and the smallest punti value that
    /// produces it.
    pub fn set_commission(&self, listing_id: &str, commission: f64) -> AppResult<PartnerStanding> {
        let listing_id = required_id("listingId", listing_id)?;
        let commission = sanitize_commission(commission);
        let punti = punti_from_commission(f64::from(commission));
        self.write(&listing_id, punti, commission)
    }

    /// Clamps every stored punti value and realigns commissions that drifted
    /// from `commission_from_punti`.
    pub fn reconcile(&self) -> AppResult<ReconciliationReport> {
        let partners = self.store.list_partners()?;
        let mut report = ReconciliationReport {
            inspected: partners.len(),
            corrected: Vec::new(),
        };

        for record in partners {
            let punti = clamp_punti(record.punti as f64);
            let commission = commission_from_punti(f64::from(punti));

            if record.punti != i64::from(punti) || record.commission != i64::from(commission) {
                self.store
                    .write_punti(&record.listing_id, i64::from(punti), i64::from(commission))?;
                report.corrected.push(ReconciledPartner {
                    listing_id: record.listing_id.clone(),
                    previous_punti: record.punti,
                    previous_commission: record.commission,
                    punti,
                    commission,
                });
            }
            self.store.mark_reconciled(&record.listing_id)?;
        }

        info!(
            target: "app::partner",
            inspected = report.inspected,
            corrected = report.corrected.len(),
            "partner reconciliation finished"
        );
        Ok(report)
    }

    fn load(&self, listing_id: &str) -> AppResult<PartnerRecord> {
        let listing_id = required_id("listingId", listing_id)?;
        self.store
            .read_punti(&listing_id)?
            .ok_or_else(AppError::not_found)
    }

    fn write(&self, listing_id: &str, punti: u8, commission: u8) -> AppResult<PartnerStanding> {
        let record =
            self.store
                .write_punti(listing_id, i64::from(punti), i64::from(commission))?;
        info!(
            target: "app::partner",
            listing_id = %record.listing_id,
            punti,
            commission,
            "partner punti updated"
        );
        Ok(standing_from_record(&record))
    }
}

/// Display view of a stored record; out-of-range stored values are clamped.
pub fn standing_from_record(record: &PartnerRecord) -> PartnerStanding {
    let punti = clamp_punti(record.punti as f64);
    let commission = sanitize_commission(record.commission as f64);
    let share = punti_share(f64::from(punti));

    PartnerStanding {
        listing_id: record.listing_id.clone(),
        owner_id: record.owner_id.clone(),
        punti,
        commission,
        punti_share: share,
        share_display: format_share_percentage(share),
        label: punti_label(f64::from(punti)),
        host_share: host_share_from_commission(f64::from(commission)),
        updated_at: record.updated_at.clone(),
    }
}

fn required_id(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
