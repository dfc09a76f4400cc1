//! Punti and commission arithmetic.
//!
//! Every function here is total: NaN, infinities and out-of-range values are
//! clamped to the nearest valid boundary instead of being reported, since the
//! results feed listing badges directly.

use crate::models::partner::{CommissionPreview, PuntiLabel};

pub const PUNTI_MIN: u8 = 0;
pub const PUNTI_MAX: u8 = 111;
pub const COMMISSION_MIN: u8 = 15;
pub const COMMISSION_MAX: u8 = 50;
/// Punti needed for one extra commission percentage point.
pub const PUNTI_PER_COMMISSION_POINT: u8 = 2;

const TOP_RATE_THRESHOLD: f64 = 40.0;
const RELEVANT_THRESHOLD: f64 = 80.0;

/// Rounds half away from zero and clamps to `[15, 50]`.
pub fn sanitize_commission(value: f64) -> u8 {
    if !value.is_finite() {
        return COMMISSION_MIN;
    }
    value
        .round()
        .clamp(f64::from(COMMISSION_MIN), f64::from(COMMISSION_MAX)) as u8
}

/// Floors and clamps a punti value to `[0, 111]`.
pub fn clamp_punti(value: f64) -> u8 {
    if !value.is_finite() {
        return PUNTI_MIN;
    }
    value
        .floor()
        .clamp(f64::from(PUNTI_MIN), f64::from(PUNTI_MAX)) as u8
}

/// `15 + floor(punti / 2)`, capped at 50. Punti above 111 are not clamped
/// here; they simply saturate the commission.
pub fn commission_from_punti(punti: f64) -> u8 {
    let normalized = if punti.is_finite() && punti > 0.0 {
        punti.floor()
    } else {
        0.0
    };
    let step = (normalized / f64::from(PUNTI_PER_COMMISSION_POINT)).floor();
    let raw = f64::from(COMMISSION_MIN) + step;
    raw.min(f64::from(COMMISSION_MAX)) as u8
}

/// Smallest punti value that yields the sanitized commission. The forward
/// mapping floors, so only those values round-trip exactly.
pub fn punti_from_commission(commission: f64) -> u8 {
    let sanitized = sanitize_commission(commission);
    let punti = u16::from(sanitized - COMMISSION_MIN) * u16::from(PUNTI_PER_COMMISSION_POINT);
    punti.min(u16::from(PUNTI_MAX)) as u8
}

pub fn punti_share(punti: f64) -> f64 {
    if !punti.is_finite() || punti <= 0.0 {
        return 0.0;
    }
    (punti / f64::from(PUNTI_MAX)).min(1.0)
}

pub fn punti_label(punti: f64) -> PuntiLabel {
    if punti >= RELEVANT_THRESHOLD {
        PuntiLabel::Relevant
    } else if punti >= TOP_RATE_THRESHOLD {
        PuntiLabel::TopRate
    } else {
        PuntiLabel::Pump
    }
}

pub fn format_share_percentage(share: f64) -> String {
    let percent = if share.is_finite() {
        (share * 100.0).round()
    } else {
        0.0
    };
    format!("{}%", percent as i64)
}

/// Fraction of revenue the host keeps once the platform commission is taken.
pub fn host_share_from_commission(commission: f64) -> f64 {
    let commission = f64::from(sanitize_commission(commission));
    (1.0 - commission / 100.0).clamp(0.0, 1.0)
}

/// Everything the engine derives from one punti value, clamped first.
pub fn preview(punti: f64) -> CommissionPreview {
    let punti = clamp_punti(punti);
    let commission = commission_from_punti(f64::from(punti));
    let share = punti_share(f64::from(punti));
    CommissionPreview {
        punti,
        commission,
        punti_share: share,
        share_display: format_share_percentage(share),
        label: punti_label(f64::from(punti)),
        host_share: host_share_from_commission(f64::from(commission)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGE_INPUTS: [f64; 9] = [
        f64::NAN,
        f64::INFINITY,
        f64::NEG_INFINITY,
        -1.0,
        0.0,
        14.5,
        32.49,
        50.5,
        1e12,
    ];

    #[test]
    fn sanitize_commission_stays_in_range_and_is_idempotent() {
        for value in EDGE_INPUTS {
            let sanitized = sanitize_commission(value);
            assert!((COMMISSION_MIN..=COMMISSION_MAX).contains(&sanitized), "{value}");
            assert_eq!(sanitize_commission(f64::from(sanitized)), sanitized);
        }
        assert_eq!(sanitize_commission(f64::NAN), 15);
        assert_eq!(sanitize_commission(22.5), 23);
        assert_eq!(sanitize_commission(22.49), 22);
        assert_eq!(sanitize_commission(99.0), 50);
    }

    #[test]
    fn commission_from_punti_matches_reference_points() {
        assert_eq!(commission_from_punti(0.0), 15);
        assert_eq!(commission_from_punti(1.0), 15);
        assert_eq!(commission_from_punti(2.0), 16);
        assert_eq!(commission_from_punti(3.9), 16);
        assert_eq!(commission_from_punti(70.0), 50);
        assert_eq!(commission_from_punti(111.0), 50);
        assert_eq!(commission_from_punti(-20.0), 15);
        assert_eq!(commission_from_punti(f64::NAN), 15);
        assert_eq!(commission_from_punti(f64::INFINITY), 15);
    }

    #[test]
    fn commission_from_punti_is_monotonic() {
        let mut previous = commission_from_punti(0.0);
        for tenth in 0..=2_000 {
            let current = commission_from_punti(f64::from(tenth) / 10.0);
            assert!(current >= previous);
            assert!((COMMISSION_MIN..=COMMISSION_MAX).contains(&current));
            previous = current;
        }
    }

    #[test]
    fn punti_from_commission_inverts_the_step() {
        assert_eq!(punti_from_commission(15.0), 0);
        assert_eq!(punti_from_commission(16.0), 2);
        assert_eq!(punti_from_commission(50.0), 70);
        assert_eq!(punti_from_commission(f64::NAN), 0);

        for value in EDGE_INPUTS.into_iter().chain((0..=60).map(f64::from)) {
            let punti = punti_from_commission(value);
            assert_eq!(
                commission_from_punti(f64::from(punti)),
                sanitize_commission(value),
                "{value}"
            );
        }
    }

    #[test]
    fn reverse_round_trip_only_holds_on_even_punti() {
        assert_eq!(punti_from_commission(f64::from(commission_from_punti(10.0))), 10);
        assert_eq!(punti_from_commission(f64::from(commission_from_punti(11.0))), 10);
    }

    #[test]
    fn punti_share_is_clamped() {
        assert_eq!(punti_share(0.0), 0.0);
        assert_eq!(punti_share(-5.0), 0.0);
        assert_eq!(punti_share(f64::NAN), 0.0);
        assert_eq!(punti_share(111.0), 1.0);
        assert_eq!(punti_share(200.0), 1.0);
        assert!((punti_share(55.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn punti_label_thresholds() {
        assert_eq!(punti_label(0.0), PuntiLabel::Pump);
        assert_eq!(punti_label(39.0), PuntiLabel::Pump);
        assert_eq!(punti_label(40.0), PuntiLabel::TopRate);
        assert_eq!(punti_label(79.0), PuntiLabel::TopRate);
        assert_eq!(punti_label(80.0), PuntiLabel::Relevant);
        assert_eq!(punti_label(111.0), PuntiLabel::Relevant);
        assert_eq!(punti_label(f64::NAN), PuntiLabel::Pump);
        assert_eq!(PuntiLabel::TopRate.to_string(), "TOP RATE");
    }

    #[test]
    fn share_percentage_rendering() {
        assert_eq!(format_share_percentage(0.0), "0%");
        assert_eq!(format_share_percentage(1.0), "100%");
        assert_eq!(format_share_percentage(0.125), "13%");
        assert_eq!(format_share_percentage(punti_share(40.0)), "36%");
        assert_eq!(format_share_percentage(f64::NAN), "0%");
    }

    #[test]
    fn host_share_complements_commission() {
        assert!((host_share_from_commission(15.0) - 0.85).abs() < 1e-12);
        assert!((host_share_from_commission(50.0) - 0.5).abs() < 1e-12);
        assert!((host_share_from_commission(f64::NAN) - 0.85).abs() < 1e-12);
        assert!((host_share_from_commission(500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn preview_combines_the_derived_metrics() {
        let preview = preview(86.4);
        assert_eq!(preview.punti, 86);
        assert_eq!(preview.commission, 50);
        assert_eq!(preview.label, PuntiLabel::Relevant);
        assert_eq!(preview.share_display, "77%");
        assert!((preview.host_share - 0.5).abs() < 1e-12);
    }

    #[test]
    fn clamp_punti_bounds() {
        assert_eq!(clamp_punti(-3.0), 0);
        assert_eq!(clamp_punti(42.9), 42);
        assert_eq!(clamp_punti(500.0), 111);
        assert_eq!(clamp_punti(f64::NEG_INFINITY), 0);
    }
}
