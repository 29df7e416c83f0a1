//! Metric derivation
//!
//! This module derives computed fields from a record's raw measurements.
//! - Body mass index from weight (kg) and height (cm)
//! - Display rounding (stored values keep full precision)

use crate::types::{Measurements, ProgressRecord};

/// Decimal places used when presenting BMI
pub const BMI_DISPLAY_DECIMALS: u32 = 2;

/// Deriver for computing derived record fields
pub struct MetricDeriver;

impl MetricDeriver {
    /// Recompute every derived field of `record` from its own measurements.
    ///
    /// Idempotent: the BMI only depends on the record's weight and height, so
    /// running it twice yields the same record.
    pub fn derive(mut record: ProgressRecord) -> ProgressRecord {
        Self::derive_in_place(&mut record);
        record
    }

    /// In-place variant of [`MetricDeriver::derive`]
    pub fn derive_in_place(record: &mut ProgressRecord) {
        record.bmi = compute_bmi(&record.measurements);
    }
}

/// Body mass index: weight(kg) / height(m)^2.
///
/// Absent unless both values are present, finite and positive; a non-positive
/// height is treated as missing rather than producing an infinite or negative BMI.
pub fn compute_bmi(measurements: &Measurements) -> Option<f64> {
    match (measurements.weight, measurements.height) {
        (Some(weight), Some(height_cm))
            if weight.is_finite() && height_cm.is_finite() && height_cm > 0.0 && weight >= 0.0 =>
        {
            let height_m = height_cm / 100.0;
            Some(weight / (height_m * height_m))
        }
        _ => None,
    }
}

/// Round a value to `decimals` places for presentation
pub fn round_for_display(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// BMI of a record rounded for display
pub fn display_bmi(record: &ProgressRecord) -> Option<f64> {
    record
        .bmi
        .map(|bmi| round_for_display(bmi, BMI_DISPLAY_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemberId, RecordId};
    use chrono::{NaiveDate, Utc};

    fn make_record(weight: Option<f64>, height: Option<f64>) -> ProgressRecord {
        let now = Utc::now();
        ProgressRecord {
            id: RecordId::new_v4(),
            member: MemberId(1),
            registered_by: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            measurements: Measurements {
                weight,
                height,
                ..Default::default()
            },
            notes: String::new(),
            bmi: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_bmi_from_weight_and_height() {
        let record = MetricDeriver::derive(make_record(Some(80.0), Some(180.0)));
        // 80 / 1.8^2 = 24.691...
        assert!((record.bmi.unwrap() - 24.691358).abs() < 0.001);
        assert_eq!(display_bmi(&record), Some(24.69));
    }

    #[test]
    fn test_bmi_requires_both_values() {
        assert!(MetricDeriver::derive(make_record(Some(80.0), None)).bmi.is_none());
        assert!(MetricDeriver::derive(make_record(None, Some(180.0))).bmi.is_none());
    }

    #[test]
    fn test_non_positive_height_yields_absent_bmi() {
        for height in [0.0, -170.0, f64::NAN] {
            let record = MetricDeriver::derive(make_record(Some(80.0), Some(height)));
            assert!(record.bmi.is_none(), "height {height} produced a BMI");
        }
    }

    #[test]
    fn test_stale_bmi_is_cleared() {
        let mut record = make_record(Some(80.0), None);
        record.bmi = Some(31.0);
        let record = MetricDeriver::derive(record);
        assert!(record.bmi.is_none());
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let once = MetricDeriver::derive(make_record(Some(72.5), Some(168.0)));
        let twice = MetricDeriver::derive(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_round_for_display() {
        assert_eq!(round_for_display(24.691358, 2), 24.69);
        assert_eq!(round_for_display(24.695, 1), 24.7);
        assert_eq!(round_for_display(3.0, 0), 3.0);
    }
}
