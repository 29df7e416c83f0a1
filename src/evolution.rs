//! Evolution series
//!
//! Projects one member's records onto date-aligned per-metric sequences for
//! trend charts. A date lacking a metric yields `None` (serialized as `null`),
//! so a chart shows a discontinuity instead of a false dip to zero.

use crate::types::{Metric, ProgressRecord, RecordId};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default window when the caller does not pick one
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// Windows offered by the dashboard period selector
pub const STANDARD_WINDOWS: [u32; 4] = [30, 90, 180, 365];

/// Date-aligned per-metric sequences; every vector has the length of `dates`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSeries {
    /// Reference date the window was measured back from
    pub as_of: Option<NaiveDate>,
    /// Window length in days, `None` for count-based series
    pub window_days: Option<u32>,
    pub dates: Vec<NaiveDate>,
    pub record_ids: Vec<RecordId>,
    pub weight: Vec<Option<f64>>,
    pub bmi: Vec<Option<f64>>,
    pub body_fat: Vec<Option<f64>>,
    pub muscle_mass: Vec<Option<f64>>,
    pub chest: Vec<Option<f64>>,
    pub waist: Vec<Option<f64>>,
    pub hips: Vec<Option<f64>>,
}

impl EvolutionSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Sequence for one metric, index-aligned with `dates`
    pub fn series(&self, metric: Metric) -> &[Option<f64>] {
        match metric {
            Metric::Weight => &self.weight,
            Metric::Bmi => &self.bmi,
            Metric::BodyFat => &self.body_fat,
            Metric::MuscleMass => &self.muscle_mass,
            Metric::Chest => &self.chest,
            Metric::Waist => &self.waist,
            Metric::Hips => &self.hips,
        }
    }

    fn series_mut(&mut self, metric: Metric) -> &mut Vec<Option<f64>> {
        match metric {
            Metric::Weight => &mut self.weight,
            Metric::Bmi => &mut self.bmi,
            Metric::BodyFat => &mut self.body_fat,
            Metric::MuscleMass => &mut self.muscle_mass,
            Metric::Chest => &mut self.chest,
            Metric::Waist => &mut self.waist,
            Metric::Hips => &mut self.hips,
        }
    }

    /// Number of actual data points (non-gaps) for a metric
    pub fn points(&self, metric: Metric) -> usize {
        self.series(metric).iter().filter(|v| v.is_some()).count()
    }

    fn push(&mut self, record: &ProgressRecord) {
        self.dates.push(record.date);
        self.record_ids.push(record.id);
        for metric in Metric::ALL {
            self.series_mut(metric).push(record.value(metric));
        }
    }
}

/// First day of the window `[start, as_of]`. Windows reaching past the
/// earliest representable date are unbounded.
pub(crate) fn window_start(as_of: NaiveDate, window_days: u32) -> NaiveDate {
    as_of
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Builder for evolution series
pub struct EvolutionBuilder;

impl EvolutionBuilder {
    /// Build the series for a window measured back from today (UTC).
    pub fn build(records: &[ProgressRecord], window_days: u32) -> EvolutionSeries {
        Self::build_as_of(records, window_days, Utc::now().date_naive())
    }

    /// Build the series for the window `[as_of - window_days, as_of]`.
    ///
    /// Records dated after `as_of` are outside the window. Sorting is stable,
    /// so records sharing a date keep their input (insertion) order.
    pub fn build_as_of(
        records: &[ProgressRecord],
        window_days: u32,
        as_of: NaiveDate,
    ) -> EvolutionSeries {
        let start = window_start(as_of, window_days);

        let mut in_window: Vec<&ProgressRecord> = records
            .iter()
            .filter(|r| r.date >= start && r.date <= as_of)
            .collect();
        in_window.sort_by_key(|r| r.date);

        let mut series = EvolutionSeries {
            as_of: Some(as_of),
            window_days: Some(window_days),
            ..Default::default()
        };
        for record in in_window {
            series.push(record);
        }

        tracing::debug!(
            window_days,
            %as_of,
            input = records.len(),
            points = series.len(),
            "evolution series built"
        );
        series
    }

    /// Build the series from the last `count` records regardless of date.
    pub fn build_recent(records: &[ProgressRecord], count: usize) -> EvolutionSeries {
        let mut sorted: Vec<&ProgressRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.date);
        let skip = sorted.len().saturating_sub(count);

        let mut series = EvolutionSeries::default();
        for record in sorted.into_iter().skip(skip) {
            series.push(record);
        }
        series
    }
}
