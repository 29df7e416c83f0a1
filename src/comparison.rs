//! Two-point comparison
//!
//! Compares two records metric by metric. A metric is only compared when both
//! records carry it; the classification follows the fixed per-metric policy
//! from [`Metric::favorable_direction`].

use crate::error::ProgressError;
use crate::types::{FavorableDirection, Metric, ProgressRecord, RecordId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sign of a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    Unchanged,
}

/// Progress judgment for a metric delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improvement,
    Decline,
    Neutral,
}

/// Why a comparison should not be presented as meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// The same record was passed as both sides
    SameRecord,
    /// The "later" record is dated before the "earlier" one
    ReversedOrder,
}

/// Comparison of one metric across the two records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub earlier: f64,
    pub later: f64,
    /// `later - earlier`
    pub delta: f64,
    /// Delta relative to the earlier value, absent when that value is zero
    pub percent_change: Option<f64>,
    pub direction: Direction,
    pub trend: Trend,
}

/// Per-metric deltas between two records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub earlier_id: RecordId,
    pub later_id: RecordId,
    pub earlier_date: NaiveDate,
    pub later_date: NaiveDate,
    /// `later_date - earlier_date`; zero or negative only for degenerate input
    /// or two records sharing a date
    pub elapsed_days: i64,
    pub degenerate: Option<Degeneracy>,
    /// Metrics present on both records, in [`Metric::ALL`] order
    pub metrics: Vec<MetricComparison>,
}

impl ComparisonResult {
    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate.is_some()
    }

    pub fn improvements(&self) -> usize {
        self.count(Trend::Improvement)
    }

    pub fn declines(&self) -> usize {
        self.count(Trend::Decline)
    }

    fn count(&self, trend: Trend) -> usize {
        self.metrics.iter().filter(|m| m.trend == trend).count()
    }
}

/// Classify a delta for a metric
pub fn classify(metric: Metric, delta: f64) -> (Direction, Trend) {
    let direction = if delta > 0.0 {
        Direction::Increase
    } else if delta < 0.0 {
        Direction::Decrease
    } else {
        Direction::Unchanged
    };

    let trend = match (metric.favorable_direction(), direction) {
        (_, Direction::Unchanged) | (FavorableDirection::Unjudged, _) => Trend::Neutral,
        (FavorableDirection::Lower, Direction::Decrease)
        | (FavorableDirection::Higher, Direction::Increase) => Trend::Improvement,
        (FavorableDirection::Lower, Direction::Increase)
        | (FavorableDirection::Higher, Direction::Decrease) => Trend::Decline,
    };

    (direction, trend)
}

/// Comparator for pairs of records
pub struct Comparator;

impl Comparator {
    /// Compare `earlier` against `later`.
    ///
    /// Never fails: passing the same record twice or reversed dates yields a
    /// result with `degenerate` set, which callers must surface to the user.
    pub fn compare(earlier: &ProgressRecord, later: &ProgressRecord) -> ComparisonResult {
        let elapsed_days = (later.date - earlier.date).num_days();

        let degenerate = if earlier.id == later.id {
            Some(Degeneracy::SameRecord)
        } else if elapsed_days < 0 {
            Some(Degeneracy::ReversedOrder)
        } else {
            None
        };
        if let Some(kind) = degenerate {
            tracing::warn!(earlier = %earlier.id, later = %later.id, ?kind, "degenerate comparison");
        }

        let metrics = Metric::ALL
            .iter()
            .filter_map(|&metric| {
                let (before, after) = (earlier.value(metric)?, later.value(metric)?);
                let delta = after - before;
                let (direction, trend) = classify(metric, delta);
                Some(MetricComparison {
                    metric,
                    earlier: before,
                    later: after,
                    delta,
                    percent_change: percent_change(before, after),
                    direction,
                    trend,
                })
            })
            .collect();

        ComparisonResult {
            earlier_id: earlier.id,
            later_id: later.id,
            earlier_date: earlier.date,
            later_date: later.date,
            elapsed_days,
            degenerate,
            metrics,
        }
    }

    /// Look both records up by id and compare them
    pub fn compare_by_id(
        records: &[ProgressRecord],
        earlier: RecordId,
        later: RecordId,
    ) -> Result<ComparisonResult, ProgressError> {
        let find = |id: RecordId| {
            records
                .iter()
                .find(|r| r.id == id)
                .ok_or(ProgressError::RecordNotFound(id))
        };
        Ok(Self::compare(find(earlier)?, find(later)?))
    }

    /// Compare the chronologically first and last records.
    ///
    /// `None` when fewer than two records exist.
    pub fn compare_first_last(records: &[ProgressRecord]) -> Option<ComparisonResult> {
        if records.len() < 2 {
            return None;
        }
        let mut sorted: Vec<&ProgressRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.date);
        let first = sorted.first()?;
        let last = sorted.last()?;
        Some(Self::compare(first, last))
    }
}

/// Relative change in percent, absent when the base is zero
pub(crate) fn percent_change(base: f64, current: f64) -> Option<f64> {
    if base == 0.0 {
        None
    } else {
        Some((current - base) / base.abs() * 100.0)
    }
}
