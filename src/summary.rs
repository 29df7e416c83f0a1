//! Aggregate reporting
//!
//! Summary statistics for dashboard cards: per-member progress (latest values
//! and change since the first data point of each metric) and a facility-level
//! overview for privileged roles.

use crate::comparison::percent_change;
use crate::evolution::window_start;
use crate::types::{MemberId, Metric, ProgressRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest value and change since first available data point for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    /// Value on the latest record
    pub latest: Option<f64>,
    /// First chronological value of this metric, and its date
    pub first: Option<f64>,
    pub first_date: Option<NaiveDate>,
    /// Number of records carrying this metric
    pub data_points: usize,
    /// `latest - first`; absent unless at least two records carry the metric
    /// and the latest record is one of them
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
}

/// Populated summary of one member's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub record_count: usize,
    pub first_date: NaiveDate,
    pub latest_date: NaiveDate,
    /// Days between the first and latest record
    pub span_days: i64,
    pub metrics: Vec<MetricSummary>,
}

impl SummaryReport {
    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Result of summarizing a record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressSummary {
    /// No records at all; rendered as an empty state
    NoData,
    Available(SummaryReport),
}

impl ProgressSummary {
    pub fn report(&self) -> Option<&SummaryReport> {
        match self {
            ProgressSummary::NoData => None,
            ProgressSummary::Available(report) => Some(report),
        }
    }
}

/// Facility-level dashboard statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityOverview {
    pub as_of: NaiveDate,
    pub members_tracked: usize,
    pub total_records: usize,
    /// Members with at least one record in the last `active_within_days`
    pub active_members: usize,
    pub active_within_days: u32,
    /// Mean of each member's latest available value, per metric
    pub average_latest: Vec<MetricAverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAverage {
    pub metric: Metric,
    pub members: usize,
    pub average: Option<f64>,
}

/// Reporter for summary statistics
pub struct AggregateReporter;

impl AggregateReporter {
    /// Summarize one member's records.
    pub fn summarize<R>(records: &[R]) -> ProgressSummary
    where
        R: AsRef<ProgressRecord>,
    {
        let mut sorted: Vec<&ProgressRecord> = records.iter().map(|r| r.as_ref()).collect();
        if sorted.is_empty() {
            return ProgressSummary::NoData;
        }
        sorted.sort_by_key(|r| r.date);

        let (first, latest) = match (sorted.first(), sorted.last()) {
            (Some(first), Some(latest)) => (*first, *latest),
            _ => return ProgressSummary::NoData,
        };

        let metrics = Metric::ALL
            .iter()
            .map(|&metric| summarize_metric(metric, &sorted, latest))
            .collect();

        ProgressSummary::Available(SummaryReport {
            record_count: sorted.len(),
            first_date: first.date,
            latest_date: latest.date,
            span_days: (latest.date - first.date).num_days(),
            metrics,
        })
    }

    /// Facility overview across every member present in `records`.
    pub fn facility_overview<R>(
        records: &[R],
        as_of: NaiveDate,
        active_within_days: u32,
    ) -> FacilityOverview
    where
        R: AsRef<ProgressRecord>,
    {
        let mut by_member: BTreeMap<MemberId, Vec<&ProgressRecord>> = BTreeMap::new();
        for record in records {
            let record: &ProgressRecord = record.as_ref();
            by_member.entry(record.member).or_default().push(record);
        }
        for member_records in by_member.values_mut() {
            member_records.sort_by_key(|r| r.date);
        }

        let active_since = window_start(as_of, active_within_days);
        let active_members = by_member
            .values()
            .filter(|rs| rs.iter().any(|r| r.date >= active_since && r.date <= as_of))
            .count();

        let average_latest = Metric::ALL
            .iter()
            .map(|&metric| {
                let latest_values: Vec<f64> = by_member
                    .values()
                    .filter_map(|rs| rs.iter().rev().find_map(|r| r.value(metric)))
                    .collect();
                let average = if latest_values.is_empty() {
                    None
                } else {
                    Some(latest_values.iter().sum::<f64>() / latest_values.len() as f64)
                };
                MetricAverage {
                    metric,
                    members: latest_values.len(),
                    average,
                }
            })
            .collect();

        tracing::debug!(
            members = by_member.len(),
            records = records.len(),
            active_members,
            "facility overview computed"
        );

        FacilityOverview {
            as_of,
            members_tracked: by_member.len(),
            total_records: records.len(),
            active_members,
            active_within_days,
            average_latest,
        }
    }
}

fn summarize_metric(
    metric: Metric,
    sorted: &[&ProgressRecord],
    latest: &ProgressRecord,
) -> MetricSummary {
    let first_record = sorted.iter().find(|r| r.value(metric).is_some());
    let data_points = sorted.iter().filter(|r| r.value(metric).is_some()).count();
    let first = first_record.and_then(|r| r.value(metric));
    let latest_value = latest.value(metric);

    let change = match (first, latest_value) {
        (Some(first), Some(last)) if data_points >= 2 => Some(last - first),
        _ => None,
    };
    let percent = match (first, latest_value) {
        (Some(first), Some(last)) if change.is_some() => percent_change(first, last),
        _ => None,
    };

    MetricSummary {
        metric,
        latest: latest_value,
        first,
        first_date: first_record.map(|r| r.date),
        data_points,
        change,
        percent_change: percent,
    }
}
