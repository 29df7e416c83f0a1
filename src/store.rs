//! Record loading
//!
//! Parses progress records handed over by the storage collaborator (JSON
//! array or NDJSON) and normalizes them at the boundary: derived fields are
//! recomputed and records that carry no measurement are flagged.

use crate::derivation::MetricDeriver;
use crate::error::ProgressError;
use crate::types::{ProgressRecord, RecordId};
use serde::{Deserialize, Serialize};

/// Loader for raw record payloads
pub struct RecordLoader;

impl RecordLoader {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<ProgressRecord>, ProgressError> {
        let records: Vec<ProgressRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (one record per line)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<ProgressRecord>, ProgressError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ProgressRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ProgressError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Parse either format, picking JSON array when the payload starts with `[`
    pub fn parse_auto(input: &str) -> Result<Vec<ProgressRecord>, ProgressError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Recompute derived fields and report records that should not have been stored.
    ///
    /// Input order is preserved; it doubles as insertion order for tie-breaking.
    pub fn normalize(records: Vec<ProgressRecord>) -> (Vec<ProgressRecord>, LoadReport) {
        let mut report = LoadReport {
            total_records: records.len(),
            ..Default::default()
        };

        let records = records
            .into_iter()
            .map(|record| {
                let record = MetricDeriver::derive(record);
                if !record.has_measurements() {
                    tracing::warn!(record = %record.id, member = %record.member, "progress record has no measurements");
                    report.empty_records.push(record.id);
                }
                if matches!(record.measurements.height, Some(h) if h <= 0.0) {
                    tracing::warn!(record = %record.id, "non-positive height ignored for BMI");
                    report.ignored_heights.push(record.id);
                }
                if record.bmi.is_some() {
                    report.records_with_bmi += 1;
                }
                record
            })
            .collect();

        tracing::debug!(
            total = report.total_records,
            empty = report.empty_records.len(),
            "records normalized"
        );
        (records, report)
    }

    /// Parse and normalize in one step
    pub fn load(input: &str) -> Result<(Vec<ProgressRecord>, LoadReport), ProgressError> {
        Ok(Self::normalize(Self::parse_auto(input)?))
    }
}

/// Outcome of loading a batch of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub total_records: usize,
    pub records_with_bmi: usize,
    /// Records without a single measurement
    pub empty_records: Vec<RecordId>,
    /// Records whose non-positive height was treated as absent
    pub ignored_heights: Vec<RecordId>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.empty_records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARRAY: &str = r#"[
        {"id": "00000000-0000-4000-8000-000000000001", "member": 1, "date": "2024-01-01",
         "weight": 82.0, "height": 180.0, "bmi": 99.0,
         "created_at": "2024-01-01T08:00:00Z", "updated_at": "2024-01-01T08:00:00Z"},
        {"id": "00000000-0000-4000-8000-000000000002", "member": 1, "date": "2024-02-01",
         "notes": "travel week",
         "created_at": "2024-02-01T08:00:00Z", "updated_at": "2024-02-01T08:00:00Z"}
    ]"#;

    #[test]
    fn test_parse_array_and_normalize() {
        let (records, report) = RecordLoader::load(ARRAY).unwrap();
        assert_eq!(records.len(), 2);
        // Stored BMI is replaced by the recomputed one
        assert!((records[0].bmi.unwrap() - 25.308642).abs() < 0.001);
        assert_eq!(report.total_records, 2);
        assert_eq!(report.records_with_bmi, 1);
        assert_eq!(report.empty_records, vec![records[1].id]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = concat!(
            r#"{"id": "00000000-0000-4000-8000-000000000003", "member": 2, "date": "2024-01-05", "waist": 90, "created_at": "2024-01-05T08:00:00Z", "updated_at": "2024-01-05T08:00:00Z"}"#,
            "\n\n",
            r#"{"id": "00000000-0000-4000-8000-000000000004", "member": 2, "date": "2024-01-12", "waist": 88, "height": 0, "weight": 70, "created_at": "2024-01-12T08:00:00Z", "updated_at": "2024-01-12T08:00:00Z"}"#,
            "\n"
        );
        let (records, report) = RecordLoader::load(ndjson).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].measurements.waist, Some(90.0));
        assert!(records[1].bmi.is_none());
        assert_eq!(report.ignored_heights, vec![records[1].id]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_ndjson_error_names_line() {
        let err = RecordLoader::parse_ndjson("\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_empty_array() {
        let (records, report) = RecordLoader::load("[]").unwrap();
        assert!(records.is_empty());
        assert_eq!(report.total_records, 0);
    }
}
