//! Pipeline orchestration
//!
//! This module provides the public API of the engine. Every operation runs
//! the same stages:
//! 1. RecordLoader - parse records and re-derive metrics (JSON entry points only)
//! 2. VisibilityResolver - narrow the population to what the actor may see
//! 3. EvolutionBuilder / Comparator / AggregateReporter - compute the view

use crate::comparison::{Comparator, ComparisonResult};
use crate::config::EngineConfig;
use crate::derivation::round_for_display;
use crate::error::ProgressError;
use crate::evolution::{EvolutionBuilder, EvolutionSeries};
use crate::store::RecordLoader;
use crate::summary::{AggregateReporter, FacilityOverview, ProgressSummary};
use crate::types::{Actor, MemberId, ProgressRecord, RecordId};
use crate::visibility::VisibilityResolver;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Request parameters supplied by the auth and UI collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRequest {
    pub actor: Actor,
    /// Selected member; only honored for roster-browsing roles
    #[serde(default)]
    pub member_id: Option<MemberId>,
    /// Known members, for "member not found" checks
    #[serde(default)]
    pub roster: Vec<MemberId>,
    #[serde(default)]
    pub window_days: Option<u32>,
    /// Reference date; today (UTC) when absent
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub earlier: Option<RecordId>,
    #[serde(default)]
    pub later: Option<RecordId>,
}

impl ProgressRequest {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            member_id: None,
            roster: Vec::new(),
            window_days: None,
            as_of: None,
            earlier: None,
            later: None,
        }
    }

    pub fn for_member(mut self, member: MemberId) -> Self {
        self.member_id = Some(member);
        self
    }

    pub fn with_roster(mut self, roster: Vec<MemberId>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_window(mut self, window_days: u32) -> Self {
        self.window_days = Some(window_days);
        self
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn between(mut self, earlier: RecordId, later: RecordId) -> Self {
        self.earlier = Some(earlier);
        self.later = Some(later);
        self
    }

    fn reference_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// One row of the progress history, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: ProgressRecord,
    /// BMI rounded for display
    pub bmi_display: Option<f64>,
}

/// Stateless engine bundling configuration and the visibility rule.
pub struct ProgressEngine {
    config: EngineConfig,
    resolver: VisibilityResolver,
}

impl Default for ProgressEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let resolver = VisibilityResolver::new(config.foreign_request_policy);
        Self { config, resolver }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn scoped(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> Result<Vec<ProgressRecord>, ProgressError> {
        self.resolver
            .scope_owned(&request.actor, records, request.member_id, &request.roster)
    }

    /// Evolution series of the visible member over the requested window
    pub fn evolution(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> Result<EvolutionSeries, ProgressError> {
        let visible = self.scoped(records, request)?;
        let window = request.window_days.unwrap_or(self.config.default_window_days);
        Ok(EvolutionBuilder::build_as_of(
            &visible,
            window,
            request.reference_date(),
        ))
    }

    /// Series over the member's most recent records (dashboard mini chart)
    pub fn recent(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> Result<EvolutionSeries, ProgressError> {
        let visible = self.scoped(records, request)?;
        Ok(EvolutionBuilder::build_recent(
            &visible,
            self.config.recent_points,
        ))
    }

    /// Compare two visible records.
    ///
    /// Without explicit ids the first and last records are compared; `Ok(None)`
    /// means fewer than two records are visible. Naming only one of the two
    /// ids is an error. A record id outside the actor's scope is reported as
    /// not found.
    pub fn compare(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> Result<Option<ComparisonResult>, ProgressError> {
        let visible = self.scoped(records, request)?;
        match (request.earlier, request.later) {
            (Some(earlier), Some(later)) => {
                Comparator::compare_by_id(&visible, earlier, later).map(Some)
            }
            (None, None) => Ok(Comparator::compare_first_last(&visible)),
            _ => Err(ProgressError::ParseError(
                "both earlier and later record ids are required".to_string(),
            )),
        }
    }

    /// Summary card data for the visible member
    pub fn summary(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> Result<ProgressSummary, ProgressError> {
        let visible = self.scoped(records, request)?;
        Ok(AggregateReporter::summarize(&visible))
    }

    /// Visible records newest first; same-date records keep insertion order
    pub fn history(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> Result<Vec<HistoryEntry>, ProgressError> {
        let mut visible = self.scoped(records, request)?;
        visible.sort_by(|a, b| b.date.cmp(&a.date));
        let decimals = self.config.display_decimals;
        Ok(visible
            .into_iter()
            .map(|record| HistoryEntry {
                bmi_display: record.bmi.map(|bmi| round_for_display(bmi, decimals)),
                record,
            })
            .collect())
    }

    /// Facility overview over every record the actor may read
    pub fn facility_overview(
        &self,
        records: &[ProgressRecord],
        request: &ProgressRequest,
    ) -> FacilityOverview {
        let readable = self.resolver.scope_all(&request.actor, records);
        AggregateReporter::facility_overview(
            &readable,
            request.reference_date(),
            self.config.active_within_days,
        )
    }

    /// JSON entry point for [`ProgressEngine::evolution`]
    pub fn evolution_json(
        &self,
        records_json: &str,
        request_json: &str,
    ) -> Result<String, ProgressError> {
        let (records, request) = parse_inputs(records_json, request_json)?;
        Ok(serde_json::to_string(&self.evolution(&records, &request)?)?)
    }

    /// JSON entry point for [`ProgressEngine::compare`]; `null` when there is nothing to compare
    pub fn compare_json(
        &self,
        records_json: &str,
        request_json: &str,
    ) -> Result<String, ProgressError> {
        let (records, request) = parse_inputs(records_json, request_json)?;
        Ok(serde_json::to_string(&self.compare(&records, &request)?)?)
    }

    /// JSON entry point for [`ProgressEngine::summary`]
    pub fn summary_json(
        &self,
        records_json: &str,
        request_json: &str,
    ) -> Result<String, ProgressError> {
        let (records, request) = parse_inputs(records_json, request_json)?;
        Ok(serde_json::to_string(&self.summary(&records, &request)?)?)
    }

    pub fn history_json(
        &self,
        records_json: &str,
        request_json: &str,
    ) -> Result<String, ProgressError> {
        let (records, request) = parse_inputs(records_json, request_json)?;
        Ok(serde_json::to_string(&self.history(&records, &request)?)?)
    }

    /// JSON entry point for [`ProgressEngine::facility_overview`]
    pub fn facility_json(
        &self,
        records_json: &str,
        request_json: &str,
    ) -> Result<String, ProgressError> {
        let (records, request) = parse_inputs(records_json, request_json)?;
        Ok(serde_json::to_string(
            &self.facility_overview(&records, &request),
        )?)
    }
}

fn parse_inputs(
    records_json: &str,
    request_json: &str,
) -> Result<(Vec<ProgressRecord>, ProgressRequest), ProgressError> {
    let (records, _report) = RecordLoader::load(records_json)?;
    let request: ProgressRequest = serde_json::from_str(request_json)?;
    Ok((records, request))
}
