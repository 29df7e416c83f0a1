//! Engine configuration

use crate::derivation::BMI_DISPLAY_DECIMALS;
use crate::evolution::DEFAULT_WINDOW_DAYS;
use crate::visibility::ForeignRequestPolicy;
use serde::{Deserialize, Serialize};

/// Default number of points in the dashboard mini chart
pub const DEFAULT_RECENT_POINTS: usize = 7;

/// Default look-back for counting a member as recently active
pub const DEFAULT_ACTIVE_WITHIN_DAYS: u32 = 30;

/// Settings shared by every engine operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evolution window when the request does not name one
    pub default_window_days: u32,
    /// Handling of a member actor selecting another member
    pub foreign_request_policy: ForeignRequestPolicy,
    /// Points kept by the recent-records series
    pub recent_points: usize,
    /// Look-back for the facility "active members" count
    pub active_within_days: u32,
    /// Rounding applied to presented BMI values
    pub display_decimals: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_days: DEFAULT_WINDOW_DAYS,
            foreign_request_policy: ForeignRequestPolicy::default(),
            recent_points: DEFAULT_RECENT_POINTS,
            active_within_days: DEFAULT_ACTIVE_WITHIN_DAYS,
            display_decimals: BMI_DISPLAY_DECIMALS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON; missing keys fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
