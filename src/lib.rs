//! Gym Progress - Member progress tracking engine for fitness facilities
//!
//! The engine turns stored body-measurement records into the views a facility
//! dashboard needs, through a deterministic pipeline: record loading →
//! metric derivation → visibility scoping → evolution / comparison / summary.
//!
//! ## Modules
//!
//! - **Records**: Validated creation and amendment of progress records, with BMI derivation
//! - **Views**: Evolution series, two-record comparison and aggregate summaries
//! - **Visibility**: Role-based narrowing of the records an actor may see

pub mod comparison;
pub mod config;
pub mod derivation;
pub mod error;
pub mod evolution;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod summary;
pub mod types;
pub mod visibility;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use comparison::{Comparator, ComparisonResult, Trend};
pub use config::EngineConfig;
pub use derivation::MetricDeriver;
pub use error::ProgressError;
pub use evolution::{EvolutionBuilder, EvolutionSeries};
pub use pipeline::{HistoryEntry, ProgressEngine, ProgressRequest};
pub use record::{MeasurementPatch, RecordDraft};
pub use store::{LoadReport, RecordLoader};
pub use summary::{AggregateReporter, FacilityOverview, ProgressSummary};
pub use types::{Actor, MemberId, Metric, ProgressRecord, RecordId, Role, UserId};
pub use visibility::{ForeignRequestPolicy, MemberRoster, VisibilityResolver};

/// Engine version reported by the CLI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "gym-progress";
