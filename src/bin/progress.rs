//! Progress CLI - Command-line interface for the gym progress engine
//!
//! Commands:
//! - evolution: Time series of a member's measurements over a window
//! - recent: Series over the member's most recent records
//! - compare: Side-by-side comparison of two records
//! - summary: Latest values and change since the first measurement
//! - history: Records newest first
//! - facility: Facility-wide overview for privileged roles
//! - record: Create a record from a draft
//! - validate: Validate stored records
//! - doctor: Diagnose configuration and environment

use clap::{Args, Parser, Subcommand, ValueEnum};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use gym_progress::record::RecordDraft;
use gym_progress::types::{Actor, MemberId, ProgressRecord, Role, UserId};
use gym_progress::{
    EngineConfig, ForeignRequestPolicy, ProgressEngine, ProgressError, ProgressRequest, RecordId,
    RecordLoader, ENGINE_VERSION, PRODUCER_NAME,
};

/// Progress - Member progress tracking for fitness facilities
#[derive(Parser)]
#[command(name = "progress")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Evolution, comparison and summaries of member body measurements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time series of measurements over a look-back window
    Evolution {
        #[command(flatten)]
        common: CommonArgs,

        /// Look-back window in days (defaults to the configured window)
        #[arg(long)]
        window: Option<u32>,
    },

    /// Series over the most recent records (dashboard mini chart)
    Recent {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Compare two records (first and last when no ids are given)
    Compare {
        #[command(flatten)]
        common: CommonArgs,

        /// Earlier record id
        #[arg(long, requires = "later")]
        earlier: Option<RecordId>,

        /// Later record id
        #[arg(long, requires = "earlier")]
        later: Option<RecordId>,
    },

    /// Latest values and change since the first measurement
    Summary {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Records newest first
    History {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Facility-wide overview
    Facility {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Create a record from a draft and print it
    Record {
        /// Draft file path (use - for stdin)
        #[arg(short, long)]
        draft: PathBuf,

        #[command(flatten)]
        actor: ActorArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate stored records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ActorArgs {
    /// Role of the acting user
    #[arg(long, value_enum, default_value = "member")]
    role: RoleArg,

    /// User id of the acting user
    #[arg(long, default_value = "0")]
    user_id: u64,

    /// Member profile of the acting user
    #[arg(long)]
    member_id: Option<u64>,
}

impl ActorArgs {
    fn actor(&self) -> Actor {
        Actor::new(
            UserId(self.user_id),
            self.role.into(),
            self.member_id.map(MemberId),
        )
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Records file, JSON array or NDJSON (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    actor: ActorArgs,

    /// Member to view (trainer, staff and admin only)
    #[arg(long)]
    select: Option<u64>,

    /// Comma-separated list of known member ids
    #[arg(long, value_delimiter = ',')]
    roster: Vec<u64>,

    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    as_of: Option<String>,

    /// Engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override how a member selecting another member is handled
    #[arg(long, value_enum)]
    foreign_requests: Option<ForeignRequestArg>,

    /// Override the number of points in the recent series
    #[arg(long)]
    recent_points: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ForeignRequestArg {
    /// Answer with the member's own records
    Ignore,
    /// Fail with a FORBIDDEN error
    Reject,
}

impl From<ForeignRequestArg> for ForeignRequestPolicy {
    fn from(policy: ForeignRequestArg) -> Self {
        match policy {
            ForeignRequestArg::Ignore => ForeignRequestPolicy::Ignore,
            ForeignRequestArg::Reject => ForeignRequestPolicy::Reject,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Member,
    Trainer,
    Staff,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Member => Role::Member,
            RoleArg::Trainer => Role::Trainer,
            RoleArg::Staff => Role::Staff,
            RoleArg::Admin => Role::Admin,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ProgressCliError> {
    match cli.command {
        Commands::Evolution { common, window } => {
            let (engine, records, mut request) = prepare(&common)?;
            request.window_days = window;
            emit(&engine.evolution(&records, &request)?, common.pretty)
        }

        Commands::Recent { common } => {
            let (engine, records, request) = prepare(&common)?;
            emit(&engine.recent(&records, &request)?, common.pretty)
        }

        Commands::Compare {
            common,
            earlier,
            later,
        } => {
            let (engine, records, mut request) = prepare(&common)?;
            request.earlier = earlier;
            request.later = later;
            match engine.compare(&records, &request)? {
                Some(result) => emit(&result, common.pretty),
                None => Err(ProgressCliError::NotEnoughRecords),
            }
        }

        Commands::Summary { common } => {
            let (engine, records, request) = prepare(&common)?;
            emit(&engine.summary(&records, &request)?, common.pretty)
        }

        Commands::History { common } => {
            let (engine, records, request) = prepare(&common)?;
            emit(&engine.history(&records, &request)?, common.pretty)
        }

        Commands::Facility { common } => {
            let (engine, records, request) = prepare(&common)?;
            emit(&engine.facility_overview(&records, &request), common.pretty)
        }

        Commands::Record {
            draft,
            actor,
            pretty,
        } => cmd_record(&draft, &actor.actor(), pretty),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

/// Load configuration and records, and build the request shared by the view commands.
fn prepare(
    common: &CommonArgs,
) -> Result<(ProgressEngine, Vec<ProgressRecord>, ProgressRequest), ProgressCliError> {
    let mut config = match &common.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(policy) = common.foreign_requests {
        config.foreign_request_policy = policy.into();
    }
    if let Some(points) = common.recent_points {
        config.recent_points = points;
    }

    let (records, report) = RecordLoader::load(&read_input(&common.input)?)?;
    tracing::info!(
        total = report.total_records,
        with_bmi = report.records_with_bmi,
        "records loaded"
    );

    let mut request = ProgressRequest::new(common.actor.actor())
        .with_roster(common.roster.iter().copied().map(MemberId).collect());
    if let Some(member) = common.select {
        request = request.for_member(MemberId(member));
    }
    if let Some(date) = &common.as_of {
        request = request.as_of(parse_date(date)?);
    }

    Ok((ProgressEngine::with_config(config), records, request))
}

fn cmd_record(draft: &Path, actor: &Actor, pretty: bool) -> Result<(), ProgressCliError> {
    let draft: RecordDraft = serde_json::from_str(&read_input(draft)?)?;
    let record = ProgressRecord::create(draft, actor)?;
    emit(&record, pretty)
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), ProgressCliError> {
    let records = RecordLoader::parse_auto(&read_input(input)?)?;

    let errors: Vec<ValidationErrorDetail> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let draft = RecordDraft {
                member: record.member,
                date: record.date,
                measurements: record.measurements,
                notes: String::new(),
            };
            draft.validate().err().map(|e| ValidationErrorDetail {
                index,
                record_id: record.id,
                error: e.to_string(),
            })
        })
        .collect();

    let (_, load) = RecordLoader::normalize(records);

    let report = ValidationReport {
        total_records: load.total_records,
        valid_records: load.total_records - errors.len(),
        invalid_records: errors.len(),
        records_with_bmi: load.records_with_bmi,
        ignored_heights: load.ignored_heights.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);
        println!("With BMI:        {}", report.records_with_bmi);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.record_id, err.index, err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(ProgressCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), ProgressCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engine version {}", ENGINE_VERSION),
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match EngineConfig::from_json(&content) {
                    Ok(config) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (window {} days, {:?} foreign requests)",
                            config.default_window_days, config.foreign_request_policy
                        ),
                    }),
                    Err(e) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config JSON: {}", e),
                    }),
                },
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults apply".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass records with --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Progress Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ProgressCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(path: &Path) -> Result<String, ProgressCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, ProgressCliError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ProgressError::DateParseError(format!("{}: {}", s, e)).into())
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<(), ProgressCliError> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

// Error types

#[derive(Debug)]
enum ProgressCliError {
    Io(io::Error),
    Engine(ProgressError),
    Json(serde_json::Error),
    NotEnoughRecords,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for ProgressCliError {
    fn from(e: io::Error) -> Self {
        ProgressCliError::Io(e)
    }
}

impl From<ProgressError> for ProgressCliError {
    fn from(e: ProgressError) -> Self {
        ProgressCliError::Engine(e)
    }
}

impl From<serde_json::Error> for ProgressCliError {
    fn from(e: serde_json::Error) -> Self {
        ProgressCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ProgressCliError> for CliError {
    fn from(e: ProgressCliError) -> Self {
        match e {
            ProgressCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ProgressCliError::Engine(e) => {
                let (code, hint) = engine_error_code(&e);
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ProgressCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ProgressCliError::NotEnoughRecords => CliError {
                code: "NOT_ENOUGH_RECORDS".to_string(),
                message: "At least two records are needed for a comparison".to_string(),
                hint: Some("Register another measurement first".to_string()),
            },
            ProgressCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ProgressCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn engine_error_code(e: &ProgressError) -> (&'static str, &'static str) {
    match e {
        ProgressError::Forbidden => ("FORBIDDEN", "Members can only view their own progress"),
        ProgressError::MemberNotFound(_) | ProgressError::RecordNotFound(_) => {
            ("NOT_FOUND", "Check the member roster and record ids")
        }
        ProgressError::EmptyRecord | ProgressError::InvalidMeasurement { .. } => (
            "INVALID_RECORD",
            "Provide at least one measurement with finite, non-negative values",
        ),
        ProgressError::DateParseError(_) => ("INVALID_DATE", "Use the YYYY-MM-DD date format"),
        ProgressError::ParseError(_) | ProgressError::JsonError(_) => (
            "PARSE_ERROR",
            "Ensure input is a JSON array or NDJSON of progress records",
        ),
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    records_with_bmi: usize,
    ignored_heights: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    record_id: RecordId,
    error: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
