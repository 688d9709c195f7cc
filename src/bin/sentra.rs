//! Sentra CLI - Command-line interface for Sentra Drift
//!
//! Commands:
//! - checkin: Record a daily self-report and rescore the day
//! - typing: Record a typing session and rescore the day
//! - voice: Assess a voice session against the user's voice baseline
//! - import: Bulk-load NDJSON daily records
//! - score: Print a day's score with momentum and drivers
//! - trends: Print a score trend with projection
//! - org: Print a Care Mode organization summary
//! - doctor: Diagnose configuration and database health

use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sentra_drift::{
    CheckIn, ConfigError, DriftEngine, DriftError, EngineConfig, ScoreEncoder, SqliteStore,
    StoreError, TypingSession, VoiceSession, DRIFT_VERSION, PRODUCER_NAME, SCHEMA_VERSION,
};

/// Sentra - personal baseline-drift wellbeing scoring
#[derive(Parser)]
#[command(name = "sentra")]
#[command(version = DRIFT_VERSION)]
#[command(about = "Score daily wellbeing signals against a personal baseline", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, default_value = "sentra.db")]
    db: PathBuf,

    /// Engine configuration (TOML); defaults apply when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a daily check-in
    Checkin {
        #[arg(long)]
        user: String,

        /// Mood on the emoji wheel (1-10)
        #[arg(long)]
        mood: f64,

        /// Hours slept (0-14)
        #[arg(long)]
        sleep_hours: f64,

        /// Sleep quality (1-5)
        #[arg(long)]
        sleep_quality: u8,

        /// Active minutes
        #[arg(long, conflicts_with = "activity_slider")]
        activity_minutes: Option<f64>,

        /// Activity slider position (0-100)
        #[arg(long)]
        activity_slider: Option<f64>,

        /// Day of the check-in (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a typing session
    Typing {
        #[arg(long)]
        user: String,

        #[arg(long)]
        avg_interval_ms: f64,

        #[arg(long)]
        std_interval_ms: f64,

        #[arg(long)]
        backspace_ratio: f64,

        #[arg(long)]
        session_duration_sec: f64,

        #[arg(long, default_value = "0")]
        fragmentation_count: u32,

        /// Session happened late at night
        #[arg(long)]
        late_night: bool,

        /// Day of the session (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Assess a voice session given as JSON (use - for stdin)
    Voice {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Import daily signal records from NDJSON (use - for stdin)
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the score for one day
    Score {
        #[arg(long)]
        user: String,

        /// Day to score (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the score trend with a short projection
    Trends {
        #[arg(long)]
        user: String,

        /// Number of days in the trend
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(7..=90))]
        days: u32,

        /// Last day of the trend (defaults to today, UTC)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Print an organization summary
    Org {
        /// Comma-separated member user ids
        #[arg(long, value_delimiter = ',', required = true)]
        users: Vec<String>,

        /// Use each member's latest score on or before this day
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Diagnose configuration and database health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

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

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sentra_drift={level},sentra={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), SentraCliError> {
    let engine = || open_engine(&cli.db, cli.config.as_deref());
    let encoder = ScoreEncoder::new();
    let today = Utc::now().date_naive();

    let output = match cli.command {
        Commands::Checkin {
            user,
            mood,
            sleep_hours,
            sleep_quality,
            activity_minutes,
            activity_slider,
            date,
        } => {
            let checkin = CheckIn {
                mood,
                sleep_hours,
                sleep_quality,
                activity_minutes,
                activity_slider,
            };
            let score = engine()?.submit_checkin(&user, date.unwrap_or(today), &checkin)?;
            encoder.encode_to_json(&score, cli.pretty)?
        }

        Commands::Typing {
            user,
            avg_interval_ms,
            std_interval_ms,
            backspace_ratio,
            session_duration_sec,
            fragmentation_count,
            late_night,
            date,
        } => {
            let session = TypingSession {
                user_id: user,
                date: date.unwrap_or(today),
                avg_interval_ms,
                std_interval_ms,
                backspace_ratio,
                session_duration_sec,
                fragmentation_count,
                late_night,
            };
            let score = engine()?.submit_typing_session(&session)?;
            encoder.encode_to_json(&score, cli.pretty)?
        }

        Commands::Voice { input } => {
            let session: VoiceSession = serde_json::from_str(&read_input(&input)?)?;
            let assessment = engine()?.record_voice_session(&session)?;
            encoder.encode_to_json(&assessment, cli.pretty)?
        }

        Commands::Import { input } => {
            let summary = engine()?.import_records(&read_input(&input)?)?;
            encoder.encode_to_json(&summary, cli.pretty)?
        }

        Commands::Score { user, date } => {
            let day = date.unwrap_or(today);
            let score = engine()?
                .get_score_for_day(&user, day)?
                .ok_or(SentraCliError::NoRecord { user, day })?;
            encoder.encode_to_json(&score, cli.pretty)?
        }

        Commands::Trends { user, days, end } => {
            let trends = engine()?.get_trends_ending(&user, end.unwrap_or(today), days)?;
            encoder.encode_to_json(&trends, cli.pretty)?
        }

        Commands::Org { users, as_of } => {
            let summary = engine()?.org_summary(&users, as_of.unwrap_or(today))?;
            encoder.encode_to_json(&summary, cli.pretty)?
        }

        Commands::Doctor { json } => {
            return cmd_doctor(&cli.db, cli.config.as_deref(), json);
        }
    };

    println!("{output}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}

fn open_engine(
    db: &Path,
    config: Option<&Path>,
) -> Result<DriftEngine<SqliteStore>, SentraCliError> {
    let config = load_config(config)?;
    let store = SqliteStore::open(db)?;
    debug!(db = %db.display(), scheme = config.weight_scheme.as_str(), "engine ready");
    Ok(DriftEngine::with_config(store, config))
}

fn read_input(input: &Path) -> Result<String, SentraCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_doctor(db: &Path, config: Option<&Path>, json: bool) -> Result<(), SentraCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Sentra Drift version {}", DRIFT_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Output envelope schema: {}", SCHEMA_VERSION),
    });

    match load_config(config) {
        Ok(loaded) => {
            let source = match config {
                Some(path) if path.exists() => format!("loaded from {}", path.display()),
                Some(path) => format!("{} not found, using defaults", path.display()),
                None => "using defaults".to_string(),
            };
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Configuration {} ({} weights, {}-day baseline)",
                    source,
                    loaded.weight_scheme.as_str(),
                    loaded.baseline_days
                ),
            });
        }
        Err(e) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Invalid configuration: {}", e),
        }),
    }

    let existed = db.exists();
    match SqliteStore::open(db) {
        Ok(_) => checks.push(DoctorCheck {
            name: "database".to_string(),
            status: if existed {
                CheckStatus::Ok
            } else {
                CheckStatus::Warning
            },
            message: if existed {
                format!("Database {} is readable and migrated", db.display())
            } else {
                format!("Database {} did not exist and was created", db.display())
            },
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "database".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot open database {}: {}", db.display(), e),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass files to import/voice)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (import -i - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DRIFT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sentra Doctor Report");
        println!("====================");
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
        Err(SentraCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum SentraCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Drift(DriftError),
    Config(ConfigError),
    Store(StoreError),
    NoRecord { user: String, day: NaiveDate },
    DoctorFailed,
}

impl From<io::Error> for SentraCliError {
    fn from(e: io::Error) -> Self {
        SentraCliError::Io(e)
    }
}

impl From<serde_json::Error> for SentraCliError {
    fn from(e: serde_json::Error) -> Self {
        SentraCliError::Json(e)
    }
}

impl From<DriftError> for SentraCliError {
    fn from(e: DriftError) -> Self {
        SentraCliError::Drift(e)
    }
}

impl From<ConfigError> for SentraCliError {
    fn from(e: ConfigError) -> Self {
        SentraCliError::Config(e)
    }
}

impl From<StoreError> for SentraCliError {
    fn from(e: StoreError) -> Self {
        SentraCliError::Store(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SentraCliError> for CliError {
    fn from(e: SentraCliError) -> Self {
        match e {
            SentraCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SentraCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SentraCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'sentra doctor' to check the configuration".to_string()),
            },
            SentraCliError::Store(e) => store_error(e),
            SentraCliError::Drift(e) => drift_error(e),
            SentraCliError::NoRecord { user, day } => CliError {
                code: "NO_RECORD".to_string(),
                message: format!("No signal record for {} on {}", user, day),
                hint: Some("Submit a check-in or import records for that day".to_string()),
            },
            SentraCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn store_error(e: StoreError) -> CliError {
    CliError {
        code: "STORE_ERROR".to_string(),
        message: e.to_string(),
        hint: Some("Check the --db path; run 'sentra doctor' for details".to_string()),
    }
}

fn drift_error(e: DriftError) -> CliError {
    let (code, hint) = match &e {
        DriftError::Store(_) => ("STORE_ERROR", "Check the --db path"),
        DriftError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
        DriftError::ParseError(_) => (
            "PARSE_ERROR",
            "Each line must be one daily signal record object",
        ),
        DriftError::MalformedRecord(_) => (
            "MALFORMED_RECORD",
            "Re-import the affected day with valid values",
        ),
        DriftError::InvalidInput(_) => ("INVALID_INPUT", "Check value ranges and retry"),
        DriftError::InvalidRange(_) => ("INVALID_RANGE", "Use a positive number of days"),
        DriftError::Config(_) => (
            "CONFIG_ERROR",
            "Run 'sentra doctor' to check the configuration",
        ),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

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
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
