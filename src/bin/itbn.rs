//! ITBN CLI - Command-line interface for ITBN feature extraction
//!
//! Commands:
//! - build: Normalize every training session and export the feature matrix
//! - session: Normalize a single session log and print its table
//! - validate: Validate the lines of a session log
//! - doctor: Diagnose configuration and manifest health
//! - columns: Print the feature column layout

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use itbn_features::encoder::MatrixEncoder;
use itbn_features::features::{column_names, ABSENT, PRESENT};
use itbn_features::schema::{LogAdapter, LOG_FORMAT};
use itbn_features::{
    normalize_session, ComputeError, Config, CorrectionPolicy, FeatureProcessor, SessionKey,
    SplitRegistry, PRODUCER_NAME, VERSION,
};

/// ITBN - Normalize session label logs into ITBN feature tables
#[derive(Parser)]
#[command(name = "itbn")]
#[command(version = VERSION)]
#[command(about = "Normalize session label logs into ITBN feature tables", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every training session and export the feature matrix
    Build {
        /// Root directory of the session label logs
        #[arg(short, long)]
        labels: PathBuf,

        /// Session manifest with the training/validation split
        #[arg(short, long)]
        manifest: PathBuf,

        /// Configuration file (JSON); built-in tables when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: MatrixFormat,

        /// Fail if any session had to be skipped
        #[arg(long)]
        strict: bool,
    },

    /// Normalize a single session log and print its canonical table
    Session {
        /// Session log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Force a correction policy instead of resolving it
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Session group used for policy resolution
        #[arg(long)]
        group: Option<String>,

        /// Session name used for policy resolution
        #[arg(long)]
        name: Option<String>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate the lines of a session log
    Validate {
        /// Session log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and manifest health
    Doctor {
        /// Configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Manifest file to check
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature column layout
    Columns {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum MatrixFormat {
    /// Numeric CSV with a leading session column
    Csv,
    /// Numeric CSV with facet columns only
    CsvBare,
    /// JSON payload with producer metadata
    Json,
    /// Y/N occurrence labels as CSV
    Labels,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    None,
    Shorten,
    Correct,
}

impl From<PolicyArg> for CorrectionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::None => CorrectionPolicy::None,
            PolicyArg::Shorten => CorrectionPolicy::Shorten,
            PolicyArg::Correct => CorrectionPolicy::Correct,
        }
    }
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
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("itbn_features={0},itbn={0}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), ItbnCliError> {
    match cli.command {
        Commands::Build {
            labels,
            manifest,
            config,
            output,
            format,
            strict,
        } => cmd_build(&labels, &manifest, config.as_deref(), &output, format, strict),

        Commands::Session {
            input,
            policy,
            group,
            name,
            config,
        } => cmd_session(&input, policy, group, name, config.as_deref()),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor {
            config,
            manifest,
            json,
        } => cmd_doctor(config.as_deref(), manifest.as_deref(), json),

        Commands::Columns { json } => cmd_columns(json),
    }
}

fn cmd_build(
    labels: &Path,
    manifest: &Path,
    config: Option<&Path>,
    output: &Path,
    format: MatrixFormat,
    strict: bool,
) -> Result<(), ItbnCliError> {
    let config = Config::load_or_default(config)?;
    let registry = SplitRegistry::from_path(manifest, &config.manifest)?;
    let processor = FeatureProcessor::with_config(config);

    let result = processor.process_dir(labels, &registry)?;
    let report = &result.report;

    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.session, skipped.reason);
    }
    if strict && !report.skipped.is_empty() {
        return Err(ItbnCliError::SessionsSkipped(report.skipped.len()));
    }
    if result.matrix.is_empty() {
        return Err(ItbnCliError::NoSessions);
    }

    let encoder = MatrixEncoder::new();
    let output_data = match format {
        MatrixFormat::Csv => encoder.encode_csv(&result.matrix, true)?,
        MatrixFormat::CsvBare => encoder.encode_csv(&result.matrix, false)?,
        MatrixFormat::Json => encoder.encode_to_json(&result.matrix)? + "\n",
        MatrixFormat::Labels => encoder.encode_labels_csv(&result.matrix)?,
    };

    write_output(output, &output_data)?;

    tracing::info!(
        rows = result.matrix.len(),
        none = report.policies[0],
        shorten = report.policies[1],
        correct = report.policies[2],
        "feature matrix written"
    );
    Ok(())
}

fn cmd_session(
    input: &Path,
    policy: Option<PolicyArg>,
    group: Option<String>,
    name: Option<String>,
    config: Option<&Path>,
) -> Result<(), ItbnCliError> {
    let config = Config::load_or_default(config)?;
    let log = read_input(input)?;

    let key = match (group, name) {
        (Some(group), Some(name)) => SessionKey::new(group, name),
        (group, name) => {
            let derived = SessionKey::from_path(input);
            SessionKey::new(
                group.unwrap_or(derived.group),
                name.unwrap_or(derived.name),
            )
        }
    };
    let policy = match policy {
        Some(policy) => policy.into(),
        None => config.corrections.resolve(&key),
    };

    let table = normalize_session(&log, policy, config.canonical_lines)?;

    let report = SessionReport {
        session: key,
        policy,
        table,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), ItbnCliError> {
    let log = read_input(input)?;
    let validation = LogAdapter::validate_log(&log);

    let report = ValidationReport {
        format: LOG_FORMAT.to_string(),
        total_lines: validation.total_lines,
        valid_lines: validation.valid_lines(),
        invalid_lines: validation.errors.len(),
        errors: validation
            .errors
            .iter()
            .map(|e| ValidationErrorDetail {
                line: e.line,
                text: e.text.clone(),
                error: e.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", report.format);
        println!("=================");
        println!("Total lines:   {}", report.total_lines);
        println!("Valid lines:   {}", report.valid_lines);
        println!("Invalid lines: {}", report.invalid_lines);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {} ('{}'): {}", err.line, err.text, err.error);
            }
        }
    }

    if report.invalid_lines > 0 {
        Err(ItbnCliError::ValidationFailed(report.invalid_lines))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, manifest: Option<&Path>, json: bool) -> Result<(), ItbnCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, VERSION),
    });

    checks.push(DoctorCheck {
        name: "log_format".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input format: {}", LOG_FORMAT),
    });

    let loaded = match Config::load_or_default(config) {
        Ok(loaded) => {
            let (shorten, correct) = loaded.corrections.counts();
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} ({} shorten, {} correct sessions)",
                    if config.is_some() { "Configuration valid" } else { "Built-in configuration" },
                    shorten,
                    correct
                ),
            });
            Some(loaded)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            });
            None
        }
    };

    if let Some(manifest_path) = manifest {
        let rules = loaded.map(|c| c.manifest).unwrap_or_default();
        match SplitRegistry::from_path(manifest_path, &rules) {
            Ok(registry) if registry.training_count() == 0 => checks.push(DoctorCheck {
                name: "manifest".to_string(),
                status: CheckStatus::Warning,
                message: "Manifest lists no training sessions".to_string(),
            }),
            Ok(registry) => checks.push(DoctorCheck {
                name: "manifest".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} training, {} validation sessions",
                    registry.training_count(),
                    registry.validation_count()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "manifest".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        }
    }

    // Check stdin is available (for `-` inputs)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (log input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("ITBN Doctor Report");
        println!("==================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ItbnCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_columns(json: bool) -> Result<(), ItbnCliError> {
    let columns = column_names();
    if json {
        let layout = serde_json::json!({
            "columns": columns,
            "absent_sentinel": ABSENT,
            "present_flag": PRESENT,
        });
        println!("{}", serde_json::to_string_pretty(&layout)?);
    } else {
        for (idx, column) in columns.iter().enumerate() {
            println!("{:>2}  {}", idx, column);
        }
        println!();
        println!("Absent cells hold {}; occurrence columns hold {} when the event started.", ABSENT, PRESENT);
    }
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, ItbnCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), ItbnCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error handling

#[derive(Debug)]
enum ItbnCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSessions,
    SessionsSkipped(usize),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for ItbnCliError {
    fn from(e: io::Error) -> Self {
        ItbnCliError::Io(e)
    }
}

impl From<ComputeError> for ItbnCliError {
    fn from(e: ComputeError) -> Self {
        ItbnCliError::Compute(e)
    }
}

impl From<serde_json::Error> for ItbnCliError {
    fn from(e: serde_json::Error) -> Self {
        ItbnCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ItbnCliError> for CliError {
    fn from(e: ItbnCliError) -> Self {
        match e {
            ItbnCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ItbnCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::MalformedLine { .. } => {
                        ("MALFORMED_LINE", "Run 'itbn validate' on the session log")
                    }
                    ComputeError::UnclosedRewardWindow => {
                        ("UNCLOSED_REWARD", "The log opens a reward window that never ends")
                    }
                    ComputeError::PolicyConflict { .. } => {
                        ("POLICY_CONFLICT", "List each session in at most one correction table")
                    }
                    ComputeError::Manifest(_) => ("MANIFEST_ERROR", "Check the manifest path and rewrite rules"),
                    ComputeError::Config(_) => ("CONFIG_ERROR", "Run 'itbn doctor --config <file>'"),
                    _ => ("COMPUTE_ERROR", "Check input files"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ItbnCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ItbnCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No training sessions were processed".to_string(),
                hint: Some("Check that the labels root is spelled as in the rewritten manifest".to_string()),
            },
            ItbnCliError::SessionsSkipped(count) => CliError {
                code: "SESSIONS_SKIPPED".to_string(),
                message: format!("{} sessions were skipped", count),
                hint: Some("Drop --strict to export the remaining sessions".to_string()),
            },
            ItbnCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} lines failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ItbnCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct SessionReport {
    session: SessionKey,
    policy: CorrectionPolicy,
    table: itbn_features::CanonicalEventTable,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    format: String,
    total_lines: usize,
    valid_lines: usize,
    invalid_lines: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    text: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
