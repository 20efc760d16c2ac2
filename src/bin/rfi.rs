//! RFI CLI - Command-line interface for the RFI dormancy engine
//!
//! Commands:
//! - analyze: Profile every user in an activity matrix (batch mode)
//! - profile: Show one user's row, scored episodes and RFI matrix
//! - validate: Check an activity matrix against the input contract
//! - schema: Print the output column list

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rfi_dormancy::config::{
    DEFAULT_EWMA_ALPHA, DEFAULT_EXPONENTIAL_K, DEFAULT_STD_DEV_K,
};
use rfi_dormancy::encoder::encode_errors;
use rfi_dormancy::{
    ActivityMatrix, ComputeError, DecayKind, DormancyEngine, EngineConfig, ReportEncoder,
    TableFormat, ThresholdKind, ENGINE_NAME, ENGINE_VERSION, OUTPUT_COLUMNS,
};

/// RFI - per-user inactivity profiling and 6-month dormancy prediction
#[derive(Parser)]
#[command(name = "rfi")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Profile user inactivity and flag dormancy risk", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile every user in an activity matrix (batch mode)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        engine: EngineArgs,

        /// Worker threads (defaults to one per core)
        #[arg(long)]
        workers: Option<usize>,

        /// Write per-user errors as NDJSON to this file
        #[arg(long)]
        errors_out: Option<PathBuf>,
    },

    /// Show one user's row, scored episodes and RFI matrix
    Profile {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// User to profile
        #[arg(short, long)]
        user: String,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Check an activity matrix against the input contract
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the output column list
    Schema {
        /// Output as a JSON array
        #[arg(long)]
        json: bool,
    },
}

/// Engine tunables shared by `analyze` and `profile`
#[derive(clap::Args)]
struct EngineArgs {
    /// Engine configuration file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relevance decay model
    #[arg(long)]
    decay: Option<DecayArg>,

    /// Decay rate for the exponential model
    #[arg(long)]
    decay_k: Option<f64>,

    /// Threshold strategy
    #[arg(long)]
    threshold: Option<ThresholdArg>,

    /// Percentile (0-100) for the percentile strategy
    #[arg(long)]
    percentile: Option<f64>,

    /// Standard deviations above the mean for the mean-std-dev strategy
    #[arg(long)]
    std_dev_k: Option<f64>,

    /// Smoothing factor for the ewma strategy
    #[arg(long)]
    alpha: Option<f64>,

    /// Recent activity window in days
    #[arg(long)]
    recent_window: Option<usize>,

    /// Dormancy horizon in days
    #[arg(long)]
    horizon: Option<usize>,

    /// Threshold for users with no closed inactivity episode
    #[arg(long)]
    default_threshold: Option<f64>,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON matrix document
    Json,
    /// Newline-delimited JSON (one user row per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one output row per line)
    Ndjson,
    /// Full report as JSON
    Json,
    /// Full report as pretty-printed JSON
    JsonPretty,
    /// CSV table with a header row
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum DecayArg {
    Hyperbolic,
    Exponential,
    Logarithmic,
}

#[derive(Clone, Copy, ValueEnum)]
enum ThresholdArg {
    Percentile,
    MeanStdDev,
    Ewma,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

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

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    // RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<(), RfiCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            engine,
            workers,
            errors_out,
        } => cmd_analyze(
            &input,
            &output,
            input_format,
            output_format,
            &engine,
            workers,
            errors_out.as_deref(),
        ),

        Commands::Profile {
            input,
            input_format,
            user,
            engine,
        } => cmd_profile(&input, input_format, &user, &engine),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { json } => cmd_schema(json),
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    engine_args: &EngineArgs,
    workers: Option<usize>,
    errors_out: Option<&Path>,
) -> Result<(), RfiCliError> {
    let mut config = engine_args.to_config()?;
    if workers.is_some() {
        config.workers = workers;
    }
    let engine = DormancyEngine::new(config)?;

    let matrix = read_matrix(input, input_format)?;
    if matrix.is_empty() {
        return Err(RfiCliError::NoUsers);
    }

    let report = engine.run_batch(&matrix)?;

    let encoder = ReportEncoder::new(table_format(&output_format));
    let output_data = encoder.encode_report(&report)?;
    write_output(output, &output_data)?;

    if !report.errors.is_empty() {
        eprintln!(
            "{} of {} users rejected",
            report.errors.len(),
            report.metadata.total_users
        );
        for err in &report.errors {
            eprintln!("  - {} (row {}): {}", err.user_id, err.index, err.message);
        }
    }

    if let Some(path) = errors_out {
        fs::write(path, encode_errors(&report.errors)?)?;
    }

    Ok(())
}

fn cmd_profile(
    input: &Path,
    input_format: InputFormat,
    user: &str,
    engine_args: &EngineArgs,
) -> Result<(), RfiCliError> {
    let engine = DormancyEngine::new(engine_args.to_config()?)?;
    let matrix = read_matrix(input, input_format)?;
    let detail = engine.profile_user(&matrix, user)?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), RfiCliError> {
    let matrix = read_matrix(input, input_format)?;
    let failures = matrix.validate_rows();

    let report = ValidationReport {
        window_days: matrix.window_days(),
        total_rows: matrix.len(),
        valid_rows: matrix.len() - failures.len(),
        invalid_rows: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                user_id: f.user_id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Window:       {} days", report.window_days);
        println!("Total rows:   {}", report.total_rows);
        println!("Valid rows:   {}", report.valid_rows);
        println!("Invalid rows: {}", report.invalid_rows);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Row {} ({}): {}", err.index, err.user_id, err.error);
            }
        }
    }

    if report.invalid_rows > 0 {
        Err(RfiCliError::ValidationFailed(report.invalid_rows))
    } else {
        Ok(())
    }
}

fn cmd_schema(json: bool) -> Result<(), RfiCliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&OUTPUT_COLUMNS)?);
    } else {
        println!("Output columns ({ENGINE_NAME} {ENGINE_VERSION}):");
        println!();
        for (i, column) in OUTPUT_COLUMNS.iter().enumerate() {
            println!("{:>2}. {}", i + 1, column);
        }
    }
    Ok(())
}

// Helper functions

impl EngineArgs {
    /// Start from the config file (or defaults) and apply flag overrides
    fn to_config(&self) -> Result<EngineConfig, RfiCliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };

        if let Some(decay) = self.decay {
            config.decay = match decay {
                DecayArg::Hyperbolic => DecayKind::Hyperbolic,
                DecayArg::Exponential => DecayKind::Exponential {
                    k: DEFAULT_EXPONENTIAL_K,
                },
                DecayArg::Logarithmic => DecayKind::Logarithmic,
            };
        }
        if let Some(k) = self.decay_k {
            config.decay = DecayKind::Exponential { k };
        }

        if let Some(threshold) = self.threshold {
            config.threshold = match threshold {
                ThresholdArg::Percentile => ThresholdKind::default(),
                ThresholdArg::MeanStdDev => ThresholdKind::MeanStdDev {
                    k: DEFAULT_STD_DEV_K,
                },
                ThresholdArg::Ewma => ThresholdKind::Ewma {
                    alpha: DEFAULT_EWMA_ALPHA,
                },
            };
        }
        if let Some(percentile) = self.percentile {
            config.threshold = ThresholdKind::Percentile { percentile };
        }
        if let Some(k) = self.std_dev_k {
            config.threshold = ThresholdKind::MeanStdDev { k };
        }
        if let Some(alpha) = self.alpha {
            config.threshold = ThresholdKind::Ewma { alpha };
        }

        if let Some(days) = self.recent_window {
            config.recent_window_days = days;
        }
        if let Some(days) = self.horizon {
            config.dormancy_horizon_days = days;
        }
        if let Some(days) = self.default_threshold {
            config.default_threshold_days = days;
        }

        Ok(config)
    }
}

fn read_input(input: &Path) -> Result<String, RfiCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_matrix(input: &Path, input_format: InputFormat) -> Result<ActivityMatrix, RfiCliError> {
    let input_data = read_input(input)?;
    let matrix = match input_format {
        InputFormat::Json => ActivityMatrix::parse_json(&input_data)?,
        InputFormat::Ndjson => ActivityMatrix::parse_ndjson(&input_data)?,
    };
    Ok(matrix)
}

fn write_output(output: &Path, data: &str) -> Result<(), RfiCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn table_format(format: &OutputFormat) -> TableFormat {
    match format {
        OutputFormat::Ndjson => TableFormat::Ndjson,
        OutputFormat::Json => TableFormat::Json,
        OutputFormat::JsonPretty => TableFormat::JsonPretty,
        OutputFormat::Csv => TableFormat::Csv,
    }
}

// Error handling

#[derive(Debug)]
enum RfiCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoUsers,
    ValidationFailed(usize),
}

impl From<io::Error> for RfiCliError {
    fn from(e: io::Error) -> Self {
        RfiCliError::Io(e)
    }
}

impl From<ComputeError> for RfiCliError {
    fn from(e: ComputeError) -> Self {
        RfiCliError::Compute(e)
    }
}

impl From<serde_json::Error> for RfiCliError {
    fn from(e: serde_json::Error) -> Self {
        RfiCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RfiCliError> for CliError {
    fn from(e: RfiCliError) -> Self {
        match e {
            RfiCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RfiCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::Configuration(_) => (
                        "CONFIG_ERROR",
                        "Check the config file and engine flags",
                    ),
                    ComputeError::UserNotFound(_) => (
                        "USER_NOT_FOUND",
                        "Run 'rfi validate' to list the users in the matrix",
                    ),
                    ComputeError::InputShape { .. } => (
                        "INVALID_ROW",
                        "Run 'rfi validate' for details",
                    ),
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input is a user x day matrix of 0/1 values",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            RfiCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RfiCliError::NoUsers => CliError {
                code: "NO_USERS".to_string(),
                message: "No users found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            RfiCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    window_days: usize,
    total_rows: usize,
    valid_rows: usize,
    invalid_rows: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    user_id: String,
    error: String,
}
