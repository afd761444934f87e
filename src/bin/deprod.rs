//! deprod CLI - command-line interface for the DeProductify engine
//!
//! Commands:
//! - replay: Run recorded frames through the engine (batch mode)
//! - run: Tick live on the wall clock from scores streamed on stdin
//! - doctor: Diagnose configuration and environment
//! - config: Print the effective configuration

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use deproductify::replay::{ReplayFrame, ReplayReport, Replayer};
use deproductify::signals::{SharedScore, SignalSources};
use deproductify::sinks::{FanoutSink, LogSink, NdjsonSink};
use deproductify::suppression::{SharedSuppression, ThrottledSuppression};
use deproductify::{
    DecisionEngine, EngineConfig, EngineController, EngineError, SuppressionFailure,
    DEPROD_VERSION, PRODUCER_NAME,
};

/// deprod - productivity scoring and decision engine
#[derive(Parser)]
#[command(name = "deprod")]
#[command(author = "DeProductify Contributors")]
#[command(version = DEPROD_VERSION)]
#[command(about = "Score productivity signals and decide when to intervene", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded frames through the engine (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Write emitted events instead of per-tick outcomes
        #[arg(long)]
        events: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Tick live from scores streamed on stdin (one JSON object per line)
    Run {
        /// Also write a status event every tick
        #[arg(long)]
        status: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// Configuration file plus per-field overrides
#[derive(Args)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Combined score that fires a trigger
    #[arg(long)]
    threshold: Option<f64>,

    /// Seconds between ticks
    #[arg(long)]
    tick_interval: Option<f64>,

    /// Seconds of silence after a trigger
    #[arg(long)]
    cooldown: Option<f64>,

    /// Minimum seconds between two warnings
    #[arg(long)]
    warning_rate_limit: Option<f64>,

    /// Treat a failing suppression check as suppressed
    #[arg(long)]
    fail_closed: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<EngineConfig, DeprodCliError> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.trigger_threshold = threshold;
        }
        if let Some(interval) = self.tick_interval {
            config.tick_interval_secs = interval;
        }
        if let Some(cooldown) = self.cooldown {
            config.cooldown_secs = cooldown;
        }
        if let Some(limit) = self.warning_rate_limit {
            config.warning_rate_limit_secs = limit;
        }
        if self.fail_closed {
            config.suppression_failure = SuppressionFailure::FailClosed;
        }

        config.validate()?;
        Ok(config)
    }
}

/// One line of live input; absent fields keep their previous value
#[derive(Debug, Deserialize)]
struct LiveUpdate {
    visual: Option<f64>,
    focus: Option<f64>,
    typing: Option<f64>,
    suppressed: Option<bool>,
    suppression_reason: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DeprodCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            events,
            config,
        } => cmd_replay(&input, &output, input_format, output_format, events, &config),

        Commands::Run { status, config } => cmd_run(status, &config),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Config { config } => {
            println!("{}", config.resolve()?.to_json_pretty()?);
            Ok(())
        }
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    events: bool,
    config_args: &ConfigArgs,
) -> Result<(), DeprodCliError> {
    let config = config_args.resolve()?;

    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let frames = match input_format {
        InputFormat::Ndjson => ReplayFrame::parse_ndjson(&input_data)?,
        InputFormat::Json => ReplayFrame::parse_array(&input_data)?,
    };

    if frames.is_empty() {
        return Err(DeprodCliError::NoFrames);
    }

    let mut replayer = Replayer::new(config)?;
    let report = replayer.run(&frames)?;
    info!(
        "replayed {} frames: {} triggers, final baseline {:.1}",
        frames.len(),
        report.snapshot.triggers,
        report.snapshot.baseline
    );

    let output_data = format_report(&report, events, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(include_status: bool, config_args: &ConfigArgs) -> Result<(), DeprodCliError> {
    let config = config_args.resolve()?;

    let visual = SharedScore::default();
    let focus = SharedScore::default();
    let typing = SharedScore::default();
    let suppression = SharedSuppression::new();

    let stdout_sink = NdjsonSink::new(io::stdout());
    let stdout_sink = if include_status {
        stdout_sink.with_status()
    } else {
        stdout_sink
    };
    let sink = FanoutSink::new().with(LogSink).with(stdout_sink);

    let sources = SignalSources::new(visual.clone(), focus.clone()).with_typing(typing.clone());
    let check_interval = config.suppression_check_interval_secs;
    let policy = ThrottledSuppression::new(suppression.clone(), check_interval);
    let engine = DecisionEngine::new(config, sources, policy, sink)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let eof = CancellationToken::new();
        let reader_eof = eof.clone();
        std::thread::spawn(move || {
            read_updates(&visual, &focus, &typing, &suppression);
            reader_eof.cancel();
        });

        let mut controller = EngineController::new();
        controller.start(engine)?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!("failed to listen for Ctrl-C: {err}");
                }
                info!("interrupted, stopping after the current tick");
            }
            _ = eof.cancelled() => {
                info!("stdin closed, stopping after the current tick");
            }
        }

        if let Some(engine) = controller.stop().await? {
            let snapshot = engine.snapshot();
            info!("stopped after {} ticks, {} triggers", snapshot.ticks, snapshot.triggers);
        }
        Ok::<(), DeprodCliError>(())
    })
}

/// Apply stdin lines to the shared cells until EOF
fn read_updates(
    visual: &SharedScore,
    focus: &SharedScore,
    typing: &SharedScore,
    suppression: &SharedSuppression,
) {
    let stdin = io::stdin();
    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("failed to read stdin: {err}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let update: LiveUpdate = match serde_json::from_str(trimmed) {
            Ok(update) => update,
            Err(err) => {
                warn!("skipping line {}: {err}", line_num + 1);
                continue;
            }
        };

        if let Some(score) = update.visual {
            visual.set(score);
        }
        if let Some(score) = update.focus {
            focus.set(score);
        }
        if let Some(score) = update.typing {
            typing.set(score);
        }
        match update.suppressed {
            Some(true) => suppression.suppress(
                update
                    .suppression_reason
                    .unwrap_or_else(|| "Suppression active".to_string()),
            ),
            Some(false) => suppression.clear(),
            None => {}
        }
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), DeprodCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "deprod_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("deprod version {}", DEPROD_VERSION),
    });

    let defaults = EngineConfig::default();
    checks.push(match defaults.validate() {
        Ok(()) => DoctorCheck {
            name: "default_config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Defaults valid (threshold {}, tick {}s, cooldown {}s)",
                defaults.trigger_threshold, defaults.tick_interval_secs, defaults.cooldown_secs
            ),
        },
        Err(e) => DoctorCheck {
            name: "default_config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    if let Some(path) = config_path {
        let check = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match EngineConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config file valid (threshold {}, cooldown {}s)",
                            config.trigger_threshold, config.cooldown_secs
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; 'deprod run' expects scores piped in".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (live mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DEPROD_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("deprod Doctor Report");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DeprodCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn format_report(
    report: &ReplayReport,
    events: bool,
    format: &OutputFormat,
) -> Result<String, DeprodCliError> {
    if events {
        format_records(&report.events, format)
    } else {
        format_records(&report.outcomes, format)
    }
}

fn format_records<T: Serialize>(records: &[T], format: &OutputFormat) -> Result<String, DeprodCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

// Error handling

#[derive(Debug)]
enum DeprodCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
}

impl From<io::Error> for DeprodCliError {
    fn from(e: io::Error) -> Self {
        DeprodCliError::Io(e)
    }
}

impl From<EngineError> for DeprodCliError {
    fn from(e: EngineError) -> Self {
        DeprodCliError::Engine(e)
    }
}

impl From<serde_json::Error> for DeprodCliError {
    fn from(e: serde_json::Error) -> Self {
        DeprodCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DeprodCliError> for CliError {
    fn from(e: DeprodCliError) -> Self {
        match e {
            DeprodCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DeprodCliError::Engine(EngineError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'deprod config' to see the defaults".to_string()),
            },
            DeprodCliError::Engine(EngineError::Replay(msg)) => CliError {
                code: "REPLAY_ERROR".to_string(),
                message: msg,
                hint: Some("Frames need scores in [0, 1] and non-decreasing timestamps".to_string()),
            },
            DeprodCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            DeprodCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DeprodCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            DeprodCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

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
