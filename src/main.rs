//! Keystroke Sampler CLI
//!
//! Keystroke-dynamics sample capture and dataset curation.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use keystroke_sampler::{
    collector::{CollectorConfig, MonotonicClock, ReplayCollector},
    config::Config,
    core::{curate, FeatureSchema, Label},
    dataset::{repair_header, LabeledTable},
    export::SampleExporter,
    ledger::SampleLedger,
    sampler::{Sampler, SamplerEvent},
    CAPTURE_NOTICE, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keystroke-sampler")]
#[command(version = VERSION)]
#[command(about = "Keystroke-dynamics sample capture and dataset curation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture password samples from a recorded key script
    Capture {
        /// JSON-lines key script to replay
        #[arg(long, short)]
        script: PathBuf,

        /// Participant name (defaults to the configured default user)
        #[arg(long, short)]
        user: Option<String>,

        /// Label for the captured samples (exactly `Genuine` or `Imposter`)
        #[arg(long, short)]
        label: Option<Label>,

        /// Password the participant is asked to type
        #[arg(long)]
        target: Option<String>,

        /// Directory for the sample files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Replay timestamped signals at their recorded pace
        #[arg(long)]
        pace: bool,
    },

    /// Remove ambiguous samples from a labeled sample file
    Curate {
        /// Sample file to curate (defaults to the millisecond sample file)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Where to write the curated table
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Half-width of the ambiguous band around 0.5
        #[arg(long)]
        margin: Option<f64>,

        /// Solver iteration cap
        #[arg(long)]
        max_iter: Option<usize>,

        /// Solver convergence tolerance
        #[arg(long)]
        tolerance: Option<f64>,

        /// Password the file was captured for (defaults to the configured password)
        #[arg(long)]
        target: Option<String>,
    },

    /// Show per-participant sample counts
    Status,

    /// Print the column layout for a password
    Schema {
        /// Password to derive columns for (defaults to the configured password)
        #[arg(long)]
        target: Option<String>,
    },

    /// Rewrite a sample file's header to the canonical column layout
    RepairHeader {
        /// File with the legacy header
        #[arg(long, short)]
        input: PathBuf,

        /// Where to write the repaired file
        #[arg(long, short)]
        output: PathBuf,

        /// Password the file was captured for (defaults to the configured password)
        #[arg(long)]
        target: Option<String>,
    },

    /// Display the participant notice
    Notice,

    /// Show configuration
    Config,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Capture {
            script,
            user,
            label,
            target,
            output_dir,
            pace,
        } => cmd_capture(script, user, label, target, output_dir, pace),
        Commands::Curate {
            input,
            output,
            margin,
            max_iter,
            tolerance,
            target,
        } => cmd_curate(input, output, margin, max_iter, tolerance, target),
        Commands::Status => cmd_status(),
        Commands::Schema { target } => cmd_schema(target),
        Commands::RepairHeader {
            input,
            output,
            target,
        } => cmd_repair_header(input, output, target),
        Commands::Notice => {
            println!("{CAPTURE_NOTICE}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Install the stderr log subscriber, honouring `RUST_LOG`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_capture(
    script: PathBuf,
    user: Option<String>,
    label: Option<Label>,
    target: Option<String>,
    output_dir: Option<PathBuf>,
    pace: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load().context("loading configuration")?;
    if let Some(target) = target {
        config.target_password = target;
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    config.validate()?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let user = user.unwrap_or_else(|| config.default_user.clone());
    let label = label.unwrap_or(config.default_label);
    let schema = config.schema();

    println!("Keystroke Sampler v{VERSION}");
    println!("{CAPTURE_NOTICE}");
    println!("Starting capture...");
    println!("  Participant: {user}");
    println!("  Label: {label}");
    println!("  Password length: {}", config.target_password.chars().count());
    println!("  Feature columns: {}", schema.feature_count());
    println!("  Sample files: {:?}, {:?}", config.ms_path(), config.ns_path());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let exporter = SampleExporter::new(config.ms_path(), config.ns_path(), &schema);
    let ledger = SampleLedger::with_persistence(config.samples_per_user, config.ledger_path());
    println!("Session ID: {}", ledger.session_id());
    println!("{}", ledger.progress_line(&user));

    let mut sampler = Sampler::with_ledger(
        config.target_password.clone(),
        exporter,
        ledger,
        MonotonicClock::new(),
    );
    sampler.set_user(&user);
    sampler.set_label(label);

    let mut collector_config = CollectorConfig::new(&script);
    collector_config.pace = pace;
    let mut collector = ReplayCollector::new(collector_config)
        .with_context(|| format!("loading key script {}", script.display()))?;
    tracing::info!(signals = collector.signal_count(), "key script loaded");

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    collector.start()?;
    let receiver = collector.receiver().clone();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(signal) => {
                let event = match sampler.handle(signal) {
                    Ok(event) => event,
                    Err(e) => {
                        collector.stop();
                        if let Err(e) = sampler.ledger().save() {
                            eprintln!("Warning: Could not save sample counts: {e}");
                        }
                        return Err(e).context("writing sample");
                    }
                };

                if let Some(message) = event.message() {
                    println!("{message}");
                }
                if let SamplerEvent::Saved { ref user, .. } = event {
                    println!("{}", sampler.ledger().progress_line(user));
                    if sampler.ledger().count_for(user) == sampler.ledger().goal() {
                        println!("Goal reached for '{user}'.");
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // Script exhausted
                break;
            }
        }
    }

    println!();
    println!("Stopping capture...");
    collector.stop();

    if !sampler.typed_text().is_empty() {
        println!("Discarding unfinished attempt.");
    }

    if let Err(e) = sampler.ledger().save() {
        eprintln!("Warning: Could not save sample counts: {e}");
    }

    println!();
    println!("{}", sampler.ledger().summary());
    Ok(())
}

fn cmd_curate(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    margin: Option<f64>,
    max_iter: Option<usize>,
    tolerance: Option<f64>,
    target: Option<String>,
) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let schema = match target {
        Some(target) => FeatureSchema::for_password(&target),
        None => config.schema(),
    };
    let input = input.unwrap_or_else(|| config.ms_path());
    let output = output.unwrap_or_else(|| config.output_dir.join("subset.csv"));
    if input == output {
        bail!("refusing to overwrite the input file {}", input.display());
    }

    let mut curation = config.curation.clone();
    if let Some(margin) = margin {
        curation.margin = margin;
    }
    if let Some(max_iter) = max_iter {
        curation.max_iter = max_iter;
    }
    if let Some(tolerance) = tolerance {
        curation.tolerance = tolerance;
    }

    let (table, stats) = LabeledTable::read_csv(&input)
        .with_context(|| format!("loading {}", input.display()))?;
    println!("Successfully loaded {}.", input.display());
    if stats.rows_skipped > 0 {
        println!("Skipped {} malformed row(s).", stats.rows_skipped);
    }
    table.check_schema(&schema).with_context(|| {
        format!(
            "{} does not have the {}-column layout; run `keystroke-sampler repair-header` first",
            input.display(),
            schema.feature_count()
        )
    })?;

    let report = curate(&table, &curation).context("curating samples")?;
    println!("{}", report.summary());

    report
        .curated
        .write_csv(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Curated subset saved to {}", output.display());
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Keystroke Sampler Status");
    println!("========================");
    println!();
    println!("Configuration:");
    println!("  Password length: {}", config.target_password.chars().count());
    println!("  Samples per participant: {}", config.samples_per_user);
    println!("  Millisecond file: {:?}", config.ms_path());
    println!("  Nanosecond file: {:?}", config.ns_path());
    println!();

    let ledger_path = config.ledger_path();
    if ledger_path.exists() {
        let ledger = SampleLedger::with_persistence(config.samples_per_user, ledger_path);
        let stats = ledger.stats();
        println!("Cumulative Statistics:");
        println!("  Samples saved: {}", stats.total_samples);
        println!("  Rejected, text mismatch: {}", stats.mismatches);
        println!("  Rejected, not enough keys: {}", stats.insufficient);
        println!("  Attempts cleared: {}", stats.resets);
        println!();
        for user in stats.samples_by_user.keys() {
            let mark = if ledger.is_complete(user) { " ✓" } else { "" };
            println!("  {}{mark}", ledger.progress_line(user));
        }
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_schema(target: Option<String>) -> anyhow::Result<()> {
    let target = match target {
        Some(target) => target,
        None => Config::load().context("loading configuration")?.target_password,
    };
    let schema = FeatureSchema::for_password(&target);
    println!("{} feature columns", schema.feature_count());
    println!("{}", schema.header().join(","));
    Ok(())
}

fn cmd_repair_header(
    input: PathBuf,
    output: PathBuf,
    target: Option<String>,
) -> anyhow::Result<()> {
    if input == output {
        bail!("refusing to overwrite the input file {}", input.display());
    }
    let schema = match target {
        Some(target) => FeatureSchema::for_password(&target),
        None => Config::load().context("loading configuration")?.schema(),
    };

    let outcome = repair_header(&input, &output, &schema)
        .with_context(|| format!("repairing {}", input.display()))?;

    if outcome.header_rewritten {
        println!("Header rewritten to {} columns.", schema.header().len());
    } else {
        println!("Header already canonical.");
    }
    println!("Copied {} row(s) to {}", outcome.rows, output.display());
    if outcome.rows_with_other_width > 0 {
        println!(
            "Warning: {} row(s) do not match the header width and will be skipped by curate.",
            outcome.rows_with_other_width
        );
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
