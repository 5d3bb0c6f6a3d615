// src/main.rs
//! Rolling anomaly monitor CLI
//! Replays a simulated feed or analyzes recorded observations.
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use defi_anomaly_monitor::anomaly_detection::{
    DetectorConfig, DeviationSummary, EventBus, LogNotifier, RiskClassifier, RiskLabel,
    RollingAnomalyMonitor, StatisticsSubscriber,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "anomaly-monitor")]
#[command(about = "Rolling-window anomaly monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(flatten)]
    detector: DetectorArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct DetectorArgs {
    /// JSON or TOML detector configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Window capacity
    #[arg(long, global = true)]
    window: Option<usize>,
    /// Max |z| before the window is volatile
    #[arg(long, global = true)]
    z_threshold: Option<f64>,
    /// MAD / mean ratio before the window is volatile
    #[arg(long, global = true)]
    mad_threshold: Option<f64>,
    /// Percent-of-mean multiple for outlier extraction
    #[arg(long, global = true)]
    pct_threshold: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Warm up with stable values, then inject a spike
    Simulate {
        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Number of spike values appended after warm-up
        #[arg(long, default_value = "10")]
        spikes: usize,
    },
    /// Read newline-separated observations from a file or stdin
    Analyze {
        /// Input file; stdin when omitted
        input: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Report {
    observations: usize,
    window: Vec<f64>,
    summary: DeviationSummary,
    risk: RiskLabel,
    alert: bool,
    outliers: Vec<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging()?;

    let config = load_config(&args.detector)?;
    info!(
        window_size = config.window_size,
        z_threshold = config.z_threshold,
        mad_threshold = config.mad_threshold,
        "Starting anomaly monitor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let bus = Arc::new(EventBus::with_logging());
    let stats = Arc::new(StatisticsSubscriber::new("cli-stats"));
    bus.subscribe(stats.clone());

    let mut monitor = RollingAnomalyMonitor::new(config)?
        .with_event_bus(bus)
        .with_notifier(Arc::new(LogNotifier::new("cli")));

    match args.command {
        Commands::Simulate { seed, spikes } => simulate(&mut monitor, seed, spikes)?,
        Commands::Analyze { input, json } => analyze(&mut monitor, input, json)?,
    }

    let totals = stats.get_statistics();
    info!(
        evaluations = totals.evaluations,
        anomalies = totals.anomalies_detected,
        "📊 volatile evaluations: {:.0}%",
        totals.volatile_rate() * 100.0
    );
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// File config first, then CLI overrides, then validation
fn load_config(args: &DetectorArgs) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DetectorConfig::from_env()?,
    };

    if let Some(window) = args.window {
        config.window_size = window;
    }
    if let Some(z) = args.z_threshold {
        config.z_threshold = z;
    }
    if let Some(mad) = args.mad_threshold {
        config.mad_threshold = mad;
    }
    if let Some(pct) = args.pct_threshold {
        config.pct_threshold = pct;
    }

    config.validate()?;
    Ok(config)
}

fn simulate(monitor: &mut RollingAnomalyMonitor, seed: u64, spikes: usize) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let classifier = RiskClassifier::default();

    for _ in 0..monitor.capacity() {
        monitor.add_value(rng.gen_range(95.0..=105.0))?;
    }
    let initial = monitor.summary();
    println!(
        "Initial state: {} score={:.3} risk={}",
        initial.state,
        initial.score,
        classifier.classify_summary(&initial)
    );

    for _ in 0..spikes {
        monitor.add_value(rng.gen_range(200.0..=250.0))?;
    }
    let after = monitor.summary();
    let risk = classifier.classify_summary(&after);
    println!(
        "After spike:   {} score={:.3} risk={} alert={}",
        after.state,
        after.score,
        risk,
        risk.should_alert()
    );

    let outliers = monitor.check_for_anomalies();
    println!("Outliers: {:?}", outliers);
    Ok(())
}

fn analyze(monitor: &mut RollingAnomalyMonitor, input: Option<PathBuf>, json: bool) -> Result<()> {
    let reader: Box<dyn Read> = match &input {
        Some(path) => Box::new(
            std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(std::io::stdin()),
    };

    let mut observations = 0usize;
    for (line_no, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let value: f64 = match trimmed.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(line = line_no + 1, "skipping unparsable value {:?}", trimmed);
                continue;
            }
        };
        match monitor.add_value(value) {
            Ok(()) => observations += 1,
            Err(e) if e.is_critical() => return Err(e.into()),
            Err(e) => warn!(
                line = line_no + 1,
                recoverable = e.is_recoverable(),
                error = %e,
                "skipping observation"
            ),
        }
    }

    let summary = monitor.summary();
    let risk = RiskClassifier::default().classify_summary(&summary);
    let report = Report {
        observations,
        window: monitor.values(),
        summary,
        risk,
        alert: risk.should_alert(),
        outliers: monitor.check_for_anomalies(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Observations: {}", report.observations);
        println!(
            "State: {} (score {:.3}, window {}/{})",
            report.summary.state,
            report.summary.score,
            report.window.len(),
            monitor.capacity()
        );
        println!("Risk: {} - {}", report.risk, report.risk.describe());
        println!("Outliers: {:?}", report.outliers);
    }
    Ok(())
}
