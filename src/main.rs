//! CLI entry point for the GLOSA analyzer.
//!
//! Provides subcommands for analyzing a telemetry dataset into per-intersection
//! green-interval statistics and for simulating GLOSA advice, either for its
//! reliability or for opportunities the driver missed.

use anyhow::Result;
use clap::{Parser, Subcommand};
use glosa_analyzer::analyzers::analyzer::process_raw_data;
use glosa_analyzer::analyzers::simulation::{
    analyze_advice_reliability, analyze_missed_opportunities,
};
use glosa_analyzer::analyzers::types::IntersectionMap;
use glosa_analyzer::{
    config::AnalysisConfig,
    fetch::load_source,
    output::{append_record, print_json, write_json},
    parser::parse_dataset,
    stats::PassStats,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DATA_URL_ENV: &str = "GLOSA_DATA_URL";
const DEFAULT_SOURCE: &str = "./data/output800-time-limit.json";

#[derive(Parser)]
#[command(name = "glosa_analyzer")]
#[command(about = "A tool to analyze GLOSA green-interval telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a dataset of pass-records from a file or URL
    Analyze {
        /// Path to file or URL to fetch (defaults to $GLOSA_DATA_URL)
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// JSON file to write the intersection map to (".gz" to compress)
        #[arg(short, long)]
        output: Option<String>,

        /// CSV file to append one row per pass-through to
        #[arg(long)]
        csv: Option<String>,

        /// Analysis config JSON (defaults to $GLOSA_CONFIG_PATH)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Simulate following GLOSA advice and report arrival-on-green rates
    Simulate {
        /// Path to file or URL to fetch (defaults to $GLOSA_DATA_URL)
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Distance interval size in metres
        #[arg(short, long)]
        interval_size: Option<f64>,

        /// Arrival tolerance in seconds
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// JSON file to write the report to (".gz" to compress)
        #[arg(short, long)]
        output: Option<String>,

        /// Analysis config JSON (defaults to $GLOSA_CONFIG_PATH)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Report advice that would have arrived on green while the vehicle kept waiting
    MissedOpportunities {
        /// Path to file or URL to fetch (defaults to $GLOSA_DATA_URL)
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Distance interval size in metres
        #[arg(short, long)]
        interval_size: Option<f64>,

        /// Arrival tolerance in seconds
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Smallest distance in metres to analyze
        #[arg(long)]
        min_distance: Option<f64>,

        /// Largest distance in metres to analyze
        #[arg(long)]
        max_distance: Option<f64>,

        /// JSON file to write the report to (".gz" to compress)
        #[arg(short, long)]
        output: Option<String>,

        /// Analysis config JSON (defaults to $GLOSA_CONFIG_PATH)
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/glosa_analyzer.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("glosa_analyzer.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            source,
            output,
            csv,
            config,
        } => {
            let config = AnalysisConfig::resolve(config.as_deref())?;
            let intersections = load_intersections(source, &config).await?;

            for intersection in intersections.values() {
                let summary = &intersection.summary;
                info!(
                    intersection = %intersection.id,
                    name = %intersection.name,
                    pass_throughs = summary.total_pass_throughs,
                    green_interval_changes = summary.green_interval_changes,
                    got_green = summary.green_balance.got_green,
                    lost_green = summary.green_balance.lost_green,
                    stop_locations = summary.stop_locations.len(),
                    gps_mismatches = summary.prediction_statistics.pass_throughs_with_gps_mismatch,
                    "Intersection"
                );
            }

            if let Some(path) = csv {
                let mut rows = 0usize;
                for intersection in intersections.values() {
                    for stats in PassStats::from_intersection(intersection) {
                        append_record(&path, &stats)?;
                        rows += 1;
                    }
                }
                info!(path = %path, rows, "Pass-through rows appended");
            }

            match output {
                Some(path) => write_json(&path, &intersections)?,
                None => print_json(&intersections)?,
            }
        }
        Commands::Simulate {
            source,
            interval_size,
            tolerance,
            output,
            config,
        } => {
            let config = simulation_config(config.as_deref(), interval_size, tolerance)?;
            let intersections = load_intersections(source, &config).await?;
            let report = analyze_advice_reliability(&intersections, &config);

            for interval in &report {
                info!(
                    interval = %interval.interval,
                    total_advice = interval.total_advice,
                    successful_advice = interval.successful_advice,
                    success_rate = interval.success_rate,
                    "Advice reliability"
                );
            }

            match output {
                Some(path) => write_json(&path, &report)?,
                None => print_json(&report)?,
            }
        }
        Commands::MissedOpportunities {
            source,
            interval_size,
            tolerance,
            min_distance,
            max_distance,
            output,
            config,
        } => {
            let mut config = simulation_config(config.as_deref(), interval_size, tolerance)?;
            if let Some(min) = min_distance {
                config.simulation.min_distance_m = min;
            }
            if let Some(max) = max_distance {
                config.simulation.max_distance_m = max;
            }

            let intersections = load_intersections(source, &config).await?;
            let report = analyze_missed_opportunities(&intersections, &config);

            for interval in &report.intervals {
                info!(
                    interval = %interval.interval,
                    opportunities = interval.total_opportunities,
                    missed = interval.missed_opportunities,
                    missed_rate = interval.missed_rate,
                    "Missed opportunities"
                );
            }
            info!(
                opportunities = report.total_opportunities,
                missed = report.missed_opportunities,
                missed_rate = report.missed_rate,
                "Missed opportunities overall"
            );

            match output {
                Some(path) => write_json(&path, &report)?,
                None => print_json(&report)?,
            }
        }
    }

    Ok(())
}

/// Resolves the analysis config and applies the simulation overrides from the CLI.
fn simulation_config(
    path: Option<&str>,
    interval_size: Option<f64>,
    tolerance: Option<f64>,
) -> Result<AnalysisConfig> {
    let mut config = AnalysisConfig::resolve(path)?;
    if let Some(size) = interval_size {
        config.simulation.interval_m = size;
    }
    if let Some(tolerance) = tolerance {
        config.simulation.tolerance_secs = tolerance;
    }
    if config.simulation.interval_m <= 0.0 {
        warn!(
            interval_size = config.simulation.interval_m,
            "Interval size must be positive, nothing to simulate"
        );
    }
    Ok(config)
}

/// Resolves the dataset source, loads it and runs the analysis pipeline.
#[tracing::instrument(skip(config))]
async fn load_intersections(
    source: Option<String>,
    config: &AnalysisConfig,
) -> Result<IntersectionMap> {
    let source = source
        .or_else(|| std::env::var(DATA_URL_ENV).ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let bytes = load_source(&source).await?;
    let records = parse_dataset(&bytes)?;
    info!(records = records.len(), "Dataset parsed");

    Ok(process_raw_data(&records, config))
}
