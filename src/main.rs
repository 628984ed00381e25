mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracker_analytics::{
    export_daily_csv, AnalyticsEngine, LogLoader, OutputFormat, ReportGenerator, ReportKind,
    TimeRange,
};
use tracker_core::config::TrackerConfig;

#[derive(Parser)]
#[command(
    name = "perf-tracker",
    about = "Per-session performance logs and analytics for agent sessions",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/perf-tracker/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the session log directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute analytics over the session logs
    Analytics {
        /// Which report to produce
        #[arg(value_enum)]
        report: ReportArg,
        /// Time window: all, last_24h, last_7d, last_30d (default from config)
        #[arg(short, long)]
        range: Option<TimeRange>,
        /// Output format: json, text, chart
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
        /// Also write daily token usage as CSV (daily report only)
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Replay recorded host events (JSON lines) into session logs
    Replay {
        /// File of host events, one JSON object per line
        file: PathBuf,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportArg {
    Summary,
    Tokens,
    ResponseTimes,
    Tools,
    Agents,
    Daily,
}

impl From<ReportArg> for ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Summary => ReportKind::Summary,
            ReportArg::Tokens => ReportKind::Tokens,
            ReportArg::ResponseTimes => ReportKind::ResponseTimes,
            ReportArg::Tools => ReportKind::Tools,
            ReportArg::Agents => ReportKind::Agents,
            ReportArg::Daily => ReportKind::Daily,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "perf_tracker=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config.
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load_from(path)?,
        None => TrackerConfig::load()?,
    };

    // Apply CLI overrides.
    if let Some(log_dir) = &cli.log_dir {
        config.logging.log_dir = Some(log_dir.clone());
    }

    match cli.command {
        Commands::Analytics {
            report,
            range,
            format,
            csv,
        } => {
            run_analytics(&config, report.into(), range, format, csv)?;
        }
        Commands::Replay { file } => {
            let report = replay::run(&config, &file).await?;
            println!(
                "Replayed {} events ({} skipped, {} failed) into {}",
                report.parsed,
                report.skipped,
                report.stats.failed,
                config.log_dir().display()
            );
            if report.unfinished > 0 {
                println!(
                    "{} session(s) never went idle and were closed without a summary",
                    report.unfinished
                );
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, &config)?;
        }
    }

    Ok(())
}

fn run_analytics(
    config: &TrackerConfig,
    kind: ReportKind,
    range: Option<TimeRange>,
    format: OutputFormat,
    csv: Option<PathBuf>,
) -> Result<()> {
    let range = match range {
        Some(range) => range,
        None => config
            .analytics
            .default_range
            .parse()
            .map_err(|e: String| anyhow::anyhow!("analytics.default_range: {e}"))?,
    };

    if csv.is_some() && kind != ReportKind::Daily {
        anyhow::bail!("--csv is only supported for the daily report");
    }

    let log_dir = config.log_dir();
    let records = LogLoader::new(&config.logging.file_extension)?
        .load(&log_dir)
        .with_context(|| format!("Failed to load logs from {}", log_dir.display()))?;
    tracing::debug!(records = records.len(), "Loaded records");

    let engine = AnalyticsEngine::new(records);
    let reports = ReportGenerator::new(config.analytics.chart_width);
    println!("{}", reports.render(&engine, kind, range, format)?);

    if let Some(path) = csv {
        export_daily_csv(&engine.daily_token_usage(range), &path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_config_command(action: Option<ConfigAction>, config: &TrackerConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = TrackerConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", TrackerConfig::default_path().display());
        }
    }
    Ok(())
}
