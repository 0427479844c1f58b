//! Rulesmith CLI
//!
//! Command-line interface for rulesmith:
//! - Canonicalize durations
//! - Preview rule naming transforms
//! - Render an example rule manifest
//! - Print a default config file

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rulesmith::config::{generate_default_config, Config};
use rulesmith::ql::{self, Duration, MINUTE, SECOND};
use rulesmith::rules::{
    rename_alert_rule, rename_recording_rule, render_manifest, OutputFormat, RuleBundle,
    RuleResult, SimpleAlert, SimpleRecording,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rulesmith")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build PromQL expressions and rule manifests from typed code")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a duration in canonical form (e.g. 605s -> 10m5s)
    Duration {
        /// Duration text such as 90s, 1h30m or -5m
        text: String,
    },

    /// Show the rule name derived from an identifier
    Rename {
        /// Rule kind
        #[arg(value_enum)]
        kind: RuleKind,
        /// snake_case identifier
        name: String,
    },

    /// Render the example rule bundles as a manifest
    Example {
        /// Output format (overrides config)
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Output file (overrides config; default stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a default config file
    Config {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RuleKind {
    Alert,
    Record,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config);

    match cli.command {
        Commands::Duration { text } => {
            let duration: Duration = text.parse()?;
            println!("{}", duration);
        }

        Commands::Rename { kind, name } => {
            let renamed = match kind {
                RuleKind::Alert => rename_alert_rule(&name),
                RuleKind::Record => rename_recording_rule(&name),
            };
            println!("{}", renamed);
        }

        Commands::Example { format, output } => {
            let mut output_config = config.output.clone();
            if let Some(format) = format {
                output_config.format = format;
            }
            if let Some(path) = output {
                output_config.path = Some(path);
            }

            let bundles = example_bundles()?;
            let manifest = render_manifest(&bundles, &output_config)?;

            match &output_config.path {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, &manifest)
                        .with_context(|| format!("writing manifest to {:?}", path))?;
                    tracing::info!("Manifest written to {:?}", path);
                }
                None => print!("{}", manifest),
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Log to stderr so rendered manifests on stdout stay clean
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rulesmith={}", config.logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

/// Rule bundles for a typical HTTP API
fn example_bundles() -> RuleResult<Vec<RuleBundle>> {
    let mut recordings = RuleBundle::new("api_recordings").with_interval(30 * SECOND);

    let request_rate = recordings.register_recording_named("job:http_requests:rate5m", || {
        let requests = ql::metric("http_requests_total")?.sliced(5 * MINUTE)?;
        Ok(SimpleRecording::new(ql::sum(ql::rate(requests)?)?.by(["job"])?))
    })?;

    let error_rate = recordings.register_recording_named("job:http_errors:rate5m", || {
        let errors = ql::metric("http_requests_total")?
            .with_labels([("code", "5xx")])?
            .sliced(5 * MINUTE)?;
        Ok(SimpleRecording::new(ql::sum(ql::rate(errors)?)?.by(["job"])?))
    })?;

    let latency = ql::histogram_quantile(
        0.99,
        ql::sum(ql::rate(
            ql::metric("http_request_duration_seconds_bucket")?.sliced(5 * MINUTE)?,
        )?)?
        .by(["job", "le"])?,
    )?;
    let p99 = recordings.record(latency, "job:http_request_duration_seconds:p99")?;

    let mut alerts = RuleBundle::new("api_alerts");

    let ratio = (error_rate / request_rate.clone())?;
    alerts.register_alert("high_error_rate", move || {
        Ok(SimpleAlert::new(ratio.compare_gt(0.05)?)
            .for_(10 * MINUTE)
            .label("severity", "page")
            .annotation("summary", "More than 5% of requests are failing"))
    })?;

    alerts.register_alert("slow_requests", move || {
        Ok(SimpleAlert::new(p99.compare_gt(1.5)?)
            .for_(15 * MINUTE)
            .fire_for(5 * MINUTE)
            .label("severity", "ticket"))
    })?;

    alerts.register_alert("traffic_drop", move || {
        let last_week = request_rate.offset_by(ql::WEEK)?;
        let drop = request_rate.compare_lt(last_week.mul(0.5)?)?.on(["job"])?;
        Ok(SimpleAlert::new(drop).for_(30 * MINUTE))
    })?;

    Ok(vec![recordings, alerts])
}
