//! # Chaos Monitor CLI
//!
//! Terminal front end for the service health monitor. Renders snapshots,
//! triggers on-demand cycles, and validates the deployment environment.
//!
//! ```bash
//! chaos-monitor check                 # one cycle, table output
//! chaos-monitor check --format json   # one cycle, snapshot as JSON
//! chaos-monitor watch                 # poll on the configured interval until Ctrl-C
//! chaos-monitor services              # registered services and dashboard links
//! chaos-monitor validate              # environment report + connectivity test
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use chaos_monitor::logging::init_cli_tracing;
use chaos_monitor::{CycleOutcome, MonitorConfig, MonitorSystem, ServiceState, Snapshot};

#[derive(Parser, Debug)]
#[command(name = "chaos-monitor")]
#[command(about = "Service health monitor for the Chaos CMS dashboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (default: ./chaos-monitor.toml or ./config/chaos-monitor.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity on stderr (repeat for more: -v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Probe every service once and print the snapshot
    Check {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Poll continuously and print each snapshot
    Watch {
        /// Override the configured poll interval (milliseconds)
        #[arg(short, long)]
        interval_ms: Option<u64>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// List registered services, probe URLs and dashboard links
    Services,
    /// Validate environment configuration and test connectivity
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(verbosity_level(cli.verbose));

    let mut config = MonitorConfig::load_from(cli.config.as_deref())
        .context("Failed to load monitor configuration")?;

    info!(
        services = config.services.endpoints().len(),
        timeout_ms = config.probe.timeout_ms,
        interval_ms = config.poller.interval_ms,
        "Chaos monitor starting"
    );

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Check { format } => {
            let system = MonitorSystem::bootstrap(config)?;
            let outcome = system.aggregator().run_cycle().await;
            let snapshot = match outcome {
                CycleOutcome::Completed(snapshot) => snapshot,
                CycleOutcome::Skipped => system.aggregator().snapshot(),
            };
            render(&mut out, &snapshot, format)?;
        }
        Commands::Watch {
            interval_ms,
            format,
        } => {
            if let Some(interval_ms) = interval_ms {
                config.poller.interval_ms = interval_ms;
            }
            watch(&mut out, MonitorSystem::bootstrap(config)?, format).await?;
        }
        Commands::Services => {
            let system = MonitorSystem::bootstrap(config)?;
            print_services(&mut out, &system)?;
        }
        Commands::Validate => {
            if !validate(&mut out, config).await? {
                out.flush()?;
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// `-v` count to a log filter; `None` leaves the environment default
fn verbosity_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

async fn watch(out: &mut impl Write, system: MonitorSystem, format: OutputFormat) -> Result<()> {
    let mut updates = system.aggregator().subscribe();
    let handle = system.start_polling();

    if format == OutputFormat::Table {
        writeln!(
            out,
            "Polling {} services every {}ms (Ctrl-C to stop)",
            system.registry().len(),
            system.config().poller.interval_ms
        )?;
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                render(out, &snapshot, format)?;
                out.flush()?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn render(out: &mut impl Write, snapshot: &Snapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, snapshot)?;
            writeln!(out)?;
        }
        OutputFormat::Table => print_table(out, snapshot)?,
    }
    Ok(())
}

fn print_table(out: &mut impl Write, snapshot: &Snapshot) -> Result<()> {
    let checked = snapshot
        .published_at()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    writeln!(out)?;
    writeln!(out, "Cycle {} at {}", snapshot.cycle(), checked)?;
    writeln!(
        out,
        "  {:<2} {:<18} {:<10} {:>8}  {:<10} {}",
        "", "SERVICE", "STATE", "LATENCY", "VERSION", "URL"
    )?;

    for status in snapshot.services() {
        let icon = match status.state {
            ServiceState::Healthy => "✓",
            ServiceState::Unhealthy => "✗",
            ServiceState::Unknown => "?",
        };
        let latency = status
            .response_time_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "  {:<2} {:<18} {:<10} {:>8}  {:<10} {}",
            icon,
            status.name,
            status.state.as_str(),
            latency,
            status.version.as_deref().unwrap_or("-"),
            status.url
        )?;
        if let Some(detail) = &status.detail {
            writeln!(out, "       {detail}")?;
        }
    }

    writeln!(out, "  Healthy: {}", snapshot.summary())?;
    if let Some(metrics) = snapshot.metrics() {
        writeln!(
            out,
            "  Prometheus targets: {}/{} up",
            metrics.targets_up, metrics.targets_total
        )?;
    }
    Ok(())
}

fn print_services(out: &mut impl Write, system: &MonitorSystem) -> Result<()> {
    writeln!(out, "Registered services:")?;
    for descriptor in system.registry().iter() {
        writeln!(
            out,
            "  {:<18} {:<11} {}",
            descriptor.name(),
            descriptor.kind().as_str(),
            descriptor.probe_url()
        )?;
    }

    let links = system.dashboard_links();
    if !links.is_empty() {
        writeln!(out)?;
        writeln!(out, "Dashboards:")?;
        for link in links {
            writeln!(out, "  {:<18} {}", link.name, link.url)?;
        }
    }
    Ok(())
}

/// Print the environment report, then run one cycle as a connectivity test.
/// Returns false when the configuration has errors, in which case no probes run.
async fn validate(out: &mut impl Write, config: MonitorConfig) -> Result<bool> {
    writeln!(out, "Validating environment configuration...")?;
    let report = config.validate();

    for error in &report.errors {
        writeln!(out, "  ✗ {error}")?;
    }
    for warning in &report.warnings {
        writeln!(out, "  ⚠ {warning}")?;
    }
    if !report.is_valid() {
        writeln!(out)?;
        writeln!(out, "Skipping connectivity test until the errors above are fixed")?;
        return Ok(false);
    }
    writeln!(out, "  ✓ Configuration is valid")?;

    writeln!(out)?;
    writeln!(out, "Testing connectivity...")?;
    let system = MonitorSystem::bootstrap(config)?;
    if let Some(snapshot) = system.aggregator().run_cycle().await.snapshot() {
        print_table(out, snapshot)?;
    }

    // Probe failures are reported above but do not fail validation
    Ok(true)
}
