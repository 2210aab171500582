//! export-standalone - builds, bundles and lays out a standalone game release
//! from a declarative export plan

mod logging;
mod plan_loader;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

use exporter_core::application::export::{ExportPipeline, ExportReport, ResolvedPlan, StepStatus};
use exporter_core::port::time_provider::SystemTimeProvider;
use exporter_core::port::RunnerConfig;
use exporter_core::ExportError;
use exporter_infra_system::{FsLayout, SubprocessRunner, TracingLogSink};

use logging::LogFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Conventional status for a run stopped by Ctrl+C
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser)]
#[command(name = "export-standalone")]
#[command(about = "Standalone release exporter", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level for the exporter and tool output
    #[arg(
        long,
        global = true,
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "EXPORTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute an export plan
    Run {
        #[command(flatten)]
        plan: PlanArgs,

        /// Log each step without executing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the resolved steps of an export plan
    Show {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

#[derive(Args)]
struct PlanArgs {
    /// Plan file (TOML, YAML or JSON)
    #[arg(short, long, env = "EXPORTER_PLAN")]
    plan: PathBuf,

    /// Override a plan variable (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = plan_loader::parse_var)]
    vars: Vec<(String, String)>,
}

impl PlanArgs {
    fn resolve(&self) -> Result<ResolvedPlan> {
        let plan = plan_loader::load_plan(&self.plan)?;
        let overrides = plan_loader::collect_overrides(&self.vars);
        plan.resolve(&overrides)
            .with_context(|| format!("Failed to resolve plan {}", self.plan.display()))
    }
}

/// Ctrl+C arrived while a step was running
#[derive(Debug)]
struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for Interrupted {}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    name: String,
    kind: String,
    enabled: String,
    action: String,
}

#[derive(Tabled)]
struct VarRow {
    name: String,
    value: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet { "error" } else { cli.log_level.as_str() };
    let _log_guard = match logging::init(level, cli.log_format, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = failure_exit_code(&e);
            let message = format!("{:#}", e);
            error!(error = %message, exit_code = code, "Export failed");
            eprintln!("{} {}", "Error:".red().bold(), message);
            ExitCode::from(code)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { plan, dry_run } => run_export(plan, dry_run, cli.quiet).await,
        Commands::Show { plan } => show_plan(plan),
    }
}

async fn run_export(args: PlanArgs, dry_run: bool, quiet: bool) -> Result<()> {
    info!("export-standalone v{} starting", VERSION);
    let plan = args.resolve()?;

    // DI wiring
    let runner_config = plan.runner.apply(RunnerConfig::default());
    info!(
        poll_interval_ms = runner_config.poll_interval.as_millis() as u64,
        termination_timeout_secs = runner_config.termination_timeout.as_secs(),
        steps = plan.steps.len(),
        "Plan loaded"
    );

    let time_provider = Arc::new(SystemTimeProvider);
    let runner = Arc::new(SubprocessRunner::new(runner_config, time_provider.clone()));
    let pipeline = ExportPipeline::new(
        runner,
        Arc::new(FsLayout::new()),
        time_provider,
        Arc::new(TracingLogSink::new("export")),
    )
    .with_dry_run(dry_run);

    // Dropping the pipeline future kills the in-flight child (kill_on_drop)
    let report = tokio::select! {
        result = pipeline.run(&plan.steps) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl+C received, stopping export");
            return Err(Interrupted.into());
        }
    };

    if !quiet {
        print_summary(&report, dry_run);
    }
    Ok(())
}

fn show_plan(args: PlanArgs) -> Result<()> {
    let plan = args.resolve()?;

    let vars: Vec<VarRow> = plan
        .vars
        .iter()
        .map(|(name, value)| VarRow {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect();
    if !vars.is_empty() {
        println!("{}", "Variables".bold());
        println!("{}", Table::new(vars));
    }

    let rows: Vec<StepRow> = plan
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| StepRow {
            index: i + 1,
            name: step.name.clone(),
            kind: step.kind.to_string(),
            enabled: match (&step.condition, step.is_enabled()) {
                (None, _) => "yes".to_string(),
                (Some(flag), true) => format!("yes ({})", flag),
                (Some(flag), false) => format!("no ({})", flag),
            },
            action: step
                .action
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    println!("{}", "Steps".bold());
    if rows.is_empty() {
        println!("{}", "(plan has no steps)".yellow());
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

fn print_summary(report: &ExportReport, dry_run: bool) {
    for step in &report.steps {
        let marker = match step.status {
            StepStatus::Skipped => "-".yellow(),
            StepStatus::DryRun => "~".cyan(),
            _ => "✓".green(),
        };
        println!(
            "  {} {} {}",
            marker,
            step.name,
            format!("({}, {} ms)", step.status, step.duration_ms).dimmed()
        );
    }

    let headline = if dry_run {
        "Dry run complete".cyan().bold()
    } else {
        "Export complete".green().bold()
    };
    println!(
        "{}: {} step(s) executed, {} skipped in {:.1}s",
        headline,
        report.executed_count(),
        report.skipped_count(),
        report.duration_ms as f64 / 1000.0
    );
}

/// Process exit status for a failed command
///
/// A failed step propagates its own exit code; Ctrl+C maps to 130.
fn failure_exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<Interrupted>().is_some() {
        return INTERRUPTED_EXIT_CODE;
    }
    let code = err
        .downcast_ref::<ExportError>()
        .map(ExportError::exit_code)
        .unwrap_or(1);
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}
