// Logging initialisation for the binary
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Full filter directive; overrides `--log-level` when set
pub const LOG_FILTER_ENV: &str = "EXPORTER_LOG";

const WORKSPACE_TARGETS: &[&str] = &[
    "exporter",
    "exporter_core",
    "exporter_infra_system",
    "export_standalone",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One line per event
    Compact,
    /// Structured JSON lines
    Json,
}

/// Keeps the file writer flushing until dropped at the end of `main`
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Directive used when `EXPORTER_LOG` is not set
///
/// Third-party crates stay at `warn`; the workspace crates and the tool
/// output target follow `level`.
pub fn default_directive(level: &str) -> String {
    let mut directive = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directive.push_str(&format!(",{}={}", target, level));
    }
    directive
}

pub fn init(level: &str, format: LogFormat, log_file: Option<&Path>) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .context("Failed to create log filter")?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match format {
        LogFormat::Pretty => layers.push(fmt::layer().pretty().boxed()),
        LogFormat::Compact => layers.push(fmt::layer().compact().with_target(false).boxed()),
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
    }

    let mut file_guard = None;
    if let Some(path) = log_file {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
        std::fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_workspace_crates() {
        let directive = default_directive("debug");
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("exporter_core=debug"));
        assert!(directive.contains("export_standalone=debug"));
        // Must parse as a filter
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
