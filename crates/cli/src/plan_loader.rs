// Plan file loading and `--var` parsing
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};

use exporter_core::application::export::ExportPlan;

/// Environment prefix for plan overrides, e.g. `EXPORTER_RUNNER__POLL_INTERVAL_MS`
pub const ENV_PREFIX: &str = "EXPORTER";

/// Plan variable preset to the exporter's working directory unless the plan declares it
pub const WORK_DIR_VAR: &str = "work_dir";

/// Read a plan file and layer `EXPORTER_*` environment overrides on top
///
/// The format follows the file extension (TOML, YAML, JSON). `work_dir`
/// defaults to the current directory.
pub fn load_plan(path: &Path) -> Result<ExportPlan> {
    if !path.is_file() {
        bail!("Plan file not found: {}", path.display());
    }

    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to read plan {}", path.display()))?;

    let plan = settings
        .try_deserialize::<ExportPlan>()
        .with_context(|| format!("Invalid plan {}", path.display()))?;

    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(with_work_dir(plan, &cwd))
}

fn with_work_dir(mut plan: ExportPlan, dir: &Path) -> ExportPlan {
    let declared = plan
        .vars
        .keys()
        .any(|name| name.eq_ignore_ascii_case(WORK_DIR_VAR));
    if !declared {
        plan.vars
            .insert(WORK_DIR_VAR.to_string(), dir.display().to_string());
    }
    plan
}

/// clap value parser for `--var KEY=VALUE`
pub fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Later `--var` flags win over earlier ones
pub fn collect_overrides(vars: &[(String, String)]) -> BTreeMap<String, String> {
    vars.iter().cloned().collect()
}
