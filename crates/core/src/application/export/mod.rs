// Export Pipeline - sequential driver over the process runner and file layout

pub mod plan;
pub mod vars;

#[cfg(test)]
mod pipeline_test;

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::domain::Command;
use crate::error::{ExportError, Result};
use crate::port::{FileLayout, LogSink, ProcessRunner, TimeProvider};

pub use plan::{
    ActionSpec, ExportPlan, ResolvedAction, ResolvedPlan, ResolvedStep, RunnerSettings, StepKind,
    StepSpec,
};
pub use vars::VarTable;

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Ran { exit_code: i32 },
    Copied { files: usize },
    Created,
    Archived { files: usize },
    Paused,
    Skipped,
    DryRun,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Ran { exit_code } => write!(f, "exit {}", exit_code),
            StepStatus::Copied { files } => write!(f, "{} file(s) copied", files),
            StepStatus::Created => write!(f, "created"),
            StepStatus::Archived { files } => write!(f, "{} file(s) archived", files),
            StepStatus::Paused => write!(f, "paused"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::DryRun => write!(f, "dry run"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub kind: StepKind,
    pub status: StepStatus,
    pub duration_ms: i64,
}

/// Summary of a completed export
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub steps: Vec<StepReport>,
    pub duration_ms: i64,
}

impl ExportReport {
    pub fn skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Skipped)
            .count()
    }

    pub fn executed_count(&self) -> usize {
        self.steps.len() - self.skipped_count()
    }
}

/// Runs resolved steps one at a time, stopping at the first failure
///
/// A `run` step fails when its command cannot be spawned or exits non-zero.
/// Every command receives the pipeline's sink, so tool output lands in the
/// same log as the pipeline's own messages.
pub struct ExportPipeline {
    runner: Arc<dyn ProcessRunner>,
    layout: Arc<dyn FileLayout>,
    time_provider: Arc<dyn TimeProvider>,
    sink: Arc<dyn LogSink>,
    dry_run: bool,
}

impl ExportPipeline {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        layout: Arc<dyn FileLayout>,
        time_provider: Arc<dyn TimeProvider>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            runner,
            layout,
            time_provider,
            sink,
            dry_run: false,
        }
    }

    /// Log each step instead of executing it
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute `steps` in order
    ///
    /// # Errors
    /// - ExportError::StepFailed if a command exits non-zero
    /// - ExportError::Runner if a command cannot be spawned
    /// - ExportError::Layout if a copy, mkdir or archive fails
    pub async fn run(&self, steps: &[ResolvedStep]) -> Result<ExportReport> {
        let started = self.time_provider.now_millis();
        let total = steps.len();
        let mut report = ExportReport::default();

        for (index, step) in steps.iter().enumerate() {
            let span = info_span!("export_step", step = %step.name, index = index + 1, total);
            let step_report = self.run_step(step).instrument(span).await?;
            report.steps.push(step_report);
        }

        report.duration_ms = self.time_provider.elapsed_millis(started);
        info!(
            steps = report.executed_count(),
            skipped = report.skipped_count(),
            duration_ms = report.duration_ms,
            "Export pipeline finished"
        );
        Ok(report)
    }

    async fn run_step(&self, step: &ResolvedStep) -> Result<StepReport> {
        let started = self.time_provider.now_millis();

        let status = match &step.action {
            None => {
                info!(condition = ?step.condition, "Skipping step (condition is off)");
                StepStatus::Skipped
            }
            Some(action) if self.dry_run => {
                info!(kind = %step.kind, action = %action, "Dry run: would execute step");
                StepStatus::DryRun
            }
            Some(action) => {
                info!(kind = %step.kind, action = %action, "Executing step");
                self.execute_action(&step.name, action).await?
            }
        };

        Ok(StepReport {
            name: step.name.clone(),
            kind: step.kind,
            status,
            duration_ms: self.time_provider.elapsed_millis(started),
        })
    }

    async fn execute_action(&self, name: &str, action: &ResolvedAction) -> Result<StepStatus> {
        match action {
            ResolvedAction::Run {
                args,
                cwd,
                env,
                clear_env,
            } => {
                let mut command = Command::new(args.iter().cloned(), self.sink.clone())?
                    .with_envs(env.clone());
                if let Some(cwd) = cwd {
                    command = command.with_cwd(cwd.clone());
                }
                if *clear_env {
                    command = command.without_inherited_env();
                }

                let result = self.runner.execute(&command).await?;
                if !result.success() {
                    warn!(exit_code = result.exit_code(), "Step command failed");
                    return Err(ExportError::StepFailed {
                        step: name.to_string(),
                        exit_code: result.exit_code(),
                    });
                }
                Ok(StepStatus::Ran {
                    exit_code: result.exit_code(),
                })
            }
            ResolvedAction::Copy { from, pattern, to } => {
                let files = self.layout.copy_matching(from, pattern, to).await?;
                if files == 0 {
                    warn!(from = %from.display(), pattern = %pattern, "Copy step matched no files");
                }
                Ok(StepStatus::Copied { files })
            }
            ResolvedAction::Mkdir { path } => {
                self.layout.ensure_dir(path).await?;
                Ok(StepStatus::Created)
            }
            ResolvedAction::Archive { from, to } => {
                let files = self.layout.archive_dir(from, to).await?;
                Ok(StepStatus::Archived { files })
            }
            ResolvedAction::Pause { duration } => {
                tokio::time::sleep(*duration).await;
                Ok(StepStatus::Paused)
            }
        }
    }
}
