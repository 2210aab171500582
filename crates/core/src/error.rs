// Central Error Type for the Export Pipeline

use thiserror::Error;

/// Export-level error type
///
/// Any of these aborts the remaining steps of an export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Plan error: {0}")]
    Plan(String),

    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Runner error: {0}")]
    Runner(#[from] crate::port::RunnerError),

    #[error("Layout error: {0}")]
    Layout(#[from] crate::port::LayoutError),

    #[error("Step '{step}' failed with exit code {exit_code}")]
    StepFailed { step: String, exit_code: i32 },
}

impl ExportError {
    /// Process exit code the binary should report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ExportError::StepFailed { exit_code, .. } if *exit_code > 0 => *exit_code,
            _ => 1,
        }
    }
}

/// Result type alias using ExportError
pub type Result<T> = std::result::Result<T, ExportError>;
