// Port Layer - Interfaces for external dependencies

pub mod file_layout;
pub mod log_sink;
pub mod process_runner;
pub mod terminable;
pub mod time_provider; // For deterministic durations in tests

// Re-exports
pub use file_layout::{FileLayout, LayoutError};
pub use log_sink::{LogSink, Severity};
pub use process_runner::{ProcessRunner, RunnerConfig, RunnerError};
pub use terminable::{KillOutcome, Terminable};
pub use time_provider::TimeProvider;
