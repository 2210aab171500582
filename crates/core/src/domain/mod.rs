// Domain Layer - Pure values describing one external tool invocation

pub mod command;
pub mod error;
pub mod phase;
pub mod run_result;

// Re-exports
pub use command::Command;
pub use error::DomainError;
pub use phase::RunPhase;
pub use run_result::{RunResult, TerminationOutcome, UNKNOWN_EXIT_CODE};
