// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Command must have at least one argument (the executable)")]
    EmptyCommand,

    #[error("Invalid run phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
