// Run Phase (per-execution lifecycle)

use crate::domain::error::{DomainError, Result};

/// Lifecycle of a single command execution
///
/// Phases only move forward, one step at a time. Every execution passes
/// through `Terminating`, including processes that already exited cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Running,
    Draining,
    Terminating,
    Done,
}

impl RunPhase {
    /// The only phase reachable from `self`, `None` once `Done`
    pub fn successor(self) -> Option<RunPhase> {
        match self {
            RunPhase::NotStarted => Some(RunPhase::Running),
            RunPhase::Running => Some(RunPhase::Draining),
            RunPhase::Draining => Some(RunPhase::Terminating),
            RunPhase::Terminating => Some(RunPhase::Done),
            RunPhase::Done => None,
        }
    }

    /// Move to `next`
    ///
    /// # Errors
    /// - `DomainError::InvalidPhaseTransition` if `next` is not the immediate successor
    pub fn advance(&mut self, next: RunPhase) -> Result<()> {
        if self.successor() != Some(next) {
            return Err(DomainError::InvalidPhaseTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_terminal(self) -> bool {
        self == RunPhase::Done
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::NotStarted => write!(f, "NOT_STARTED"),
            RunPhase::Running => write!(f, "RUNNING"),
            RunPhase::Draining => write!(f, "DRAINING"),
            RunPhase::Terminating => write!(f, "TERMINATING"),
            RunPhase::Done => write!(f, "DONE"),
        }
    }
}
