// Process Runner Port
// Abstraction for executing one external command to completion

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Command, RunResult};

/// Sleep between completion polls of a running child (10ms)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded wait for killed processes to be reaped (30s, per batch)
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long output keeps being drained after the child exited (5s)
/// Bounds the case of grandchildren holding the output pipes open
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Errors that cross the runner boundary
///
/// Everything else (monitoring hiccups, kill failures, termination timeouts)
/// is logged to the command's sink and absorbed. A non-zero exit status is
/// data on the `RunResult`, not an error.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Command has no arguments; nothing to spawn")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runner tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Sleep between completion polls
    pub poll_interval: Duration,
    /// Bounded wait for a killed process to be reaped
    pub termination_timeout: Duration,
    /// How long to keep draining output after the process exited
    pub drain_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

/// Process Runner trait
///
/// Implementations:
/// - SubprocessRunner: spawns a real OS process (infra-system)
/// - MockProcessRunner: scripted results (tests)
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute a command and return its captured result
    ///
    /// The process is terminated and reaped before this returns.
    ///
    /// # Errors
    /// - RunnerError::EmptyCommand if the command has no executable
    /// - RunnerError::Spawn if the process cannot be started
    async fn execute(&self, command: &Command) -> Result<RunResult, RunnerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted response for one program
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit with the given code, printing the given lines
        Exit { code: i32, stdout: Vec<String> },
        /// Fail to spawn (executable not found)
        SpawnFailure,
    }

    /// Mock Process Runner for testing
    ///
    /// Programs without a scripted behavior exit 0 with no output.
    #[derive(Default)]
    pub struct MockProcessRunner {
        behaviors: Mutex<HashMap<String, MockBehavior>>,
        executed: Mutex<Vec<Vec<String>>>,
    }

    impl MockProcessRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_exit_code(self, program: impl Into<String>, code: i32) -> Self {
            self.behaviors.lock().unwrap().insert(
                program.into(),
                MockBehavior::Exit {
                    code,
                    stdout: Vec::new(),
                },
            );
            self
        }

        pub fn with_output(self, program: impl Into<String>, lines: &[&str]) -> Self {
            self.behaviors.lock().unwrap().insert(
                program.into(),
                MockBehavior::Exit {
                    code: 0,
                    stdout: lines.iter().map(|l| l.to_string()).collect(),
                },
            );
            self
        }

        pub fn with_spawn_failure(self, program: impl Into<String>) -> Self {
            self.behaviors
                .lock()
                .unwrap()
                .insert(program.into(), MockBehavior::SpawnFailure);
            self
        }

        /// Argument lists of every command executed so far, in order
        pub fn executed(&self) -> Vec<Vec<String>> {
            self.executed.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.executed.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn execute(&self, command: &Command) -> Result<RunResult, RunnerError> {
            self.executed.lock().unwrap().push(command.args().to_vec());

            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(command.program())
                .cloned()
                .unwrap_or(MockBehavior::Exit {
                    code: 0,
                    stdout: Vec::new(),
                });

            match behavior {
                MockBehavior::Exit { code, stdout } => {
                    for line in &stdout {
                        command.sink().info(line);
                    }
                    Ok(RunResult::new(code, stdout, Vec::new()))
                }
                MockBehavior::SpawnFailure => Err(RunnerError::Spawn {
                    program: command.program().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock: not found"),
                }),
            }
        }
    }
}
