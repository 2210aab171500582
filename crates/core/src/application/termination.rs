// Batch process termination
// Kill everything first, then reap under one shared deadline
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::domain::TerminationOutcome;
use crate::port::{KillOutcome, LogSink, Terminable};

fn pid_label(pid: Option<u32>) -> String {
    pid.map(|p| p.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Forcibly terminate a set of started processes
///
/// Two phases:
/// 1. Send a kill to every process. Failures are logged and ignored.
/// 2. Wait for each process to be reaped. All waits share one deadline of
///    `timeout` from the start of this phase; a process not reaped by then is
///    logged at error severity and reported as `TimedOut`.
///
/// Never fails and never waits past the deadline. Safe on processes that
/// already exited: they are reported as confirmed with their exit code.
///
/// # Example
/// ```text
/// let outcomes = terminate_all(&mut [&mut build, &mut bundler], timeout, sink).await;
/// ```
pub async fn terminate_all(
    processes: &mut [&mut dyn Terminable],
    timeout: Duration,
    sink: &dyn LogSink,
) -> Vec<TerminationOutcome> {
    for process in processes.iter_mut() {
        sink.info(&format!(
            "Terminating process '{}' with PID({})",
            process.name(),
            pid_label(process.pid())
        ));

        match process.kill() {
            Ok(KillOutcome::Signalled) => {
                debug!(name = %process.name(), pid = ?process.pid(), "Kill signal sent");
            }
            Ok(KillOutcome::AlreadyExited) => {
                debug!(name = %process.name(), pid = ?process.pid(), "Process already exited");
            }
            Err(e) => {
                sink.error(&format!(
                    "Unexpected error ignored while terminating process '{}' with PID({}): {}",
                    process.name(),
                    pid_label(process.pid()),
                    e
                ));
            }
        }
    }

    let deadline = Instant::now() + timeout;
    let mut outcomes = Vec::with_capacity(processes.len());

    for process in processes.iter_mut() {
        let name = process.name().to_string();
        let pid = pid_label(process.pid());

        let outcome = match timeout_at(deadline, process.wait()).await {
            Ok(Ok(exit_code)) => {
                sink.info(&format!(
                    "process '{}' with PID({}) terminated with exit code {}",
                    name, pid, exit_code
                ));
                TerminationOutcome::Confirmed { exit_code }
            }
            Ok(Err(e)) => {
                sink.error(&format!(
                    "Unexpected error while waiting for process '{}' with PID({}) to terminate: {}",
                    name, pid, e
                ));
                TerminationOutcome::Failed(e.to_string())
            }
            Err(_) => {
                sink.error(&format!(
                    "process '{}' with PID({}) did not terminate within {:?}",
                    name, pid, timeout
                ));
                TerminationOutcome::TimedOut
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}
