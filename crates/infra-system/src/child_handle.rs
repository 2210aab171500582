// Live process handle owned by one execution
use std::io;
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::process::Child;

use exporter_core::domain::UNKNOWN_EXIT_CODE;
use exporter_core::port::{KillOutcome, Terminable};

/// Integer exit status of a finished process
///
/// A process ended by a signal (Unix) reports the negated signal number,
/// e.g. `-9` after SIGKILL.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    UNKNOWN_EXIT_CODE
}

/// Tokio child plus the name and pid captured at spawn time
///
/// The pid is kept separately because tokio forgets it once the child is reaped.
pub(crate) struct ChildHandle {
    child: Child,
    program: String,
    pid: Option<u32>,
}

impl ChildHandle {
    pub(crate) fn new(child: Child, program: impl Into<String>) -> Self {
        let pid = child.id();
        Self {
            child,
            program: program.into(),
            pid,
        }
    }

    /// Non-blocking completion check
    pub(crate) fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code))
    }
}

#[async_trait]
impl Terminable for ChildHandle {
    fn name(&self) -> &str {
        &self.program
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn kill(&mut self) -> io::Result<KillOutcome> {
        match self.child.start_kill() {
            Ok(()) => Ok(KillOutcome::Signalled),
            // tokio refuses to signal a child it already reaped
            Err(err) => match self.child.try_wait() {
                Ok(Some(_)) => Ok(KillOutcome::AlreadyExited),
                _ => Err(err),
            },
        }
    }

    async fn wait(&mut self) -> io::Result<i32> {
        self.child.wait().await.map(exit_code)
    }
}
