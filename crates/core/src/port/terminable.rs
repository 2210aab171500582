// Terminable Port
// A started OS process that cleanup code can kill and reap

use async_trait::async_trait;

/// Result of a kill request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// Kill signal delivered
    Signalled,
    /// Process had already exited and been reaped; nothing to signal
    AlreadyExited,
}

/// Process handle usable by [`crate::application::termination::terminate_all`]
#[async_trait]
pub trait Terminable: Send {
    /// Name used in log messages (usually the executable)
    fn name(&self) -> &str;

    /// OS process id, if known
    fn pid(&self) -> Option<u32>;

    /// Request forced termination without waiting for it
    fn kill(&mut self) -> std::io::Result<KillOutcome>;

    /// Wait until the process is reaped, returning its exit code
    ///
    /// Must return immediately for a process that was already reaped.
    async fn wait(&mut self) -> std::io::Result<i32>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Scripted answer to `kill`
    #[derive(Debug, Clone, Copy)]
    pub enum FakeKill {
        Signalled,
        AlreadyExited,
        Fail,
    }

    /// Scripted answer to `wait`
    #[derive(Debug, Clone, Copy)]
    pub enum FakeWait {
        Exit(i32),
        /// Never completes (a process that refuses to die)
        Hang,
        Fail,
    }

    /// In-memory process double
    pub struct FakeProcess {
        name: String,
        pid: u32,
        kill: FakeKill,
        wait: FakeWait,
        kill_calls: usize,
    }

    impl FakeProcess {
        /// A process that already exited with `code`
        pub fn exited(name: impl Into<String>, pid: u32, code: i32) -> Self {
            Self {
                name: name.into(),
                pid,
                kill: FakeKill::AlreadyExited,
                wait: FakeWait::Exit(code),
                kill_calls: 0,
            }
        }

        /// A process that accepts the kill but is never reaped
        pub fn stubborn(name: impl Into<String>, pid: u32) -> Self {
            Self {
                name: name.into(),
                pid,
                kill: FakeKill::Signalled,
                wait: FakeWait::Hang,
                kill_calls: 0,
            }
        }

        pub fn with_kill(mut self, kill: FakeKill) -> Self {
            self.kill = kill;
            self
        }

        pub fn with_wait(mut self, wait: FakeWait) -> Self {
            self.wait = wait;
            self
        }

        pub fn kill_calls(&self) -> usize {
            self.kill_calls
        }
    }

    #[async_trait]
    impl Terminable for FakeProcess {
        fn name(&self) -> &str {
            &self.name
        }

        fn pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn kill(&mut self) -> std::io::Result<KillOutcome> {
            self.kill_calls += 1;
            match self.kill {
                FakeKill::Signalled => Ok(KillOutcome::Signalled),
                FakeKill::AlreadyExited => Ok(KillOutcome::AlreadyExited),
                FakeKill::Fail => Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "fake: operation not permitted",
                )),
            }
        }

        async fn wait(&mut self) -> std::io::Result<i32> {
            match self.wait {
                FakeWait::Exit(code) => Ok(code),
                FakeWait::Hang => std::future::pending().await,
                FakeWait::Fail => Err(std::io::Error::other("fake: wait failed")),
            }
        }
    }
}
