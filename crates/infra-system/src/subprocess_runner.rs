// Subprocess runner implementation
// reason: tokio for async process management, one reader task per execution
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use exporter_core::application::terminate_all;
use exporter_core::domain::run_result::{decode_line, split_block};
use exporter_core::domain::{Command, RunPhase, RunResult, TerminationOutcome, UNKNOWN_EXIT_CODE};
use exporter_core::port::{LogSink, ProcessRunner, RunnerConfig, RunnerError, TimeProvider};

use crate::child_handle::ChildHandle;
use crate::process_probe::is_alive;

/// Message from the background reader to the polling loop
enum ReaderEvent {
    /// One raw stdout line, terminator included
    Line(Vec<u8>),
    /// Reading stdout failed; no more lines will follow
    ReadFailed(io::Error),
    /// Raw stderr bytes, in arrival order
    Stderr(Vec<u8>),
    /// Reading stderr failed; bytes already sent are kept
    StderrFailed(io::Error),
}

/// Subprocess runner
///
/// Spawns each command as a child process with piped stdout/stderr, streams
/// stdout lines to the command's sink while the child runs, and always kills
/// and reaps the child before returning. Reusable: every `execute` call gets
/// its own process, pipes, queue and reader task.
pub struct SubprocessRunner {
    config: RunnerConfig,
    time_provider: Arc<dyn TimeProvider>,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new(RunnerConfig::default(), Arc::new(SystemTimeProvider));
    /// let result = runner.execute(&command).await?;
    /// ```
    pub fn new(config: RunnerConfig, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            config,
            time_provider,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn build_command(command: &Command) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(command.program());
        cmd.args(command.program_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !command.inherits_env() {
            cmd.env_clear();
        }
        cmd.envs(command.env());

        if let Some(cwd) = command.cwd() {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn execute(&self, command: &Command) -> Result<RunResult, RunnerError> {
        Execution::new(command, &self.config)
            .run(self.time_provider.as_ref())
            .await
    }
}

/// One execution of one command; consumed by `run`
struct Execution<'a> {
    command: &'a Command,
    config: &'a RunnerConfig,
    sink: Arc<dyn LogSink>,
    phase: RunPhase,
    stdout_lines: Vec<String>,
    stderr_raw: Vec<u8>,
}

impl<'a> Execution<'a> {
    fn new(command: &'a Command, config: &'a RunnerConfig) -> Self {
        Self {
            command,
            config,
            sink: command.sink().clone(),
            phase: RunPhase::NotStarted,
            stdout_lines: Vec::new(),
            stderr_raw: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunPhase) {
        if let Err(e) = self.phase.advance(next) {
            warn!(error = %e, program = %self.command.program(), "Run phase out of order");
            self.phase = next;
        }
        debug!(program = %self.command.program(), phase = %self.phase, "Run phase");
    }

    async fn run(mut self, time_provider: &dyn TimeProvider) -> Result<RunResult, RunnerError> {
        if self.command.args().is_empty() {
            return Err(RunnerError::EmptyCommand);
        }

        let program = self.command.program().to_string();
        let start_time = time_provider.now_millis();

        let mut child = match SubprocessRunner::build_command(self.command).spawn() {
            Ok(child) => child,
            Err(source) => {
                self.sink
                    .error(&format!("Failed to start process '{}': {}", program, source));
                return Err(RunnerError::Spawn { program, source });
            }
        };
        self.advance(RunPhase::Running);

        let pid = child.id();
        self.sink.info(&format!(
            "Running process '{}' with PID({}): {:?}",
            program,
            pid.map(|p| p.to_string()).unwrap_or_default(),
            self.command.args()
        ));
        info!(
            program = %program,
            pid = ?pid,
            cwd = ?self.command.cwd(),
            "Subprocess started"
        );

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_pipes(
            child.stdout.take(),
            child.stderr.take(),
            event_tx,
        ));
        let mut handle = ChildHandle::new(child, program.clone());

        let polled_exit = self.poll(&mut handle, &mut event_rx).await;

        self.advance(RunPhase::Draining);
        self.drain(&mut event_rx).await;
        let stderr_raw = std::mem::take(&mut self.stderr_raw);

        self.advance(RunPhase::Terminating);
        let termination = terminate_all(
            &mut [&mut handle],
            self.config.termination_timeout,
            self.sink.as_ref(),
        )
        .await
        .into_iter()
        .next()
        .unwrap_or(TerminationOutcome::TimedOut);
        reader.abort();

        if termination == TerminationOutcome::TimedOut {
            if let Some(pid) = pid.filter(|p| is_alive(*p)) {
                self.sink.error(&format!(
                    "process '{}' with PID({}) is still alive after cleanup",
                    program, pid
                ));
            }
        }

        let exit_code = polled_exit
            .or(match &termination {
                TerminationOutcome::Confirmed { exit_code } => Some(*exit_code),
                _ => None,
            })
            .unwrap_or(UNKNOWN_EXIT_CODE);
        self.advance(RunPhase::Done);

        let stderr_lines = split_block(&stderr_raw);
        if !stderr_raw.is_empty() {
            let text = String::from_utf8_lossy(&stderr_raw);
            let text = text.trim_end_matches(&['\r', '\n'][..]);
            if exit_code != 0 {
                self.sink.error(text);
            } else {
                self.sink.warn(text);
            }
        }

        let duration_ms = time_provider.elapsed_millis(start_time);
        info!(
            program = %program,
            exit_code = exit_code,
            duration_ms = duration_ms,
            stdout_lines = self.stdout_lines.len(),
            stderr_lines = stderr_lines.len(),
            "Subprocess execution completed"
        );

        Ok(RunResult::new(exit_code, self.stdout_lines, stderr_lines)
            .with_pid(pid)
            .with_duration_ms(duration_ms)
            .with_termination(termination))
    }

    /// Poll the child until it exits, forwarding queued events on every iteration
    ///
    /// Returns `None` if the child's status could not be read.
    async fn poll(
        &mut self,
        handle: &mut ChildHandle,
        events: &mut mpsc::UnboundedReceiver<ReaderEvent>,
    ) -> Option<i32> {
        loop {
            match handle.try_exit_code() {
                Ok(Some(code)) => return Some(code),
                Ok(None) => {}
                Err(e) => {
                    self.sink.error(&format!(
                        "Unexpected error while polling process '{}': {}",
                        self.command.program(),
                        e
                    ));
                    return None;
                }
            }

            self.drain_ready(events);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Forward whatever is queued right now; never waits
    fn drain_ready(&mut self, events: &mut mpsc::UnboundedReceiver<ReaderEvent>) {
        while let Ok(event) = events.try_recv() {
            self.forward(event);
        }
    }

    fn forward(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Line(raw) => {
                let line = decode_line(&raw);
                self.sink.info(&line);
                self.stdout_lines.push(line);
            }
            ReaderEvent::ReadFailed(e) => {
                self.sink.error(&format!(
                    "Unexpected error while reading output of '{}': {}",
                    self.command.program(),
                    e
                ));
            }
            ReaderEvent::Stderr(chunk) => self.stderr_raw.extend_from_slice(&chunk),
            ReaderEvent::StderrFailed(e) => {
                self.sink.error(&format!(
                    "Unexpected error while reading errors of '{}': {}",
                    self.command.program(),
                    e
                ));
            }
        }
    }

    /// Final drain after exit: remaining stdout lines and stderr bytes
    ///
    /// Bounded by `drain_grace`; pipes held open past that (e.g. by a
    /// grandchild) are abandoned with a warning. Everything received before
    /// the deadline, stderr included, is kept.
    async fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<ReaderEvent>) {
        let deadline = Instant::now() + self.config.drain_grace;

        loop {
            match timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) => self.forward(event),
                Ok(None) => return,
                Err(_) => {
                    self.drain_ready(events);
                    self.sink.warn(&format!(
                        "Output of '{}' still open {:?} after exit; remaining output dropped",
                        self.command.program(),
                        self.config.drain_grace
                    ));
                    return;
                }
            }
        }
    }
}

async fn read_line(
    stdout: &mut Option<BufReader<ChildStdout>>,
    buf: &mut Vec<u8>,
) -> io::Result<usize> {
    match stdout {
        Some(reader) => reader.read_until(b'\n', buf).await,
        None => std::future::pending().await,
    }
}

async fn read_chunk(stderr: &mut Option<ChildStderr>, buf: &mut Vec<u8>) -> io::Result<usize> {
    match stderr {
        Some(pipe) => pipe.read_buf(buf).await,
        None => std::future::pending().await,
    }
}

/// Background reader: stdout lines and stderr chunks go to `events` as they
/// arrive; the channel closes once both pipes are closed
///
/// Reading both pipes here keeps a chatty stderr from filling its pipe and
/// stalling the child while the caller only polls.
async fn read_pipes(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    events: mpsc::UnboundedSender<ReaderEvent>,
) {
    let mut stdout = stdout.map(BufReader::new);
    let mut stderr = stderr;
    let mut line = Vec::new();
    let mut chunk = Vec::new();

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_line(&mut stdout, &mut line) => match read {
                Ok(0) => stdout = None,
                Ok(_) => {
                    let _ = events.send(ReaderEvent::Line(std::mem::take(&mut line)));
                }
                Err(e) => {
                    let _ = events.send(ReaderEvent::ReadFailed(e));
                    stdout = None;
                }
            },
            read = read_chunk(&mut stderr, &mut chunk) => match read {
                Ok(0) => stderr = None,
                Ok(_) => {
                    let _ = events.send(ReaderEvent::Stderr(std::mem::take(&mut chunk)));
                }
                Err(e) => {
                    let _ = events.send(ReaderEvent::StderrFailed(e));
                    stderr = None;
                }
            },
        }
    }
}
