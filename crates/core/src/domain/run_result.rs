// Run Result Domain Model

use std::borrow::Cow;

/// Exit code reported when no status could be obtained from the child
pub const UNKNOWN_EXIT_CODE: i32 = 1;

/// How the cleanup step ended for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Process was reaped; carries the exit code observed at reap time
    Confirmed { exit_code: i32 },
    /// Bounded wait elapsed before the process could be reaped
    TimedOut,
    /// Waiting on the process failed outright
    Failed(String),
}

impl TerminationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TerminationOutcome::Confirmed { .. })
    }
}

/// Outcome of executing one command
///
/// Built once by the runner and handed to the caller; read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunResult {
    exit_code: i32,
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
    pid: Option<u32>,
    duration_ms: i64,
    termination: TerminationOutcome,
}

impl RunResult {
    pub fn new(exit_code: i32, stdout_lines: Vec<String>, stderr_lines: Vec<String>) -> Self {
        Self {
            exit_code,
            stdout_lines,
            stderr_lines,
            pid: None,
            duration_ms: 0,
            termination: TerminationOutcome::Confirmed { exit_code },
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_termination(mut self, termination: TerminationOutcome) -> Self {
        self.termination = termination;
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Captured standard output, one entry per line, in emission order
    pub fn stdout_lines(&self) -> &[String] {
        &self.stdout_lines
    }

    /// Captured standard error; empty if the process wrote nothing to it
    pub fn stderr_lines(&self) -> &[String] {
        &self.stderr_lines
    }

    /// Standard output as a single string
    pub fn stdout(&self) -> String {
        self.stdout_lines.join("\n")
    }

    /// Standard error as a single string
    pub fn stderr(&self) -> String {
        self.stderr_lines.join("\n")
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn termination(&self) -> &TerminationOutcome {
        &self.termination
    }
}

/// Decode one raw output line, dropping its line terminator
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
pub fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Decode a whole output block and split it into lines
///
/// One trailing newline is ignored, so `"a\nb\n"` gives `["a", "b"]`.
/// An empty block gives no lines.
pub fn split_block(raw: &[u8]) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let decoded: Cow<'_, str> = String::from_utf8_lossy(raw);
    let text = decoded.strip_suffix('\n').unwrap_or(decoded.as_ref());
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[test]
    fn test_decode_line_replaces_invalid_utf8() {
        let line = decode_line(b"ok \xff\xfe done\n");
        assert_eq!(line, "ok \u{FFFD}\u{FFFD} done");
    }

    #[test]
    fn test_split_block() {
        assert_eq!(split_block(b"a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_block(b"a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_block(b"\n"), vec![""]);
        assert!(split_block(b"").is_empty());
    }

    #[test]
    fn test_joined_views() {
        let result = RunResult::new(
            2,
            vec!["one".to_string(), "two".to_string()],
            vec!["boom".to_string()],
        );

        assert!(!result.success());
        assert_eq!(result.stdout(), "one\ntwo");
        assert_eq!(result.stderr(), "boom");
        assert_eq!(
            result.termination(),
            &TerminationOutcome::Confirmed { exit_code: 2 }
        );
    }
}
