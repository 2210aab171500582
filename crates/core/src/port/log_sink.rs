// Log Sink Port
// Receives semantic severity + text; destinations are an adapter concern

/// Severity attached to every message a runner emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Leveled text sink
///
/// Implementations:
/// - TracingLogSink: forwards to `tracing` (infra-system)
/// - RecordingSink: keeps every message in memory (tests)
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every message for later assertions
    #[derive(Default)]
    pub struct RecordingSink {
        entries: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entries(&self) -> Vec<(Severity, String)> {
            self.entries.lock().unwrap().clone()
        }

        /// Messages logged at exactly `severity`
        pub fn messages_at(&self, severity: Severity) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == severity)
                .map(|(_, m)| m.clone())
                .collect()
        }

        /// True if any message at `severity` contains `needle`
        pub fn contains(&self, severity: Severity, needle: &str) -> bool {
            self.messages_at(severity)
                .iter()
                .any(|m| m.contains(needle))
        }
    }

    impl LogSink for RecordingSink {
        fn log(&self, severity: Severity, message: &str) {
            self.entries
                .lock()
                .unwrap()
                .push((severity, message.to_string()));
        }
    }
}
