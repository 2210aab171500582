// LogSink adapter forwarding tool output to `tracing`
use tracing::{error, info, warn};

use exporter_core::port::{LogSink, Severity};

/// Sink that emits every message as a `tracing` event
///
/// Events use the `exporter::tool` target and carry a `source` field so tool
/// output can be filtered separately from the exporter's own logs.
#[derive(Debug, Clone)]
pub struct TracingLogSink {
    source: String,
}

impl TracingLogSink {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: "exporter::tool", source = %self.source, "{}", message),
            Severity::Warning => {
                warn!(target: "exporter::tool", source = %self.source, "{}", message)
            }
            Severity::Error => {
                error!(target: "exporter::tool", source = %self.source, "{}", message)
            }
        }
    }
}
