// Exporter Infrastructure - System Adapters
// Implements: ProcessRunner, Terminable, LogSink, FileLayout

mod child_handle;
pub mod fs_layout;
pub mod process_probe;
pub mod subprocess_runner;
pub mod tracing_sink;

pub use child_handle::exit_code;
pub use fs_layout::FsLayout;
pub use process_probe::is_alive;
pub use subprocess_runner::SubprocessRunner;
pub use tracing_sink::TracingLogSink;
