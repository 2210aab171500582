// Application Layer - Use Cases

pub mod constants;
pub mod export;
pub mod termination;

// Re-exports
pub use export::{ExportPipeline, ExportReport};
pub use termination::terminate_all;
