// Export pipeline constants (no magic values)
// Runner defaults live next to RunnerConfig in port::process_runner

/// Variable values treated as "enabled" by a step's `when` condition
pub const TRUTHY_VALUES: &[&str] = &["1", "true", "yes", "on"];
