// Command Domain Model

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::error::{DomainError, Result};
use crate::port::LogSink;

/// Description of one external tool invocation
///
/// The first argument is the executable, the rest are passed through verbatim.
/// A `Command` is never empty: [`Command::new`] rejects an empty argument list,
/// so every value that reaches a runner names something to spawn.
#[derive(Clone)]
pub struct Command {
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    inherit_env: bool,
    sink: Arc<dyn LogSink>,
}

impl Command {
    /// Create a command from its argument tokens
    ///
    /// # Errors
    /// - `DomainError::EmptyCommand` if `args` yields nothing
    ///
    /// # Example
    /// ```text
    /// let cmd = Command::new(["cmake", "--build", "build/mono"], sink)?
    ///     .with_cwd("/opt/engine");
    /// ```
    pub fn new<I, S>(args: I, sink: Arc<dyn LogSink>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(DomainError::EmptyCommand);
        }

        Ok(Self {
            args,
            cwd: None,
            env: BTreeMap::new(),
            inherit_env: true,
            sink,
        })
    }

    /// Run the command from `cwd` instead of the current directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set (or override) one environment variable for the child
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables for the child
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Start the child from an empty environment; only `env()` entries are visible
    pub fn without_inherited_env(mut self) -> Self {
        self.inherit_env = false;
        self
    }

    /// The executable (first argument)
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// All argument tokens, executable included
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments passed to the executable
    pub fn program_args(&self) -> &[String] {
        &self.args[1..]
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn inherits_env(&self) -> bool {
        self.inherit_env
    }

    /// Sink receiving the child's output lines and lifecycle messages
    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("inherit_env", &self.inherit_env)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::log_sink::mocks::RecordingSink;

    fn sink() -> Arc<dyn LogSink> {
        Arc::new(RecordingSink::new())
    }

    #[test]
    fn test_empty_args_rejected() {
        let result = Command::new(Vec::<String>::new(), sink());
        assert_eq!(result.unwrap_err(), DomainError::EmptyCommand);
    }

    #[test]
    fn test_program_and_args_split() {
        let cmd = Command::new(["cmake", "-S", "."], sink()).unwrap();

        assert_eq!(cmd.program(), "cmake");
        assert_eq!(cmd.program_args(), &["-S".to_string(), ".".to_string()]);
        assert_eq!(cmd.args().len(), 3);
        assert_eq!(cmd.to_string(), "cmake -S .");
    }

    #[test]
    fn test_single_token_has_no_program_args() {
        let cmd = Command::new(["true"], sink()).unwrap();
        assert!(cmd.program_args().is_empty());
    }

    #[test]
    fn test_builder_sets_cwd_and_env() {
        let cmd = Command::new(["env"], sink())
            .unwrap()
            .with_cwd("/tmp")
            .with_env("A", "1")
            .with_envs([("B", "2"), ("A", "3")])
            .without_inherited_env();

        assert_eq!(cmd.cwd(), Some(Path::new("/tmp")));
        assert_eq!(cmd.env().get("A").map(String::as_str), Some("3"));
        assert_eq!(cmd.env().get("B").map(String::as_str), Some("2"));
        assert!(!cmd.inherits_env());
    }

    #[test]
    fn test_debug_omits_sink() {
        let cmd = Command::new(["echo", "hi"], sink()).unwrap();
        let debug = format!("{:?}", cmd);
        assert!(debug.contains("echo"));
        assert!(!debug.contains("RecordingSink"));
    }
}
