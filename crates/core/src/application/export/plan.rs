// Export plan model (deserialized from a plan file)
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::vars::VarTable;
use crate::error::{ExportError, Result};
use crate::port::RunnerConfig;

fn default_pattern() -> String {
    "*".to_string()
}

/// Raw plan as written by the user
///
/// ```toml
/// [vars]
/// engine_path = "/opt/o3de"
///
/// [[steps]]
/// name = "Configure"
/// kind = "run"
/// args = ["cmake", "-S", ".", "-B", "build/mono"]
/// cwd = "${engine_path}"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportPlan {
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    #[serde(default)]
    pub runner: RunnerSettings,

    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// Optional runner overrides from the plan's `[runner]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunnerSettings {
    pub poll_interval_ms: Option<u64>,
    pub termination_timeout_secs: Option<u64>,
    pub drain_grace_ms: Option<u64>,
}

impl RunnerSettings {
    /// Overlay the values that are set onto `base`
    pub fn apply(&self, base: RunnerConfig) -> RunnerConfig {
        RunnerConfig {
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(base.poll_interval),
            termination_timeout: self
                .termination_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(base.termination_timeout),
            drain_grace: self
                .drain_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(base.drain_grace),
        }
    }
}

/// One `[[steps]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct StepSpec {
    #[serde(default)]
    pub name: Option<String>,

    /// Step runs only when this holds: a truthy variable name, or `name=value`
    #[serde(default)]
    pub when: Option<String>,

    #[serde(flatten)]
    pub action: ActionSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    Run {
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
        /// `KEY=VALUE` entries
        #[serde(default)]
        env: Vec<String>,
        #[serde(default)]
        clear_env: bool,
    },
    Copy {
        from: String,
        #[serde(default = "default_pattern")]
        pattern: String,
        to: String,
    },
    Mkdir {
        path: String,
    },
    /// Zip the contents of `from` into the file `to`
    Archive {
        from: String,
        to: String,
    },
    Pause {
        millis: u64,
    },
}

impl ActionSpec {
    pub fn kind(&self) -> StepKind {
        match self {
            ActionSpec::Run { .. } => StepKind::Run,
            ActionSpec::Copy { .. } => StepKind::Copy,
            ActionSpec::Mkdir { .. } => StepKind::Mkdir,
            ActionSpec::Archive { .. } => StepKind::Archive,
            ActionSpec::Pause { .. } => StepKind::Pause,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Run,
    Copy,
    Mkdir,
    Archive,
    Pause,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Run => write!(f, "run"),
            StepKind::Copy => write!(f, "copy"),
            StepKind::Mkdir => write!(f, "mkdir"),
            StepKind::Archive => write!(f, "archive"),
            StepKind::Pause => write!(f, "pause"),
        }
    }
}

/// Step action with every variable expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    Run {
        args: Vec<String>,
        cwd: Option<PathBuf>,
        env: BTreeMap<String, String>,
        clear_env: bool,
    },
    Copy {
        from: PathBuf,
        pattern: String,
        to: PathBuf,
    },
    Mkdir {
        path: PathBuf,
    },
    Archive {
        from: PathBuf,
        to: PathBuf,
    },
    Pause {
        duration: Duration,
    },
}

impl std::fmt::Display for ResolvedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedAction::Run { args, cwd, .. } => match cwd {
                Some(cwd) => write!(f, "{} (in {})", args.join(" "), cwd.display()),
                None => write!(f, "{}", args.join(" ")),
            },
            ResolvedAction::Copy { from, pattern, to } => write!(
                f,
                "{} -> {}",
                from.join(pattern).display(),
                to.display()
            ),
            ResolvedAction::Mkdir { path } => write!(f, "{}", path.display()),
            ResolvedAction::Archive { from, to } => {
                write!(f, "{} -> {}", from.display(), to.display())
            }
            ResolvedAction::Pause { duration } => write!(f, "{:?}", duration),
        }
    }
}

/// A step ready for the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub name: String,
    pub kind: StepKind,
    pub condition: Option<String>,
    /// `None` when the step's condition is off; such steps are not expanded
    pub action: Option<ResolvedAction>,
}

impl ResolvedStep {
    pub fn is_enabled(&self) -> bool {
        self.action.is_some()
    }
}

/// Fully resolved plan
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    pub vars: VarTable,
    pub runner: RunnerSettings,
    pub steps: Vec<ResolvedStep>,
}

impl ExportPlan {
    /// Expand variables and validate every enabled step
    ///
    /// # Errors
    /// - ExportError::Plan on unknown variables, malformed `env` entries,
    ///   or a `run` step with no arguments
    pub fn resolve(&self, overrides: &BTreeMap<String, String>) -> Result<ResolvedPlan> {
        let vars = VarTable::resolve(&self.vars, overrides)?;

        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, spec)| resolve_step(index, spec, &vars))
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedPlan {
            vars,
            runner: self.runner.clone(),
            steps,
        })
    }
}

fn resolve_step(index: usize, spec: &StepSpec, vars: &VarTable) -> Result<ResolvedStep> {
    let kind = spec.action.kind();
    let name = match &spec.name {
        Some(name) => vars.expand(name)?,
        None => format!("step {} ({})", index + 1, kind),
    };

    let enabled = spec
        .when
        .as_deref()
        .map(|condition| vars.condition_holds(condition))
        .unwrap_or(true);

    let action = if enabled {
        Some(resolve_action(&name, &spec.action, vars)?)
    } else {
        None
    };

    Ok(ResolvedStep {
        name,
        kind,
        condition: spec.when.clone(),
        action,
    })
}

fn resolve_action(name: &str, action: &ActionSpec, vars: &VarTable) -> Result<ResolvedAction> {
    let resolved = match action {
        ActionSpec::Run {
            args,
            cwd,
            env,
            clear_env,
        } => {
            if args.is_empty() {
                return Err(ExportError::Plan(format!(
                    "Step '{}' has an empty argument list",
                    name
                )));
            }

            let args = args
                .iter()
                .map(|arg| vars.expand(arg))
                .collect::<Result<Vec<_>>>()?;

            let cwd = cwd
                .as_deref()
                .map(|dir| vars.expand(dir).map(PathBuf::from))
                .transpose()?;

            let mut env_map = BTreeMap::new();
            for entry in env {
                let (key, value) = entry.split_once('=').ok_or_else(|| {
                    ExportError::Plan(format!(
                        "Step '{}': env entry '{}' is not KEY=VALUE",
                        name, entry
                    ))
                })?;
                env_map.insert(key.trim().to_string(), vars.expand(value)?);
            }

            ResolvedAction::Run {
                args,
                cwd,
                env: env_map,
                clear_env: *clear_env,
            }
        }
        ActionSpec::Copy { from, pattern, to } => ResolvedAction::Copy {
            from: PathBuf::from(vars.expand(from)?),
            pattern: vars.expand(pattern)?,
            to: PathBuf::from(vars.expand(to)?),
        },
        ActionSpec::Mkdir { path } => ResolvedAction::Mkdir {
            path: PathBuf::from(vars.expand(path)?),
        },
        ActionSpec::Archive { from, to } => ResolvedAction::Archive {
            from: PathBuf::from(vars.expand(from)?),
            to: PathBuf::from(vars.expand(to)?),
        },
        ActionSpec::Pause { millis } => ResolvedAction::Pause {
            duration: Duration::from_millis(*millis),
        },
    };

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(value: serde_json::Value) -> ExportPlan {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_expands_run_step() {
        let plan = plan(json!({
            "vars": { "engine_path": "/opt/engine", "build": "${engine_path}/build/mono" },
            "steps": [
                {
                    "name": "Configure",
                    "kind": "run",
                    "args": ["cmake", "-B", "${build}"],
                    "cwd": "${engine_path}",
                    "env": ["CMAKE_BUILD_PARALLEL_LEVEL=8"]
                }
            ]
        }));

        let resolved = plan.resolve(&BTreeMap::new()).unwrap();
        let step = &resolved.steps[0];

        assert_eq!(step.name, "Configure");
        assert_eq!(step.kind, StepKind::Run);
        match step.action.as_ref().unwrap() {
            ResolvedAction::Run {
                args, cwd, env, clear_env,
            } => {
                assert_eq!(args, &["cmake", "-B", "/opt/engine/build/mono"]);
                assert_eq!(cwd.as_deref(), Some(std::path::Path::new("/opt/engine")));
                assert_eq!(env.get("CMAKE_BUILD_PARALLEL_LEVEL").unwrap(), "8");
                assert!(!clear_env);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_shell_arguments_pass_through_unchanged() {
        let plan = plan(json!({
            "steps": [
                { "kind": "run", "args": ["sh", "-c", "echo \"$1\"", "_", "hi"] },
                { "kind": "run", "args": ["sh", "-c", "echo $HOME"] }
            ]
        }));

        let resolved = plan.resolve(&BTreeMap::new()).unwrap();

        let args: Vec<&Vec<String>> = resolved
            .steps
            .iter()
            .map(|step| match step.action.as_ref().unwrap() {
                ResolvedAction::Run { args, .. } => args,
                other => panic!("unexpected action {:?}", other),
            })
            .collect();
        assert_eq!(args[0], &["sh", "-c", "echo \"$1\"", "_", "hi"]);
        assert_eq!(args[1], &["sh", "-c", "echo $HOME"]);
    }

    #[test]
    fn test_disabled_step_is_not_expanded() {
        let plan = plan(json!({
            "vars": { "build_tools": "false" },
            "steps": [
                { "kind": "run", "when": "build_tools", "args": ["${not_defined_anywhere_xyz}"] }
            ]
        }));

        let resolved = plan.resolve(&BTreeMap::new()).unwrap();

        assert!(!resolved.steps[0].is_enabled());
        assert_eq!(resolved.steps[0].name, "step 1 (run)");
    }

    #[test]
    fn test_when_enabled_by_override() {
        let plan = plan(json!({
            "steps": [ { "kind": "pause", "millis": 5, "when": "slow" } ]
        }));
        let overrides = BTreeMap::from([("slow".to_string(), "on".to_string())]);

        let resolved = plan.resolve(&overrides).unwrap();

        assert_eq!(
            resolved.steps[0].action,
            Some(ResolvedAction::Pause {
                duration: Duration::from_millis(5)
            })
        );
    }

    #[test]
    fn test_empty_args_rejected_at_resolution() {
        let plan = plan(json!({ "steps": [ { "name": "broken", "kind": "run", "args": [] } ] }));

        let err = plan.resolve(&BTreeMap::new()).unwrap_err();

        assert!(err.to_string().contains("empty argument list"));
    }

    #[test]
    fn test_malformed_env_entry_rejected() {
        let plan = plan(json!({ "steps": [ { "kind": "run", "args": ["x"], "env": ["NOVALUE"] } ] }));
        assert!(plan.resolve(&BTreeMap::new()).is_err());
    }

    #[test]
    fn test_copy_defaults_pattern() {
        let plan = plan(json!({ "steps": [ { "kind": "copy", "from": "a", "to": "b" } ] }));

        let resolved = plan.resolve(&BTreeMap::new()).unwrap();

        assert_eq!(
            resolved.steps[0].action,
            Some(ResolvedAction::Copy {
                from: PathBuf::from("a"),
                pattern: "*".to_string(),
                to: PathBuf::from("b"),
            })
        );
    }

    #[test]
    fn test_archive_step_expands_paths() {
        let plan = plan(json!({
            "vars": { "output_path": "/srv/out", "archive_output": "0" },
            "steps": [
                { "name": "Zip", "kind": "archive", "when": "archive_output",
                  "from": "${output_path}", "to": "${output_path}.zip" }
            ]
        }));

        let off = plan.resolve(&BTreeMap::new()).unwrap();
        assert_eq!(off.steps[0].kind, StepKind::Archive);
        assert!(!off.steps[0].is_enabled());

        let overrides = BTreeMap::from([("archive_output".to_string(), "1".to_string())]);
        let on = plan.resolve(&overrides).unwrap();
        let action = on.steps[0].action.clone().unwrap();
        assert_eq!(action.to_string(), "/srv/out -> /srv/out.zip");
        assert_eq!(
            action,
            ResolvedAction::Archive {
                from: PathBuf::from("/srv/out"),
                to: PathBuf::from("/srv/out.zip"),
            }
        );
    }

    #[test]
    fn test_runner_settings_overlay() {
        let settings = RunnerSettings {
            termination_timeout_secs: Some(2),
            ..Default::default()
        };

        let config = settings.apply(RunnerConfig::default());

        assert_eq!(config.termination_timeout, Duration::from_secs(2));
        assert_eq!(config.poll_interval, RunnerConfig::default().poll_interval);
    }
}
