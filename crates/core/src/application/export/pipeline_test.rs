//! Unit tests for the export pipeline

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::port::file_layout::mocks::{LayoutCall, MockFileLayout};
use crate::port::log_sink::mocks::RecordingSink;
use crate::port::process_runner::mocks::MockProcessRunner;
use crate::port::time_provider::mocks::SteppingTimeProvider;
use crate::port::Severity;

struct Fixture {
    runner: Arc<MockProcessRunner>,
    layout: Arc<MockFileLayout>,
    sink: Arc<RecordingSink>,
}

impl Fixture {
    fn new(runner: MockProcessRunner, layout: MockFileLayout) -> Self {
        Self {
            runner: Arc::new(runner),
            layout: Arc::new(layout),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    fn pipeline(&self) -> ExportPipeline {
        ExportPipeline::new(
            self.runner.clone(),
            self.layout.clone(),
            Arc::new(SteppingTimeProvider::new(0, 5)),
            self.sink.clone(),
        )
    }
}

fn run_step(name: &str, args: &[&str]) -> ResolvedStep {
    ResolvedStep {
        name: name.to_string(),
        kind: StepKind::Run,
        condition: None,
        action: Some(ResolvedAction::Run {
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: None,
            env: BTreeMap::new(),
            clear_env: false,
        }),
    }
}

fn skipped_step(name: &str) -> ResolvedStep {
    ResolvedStep {
        name: name.to_string(),
        kind: StepKind::Run,
        condition: Some("build_tools".to_string()),
        action: None,
    }
}

#[tokio::test]
async fn test_runs_steps_in_order() {
    let fixture = Fixture::new(
        MockProcessRunner::new().with_output("cmake", &["configured"]),
        MockFileLayout::new(2),
    );
    let steps = vec![
        run_step("configure", &["cmake", "-S", "."]),
        run_step("build", &["cmake", "--build", "out"]),
        ResolvedStep {
            name: "bundles".to_string(),
            kind: StepKind::Copy,
            condition: None,
            action: Some(ResolvedAction::Copy {
                from: PathBuf::from("/bundles"),
                pattern: "*.pak".to_string(),
                to: PathBuf::from("/out/Cache/pc"),
            }),
        },
    ];

    let report = fixture.pipeline().run(&steps).await.unwrap();

    assert_eq!(
        fixture.runner.executed(),
        vec![
            vec!["cmake".to_string(), "-S".to_string(), ".".to_string()],
            vec!["cmake".to_string(), "--build".to_string(), "out".to_string()],
        ]
    );
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.steps[0].status, StepStatus::Ran { exit_code: 0 });
    assert_eq!(report.steps[2].status, StepStatus::Copied { files: 2 });
    assert_eq!(
        fixture.layout.calls(),
        vec![LayoutCall::Copy {
            from: PathBuf::from("/bundles"),
            pattern: "*.pak".to_string(),
            to: PathBuf::from("/out/Cache/pc"),
        }]
    );
    // Tool output goes through the pipeline sink
    assert!(fixture.sink.contains(Severity::Info, "configured"));
}

#[tokio::test]
async fn test_non_zero_exit_aborts_sequence() {
    let fixture = Fixture::new(
        MockProcessRunner::new().with_exit_code("AssetBundlerBatch", 4),
        MockFileLayout::new(0),
    );
    let steps = vec![
        run_step("bundle", &["AssetBundlerBatch", "bundles"]),
        run_step("never", &["cmake", "--build", "out"]),
    ];

    let err = fixture.pipeline().run(&steps).await.unwrap_err();

    match err {
        ExportError::StepFailed { step, exit_code } => {
            assert_eq!(step, "bundle");
            assert_eq!(exit_code, 4);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(fixture.runner.call_count(), 1);
}

#[tokio::test]
async fn test_spawn_failure_aborts_sequence() {
    let fixture = Fixture::new(
        MockProcessRunner::new().with_spawn_failure("missing-tool"),
        MockFileLayout::new(0),
    );
    let steps = vec![
        run_step("missing", &["missing-tool"]),
        run_step("never", &["cmake"]),
    ];

    let err = fixture.pipeline().run(&steps).await.unwrap_err();

    assert!(matches!(err, ExportError::Runner(_)));
    assert_eq!(fixture.runner.call_count(), 1);
}

#[tokio::test]
async fn test_skipped_steps_do_not_run() {
    let fixture = Fixture::new(MockProcessRunner::new(), MockFileLayout::new(0));
    let steps = vec![skipped_step("tools"), run_step("game", &["cmake"])];

    let report = fixture.pipeline().run(&steps).await.unwrap();

    assert_eq!(fixture.runner.call_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.executed_count(), 1);
    assert_eq!(report.steps[0].status, StepStatus::Skipped);
}

#[tokio::test]
async fn test_dry_run_executes_nothing() {
    let fixture = Fixture::new(MockProcessRunner::new(), MockFileLayout::new(1));
    let steps = vec![
        run_step("configure", &["cmake"]),
        ResolvedStep {
            name: "layout".to_string(),
            kind: StepKind::Mkdir,
            condition: None,
            action: Some(ResolvedAction::Mkdir {
                path: PathBuf::from("/out"),
            }),
        },
    ];

    let report = fixture
        .pipeline()
        .with_dry_run(true)
        .run(&steps)
        .await
        .unwrap();

    assert_eq!(fixture.runner.call_count(), 0);
    assert!(fixture.layout.calls().is_empty());
    assert!(report.steps.iter().all(|s| s.status == StepStatus::DryRun));
}

#[tokio::test]
async fn test_layout_failure_aborts_sequence() {
    let fixture = Fixture::new(MockProcessRunner::new(), MockFileLayout::failing());
    let steps = vec![
        ResolvedStep {
            name: "copy".to_string(),
            kind: StepKind::Copy,
            condition: None,
            action: Some(ResolvedAction::Copy {
                from: PathBuf::from("/nope"),
                pattern: "*".to_string(),
                to: PathBuf::from("/out"),
            }),
        },
        run_step("never", &["cmake"]),
    ];

    let err = fixture.pipeline().run(&steps).await.unwrap_err();

    assert!(matches!(err, ExportError::Layout(_)));
    assert_eq!(fixture.runner.call_count(), 0);
}

#[tokio::test]
async fn test_pause_and_mkdir_steps() {
    let fixture = Fixture::new(MockProcessRunner::new(), MockFileLayout::new(0));
    let steps = vec![
        ResolvedStep {
            name: "settle".to_string(),
            kind: StepKind::Pause,
            condition: None,
            action: Some(ResolvedAction::Pause {
                duration: Duration::from_millis(1),
            }),
        },
        ResolvedStep {
            name: "layout".to_string(),
            kind: StepKind::Mkdir,
            condition: None,
            action: Some(ResolvedAction::Mkdir {
                path: PathBuf::from("/out/Gems"),
            }),
        },
    ];

    let report = fixture.pipeline().run(&steps).await.unwrap();

    assert_eq!(report.steps[0].status, StepStatus::Paused);
    assert_eq!(report.steps[1].status, StepStatus::Created);
    assert_eq!(
        fixture.layout.calls(),
        vec![LayoutCall::EnsureDir(PathBuf::from("/out/Gems"))]
    );
    assert!(report.duration_ms > 0);
}

#[tokio::test]
async fn test_archive_step_runs_after_layout() {
    let fixture = Fixture::new(MockProcessRunner::new(), MockFileLayout::new(4));
    let steps = vec![
        ResolvedStep {
            name: "layout".to_string(),
            kind: StepKind::Mkdir,
            condition: None,
            action: Some(ResolvedAction::Mkdir {
                path: PathBuf::from("/out/release"),
            }),
        },
        ResolvedStep {
            name: "zip".to_string(),
            kind: StepKind::Archive,
            condition: Some("archive_output".to_string()),
            action: Some(ResolvedAction::Archive {
                from: PathBuf::from("/out/release"),
                to: PathBuf::from("/out/release.zip"),
            }),
        },
    ];

    let report = fixture.pipeline().run(&steps).await.unwrap();

    assert_eq!(report.steps[1].status, StepStatus::Archived { files: 4 });
    assert_eq!(report.steps[1].status.to_string(), "4 file(s) archived");
    assert_eq!(
        fixture.layout.calls(),
        vec![
            LayoutCall::EnsureDir(PathBuf::from("/out/release")),
            LayoutCall::Archive {
                from: PathBuf::from("/out/release"),
                to: PathBuf::from("/out/release.zip"),
            },
        ]
    );
}
