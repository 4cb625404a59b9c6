//! Integration tests for build output parsing and build supervision

use pretty_assertions::assert_eq;

use pipeworks::build::{BuildSummary, OutputParser};

#[test]
fn test_summary_over_full_build_log() {
    let log = "\
Build started 10:00:00
Skipping /game/Content/Fonts/title.spritefont
/game/Content/Textures/hero.png
/game/Content/Effects/glow.fx(12,5): error X3004: undeclared identifier 'tint'
  compilation failed
/game/Content/Effects/glow.fx
Build 1 succeeded, 1 failed, 1 skipped.
Time elapsed 00:00:01.25.
";
    let mut parser = OutputParser::new();
    let mut summary = BuildSummary::default();
    for line in log.lines() {
        summary.record(&parser.parse(line));
    }

    assert_eq!(summary.started.as_deref(), Some("10:00:00"));
    assert_eq!((summary.succeeded, summary.failed, summary.skipped), (1, 1, 1));
    assert_eq!(summary.elapsed.as_deref(), Some("00:00:01.25"));
    assert_eq!(
        summary.error_files,
        vec!["/game/Content/Effects/glow.fx".to_string()]
    );
    assert!(!summary.is_success());
}

#[cfg(unix)]
mod supervision {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use tempfile::TempDir;

    use pipeworks::build::{BuildState, TERMINATED_MESSAGE};
    use pipeworks::config::PipeworksConfig;
    use pipeworks::controller::Controller;
    use pipeworks::view::{FixedPrompt, MemoryLog, NullView};

    fn controller(tools: &Path, project_dir: &Path, body: &str) -> (Controller, Arc<MemoryLog>) {
        let script = tools.join("fake-mgcb.sh");
        fs::write(&script, body).unwrap();

        let mut config = PipeworksConfig::default();
        config.watcher.enabled = false;
        config.templates.global_dir = Some(PathBuf::from("/nonexistent/templates"));
        config.builder.executable = Some(PathBuf::from("/bin/sh"));
        config.builder.args = vec![script.to_string_lossy().into_owned()];

        let log = Arc::new(MemoryLog::new());
        let mut controller = Controller::new(
            config,
            Box::new(NullView),
            log.clone(),
            Box::new(FixedPrompt::accepting()),
        );
        controller
            .new_project_at(&project_dir.join("Content.mgcb"))
            .unwrap();
        (controller, log)
    }

    fn terminated_count(log: &MemoryLog) -> usize {
        log.lines()
            .iter()
            .filter(|l| l.as_str() == TERMINATED_MESSAGE)
            .count()
    }

    #[test]
    fn test_cancel_before_start_is_noop() {
        let tools = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let (controller, log) = controller(tools.path(), project.path(), "exit 0\n");

        controller.cancel_build();
        assert_eq!(controller.build_state(), BuildState::Idle);
        assert_eq!(terminated_count(&log), 0);
    }

    #[test]
    fn test_cancel_mid_run_kills_once() {
        let tools = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let (mut controller, log) = controller(
            tools.path(),
            project.path(),
            "echo 'Build started 10:00:00'\nexec sleep 30\n",
        );

        assert!(controller.build(false).unwrap());
        let deadline = Instant::now() + Duration::from_secs(10);
        while !(controller.build_state() == BuildState::Running && log.contains("Build started")) {
            assert!(Instant::now() < deadline, "build never started");
            thread::sleep(Duration::from_millis(10));
        }

        let started = Instant::now();
        controller.cancel_build();
        controller.cancel_build();
        assert_eq!(controller.wait_build(), BuildState::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(terminated_count(&log), 1);
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let tools = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let (mut controller, log) = controller(
            tools.path(),
            project.path(),
            "echo 'Build 0 succeeded, 0 failed.'\n",
        );

        assert!(controller.build(false).unwrap());
        assert_eq!(controller.wait_build(), BuildState::Completed);
        controller.cancel_build();
        assert_eq!(controller.build_state(), BuildState::Completed);
        assert_eq!(terminated_count(&log), 0);
    }

    #[test]
    fn test_second_build_while_running_is_rejected() {
        let tools = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let (mut controller, _log) = controller(tools.path(), project.path(), "exec sleep 30\n");

        assert!(controller.build(false).unwrap());
        let err = controller.build(true).unwrap_err();
        assert_eq!(err.error_code(), "BUILD_IN_PROGRESS");

        let deadline = Instant::now() + Duration::from_secs(10);
        while controller.build_state() != BuildState::Running {
            assert!(Instant::now() < deadline, "build never started");
            thread::sleep(Duration::from_millis(10));
        }
        controller.cancel_build();
        assert_eq!(controller.wait_build(), BuildState::Cancelled);
    }
}
