//! Supervised build subprocess
//!
//! A build runs on its own worker thread. The worker spawns the tool with
//! piped stdout, feeds every line through an [`OutputParser`] and forwards
//! the result to the log sink in emission order. The child handle is the
//! only thing shared with the foreground: it sits in `Arc<Mutex<Option<Child>>>`
//! and the lock is held only to kill the child or take it out, never across
//! a blocking wait.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::build::locate::BuildTool;
use crate::build::output::{BuildSummary, OutputParser};
use crate::error::{PipelineError, Result};
use crate::view::LogSink;

/// Line appended when a running build is killed.
pub const TERMINATED_MESSAGE: &str = "Build terminated!";

/// Lifecycle of one build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Idle,
    Launching,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl BuildState {
    pub fn is_active(self) -> bool {
        matches!(self, BuildState::Launching | BuildState::Running)
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            BuildState::Completed | BuildState::Cancelled | BuildState::Failed
        )
    }
}

/// Everything needed to launch the tool once.
#[derive(Debug)]
pub struct BuildRequest {
    pub tool: BuildTool,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Temporary script owned by this build, deleted when the worker finishes.
    script: Option<NamedTempFile>,
}

impl BuildRequest {
    /// `<project> [/rebuild] [/launchdebugger]`
    pub fn build(
        tool: BuildTool,
        project_file: &Path,
        working_dir: impl Into<PathBuf>,
        rebuild: bool,
        launch_debugger: bool,
    ) -> Self {
        let mut args = vec![project_file.to_string_lossy().into_owned()];
        if rebuild {
            args.push("/rebuild".to_string());
        }
        if launch_debugger {
            args.push("/launchdebugger".to_string());
        }
        Self {
            tool,
            args,
            working_dir: working_dir.into(),
            script: None,
        }
    }

    /// Rebuild of a partial script. The script file lives as long as the build.
    pub fn items(
        tool: BuildTool,
        script: NamedTempFile,
        working_dir: impl Into<PathBuf>,
        launch_debugger: bool,
    ) -> Self {
        let mut request = Self::build(tool, script.path(), working_dir, true, launch_debugger);
        request.script = Some(script);
        request
    }

    /// `/clean /intermediateDir:<dir> /outputDir:<dir>`
    pub fn clean(
        tool: BuildTool,
        working_dir: impl Into<PathBuf>,
        intermediate_dir: &str,
        output_dir: &str,
    ) -> Self {
        Self {
            tool,
            args: vec![
                "/clean".to_string(),
                format!("/intermediateDir:{}", intermediate_dir),
                format!("/outputDir:{}", output_dir),
            ],
            working_dir: working_dir.into(),
            script: None,
        }
    }

    pub fn script_path(&self) -> Option<&Path> {
        self.script.as_ref().map(NamedTempFile::path)
    }

    /// Program arguments in launch order.
    pub fn command_line(&self) -> Vec<String> {
        self.tool
            .leading_args
            .iter()
            .chain(self.args.iter())
            .cloned()
            .collect()
    }
}

#[derive(Clone)]
struct Shared {
    child: Arc<Mutex<Option<Child>>>,
    state: Arc<Mutex<BuildState>>,
    cancelled: Arc<AtomicBool>,
    summary: Arc<Mutex<BuildSummary>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs at most one build at a time.
pub struct BuildRunner {
    shared: Shared,
    worker: Option<JoinHandle<()>>,
    log: Option<Arc<dyn LogSink>>,
}

impl BuildRunner {
    pub fn new() -> Self {
        Self {
            shared: Shared {
                child: Arc::new(Mutex::new(None)),
                state: Arc::new(Mutex::new(BuildState::Idle)),
                cancelled: Arc::new(AtomicBool::new(false)),
                summary: Arc::new(Mutex::new(BuildSummary::default())),
            },
            worker: None,
            log: None,
        }
    }

    pub fn state(&self) -> BuildState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Totals parsed from the current or last build's output.
    pub fn summary(&self) -> BuildSummary {
        lock(&self.shared.summary).clone()
    }

    /// Launch a build on a worker thread.
    pub fn start(&mut self, request: BuildRequest, log: Arc<dyn LogSink>) -> Result<()> {
        {
            let mut state = lock(&self.shared.state);
            if state.is_active() {
                return Err(PipelineError::BuildInProgress);
            }
            *state = BuildState::Launching;
        }

        if let Some(previous) = self.worker.take() {
            let _ = previous.join();
        }

        self.shared.cancelled.store(false, Ordering::SeqCst);
        *lock(&self.shared.summary) = BuildSummary::default();
        log.clear();
        self.log = Some(Arc::clone(&log));

        log::info!(
            "Starting build: {} {}",
            request.tool.program.display(),
            request.command_line().join(" ")
        );

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("pipeworks-build".to_string())
            .spawn(move || run_build(request, shared, log));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *lock(&self.shared.state) = BuildState::Failed;
                Err(PipelineError::Io(e))
            }
        }
    }

    /// Kill the running build. No-op before start or after it finished.
    pub fn cancel(&self) {
        let mut child = lock(&self.shared.child);
        let state = self.state();
        if !state.is_active() {
            return;
        }
        // Running with no child means the worker already took it to reap.
        if state == BuildState::Running && child.is_none() {
            return;
        }
        // Exited on its own but not reaped yet. The status is cached for the worker.
        if let Some(process) = child.as_mut() {
            if let Ok(Some(_)) = process.try_wait() {
                return;
            }
        }
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(process) = child.as_mut() {
            if let Err(e) = process.kill() {
                log::warn!("Failed to kill build process: {}", e);
            }
        }
        drop(child);

        if let Some(log) = &self.log {
            log.append(TERMINATED_MESSAGE);
        }
        tracing::info!("build cancelled");
    }

    /// Block until the worker exits and return the final state.
    pub fn wait(&mut self) -> BuildState {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Build worker panicked");
                *lock(&self.shared.state) = BuildState::Failed;
            }
        }
        self.state()
    }
}

impl Default for BuildRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BuildRunner {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.wait();
    }
}

fn run_build(request: BuildRequest, shared: Shared, log: Arc<dyn LogSink>) {
    let span = tracing::info_span!("build", program = %request.tool.program.display());
    let _enter = span.enter();

    let spawned = Command::new(&request.tool.program)
        .args(&request.tool.leading_args)
        .args(&request.args)
        .current_dir(&request.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            log.append(&format!(
                "Failed to start build tool {}: {}",
                request.tool.program.display(),
                e
            ));
            *lock(&shared.state) = BuildState::Failed;
            tracing::warn!(error = %e, "build tool failed to start");
            return;
        }
    };

    let stdout = child.stdout.take();
    {
        let mut slot = lock(&shared.child);
        if shared.cancelled.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            *lock(&shared.state) = BuildState::Cancelled;
            return;
        }
        *slot = Some(child);
        *lock(&shared.state) = BuildState::Running;
    }

    if let Some(stdout) = stdout {
        pump_output(stdout, &shared, log.as_ref());
    }

    let child = lock(&shared.child).take();
    let status = child.map(|mut c| c.wait());

    let final_state = if shared.cancelled.load(Ordering::SeqCst) {
        BuildState::Cancelled
    } else {
        match status {
            Some(Ok(status)) if status.success() => BuildState::Completed,
            Some(Ok(status)) => {
                log.append(&format!("Build tool exited with {}", status));
                BuildState::Failed
            }
            Some(Err(e)) => {
                log.append(&format!("Failed to wait for build tool: {}", e));
                BuildState::Failed
            }
            None => BuildState::Failed,
        }
    };
    *lock(&shared.state) = final_state;

    drop(request);
    tracing::info!(state = ?final_state, "build finished");
}

fn pump_output(stdout: impl std::io::Read, shared: &Shared, log: &dyn LogSink) {
    let mut reader = BufReader::new(stdout);
    let mut parser = OutputParser::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\r', '\n']);
                let event = parser.parse(line);
                lock(&shared.summary).record(&event);
                log.event(&event, line);
            }
            Err(e) => {
                tracing::debug!(error = %e, "build output closed");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::view::MemoryLog;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn shell_tool(dir: &TempDir, body: &str) -> BuildTool {
        let script = dir.path().join("fake-mgcb.sh");
        fs::write(&script, body).unwrap();
        BuildTool::new("/bin/sh").with_args([script.to_string_lossy().into_owned()])
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_successful_build_streams_events() {
        let dir = TempDir::new().unwrap();
        let tool = shell_tool(
            &dir,
            "echo 'Build started 10:00:00'\n\
             echo \"$1\"\n\
             echo '/assets/tex.png'\n\
             echo 'Build 1 succeeded, 0 failed.'\n",
        );
        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();

        let request = BuildRequest::build(tool, Path::new("Content.mgcb"), dir.path(), true, false);
        runner.start(request, log.clone()).unwrap();

        assert_eq!(runner.wait(), BuildState::Completed);
        assert_eq!(
            log.lines(),
            vec![
                "Build started 10:00:00",
                "Content.mgcb",
                "/assets/tex.png",
                "Build 1 succeeded, 0 failed."
            ]
        );
        let summary = runner.summary();
        assert_eq!(summary.assets, vec!["/assets/tex.png".to_string()]);
        assert_eq!(summary.succeeded, 1);
    }

    #[test]
    fn test_nonzero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let tool = shell_tool(&dir, "echo 'Build 0 succeeded, 1 failed.'\nexit 3\n");
        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();

        runner
            .start(BuildRequest::clean(tool, dir.path(), "obj", "bin"), log.clone())
            .unwrap();

        assert_eq!(runner.wait(), BuildState::Failed);
        assert!(log.contains("exited with"));
    }

    #[test]
    fn test_missing_program_fails() {
        let dir = TempDir::new().unwrap();
        let tool = BuildTool::new(dir.path().join("no-such-tool"));
        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();

        runner
            .start(BuildRequest::clean(tool, dir.path(), "obj", "bin"), log.clone())
            .unwrap();

        assert_eq!(runner.wait(), BuildState::Failed);
        assert!(log.contains("Failed to start build tool"));
    }

    #[test]
    fn test_cancel_before_start_is_noop() {
        let runner = BuildRunner::new();
        runner.cancel();
        assert_eq!(runner.state(), BuildState::Idle);
    }

    #[test]
    fn test_cancel_kills_running_build_once() {
        let dir = TempDir::new().unwrap();
        let tool = shell_tool(&dir, "echo 'Build started 10:00:00'\nexec sleep 30\n");
        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();

        runner
            .start(BuildRequest::clean(tool, dir.path(), "obj", "bin"), log.clone())
            .unwrap();
        wait_until(|| runner.state() == BuildState::Running && log.contains("Build started"));

        runner.cancel();
        runner.cancel();

        assert_eq!(runner.wait(), BuildState::Cancelled);
        let terminated = log
            .lines()
            .iter()
            .filter(|l| l.as_str() == TERMINATED_MESSAGE)
            .count();
        assert_eq!(terminated, 1);

        runner.cancel();
        assert_eq!(runner.state(), BuildState::Cancelled);
    }

    #[test]
    fn test_cancel_after_exit_before_reap_is_noop() {
        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();
        runner.log = Some(log.clone());

        let child = Command::new("/bin/sh")
            .args(["-c", "exit 0"])
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        *lock(&runner.shared.child) = Some(child);
        *lock(&runner.shared.state) = BuildState::Running;

        wait_until(|| {
            lock(&runner.shared.child)
                .as_mut()
                .map_or(false, |c| matches!(c.try_wait(), Ok(Some(_))))
        });

        runner.cancel();
        assert!(!runner.shared.cancelled.load(Ordering::SeqCst));
        assert_eq!(runner.state(), BuildState::Running);
        assert!(log.lines().is_empty());

        let status = lock(&runner.shared.child).take().unwrap().wait().unwrap();
        assert!(status.success());
        *lock(&runner.shared.state) = BuildState::Completed;
    }

    #[test]
    fn test_second_build_rejected_while_running() {
        let dir = TempDir::new().unwrap();
        let tool = shell_tool(&dir, "exec sleep 30\n");
        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();

        runner
            .start(BuildRequest::clean(tool.clone(), dir.path(), "obj", "bin"), log.clone())
            .unwrap();
        let err = runner
            .start(BuildRequest::clean(tool, dir.path(), "obj", "bin"), log.clone())
            .unwrap_err();
        assert_eq!(err.error_code(), "BUILD_IN_PROGRESS");

        wait_until(|| runner.state() == BuildState::Running);
        runner.cancel();
        assert_eq!(runner.wait(), BuildState::Cancelled);
    }

    #[test]
    fn test_partial_script_removed_after_build() {
        let dir = TempDir::new().unwrap();
        let tool = shell_tool(&dir, "cat \"$1\"\n");
        let script = tempfile::Builder::new()
            .suffix(".mgcb")
            .tempfile_in(dir.path())
            .unwrap();
        fs::write(script.path(), "/build:hero.png\n").unwrap();

        let request = BuildRequest::items(tool, script, dir.path(), false);
        let script_path = request.script_path().unwrap().to_path_buf();
        assert_eq!(request.args[1], "/rebuild");

        let log = Arc::new(MemoryLog::new());
        let mut runner = BuildRunner::new();
        runner.start(request, log.clone()).unwrap();

        assert_eq!(runner.wait(), BuildState::Completed);
        assert!(log.contains("/build:hero.png"));
        assert!(!script_path.exists());
    }
}
