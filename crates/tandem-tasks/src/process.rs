//! External process lifecycle
//!
//! [`CommandTask`] runs one program per package, optionally inside a
//! [`ManifestGuard`]. The child is killed when the scheduler cancels the
//! task's kill token or when [`ExitHooks::terminate_all`] fires, and the
//! manifest is restored only after the child has exited.

use std::collections::{HashMap, HashSet};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

use tandem_core::Package;
use tandem_npm::ManifestGuard;

use crate::reporter::{TaskEvent, TaskReporter};
use crate::task::{PackageTask, TaskOutcome};

/// How long a terminated child gets before it is killed outright
#[cfg(unix)]
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How long output is still read once the child has exited
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Registry of live child processes, used to tear them all down at exit
#[derive(Debug, Clone, Default)]
pub struct ExitHooks {
    inner: Arc<HooksInner>,
}

#[derive(Debug, Default)]
struct HooksInner {
    root: CancellationToken,
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, CancellationToken>>,
}

impl ExitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live child. Fires immediately if teardown already happened.
    pub fn register(&self) -> ExitHook {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.root.child_token();
        self.inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, token.clone());
        ExitHook {
            id,
            token,
            hooks: self.inner.clone(),
        }
    }

    /// Fire every registered hook, now and for later registrations
    pub fn terminate_all(&self) {
        let live = self.len();
        if live > 0 {
            debug!(live, "terminating child processes");
        }
        self.inner.root.cancel();
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration of one child; unregisters on drop
#[derive(Debug)]
pub struct ExitHook {
    id: u64,
    token: CancellationToken,
    hooks: Arc<HooksInner>,
}

impl ExitHook {
    /// Completes when teardown was requested
    pub fn fired(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

impl Drop for ExitHook {
    fn drop(&mut self) {
        self.hooks
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Runs an external program in each package directory
pub struct CommandTask {
    program: String,
    args: Vec<String>,
    guard_manifest: bool,
    local_names: Arc<HashSet<String>>,
    hooks: ExitHooks,
    reporter: Arc<dyn TaskReporter>,
}

impl CommandTask {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        hooks: ExitHooks,
        reporter: Arc<dyn TaskReporter>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            guard_manifest: false,
            local_names: Arc::new(HashSet::new()),
            hooks,
            reporter,
        }
    }

    /// Hide dependencies on `local_names` from the program while it runs
    pub fn with_manifest_guard(mut self, local_names: Arc<HashSet<String>>) -> Self {
        self.guard_manifest = true;
        self.local_names = local_names;
        self
    }

    /// Program and arguments joined by spaces
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn spawn_and_wait(
        &self,
        package: &Package,
        kill: &CancellationToken,
    ) -> std::io::Result<ExitStatus> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&package.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group; terminate() signals the whole group
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let hook = self.hooks.register();
        debug!(package = %package.name, pid = ?child.id(), "child spawned");

        let mut stdout = tokio::spawn(forward_lines(
            child.stdout.take(),
            package.name.clone(),
            false,
            self.reporter.clone(),
        ));
        let mut stderr = tokio::spawn(forward_lines(
            child.stderr.take(),
            package.name.clone(),
            true,
            self.reporter.clone(),
        ));

        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill.cancelled() => terminate(&mut child, &package.name).await,
            _ = hook.fired() => terminate(&mut child, &package.name).await,
        };
        drop(hook);

        // Leftover descendants may hold the pipes open past the child's exit
        let drained = tokio::time::timeout(OUTPUT_GRACE, async {
            let _ = tokio::join!(&mut stdout, &mut stderr);
        })
        .await;
        if drained.is_err() {
            debug!(package = %package.name, "output still open after exit, detaching");
            stdout.abort();
            stderr.abort();
        }
        status
    }
}

#[async_trait]
impl PackageTask for CommandTask {
    fn describe(&self) -> String {
        self.command_line()
    }

    async fn run(&self, package: &Package, kill: CancellationToken) -> TaskOutcome {
        let guard = if self.guard_manifest {
            match ManifestGuard::mangle(&package.manifest_path, &self.local_names) {
                Ok(guard) => Some(guard),
                Err(e) => return TaskOutcome::Failure(e.to_string()),
            }
        } else {
            None
        };

        let status = self.spawn_and_wait(package, &kill).await;
        let restored = match guard {
            Some(guard) => guard.restore(),
            None => Ok(()),
        };

        match (status, restored) {
            (Ok(status), Ok(())) if status.success() => TaskOutcome::Success,
            (Ok(status), Ok(())) => TaskOutcome::Failure(describe_exit(status)),
            (Ok(_), Err(e)) => TaskOutcome::Failure(e.to_string()),
            (Err(e), Ok(())) => {
                TaskOutcome::Failure(format!("failed to run {}: {}", self.program, e))
            }
            (Err(e), Err(restore)) => TaskOutcome::Failure(format!(
                "failed to run {}: {}; {}",
                self.program, e, restore
            )),
        }
    }
}

/// Signal the child's process group, escalating to a hard kill after [`KILL_GRACE`]
#[cfg(unix)]
async fn terminate(child: &mut Child, package: &str) -> std::io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        return child.wait().await;
    };
    debug!(%package, pid, "terminating process group");
    signal_group(pid, libc::SIGTERM, package);

    let status = match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(%package, pid, "child ignored SIGTERM, killing");
            signal_group(pid, libc::SIGKILL, package);
            child.wait().await
        }
    };
    // Descendants that outlived the group leader
    signal_group(pid, libc::SIGKILL, package);
    status
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, package: &str) -> std::io::Result<ExitStatus> {
    debug!(%package, "killing child");
    if let Err(e) = child.start_kill() {
        warn!(%package, error = %e, "failed to signal child");
    }
    child.wait().await
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int, package: &str) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this child
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(%package, pgid, signal, error = %err, "failed to signal process group");
        }
    }
}

/// Forward each output line as a [`TaskEvent::Output`].
///
/// Lines are split on `\n` and decoded lossily, so invalid UTF-8 never ends
/// the stream.
async fn forward_lines<R>(
    reader: Option<R>,
    package: String,
    is_stderr: bool,
    reporter: Arc<dyn TaskReporter>,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).split(b'\n');
    loop {
        match lines.next_segment().await {
            Ok(Some(mut bytes)) => {
                if bytes.last() == Some(&b'\r') {
                    bytes.pop();
                }
                reporter.report(&TaskEvent::Output {
                    package: package.clone(),
                    line: String::from_utf8_lossy(&bytes).into_owned(),
                    is_stderr,
                });
            }
            Ok(None) => break,
            Err(e) => {
                debug!(%package, error = %e, "stopped reading child output");
                break;
            }
        }
    }
}

fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {}", signal);
        }
    }
    "terminated abnormally".to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn package_in(temp: &TempDir, manifest: &str) -> Package {
        std::fs::write(temp.path().join("package.json"), manifest).unwrap();
        Package::new("a", temp.path())
    }

    fn sh(script: &str, hooks: &ExitHooks, reporter: Arc<CollectingReporter>) -> CommandTask {
        CommandTask::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            hooks.clone(),
            reporter,
        )
    }

    fn dependency_keys(path: &Path) -> Vec<String> {
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        value["dependencies"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_exit_status_maps_to_outcome() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a"}"#);
        let reporter = Arc::new(CollectingReporter::default());
        let hooks = ExitHooks::new();

        let ok = sh("echo hello", &hooks, reporter.clone());
        assert_eq!(
            ok.run(&package, CancellationToken::new()).await,
            TaskOutcome::Success
        );
        assert!(reporter.events().contains(&TaskEvent::Output {
            package: "a".to_string(),
            line: "hello".to_string(),
            is_stderr: false,
        }));

        let failing = sh("echo oops >&2; exit 3", &hooks, reporter.clone());
        assert_eq!(
            failing.run(&package, CancellationToken::new()).await,
            TaskOutcome::Failure("exited with code 3".to_string())
        );
        assert!(reporter.events().iter().any(|e| matches!(
            e,
            TaskEvent::Output { is_stderr: true, line, .. } if line == "oops"
        )));
        assert!(hooks.is_empty());
    }

    #[tokio::test]
    async fn test_manifest_hidden_during_run_and_restored() {
        let temp = TempDir::new().unwrap();
        let package = package_in(
            &temp,
            r#"{"name": "a", "dependencies": {"zlib": "1.0.0", "b": "1.0.0"}}"#,
        );
        let reporter = Arc::new(CollectingReporter::default());
        let names: Arc<HashSet<String>> = Arc::new(["a", "b"].iter().map(|s| s.to_string()).collect());

        let task = sh("cat package.json", &ExitHooks::new(), reporter.clone())
            .with_manifest_guard(names);
        assert!(task.run(&package, CancellationToken::new()).await.is_success());

        let printed: String = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Output { line, .. } => Some(line),
                _ => None,
            })
            .collect();
        assert!(printed.contains("zlib"));
        assert!(!printed.contains("\"b\""));
        assert_eq!(dependency_keys(&package.manifest_path), vec!["b", "zlib"]);
    }

    #[tokio::test]
    async fn test_kill_token_stops_child_and_restores_manifest() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a", "dependencies": {"b": "1.0.0"}}"#);
        let names: Arc<HashSet<String>> = Arc::new(std::iter::once("b".to_string()).collect());
        let task = CommandTask::new(
            "sleep",
            vec!["30".to_string()],
            ExitHooks::new(),
            Arc::new(CollectingReporter::default()),
        )
        .with_manifest_guard(names);

        let kill = CancellationToken::new();
        let trigger = kill.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(10), task.run(&package, kill))
            .await
            .unwrap();
        match outcome {
            TaskOutcome::Failure(detail) => assert!(detail.contains("signal")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(dependency_keys(&package.manifest_path), vec!["b"]);
    }

    #[tokio::test]
    async fn test_kill_reaches_grandchildren() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a", "dependencies": {"b": "1.0.0"}}"#);
        let names: Arc<HashSet<String>> = Arc::new(std::iter::once("b".to_string()).collect());
        let task = sh(
            "sleep 30; true",
            &ExitHooks::new(),
            Arc::new(CollectingReporter::default()),
        )
        .with_manifest_guard(names);

        let kill = CancellationToken::new();
        let trigger = kill.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(10), task.run(&package, kill))
            .await
            .unwrap();
        assert!(!outcome.is_success());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(dependency_keys(&package.manifest_path), vec!["b"]);
    }

    #[tokio::test]
    async fn test_background_output_holder_does_not_block_exit() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a"}"#);
        let reporter = Arc::new(CollectingReporter::default());
        let task = sh("sleep 5 & echo done", &ExitHooks::new(), reporter.clone());

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            task.run(&package, CancellationToken::new()),
        )
        .await
        .unwrap();
        assert_eq!(outcome, TaskOutcome::Success);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(reporter.events().contains(&TaskEvent::Output {
            package: "a".to_string(),
            line: "done".to_string(),
            is_stderr: false,
        }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_keeps_streaming() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a"}"#);
        let reporter = Arc::new(CollectingReporter::default());
        let task = sh(
            r"printf 'bad \377\n'; echo after; seq 1 20000",
            &ExitHooks::new(),
            reporter.clone(),
        );

        assert_eq!(
            task.run(&package, CancellationToken::new()).await,
            TaskOutcome::Success
        );
        let lines: Vec<String> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Output { line, .. } => Some(line),
                _ => None,
            })
            .collect();
        assert_eq!(lines.len(), 20002);
        assert_eq!(lines[0], "bad \u{fffd}");
        assert_eq!(lines[1], "after");
        assert_eq!(lines.last().map(String::as_str), Some("20000"));
    }

    #[tokio::test]
    async fn test_terminate_all_kills_registered_children() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a"}"#);
        let hooks = ExitHooks::new();
        let task = CommandTask::new(
            "sleep",
            vec!["30".to_string()],
            hooks.clone(),
            Arc::new(CollectingReporter::default()),
        );

        let teardown = hooks.clone();
        tokio::spawn(async move {
            while teardown.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            teardown.terminate_all();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            task.run(&package, CancellationToken::new()),
        )
        .await
        .unwrap();
        assert!(!outcome.is_success());
        assert!(hooks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_and_bad_manifest_fail() {
        let temp = TempDir::new().unwrap();
        let package = package_in(&temp, r#"{"name": "a"}"#);
        let reporter = Arc::new(CollectingReporter::default());

        let missing = CommandTask::new(
            "definitely-not-a-real-program",
            Vec::new(),
            ExitHooks::new(),
            reporter.clone(),
        );
        assert!(!missing.run(&package, CancellationToken::new()).await.is_success());

        std::fs::write(&package.manifest_path, "not json").unwrap();
        let guarded = sh("exit 0", &ExitHooks::new(), reporter)
            .with_manifest_guard(Arc::new(HashSet::new()));
        assert!(!guarded.run(&package, CancellationToken::new()).await.is_success());
    }

    #[test]
    fn test_registrations_after_teardown_fire_immediately() {
        let hooks = ExitHooks::new();
        let first = hooks.register();
        assert_eq!(hooks.len(), 1);

        hooks.terminate_all();
        let late = hooks.register();
        assert!(first.token.is_cancelled());
        assert!(late.token.is_cancelled());

        drop(first);
        drop(late);
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_command_line() {
        let task = CommandTask::new(
            "npm",
            vec!["run".to_string(), "build".to_string()],
            ExitHooks::new(),
            Arc::new(CollectingReporter::default()),
        );
        assert_eq!(task.command_line(), "npm run build");
        assert_eq!(task.describe(), "npm run build");
    }
}
