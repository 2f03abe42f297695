//! Generic external-command execution with timeout and guaranteed kill.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

/// Default timeout for systemctl-class commands.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for package/build-class commands (apt upgrades and a full TA-Lib
/// compile can legitimately take many minutes on a small VPS).
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Runs external tools (apt-get, make, systemctl, ...).
///
/// The production implementation uses tokio; test doubles return canned
/// results without spawning processes.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a command to completion with captured output.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Run a command with its working directory set to `dir`.
    async fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<Output>;

    /// Run a command with inherited stdio (pass-through display).
    /// No timeout — used for `systemctl status` style reads.
    async fn run_status(&self, program: &str, args: &[&str]) -> Result<std::process::ExitStatus>;
}

/// Extract a one-line failure detail from a finished command's stderr,
/// falling back to stdout, then to the exit status.
#[must_use]
pub fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    match text.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => line.trim().to_owned(),
        None => format!("exited with {}", output.status),
    }
}

/// Production `CommandRunner` backed by tokio process execution.
///
/// A timeout around `.output().await` alone does not kill the child when it
/// fires — the future is dropped but the OS process keeps running. This
/// implementation uses `tokio::select!` with an explicit `child.kill()` so
/// the process is always terminated.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn execute(&self, mut cmd: tokio::process::Command, program: &str) -> Result<Output> {
        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        // Read stdout/stderr concurrently with wait() to avoid pipe deadlock:
        // a child writing more than the OS pipe buffer blocks on write, and
        // a bare wait() would then never resolve.
        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", self.timeout.as_secs())
            }
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        self.execute(cmd, program).await
    }

    async fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<Output> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args).current_dir(dir);
        self.execute(cmd, program).await
    }

    async fn run_status(&self, program: &str, args: &[&str]) -> Result<std::process::ExitStatus> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared recording mock so each test module doesn't re-define the same
    //! boilerplate.

    use std::os::unix::process::ExitStatusExt;
    use std::path::Path;
    use std::process::{ExitStatus, Output};
    use std::sync::{Arc, Mutex};

    use anyhow::Result;

    use super::CommandRunner;

    pub fn ok_output(stdout: &[u8]) -> Output {
        Output {
            status: ExitStatus::from_raw(0),
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
        }
    }

    pub fn err_output(stderr: &[u8]) -> Output {
        Output {
            status: ExitStatus::from_raw(1 << 8),
            stdout: Vec::new(),
            stderr: stderr.to_vec(),
        }
    }

    /// A `CommandRunner` that records every invocation and fails any call
    /// whose rendered command line contains `fail_when`.
    #[derive(Clone, Default)]
    pub struct RecordingRunner {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub fail_when: Option<&'static str>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(marker: &'static str) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_when: Some(marker),
            }
        }

        pub fn recorded(&self) -> Vec<String> {
            self.calls.lock().expect("mutex poisoned").clone()
        }

        fn record(&self, program: &str, args: &[&str]) -> String {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls
                .lock()
                .expect("mutex poisoned")
                .push(line.clone());
            line
        }

        fn should_fail(&self, line: &str) -> bool {
            self.fail_when.is_some_and(|m| line.contains(m))
        }
    }

    impl CommandRunner for RecordingRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
            let line = self.record(program, args);
            if self.should_fail(&line) {
                Ok(err_output(b"mock failure"))
            } else {
                Ok(ok_output(b""))
            }
        }

        async fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<Output> {
            let _ = dir;
            self.run(program, args).await
        }

        async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
            let line = self.record(program, args);
            if self.should_fail(&line) {
                Ok(ExitStatus::from_raw(3 << 8))
            } else {
                Ok(ExitStatus::from_raw(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_detail_prefers_stderr() {
        let out = testing::err_output(b"E: Unable to locate package foo\n");
        assert_eq!(failure_detail(&out), "E: Unable to locate package foo");
    }

    #[test]
    fn failure_detail_falls_back_to_stdout() {
        let mut out = testing::err_output(b"");
        out.stdout = b"some stdout line\n\n".to_vec();
        assert_eq!(failure_detail(&out), "some stdout line");
    }

    #[test]
    fn failure_detail_reports_status_when_silent() {
        let out = testing::err_output(b"");
        assert!(failure_detail(&out).starts_with("exited with"));
    }

    #[tokio::test]
    async fn run_captures_output() {
        let runner = TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT);
        let out = runner.run("echo", &["hello"]).await.expect("echo runs");
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn run_in_sets_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT);
        let out = runner.run_in(dir.path(), "pwd", &[]).await.expect("pwd runs");
        let cwd = String::from_utf8_lossy(&out.stdout);
        let canonical = dir.path().canonicalize().expect("canonicalize");
        assert_eq!(Path::new(cwd.trim()), canonical);
    }

    #[tokio::test]
    async fn timed_out_command_is_killed() {
        let runner = TokioCommandRunner::new(Duration::from_millis(50));
        let err = runner
            .run("sleep", &["5"])
            .await
            .expect_err("sleep must time out");
        assert!(err.to_string().contains("timed out"));
    }
}
