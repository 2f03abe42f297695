//! systemctl adapter and unit state model.

use std::process::{ExitStatus, Output};

use anyhow::{Context, Result};

use crate::command_runner::CommandRunner;

/// Unit state as reported back by the init system. The init system owns the
/// real state machine; this crate only issues transition requests and reads
/// the result for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No unit file known to systemd.
    Unregistered,
    /// Unit file present but not enabled for boot.
    Disabled,
    /// Enabled for boot, currently stopped.
    EnabledStopped,
    /// Enabled for boot and running.
    EnabledRunning,
    /// Unit entered the failed state.
    Failed,
}

impl ServiceState {
    /// Operator-facing description.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Unregistered => "not registered",
            Self::Disabled => "registered (disabled)",
            Self::EnabledStopped => "enabled (stopped)",
            Self::EnabledRunning => "enabled (running)",
            Self::Failed => "failed",
        }
    }
}

/// Init-system operations used by deploy and status.
#[allow(async_fn_in_trait)]
pub trait InitSystem {
    /// Reload unit definitions; required before a newly copied unit file
    /// is recognized.
    async fn daemon_reload(&self) -> Result<Output>;

    /// Enable the unit to start on boot.
    async fn enable(&self, unit: &str) -> Result<Output>;

    /// Start the unit now.
    async fn start(&self, unit: &str) -> Result<Output>;

    /// `systemctl status` with inherited stdio. A read, not a gate: callers
    /// must not let its exit code fail the run.
    async fn status(&self, unit: &str) -> Result<ExitStatus>;

    /// Machine-readable state properties for the unit.
    async fn show(&self, unit: &str) -> Result<Output>;
}

/// Production adapter over `systemctl`.
pub struct Systemctl<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> Systemctl<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> InitSystem for Systemctl<R> {
    async fn daemon_reload(&self) -> Result<Output> {
        self.runner
            .run("systemctl", &["daemon-reload"])
            .await
            .context("failed to run systemctl daemon-reload")
    }

    async fn enable(&self, unit: &str) -> Result<Output> {
        self.runner
            .run("systemctl", &["enable", unit])
            .await
            .context("failed to run systemctl enable")
    }

    async fn start(&self, unit: &str) -> Result<Output> {
        self.runner
            .run("systemctl", &["start", unit])
            .await
            .context("failed to run systemctl start")
    }

    async fn status(&self, unit: &str) -> Result<ExitStatus> {
        self.runner
            .run_status("systemctl", &["status", unit, "--no-pager"])
            .await
            .context("failed to run systemctl status")
    }

    async fn show(&self, unit: &str) -> Result<Output> {
        self.runner
            .run(
                "systemctl",
                &[
                    "show",
                    unit,
                    "--property=LoadState,ActiveState,UnitFileState",
                    "--no-pager",
                ],
            )
            .await
            .context("failed to run systemctl show")
    }
}

/// Read the unit's current state.
///
/// A `show` that runs but exits non-zero means systemctl knows no such unit
/// and maps to `Unregistered`; failing to execute systemctl at all is a
/// broken host, not an absent unit, and propagates as an error.
///
/// # Errors
///
/// Returns an error if `systemctl show` cannot be spawned or waited on.
pub async fn state(init: &impl InitSystem, unit: &str) -> Result<ServiceState> {
    let out = init.show(unit).await?;
    if out.status.success() {
        Ok(parse_state(&String::from_utf8_lossy(&out.stdout)))
    } else {
        Ok(ServiceState::Unregistered)
    }
}

/// Parse `systemctl show -p LoadState,ActiveState,UnitFileState` output.
#[must_use]
pub fn parse_state(show_output: &str) -> ServiceState {
    let mut load = "";
    let mut active = "";
    let mut unit_file = "";
    for line in show_output.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key {
                "LoadState" => load = value.trim(),
                "ActiveState" => active = value.trim(),
                "UnitFileState" => unit_file = value.trim(),
                _ => {}
            }
        }
    }

    if load == "not-found" || load.is_empty() {
        return ServiceState::Unregistered;
    }
    if active == "failed" {
        return ServiceState::Failed;
    }
    match (unit_file, active) {
        ("enabled" | "enabled-runtime", "active" | "activating") => ServiceState::EnabledRunning,
        ("enabled" | "enabled-runtime", _) => ServiceState::EnabledStopped,
        _ => ServiceState::Disabled,
    }
}
