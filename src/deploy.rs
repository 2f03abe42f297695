//! Service registration and lifecycle sequence.
//!
//! Registers the authored unit descriptor with systemd and brings the bot
//! to a running, boot-persistent state. Steps 1-4 are fatal in order; the
//! final status display is a read, never a gate.

use std::process::Output;

use anyhow::Result;

use crate::command_runner::failure_detail;
use crate::config::DeployConfig;
use crate::error::ServiceError;
use crate::output::OutputContext;
use crate::systemd::{self, InitSystem};

fn check(
    result: Result<Output>,
    mk: impl Fn(String) -> ServiceError,
) -> Result<(), ServiceError> {
    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(mk(failure_detail(&out))),
        Err(e) => Err(mk(format!("{e:#}"))),
    }
}

/// Register, enable, and start the bot's unit, then display its status.
///
/// # Errors
///
/// Returns an error if the descriptor copy, daemon reload, enable, or start
/// fails; later steps do not execute. The status display's exit code does
/// not affect the result.
pub async fn run(ctx: &OutputContext, cfg: &DeployConfig, init: &impl InitSystem) -> Result<()> {
    let unit = cfg.unit_name()?.to_owned();

    let dest = crate::fs::install_unit(&cfg.unit_file, &cfg.unit_dir)?;
    ctx.success(&format!("Installed {}", dest.display()));

    check(init.daemon_reload().await, |d| ServiceError::Registration {
        unit: unit.clone(),
        detail: format!("daemon-reload: {d}"),
    })?;

    check(init.enable(&unit).await, |d| ServiceError::Control {
        action: "enable",
        unit: unit.clone(),
        detail: d,
    })?;

    check(init.start(&unit).await, |d| ServiceError::Control {
        action: "start",
        unit: unit.clone(),
        detail: d,
    })?;

    ctx.success(&format!("{unit} enabled and started"));

    // Status is informational; a non-running unit here does not change the
    // exit code.
    let _ = init.status(&unit).await;
    Ok(())
}

/// Report the unit's current state without mutating anything.
///
/// # Errors
///
/// Returns an error if the configured unit file name is invalid or the
/// state query cannot execute systemctl.
pub async fn status(ctx: &OutputContext, cfg: &DeployConfig, init: &impl InitSystem) -> Result<()> {
    let unit = cfg.unit_name()?;
    let state = systemd::state(init, unit).await?;
    ctx.kv("Unit", unit);
    ctx.kv("State", state.describe());
    Ok(())
}
