//! Host provisioning sequence.
//!
//! An ordered list of fallible steps; the first failure aborts the rest and
//! surfaces the failing stage. There is no rollback: a failure at step *k*
//! leaves steps `1..k-1` applied, and re-running is the recovery path (every
//! step tolerates re-invocation). Host state is never read back; idempotence
//! relies on the underlying tools.

use std::future::Future;
use std::process::Output;

use anyhow::Result;

use crate::apt::PackageManager;
use crate::command_runner::failure_detail;
use crate::config::DeployConfig;
use crate::error::ProvisionError;
use crate::output::OutputContext;
use crate::talib::NativeLibInstaller;
use crate::venv::RuntimeEnv;

/// Map a finished command to a typed step error on spawn failure or
/// non-zero exit.
fn check(
    result: Result<Output>,
    mk: impl Fn(String) -> ProvisionError,
) -> Result<(), ProvisionError> {
    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(mk(failure_detail(&out))),
        Err(e) => Err(mk(format!("{e:#}"))),
    }
}

/// Drive one step with a spinner (TTY) or a plain checkmark line.
async fn run_step<T>(
    ctx: &OutputContext,
    msg: &str,
    fut: impl Future<Output = Result<T, ProvisionError>>,
) -> Result<T, ProvisionError> {
    let pb = ctx.show_progress().then(|| crate::output::spinner(msg));
    let result = fut.await;
    match (&result, pb) {
        (Ok(_), Some(pb)) => crate::output::finish_ok(&pb, msg),
        (Ok(_), None) => ctx.success(msg),
        (Err(_), Some(pb)) => pb.finish_and_clear(),
        (Err(_), None) => {}
    }
    result
}

/// Bring the host to a state where the bot's runtime prerequisites are
/// satisfied.
///
/// # Errors
///
/// Returns the first failing step's error; later steps do not execute.
pub async fn run(
    ctx: &OutputContext,
    cfg: &DeployConfig,
    pkg: &impl PackageManager,
    native: &impl NativeLibInstaller,
    env: &impl RuntimeEnv,
) -> Result<()> {
    run_step(ctx, "Refreshing package index", async {
        check(pkg.update().await, |d| ProvisionError::PackageManager {
            step: "apt-get update",
            detail: d,
        })
    })
    .await?;

    run_step(ctx, "Upgrading installed packages", async {
        check(pkg.upgrade().await, |d| ProvisionError::PackageManager {
            step: "apt-get upgrade",
            detail: d,
        })
    })
    .await?;

    run_step(ctx, "Installing base toolchain", async {
        check(
            pkg.install(&cfg.base_packages).await,
            |d| ProvisionError::PackageManager {
                step: "apt-get install",
                detail: d,
            },
        )
    })
    .await?;

    run_step(ctx, "Building TA-Lib from source", native.install(&cfg.native_lib)).await?;

    run_step(ctx, "Creating runtime environment", async {
        check(env.create().await, |d| ProvisionError::EnvironmentCreation {
            path: cfg.venv_dir.display().to_string(),
            detail: d,
        })
    })
    .await?;

    run_step(ctx, "Upgrading pip", async {
        check(
            env.pip_upgrade().await,
            |d| ProvisionError::DependencyResolution {
                step: "pip upgrade",
                detail: d,
            },
        )
    })
    .await?;

    run_step(ctx, "Installing Python dependencies", async {
        check(
            env.pip_install(&cfg.requirements).await,
            |d| ProvisionError::DependencyResolution {
                step: "pip install",
                detail: d,
            },
        )
    })
    .await?;

    run_step(ctx, "Creating data directories", async {
        crate::fs::ensure_directories(&cfg.directories)
    })
    .await?;

    run_step(ctx, "Marking entry points executable", async {
        crate::fs::mark_executable(&cfg.executables)
    })
    .await?;

    if !ctx.quiet {
        println!();
        ctx.success("Host provisioned.");
        ctx.kv("Next", "doky-deploy deploy");
    }
    Ok(())
}
