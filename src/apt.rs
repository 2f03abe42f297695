//! apt-get adapter routed through a `CommandRunner`.

use std::process::Output;

use anyhow::{Context, Result};

use crate::command_runner::CommandRunner;

/// OS package operations used by provisioning.
#[allow(async_fn_in_trait)]
pub trait PackageManager {
    /// Refresh the package index.
    async fn update(&self) -> Result<Output>;

    /// Upgrade installed packages non-interactively.
    async fn upgrade(&self) -> Result<Output>;

    /// Install the given packages non-interactively.
    async fn install(&self, packages: &[String]) -> Result<Output>;
}

/// Production adapter over `apt-get`. Generic over `R: CommandRunner` so
/// tests can inject a recording runner without touching the package database.
pub struct Apt<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> Apt<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> PackageManager for Apt<R> {
    async fn update(&self) -> Result<Output> {
        self.runner
            .run("apt-get", &["update"])
            .await
            .context("failed to run apt-get update")
    }

    async fn upgrade(&self) -> Result<Output> {
        self.runner
            .run("apt-get", &["upgrade", "-y"])
            .await
            .context("failed to run apt-get upgrade")
    }

    async fn install(&self, packages: &[String]) -> Result<Output> {
        let mut args = vec!["install", "-y"];
        args.extend(packages.iter().map(String::as_str));
        self.runner
            .run("apt-get", &args)
            .await
            .context("failed to run apt-get install")
    }
}
