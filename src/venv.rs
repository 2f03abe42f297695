//! Isolated Python environment adapter.
//!
//! Dependency installs address the environment's own `pip` by explicit path
//! instead of sourcing an activate script, so nothing depends on ambient
//! process state.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{Context, Result};

use crate::command_runner::CommandRunner;

/// Isolated runtime environment operations used by provisioning.
#[allow(async_fn_in_trait)]
pub trait RuntimeEnv {
    /// Create the environment. Safe to call when it already exists
    /// (the venv module tolerates re-invocation).
    async fn create(&self) -> Result<Output>;

    /// Upgrade the environment's own package installer.
    async fn pip_upgrade(&self) -> Result<Output>;

    /// Install the full dependency set from a manifest file.
    async fn pip_install(&self, manifest: &Path) -> Result<Output>;
}

/// Production adapter over `python3 -m venv` and `<root>/bin/pip`.
pub struct VirtualEnv<R: CommandRunner> {
    root: PathBuf,
    runner: R,
}

impl<R: CommandRunner> VirtualEnv<R> {
    #[must_use]
    pub fn new(root: PathBuf, runner: R) -> Self {
        Self { root, runner }
    }

    fn pip_path(&self) -> PathBuf {
        self.root.join("bin").join("pip")
    }
}

impl<R: CommandRunner> RuntimeEnv for VirtualEnv<R> {
    async fn create(&self) -> Result<Output> {
        let root = self.root.to_string_lossy();
        self.runner
            .run("python3", &["-m", "venv", root.as_ref()])
            .await
            .context("failed to run python3 -m venv")
    }

    async fn pip_upgrade(&self) -> Result<Output> {
        let pip = self.pip_path();
        self.runner
            .run(&pip.to_string_lossy(), &["install", "--upgrade", "pip"])
            .await
            .context("failed to upgrade pip")
    }

    async fn pip_install(&self, manifest: &Path) -> Result<Output> {
        let pip = self.pip_path();
        let manifest = manifest.to_string_lossy();
        self.runner
            .run(&pip.to_string_lossy(), &["install", "-r", manifest.as_ref()])
            .await
            .context("failed to run pip install")
    }
}
