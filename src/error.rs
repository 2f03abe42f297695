//! Typed deploy error enums.
//!
//! Each variant carries the identity of the failing step so the single
//! terminal failure message names the stage that aborted the run. All types
//! implement `thiserror::Error` and convert to `anyhow::Error` via `?`.

use thiserror::Error;

// ── Provisioning errors ──────────────────────────────────────────────────────

/// Errors raised while bringing a host to a provisioned state.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Package manager failed during '{step}': {detail}")]
    PackageManager { step: &'static str, detail: String },

    #[error("TA-Lib build failed during '{step}': {detail}")]
    Build { step: String, detail: String },

    #[error("Could not create runtime environment at {path}: {detail}")]
    EnvironmentCreation { path: String, detail: String },

    #[error("Dependency installation failed during '{step}': {detail}")]
    DependencyResolution { step: &'static str, detail: String },

    #[error("Filesystem step '{step}' failed: {detail}")]
    Filesystem { step: String, detail: String },
}

// ── Service lifecycle errors ─────────────────────────────────────────────────

/// Errors raised while registering or controlling the managed unit.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Could not register unit '{unit}': {detail}")]
    Registration { unit: String, detail: String },

    #[error("Could not {action} unit '{unit}': {detail}")]
    Control {
        action: &'static str,
        unit: String,
        detail: String,
    },
}
