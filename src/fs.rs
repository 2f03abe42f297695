//! Local filesystem steps: directory layout, execute bits, unit install.

use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, ServiceError};

fn fs_err(step: impl Into<String>, detail: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::Filesystem {
        step: step.into(),
        detail: detail.to_string(),
    }
}

/// Create every required directory. Idempotent: pre-existing directories and
/// their contents are left untouched.
pub fn ensure_directories(dirs: &[PathBuf]) -> Result<(), ProvisionError> {
    for dir in dirs {
        std::fs::create_dir_all(dir)
            .map_err(|e| fs_err(format!("create {}", dir.display()), e))?;
    }
    Ok(())
}

/// Set mode 0755 on every listed file. Idempotent: re-setting the bit is a
/// no-op.
pub fn mark_executable(files: &[PathBuf]) -> Result<(), ProvisionError> {
    for file in files {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| fs_err(format!("chmod {}", file.display()), e))?;
        }
        #[cfg(not(unix))]
        let _ = file;
    }
    Ok(())
}

/// Copy the authored unit descriptor into the init system's unit directory,
/// overwriting any prior version unconditionally (last write wins).
///
/// # Errors
///
/// Returns a registration error when the source is missing or the copy
/// fails; callers abort before any systemctl call in that case.
pub fn install_unit(source: &Path, unit_dir: &Path) -> Result<PathBuf, ServiceError> {
    let unit = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());
    let registration = |detail: String| ServiceError::Registration {
        unit: unit.clone(),
        detail,
    };

    if !source.is_file() {
        return Err(registration(format!(
            "descriptor {} does not exist",
            source.display()
        )));
    }
    let dest = unit_dir.join(&unit);
    std::fs::copy(source, &dest)
        .map_err(|e| registration(format!("copying to {}: {e}", dest.display())))?;
    Ok(dest)
}
