//! Deploy configuration — optional YAML file with full defaults.
//!
//! Every field has a default matching the Doky bot's layout, so a bare
//! `doky-deploy provision` on a fresh host needs no config file at all. The
//! archive URL and checksum live here (not as code literals) so tests can
//! point the native-library step at a local fixture.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file looked up in the invocation directory.
pub const DEFAULT_CONFIG_FILE: &str = "doky-deploy.yaml";

/// Source archive for the native TA-Lib dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeLibSpec {
    /// Gzipped source tarball URL.
    pub url: String,
    /// Expected SHA-256 of the archive (hex).
    pub sha256: String,
    /// Parallel `make` jobs.
    pub make_jobs: u32,
}

impl Default for NativeLibSpec {
    fn default() -> Self {
        Self {
            url: "https://prdownloads.sourceforge.net/ta-lib/ta-lib-0.4.0-src.tar.gz".to_owned(),
            sha256: "9ff41efcb1c011a4b4b6dfc91610b06e39b1d7973ed5d4dee55029a0ac4dc651".to_owned(),
            make_jobs: 2,
        }
    }
}

/// Full deploy configuration for one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Native numerical library built from source during provisioning.
    pub native_lib: NativeLibSpec,
    /// Root of the isolated Python environment.
    pub venv_dir: PathBuf,
    /// Dependency manifest, one specifier per line (pip format).
    pub requirements: PathBuf,
    /// Data directories the bot expects before first start.
    pub directories: Vec<PathBuf>,
    /// Files that must carry the execute bit.
    pub executables: Vec<PathBuf>,
    /// Baseline OS toolchain installed via apt.
    pub base_packages: Vec<String>,
    /// Authored systemd unit descriptor.
    pub unit_file: PathBuf,
    /// Init-system unit directory the descriptor is copied into.
    pub unit_dir: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            native_lib: NativeLibSpec::default(),
            venv_dir: PathBuf::from("venv"),
            requirements: PathBuf::from("requirements.txt"),
            directories: vec![
                PathBuf::from("logs"),
                PathBuf::from("data/historical"),
                PathBuf::from("learning_memory"),
            ],
            executables: vec![PathBuf::from("main.py")],
            base_packages: [
                "python3",
                "python3-pip",
                "python3-venv",
                "build-essential",
                "wget",
            ]
            .map(String::from)
            .to_vec(),
            unit_file: PathBuf::from("doky_daemon.service"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
        }
    }
}

impl DeployConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist and parse; with no path, the default
    /// file is used when present, otherwise built-in defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    /// The unit name systemd knows the bot by (file name of the descriptor).
    ///
    /// # Errors
    ///
    /// Returns an error if the configured unit file path has no valid
    /// UTF-8 file name.
    pub fn unit_name(&self) -> Result<&str> {
        self.unit_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unit file path has no valid file name: {}",
                    self.unit_file.display()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bot_layout() {
        let cfg = DeployConfig::default();
        assert_eq!(cfg.venv_dir, PathBuf::from("venv"));
        assert_eq!(cfg.unit_name().expect("unit name"), "doky_daemon.service");
        assert_eq!(
            cfg.directories,
            vec![
                PathBuf::from("logs"),
                PathBuf::from("data/historical"),
                PathBuf::from("learning_memory"),
            ]
        );
        assert!(cfg.base_packages.iter().any(|p| p == "build-essential"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.yaml");
        assert!(DeployConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "venv_dir: /opt/doky/venv\n").expect("write cfg");
        let cfg = DeployConfig::load(Some(&path)).expect("load");
        assert_eq!(cfg.venv_dir, PathBuf::from("/opt/doky/venv"));
        assert_eq!(cfg.requirements, PathBuf::from("requirements.txt"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "directories: {not: [a, list}").expect("write cfg");
        assert!(DeployConfig::load(Some(&path)).is_err());
    }
}
