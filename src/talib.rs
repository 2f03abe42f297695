//! TA-Lib acquisition and source build.
//!
//! The archive is fetched into a `tempfile::TempDir`, verified against the
//! pinned checksum, extracted, and built with `./configure && make &&
//! make install`. The working tree lives only as long as the `TempDir`
//! guard, so it is removed on every exit path — but only after a build
//! failure has already been surfaced with its captured stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};

use crate::command_runner::{CommandRunner, failure_detail};
use crate::config::NativeLibSpec;
use crate::error::ProvisionError;

/// Bounded retry for the archive download; transient network failures are
/// the one spot worth retrying.
const DOWNLOAD_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Upper bound on the accepted archive size (the real tarball is ~1.3 MB).
const MAX_ARCHIVE_BYTES: u64 = 64 * 1024 * 1024;

/// Builds and installs the native numerical library system-wide.
#[allow(async_fn_in_trait)]
pub trait NativeLibInstaller {
    /// Download, verify, build, and install the library described by `spec`.
    async fn install(&self, spec: &NativeLibSpec) -> Result<(), ProvisionError>;
}

/// Production installer routed through a `CommandRunner`.
pub struct TalibInstaller<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> TalibInstaller<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    async fn step(
        &self,
        dir: &Path,
        program: &str,
        args: &[&str],
        name: &str,
    ) -> Result<(), ProvisionError> {
        let out = self
            .runner
            .run_in(dir, program, args)
            .await
            .map_err(|e| build_err(name, format!("{e:#}")))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(build_err(name, failure_detail(&out)))
        }
    }

    pub(crate) async fn build_from_source(
        &self,
        src_dir: &Path,
        make_jobs: u32,
    ) -> Result<(), ProvisionError> {
        let jobs = make_jobs.to_string();
        self.step(src_dir, "./configure", &["--prefix=/usr"], "configure")
            .await?;
        self.step(src_dir, "make", &["-j", &jobs], "make").await?;
        self.step(src_dir, "make", &["install"], "make install")
            .await?;
        self.step(src_dir, "ldconfig", &[], "ldconfig").await
    }
}

impl<R: CommandRunner> NativeLibInstaller for TalibInstaller<R> {
    async fn install(&self, spec: &NativeLibSpec) -> Result<(), ProvisionError> {
        let work = tempfile::tempdir().map_err(|e| build_err("workdir", e.to_string()))?;

        let url = spec.url.clone();
        let bytes = tokio::task::spawn_blocking(move || fetch_with_retry(&url))
            .await
            .map_err(|e| build_err("download", format!("task panicked: {e}")))?
            .map_err(|e| build_err("download", format!("{e:#}")))?;

        verify_checksum(&bytes, &spec.sha256)?;

        let dest = work.path().to_path_buf();
        let src_dir = tokio::task::spawn_blocking(move || extract_archive(&bytes, &dest))
            .await
            .map_err(|e| build_err("extract", format!("task panicked: {e}")))?
            .map_err(|e| build_err("extract", format!("{e:#}")))?;

        self.build_from_source(&src_dir, spec.make_jobs).await
    }
}

fn build_err(step: impl Into<String>, detail: impl Into<String>) -> ProvisionError {
    ProvisionError::Build {
        step: step.into(),
        detail: detail.into(),
    }
}

/// Fetch the archive, retrying transient failures a bounded number of times.
pub(crate) fn fetch_with_retry(url: &str) -> Result<Vec<u8>> {
    retry_fetch(url, RETRY_DELAY, fetch)
}

/// Retry loop over an injected fetch so the bound is testable without a
/// network.
fn retry_fetch(
    url: &str,
    delay: Duration,
    mut fetch_once: impl FnMut(&str) -> Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    let mut attempt = 1;
    loop {
        match fetch_once(url) {
            Ok(bytes) => return Ok(bytes),
            Err(_) if attempt < DOWNLOAD_ATTEMPTS => {
                attempt += 1;
                std::thread::sleep(delay);
            }
            Err(e) => {
                return Err(e.context(format!(
                    "download failed after {DOWNLOAD_ATTEMPTS} attempts: {url}"
                )));
            }
        }
    }
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetching {url}"))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_ARCHIVE_BYTES + 1)
        .read_to_end(&mut bytes)
        .context("reading archive body")?;
    cap_checked(bytes)
}

/// Reject an archive past the size cap outright; truncating it would only
/// resurface later as a misleading checksum mismatch.
fn cap_checked(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.len() as u64 > MAX_ARCHIVE_BYTES {
        anyhow::bail!(
            "archive exceeds the {} MiB size cap",
            MAX_ARCHIVE_BYTES / (1024 * 1024)
        );
    }
    Ok(bytes)
}

/// Verify the archive against the pinned SHA-256.
pub(crate) fn verify_checksum(bytes: &[u8], expected: &str) -> Result<(), ProvisionError> {
    let actual = hex_encode(&Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(build_err(
            "checksum",
            format!("expected {expected}, got {actual}"),
        ))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Unpack the gzipped tarball into `dest` and return the unpacked source
/// directory (the archive carries a single top-level directory).
pub(crate) fn extract_archive(bytes: &[u8], dest: &Path) -> Result<PathBuf> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive
        .unpack(dest)
        .with_context(|| format!("extracting archive into {}", dest.display()))?;

    for entry in std::fs::read_dir(dest).with_context(|| format!("reading {}", dest.display()))? {
        let path = entry.context("reading archive entry")?.path();
        if path.is_dir() {
            return Ok(path);
        }
    }
    anyhow::bail!("archive contained no source directory")
}
