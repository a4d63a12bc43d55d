use super::make_dirs;
use crate::download::{download_file, extract_zip};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;

pub const NAME: &str = "rez";
pub const API_VERSION: u32 = 2;

const REZ_BASE_URL: &str = "https://github.com/AcademySoftwareFoundation/rez/archive/refs/tags";

/// Rez package manager, built from its GitHub source release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RezInstaller {
    pub version: u32,
    pub install_dir: PathBuf,
    #[serde(default)]
    pub dirs_to_make: Vec<PathBuf>,
    /// Python version rez is installed with, e.g. `3.9` or `3.9.13`.
    pub python_version: String,
    /// Git tag of the rez release, e.g. `2.113.0`.
    pub rez_version: String,
}

impl RezInstaller {
    pub fn source_url(&self) -> String {
        format!("{}/{}.zip", REZ_BASE_URL, self.rez_version)
    }

    pub fn rez_dir(&self) -> PathBuf {
        self.install_dir.join("rez")
    }

    pub async fn install(&self) -> Result<()> {
        make_dirs(&self.install_dir, &self.dirs_to_make)?;

        let python = find_python(&self.python_version)?;
        tracing::info!(
            "Installing rez-{} with {}",
            self.rez_version,
            python.display()
        );
        let start = Instant::now();

        let temp_download_dir = TempDir::new()?;
        let zip_path = temp_download_dir.path().join("rez.zip");
        download_file(&self.source_url(), &zip_path).await?;

        let extract_dir = temp_download_dir.path().join("source");
        extract_zip(&zip_path, &extract_dir)?;
        let installer_script = find_install_script(&extract_dir, &self.rez_version)?;

        let rez_dir = self.rez_dir();
        fs::create_dir_all(&rez_dir)?;

        tracing::debug!(
            "Running {} {} {}",
            python.display(),
            installer_script.display(),
            rez_dir.display()
        );
        let output = Command::new(&python)
            .arg(&installer_script)
            .arg(&rez_dir)
            .output()
            .with_context(|| format!("Could not run {}", installer_script.display()))?;
        tracing::debug!("install.py stdout: {}", String::from_utf8_lossy(&output.stdout));
        tracing::debug!("install.py stderr: {}", String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(anyhow!(
                "rez install.py failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        tracing::info!("rez installation took {:.1?}", start.elapsed());
        Ok(())
    }
}

/// Executable names worth trying for the given Python version.
fn python_candidates(python_version: &str) -> Vec<String> {
    let mut parts = python_version.split('.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next();

    let mut candidates = Vec::new();
    if let Some(minor) = minor {
        candidates.push(format!("python{}.{}", major, minor));
    }
    if !major.is_empty() {
        candidates.push(format!("python{}", major));
    }
    candidates.push("python".to_string());
    candidates
}

/// Whether `python --version` output announces `python_version`.
fn version_matches(output: &str, python_version: &str) -> bool {
    let Some(reported) = output.trim().strip_prefix("Python ") else {
        return false;
    };
    reported == python_version || reported.starts_with(&format!("{}.", python_version))
}

/// Find a Python interpreter of the requested version on `PATH`.
fn find_python(python_version: &str) -> Result<PathBuf> {
    for candidate in python_candidates(python_version) {
        let Ok(path) = which::which(&candidate) else {
            continue;
        };
        let Ok(output) = Command::new(&path).arg("--version").output() else {
            continue;
        };
        // python 2 printed its version on stderr
        let reported = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        if version_matches(&reported, python_version) {
            tracing::debug!("Found {} at {}", reported.trim(), path.display());
            return Ok(path);
        }
        tracing::debug!(
            "Skipping {} which reports '{}'",
            path.display(),
            reported.trim()
        );
    }
    Err(anyhow!(
        "No Python {} interpreter found on PATH; install it before installing rez",
        python_version
    ))
}

/// GitHub source archives wrap everything in `rez-<tag>/`.
fn find_install_script(extract_dir: &Path, rez_version: &str) -> Result<PathBuf> {
    let expected = extract_dir
        .join(format!("rez-{}", rez_version))
        .join("install.py");
    if expected.is_file() {
        return Ok(expected);
    }
    for entry in fs::read_dir(extract_dir)?.flatten() {
        let script = entry.path().join("install.py");
        if script.is_file() {
            return Ok(script);
        }
    }
    Err(anyhow!(
        "install.py not found in the rez {} source archive",
        rez_version
    ))
}
