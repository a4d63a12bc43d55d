//! Well-known locations of the launcher data on the local system.

use crate::config::{HubConfig, APP_NAME};
use crate::platform::executable_suffix;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub const INSTALL_RECORD_NAME: &str = ".hubrecord";
pub const LOG_FILE_NAME: &str = "hub.log";
pub const SHORTCUTS_DIR_NAME: &str = "shortcuts";
pub const VENDOR_RECORD_NAME: &str = ".vendorrecord";

/// Paths inside the data root. Nothing is guaranteed to exist.
#[derive(Debug, Clone)]
pub struct HubLocalFilesystem {
    pub root_dir: PathBuf,
}

impl HubLocalFilesystem {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn from_config(config: &HubConfig) -> Result<Self> {
        match &config.data_root {
            Some(root) => Ok(Self::new(root)),
            None => Ok(Self::new(default_root_dir()?)),
        }
    }

    pub fn install_record_path(&self) -> PathBuf {
        self.root_dir.join(INSTALL_RECORD_NAME)
    }

    /// Current log file; the rotated backup sits next to it.
    pub fn log_path(&self) -> PathBuf {
        self.root_dir.join(LOG_FILE_NAME)
    }

    pub fn shortcut_dir(&self) -> PathBuf {
        self.root_dir.join(SHORTCUTS_DIR_NAME)
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root_dir)?;
        Ok(())
    }
}

pub fn default_root_dir() -> Result<PathBuf> {
    let path = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join(APP_NAME);
    tracing::debug!("Default data root: {}", path.display());
    Ok(path)
}

/// File name the executable of the given hub version is packaged as.
pub fn executable_name(version: &str) -> String {
    format!("{}-v{}{}", APP_NAME, version, executable_suffix())
}

fn executable_regex() -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^{}-v(\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.+-]*)?){}$",
        regex::escape(APP_NAME),
        regex::escape(executable_suffix())
    ))
}

/// Find the hub executable stored directly in `directory`.
///
/// When several versions are present the highest semantic version wins, ties
/// going to the lexicographically last file name.
pub fn find_hub_executable(directory: &Path) -> Option<PathBuf> {
    let regex = executable_regex().ok()?;
    let entries = fs::read_dir(directory).ok()?;

    let mut candidates: Vec<(semver::Version, String, PathBuf)> = entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let captures = regex.captures(&name)?;
            let version = semver::Version::parse(captures.get(1)?.as_str()).ok()?;
            Some((version, name, entry.path()))
        })
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    if candidates.len() > 1 {
        tracing::warn!(
            "Found {} hub executables in {}; using the most recent",
            candidates.len(),
            directory.display()
        );
    }
    candidates.pop().map(|(_, _, path)| path)
}
