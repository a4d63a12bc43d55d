use super::make_dirs;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const NAME: &str = "workspace";
pub const API_VERSION: u32 = 1;

/// Directory tree the downstream pipeline expects to exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceInstaller {
    pub version: u32,
    pub install_dir: PathBuf,
    #[serde(default)]
    pub dirs_to_make: Vec<PathBuf>,
}

impl WorkspaceInstaller {
    pub fn install(&self) -> Result<()> {
        tracing::info!("Creating workspace in {}", self.install_dir.display());
        make_dirs(&self.install_dir, &self.dirs_to_make)
    }
}
