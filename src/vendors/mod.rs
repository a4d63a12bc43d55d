//! Third-party tools the hub provisions, declared in vendor manifests.

pub mod rez;
pub mod sync;
pub mod workspace;

use crate::errors::HubError;
use crate::filesystem::VENDOR_RECORD_NAME;
use crate::record::{expand_path, Environ};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use rez::RezInstaller;
pub use workspace::WorkspaceInstaller;

/// Names accepted as manifest keys.
pub const SUPPORTED_VENDORS: [&str; 2] = [rez::NAME, workspace::NAME];

/// A vendor declared in a manifest, with its configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorInstaller {
    Workspace(WorkspaceInstaller),
    Rez(RezInstaller),
}

impl VendorInstaller {
    /// Build the installer registered under `name` from its manifest block.
    pub fn from_manifest_value(
        name: &str,
        value: serde_json::Value,
        manifest_path: &Path,
    ) -> Result<Self, HubError> {
        let invalid = |e: serde_json::Error| HubError::InvalidManifest {
            path: manifest_path.to_path_buf(),
            reason: format!("vendor '{}': {}", name, e),
        };
        let vendor = match name {
            workspace::NAME => Self::Workspace(serde_json::from_value(value).map_err(invalid)?),
            rez::NAME => Self::Rez(serde_json::from_value(value).map_err(invalid)?),
            _ => {
                return Err(HubError::UnsupportedVendor {
                    name: name.to_string(),
                    supported: SUPPORTED_VENDORS.to_vec(),
                })
            }
        };
        if vendor.version() == 0 {
            return Err(HubError::InvalidManifest {
                path: manifest_path.to_path_buf(),
                reason: format!("vendor '{}': version must be a positive integer", name),
            });
        }
        Ok(vendor)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Workspace(_) => workspace::NAME,
            Self::Rez(_) => rez::NAME,
        }
    }

    /// Version of the install logic; bumping it invalidates existing installs.
    pub fn api_version(&self) -> u32 {
        match self {
            Self::Workspace(_) => workspace::API_VERSION,
            Self::Rez(_) => rez::API_VERSION,
        }
    }

    /// Version declared in the manifest.
    pub fn version(&self) -> u32 {
        match self {
            Self::Workspace(config) => config.version,
            Self::Rez(config) => config.version,
        }
    }

    pub fn install_dir(&self) -> &Path {
        match self {
            Self::Workspace(config) => &config.install_dir,
            Self::Rez(config) => &config.install_dir,
        }
    }

    pub fn dirs_to_make(&self) -> &[PathBuf] {
        match self {
            Self::Workspace(config) => &config.dirs_to_make,
            Self::Rez(config) => &config.dirs_to_make,
        }
    }

    pub fn record_path(&self) -> PathBuf {
        self.install_dir().join(VENDOR_RECORD_NAME)
    }

    /// Every directory the install owns, primary directory first.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.install_dir().to_path_buf()];
        paths.extend(self.dirs_to_make().iter().cloned());
        paths
    }

    fn expand_environ(&mut self, environ: &Environ) {
        let (install_dir, dirs_to_make) = match self {
            Self::Workspace(config) => (&mut config.install_dir, &mut config.dirs_to_make),
            Self::Rez(config) => (&mut config.install_dir, &mut config.dirs_to_make),
        };
        *install_dir = expand_path(install_dir, environ);
        for dir in dirs_to_make.iter_mut() {
            *dir = expand_path(dir, environ);
        }
    }

    /// Hex sha256 of the configuration, the vendor name and the API version.
    pub fn hash(&self) -> Result<String> {
        let config = match self {
            Self::Workspace(config) => serde_json::to_string(config)?,
            Self::Rez(config) => serde_json::to_string(config)?,
        };
        Ok(hash_config(&config, self.name(), self.api_version()))
    }

    /// Run the vendor-specific installation.
    pub async fn install(&self) -> Result<()> {
        match self {
            Self::Workspace(config) => config.install(),
            Self::Rez(config) => config.install().await,
        }
    }
}

fn hash_config(serialized: &str, name: &str, api_version: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(api_version.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create `install_dir` and every extra directory of a vendor.
pub(crate) fn make_dirs(install_dir: &Path, dirs_to_make: &[PathBuf]) -> Result<()> {
    fs::create_dir_all(install_dir)
        .with_context(|| format!("Could not create {}", install_dir.display()))?;
    for dir in dirs_to_make {
        tracing::debug!("Creating {}", dir.display());
        fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;
    }
    Ok(())
}

/// Parse one manifest file; `.yml`/`.yaml` files are YAML, anything else JSON.
pub fn read_manifest(path: &Path, environ: &Environ) -> Result<BTreeMap<String, VendorInstaller>> {
    let content = fs::read_to_string(path).map_err(|e| HubError::InvalidManifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    );
    let blocks: BTreeMap<String, serde_json::Value> = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| HubError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    } else {
        serde_json::from_str(&content).map_err(|e| HubError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    };

    let mut vendors = BTreeMap::new();
    for (name, value) in blocks {
        let mut vendor = VendorInstaller::from_manifest_value(&name, value, path)?;
        vendor.expand_environ(environ);
        vendors.insert(name, vendor);
    }
    tracing::debug!(
        "Read {} vendor(s) from manifest {}",
        vendors.len(),
        path.display()
    );
    Ok(vendors)
}

/// Read every manifest; a vendor may only be declared once across them.
pub fn load_manifests(
    paths: &[PathBuf],
    environ: &Environ,
) -> Result<BTreeMap<String, VendorInstaller>> {
    let mut vendors = BTreeMap::new();
    for path in paths {
        for (name, vendor) in read_manifest(path, environ)? {
            if vendors.contains_key(&name) {
                return Err(HubError::DuplicateVendor(name).into());
            }
            vendors.insert(name, vendor);
        }
    }
    Ok(vendors)
}
