use crate::record::{expand_path, Environ, Field, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metadata stored in the data root about the local hub install.
///
/// Once written it is the single source of truth for "is the hub installed and
/// with what version".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Seconds since the epoch at which the hub was last installed.
    pub installed_time: Field<f64>,
    /// Version token of the installed hub, compared for equality only.
    pub installed_version: Field<String>,
    /// Directory the hub was installed to.
    pub installed_path: Field<PathBuf>,
    /// Vendor name to the path of that vendor's own record file.
    pub vendor_records: Field<BTreeMap<String, PathBuf>>,
}

impl Record for InstallRecord {
    fn overlay(&mut self, other: Self) {
        self.installed_time.overlay(other.installed_time);
        self.installed_version.overlay(other.installed_version);
        self.installed_path.overlay(other.installed_path);
        self.vendor_records.overlay(other.vendor_records);
    }

    fn expand_environ(&mut self, environ: &Environ) {
        if let Some(path) = self.installed_path.get_mut() {
            *path = expand_path(path, environ);
        }
        if let Some(records) = self.vendor_records.get_mut() {
            for path in records.values_mut() {
                *path = expand_path(path, environ);
            }
        }
    }
}

/// How a vendor tool was installed on the local system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VendorRecord {
    pub name: Field<String>,
    pub installed_time: Field<f64>,
    /// Hash of the vendor configuration the install was made from.
    pub install_hash: Field<String>,
    pub installed_path: Field<PathBuf>,
    /// Additional directories created by the install, removed on uninstall.
    pub extra_paths: Field<Vec<PathBuf>>,
}

impl VendorRecord {
    /// Every path owned by this install, primary directory first.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.installed_path.get().cloned().into_iter().collect();
        if let Some(extra) = self.extra_paths.get() {
            paths.extend(extra.iter().cloned());
        }
        paths
    }
}

impl Record for VendorRecord {
    fn overlay(&mut self, other: Self) {
        self.name.overlay(other.name);
        self.installed_time.overlay(other.installed_time);
        self.install_hash.overlay(other.install_hash);
        self.installed_path.overlay(other.installed_path);
        self.extra_paths.overlay(other.extra_paths);
    }

    fn expand_environ(&mut self, environ: &Environ) {
        if let Some(path) = self.installed_path.get_mut() {
            *path = expand_path(path, environ);
        }
        if let Some(paths) = self.extra_paths.get_mut() {
            for path in paths.iter_mut() {
                *path = expand_path(path, environ);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}
