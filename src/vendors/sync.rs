//! Reconciliation of installed vendors with the manifests.

use super::VendorInstaller;
use crate::download::remove_path;
use crate::install::now_timestamp;
use crate::record::{read_record_or_none, update_record, write_record, Environ, Field};
use crate::types::{InstallRecord, VendorRecord};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Performs the side effects of a vendor sync.
pub trait VendorDriver {
    async fn install(&mut self, vendor: &VendorInstaller) -> Result<()>;

    /// Remove every path, skipping the ones already gone.
    fn uninstall(&mut self, paths: &[PathBuf]) -> Result<()>;
}

/// Installs for real.
pub struct SystemDriver;

impl VendorDriver for SystemDriver {
    async fn install(&mut self, vendor: &VendorInstaller) -> Result<()> {
        vendor.install().await
    }

    fn uninstall(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            remove_path(path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub installed: Vec<String>,
    pub uninstalled: Vec<String>,
    pub up_to_date: Vec<String>,
}

/// Remove the install described by the vendor record at `record_path`.
pub fn uninstall_vendor<D: VendorDriver>(
    driver: &mut D,
    record_path: &Path,
    environ: &Environ,
) -> Result<()> {
    let Some(record) = read_record_or_none::<VendorRecord>(record_path, environ)? else {
        tracing::debug!(
            "No vendor record at {}; nothing to uninstall",
            record_path.display()
        );
        return Ok(());
    };

    let name = record.name.get().cloned().unwrap_or_default();
    tracing::info!("Uninstalling vendor '{}'", name);
    let mut paths = record.owned_paths();
    paths.push(record_path.to_path_buf());
    driver.uninstall(&paths)
}

/// Install `vendor` unless its record shows the same configuration hash.
///
/// Returns whether an install happened. On failure the stale record and the
/// directories the attempt created are removed before the error is returned.
pub async fn install_vendor<D: VendorDriver>(
    driver: &mut D,
    vendor: &VendorInstaller,
    environ: &Environ,
) -> Result<bool> {
    let name = vendor.name();
    let hash = vendor.hash()?;
    let record_path = vendor.record_path();

    if let Some(existing) = read_record_or_none::<VendorRecord>(&record_path, environ)? {
        if existing.install_hash.get() == Some(&hash) {
            tracing::debug!("Vendor '{}' is up to date ({})", name, hash);
            return Ok(false);
        }
        tracing::info!("Vendor '{}' configuration changed; reinstalling", name);
        uninstall_vendor(driver, &record_path, environ)?;
    }

    let owned_paths = vendor.owned_paths();
    let preexisting: Vec<bool> = owned_paths.iter().map(|p| p.exists()).collect();

    tracing::info!("Installing vendor '{}' to {}", name, vendor.install_dir().display());
    if let Err(e) = driver.install(vendor).await {
        tracing::warn!("Vendor '{}' failed to install: {:#}", name, e);

        let mut created: Vec<PathBuf> = owned_paths
            .into_iter()
            .zip(preexisting)
            .filter(|(_, existed)| !existed)
            .map(|(path, _)| path)
            .collect();
        created.push(record_path);
        if let Err(cleanup) = driver.uninstall(&created) {
            tracing::warn!(
                "Could not clean up after vendor '{}': {:#}",
                name,
                cleanup
            );
        }
        return Err(e.context(format!("Installation of vendor '{}' failed", name)));
    }

    let record = VendorRecord {
        name: Field::Set(name.to_string()),
        installed_time: Field::Set(now_timestamp()),
        install_hash: Field::Set(hash),
        installed_path: Field::Set(vendor.install_dir().to_path_buf()),
        extra_paths: Field::Set(vendor.dirs_to_make().to_vec()),
    };
    write_record(&record, &record_path)?;
    tracing::info!("Vendor '{}' installed", name);
    Ok(true)
}

/// Bring the installed vendors in line with `vendors` and record the result
/// in the hub install record.
pub async fn sync_vendors<D: VendorDriver>(
    driver: &mut D,
    vendors: &BTreeMap<String, VendorInstaller>,
    hub_record_path: &Path,
    environ: &Environ,
) -> Result<SyncReport> {
    let previous = read_record_or_none::<InstallRecord>(hub_record_path, environ)?
        .and_then(|record| record.vendor_records.into_option())
        .unwrap_or_default();

    let mut report = SyncReport::default();
    let mut records: BTreeMap<String, PathBuf> = BTreeMap::new();
    // previous entries whose install is gone
    let mut released: BTreeSet<String> = BTreeSet::new();

    let result = async {
        for (name, record_path) in &previous {
            if !vendors.contains_key(name) {
                uninstall_vendor(driver, record_path, environ)?;
                released.insert(name.clone());
                report.uninstalled.push(name.clone());
            }
        }

        for (name, vendor) in vendors {
            let record_path = vendor.record_path();
            if let Some(old_path) = previous.get(name) {
                if old_path != &record_path {
                    tracing::info!(
                        "Vendor '{}' moved from {} to {}",
                        name,
                        old_path.display(),
                        record_path.display()
                    );
                    uninstall_vendor(driver, old_path, environ)?;
                    released.insert(name.clone());
                }
            }

            if install_vendor(driver, vendor, environ).await? {
                report.installed.push(name.clone());
            } else {
                report.up_to_date.push(name.clone());
            }
            records.insert(name.clone(), record_path);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    // Anything not removed keeps its entry so a later run can still
    // uninstall it, whether or not the manifest still declares it.
    if result.is_err() {
        for (name, record_path) in &previous {
            if !released.contains(name) && !records.contains_key(name) {
                records.insert(name.clone(), record_path.clone());
            }
        }
    }

    let hub_record = InstallRecord {
        vendor_records: Field::Set(records),
        ..Default::default()
    };
    update_record(hub_record, hub_record_path)?;

    result?;
    tracing::debug!("Vendor sync finished: {:?}", report);
    Ok(report)
}
