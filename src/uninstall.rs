//! Removal of everything the hub put on the local system.
//!
//! The running executable may live inside one of the directories to remove, so
//! deletion is delegated to a throwaway script run from a temporary directory.

use crate::config::APP_NAME;
use crate::filesystem::HubLocalFilesystem;
use crate::platform::is_windows;
use crate::record::{read_record_or_none, Environ};
use crate::restart::{ProcessLauncher, RestartRequest};
use crate::types::{InstallRecord, VendorRecord};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Every existing path owned by the hub: its install, each vendor install with
/// its extra paths, and the data root.
pub fn collect_paths(layout: &HubLocalFilesystem, environ: &Environ) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    let record = read_record_or_none::<InstallRecord>(&layout.install_record_path(), environ)?;
    if let Some(record) = record {
        if let Some(installed_path) = record.installed_path.get() {
            paths.push(installed_path.clone());
        }
        let vendor_record_paths = record.vendor_records.get().into_iter().flat_map(|r| r.values());
        for vendor_record_path in vendor_record_paths {
            match read_record_or_none::<VendorRecord>(vendor_record_path, environ)? {
                Some(vendor) => paths.extend(vendor.owned_paths()),
                None => tracing::debug!(
                    "Vendor record {} is missing; skipping",
                    vendor_record_path.display()
                ),
            }
        }
    }
    paths.push(layout.root_dir.clone());

    let mut existing: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.exists() && !existing.contains(&path) {
            existing.push(path);
        }
    }
    tracing::debug!("Paths to uninstall: {:?}", existing);
    Ok(existing)
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn unix_script(paths: &[PathBuf], script_dir: &Path) -> String {
    let mut lines = vec!["#!/bin/sh".to_string()];
    for path in paths {
        let quoted = shell_quote(path);
        lines.push(format!("echo removing {}", quoted));
        lines.push(format!("rm -rf {}", quoted));
    }
    lines.push(format!("rm -rf {}", shell_quote(script_dir)));
    lines.push("echo \"uninstall finished\"".to_string());
    lines.join("\n") + "\n"
}

fn windows_script(paths: &[PathBuf], script_dir: &Path) -> String {
    let mut lines = vec!["@echo off".to_string()];
    for path in paths {
        lines.push(format!("echo removing {}", path.display()));
        if path.is_dir() {
            lines.push(format!("RMDIR /S /Q \"{}\"", path.display()));
        } else {
            lines.push(format!("DEL /F /Q \"{}\"", path.display()));
        }
    }
    lines.push("echo uninstall finished".to_string());
    lines.push(format!(
        "start /b \"\" cmd /C RMDIR /S /Q \"{}\"",
        script_dir.display()
    ));
    lines.join("\r\n") + "\r\n"
}

/// Build the request running the removal script, written into `script_dir`.
pub fn prepare_uninstall(paths: &[PathBuf], script_dir: &Path) -> Result<RestartRequest> {
    let request = if is_windows() {
        let script = script_dir.join("uninstall.bat");
        fs::write(&script, windows_script(paths, script_dir))?;
        RestartRequest {
            exe: PathBuf::from("cmd"),
            args: vec!["/C".to_string(), script.to_string_lossy().to_string()],
            envs: vec![],
        }
    } else {
        let script = script_dir.join("uninstall.sh");
        fs::write(&script, unix_script(paths, script_dir))?;
        RestartRequest {
            exe: PathBuf::from("sh"),
            args: vec![script.to_string_lossy().to_string()],
            envs: vec![],
        }
    };
    Ok(request)
}

/// Hand over to a script removing `paths`, then removing itself.
pub fn uninstall_paths<L: ProcessLauncher>(paths: &[PathBuf], launcher: &mut L) -> Result<i32> {
    let script_dir = tempfile::Builder::new()
        .prefix(&format!("{}_uninstall_", APP_NAME))
        .tempdir()?
        .keep();
    let request = prepare_uninstall(paths, &script_dir)?;

    tracing::info!("Uninstalling {} path(s)", paths.len());
    for path in paths {
        tracing::debug!("  {}", path.display());
    }
    launcher.replace(&request)
}
