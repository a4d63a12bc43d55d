use crate::download::{copy_dir_all, extract_archive, is_archive, remove_path};
use crate::errors::HubError;
use crate::filesystem::find_hub_executable;
use crate::record::{update_record, Field};
use crate::types::InstallRecord;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Seconds since the epoch, as stored in records.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Install the hub distribution at `src` into `dst` and return the installed
/// executable.
///
/// `src` is either a directory or an archive. Its content is staged next to
/// `dst` and moved into place only once complete; the install record is written
/// last so an interrupted install is never taken for a finished one.
pub fn install_hub(src: &Path, dst: &Path, version: &str, record_path: &Path) -> Result<PathBuf> {
    if !src.exists() {
        return Err(HubError::InstallerSourceMissing(src.to_path_buf()).into());
    }
    let dst = absolute_path(dst)?;
    let parent = dst
        .parent()
        .ok_or_else(|| anyhow!("Install destination {} has no parent", dst.display()))?;

    tracing::info!(
        "Installing hub {} from {} to {}",
        version,
        src.display(),
        dst.display()
    );

    fs::create_dir_all(parent)?;
    let staging_dir = TempDir::new_in(parent)?;
    let staging_path = staging_dir.path();

    if src.is_dir() {
        copy_dir_all(src, staging_path)?;
    } else if is_archive(src) {
        extract_archive(src, staging_path)?;
    } else {
        return Err(anyhow!(
            "Installer source {} is neither a directory nor a supported archive",
            src.display()
        ));
    }

    let content_root = distribution_root(staging_path);
    let staged_executable = find_hub_executable(&content_root)
        .ok_or_else(|| HubError::ExecutableNotFound(src.to_path_buf()))?;
    let relative_exec_path = staged_executable.strip_prefix(&content_root)?.to_path_buf();

    // Whatever is at the destination is either an older install or a
    // leftover from an interrupted one.
    remove_path(&dst)?;
    fs::rename(&content_root, &dst)
        .with_context(|| format!("Could not move staged install to {}", dst.display()))?;

    let executable_path = dst.join(relative_exec_path);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&executable_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&executable_path, perms)?;
    }

    let record = InstallRecord {
        installed_time: Field::Set(now_timestamp()),
        installed_version: Field::Set(version.to_string()),
        installed_path: Field::Set(dst.clone()),
        ..Default::default()
    };
    update_record(record, record_path)?;

    tracing::info!(
        "Successfully installed hub {} to {}",
        version,
        executable_path.display()
    );
    Ok(executable_path)
}

/// Archives commonly wrap their content in a single top directory.
fn distribution_root(staging_path: &Path) -> PathBuf {
    if find_hub_executable(staging_path).is_some() {
        return staging_path.to_path_buf();
    }
    let entries: Vec<PathBuf> = match fs::read_dir(staging_path) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => return staging_path.to_path_buf(),
    };
    match entries.as_slice() {
        [single] if single.is_dir() => single.clone(),
        _ => staging_path.to_path_buf(),
    }
}

/// Whether the recorded install matches the declared installer version and
/// destination.
pub fn is_hub_up_to_date(
    record: Option<&InstallRecord>,
    version: &str,
    install_dir: &Path,
) -> bool {
    let Some(record) = record else {
        tracing::debug!("No install record; hub is not installed");
        return false;
    };
    let Some(installed_version) = record.installed_version.get() else {
        tracing::debug!("Install record has no version");
        return false;
    };
    if installed_version != version {
        tracing::info!(
            "Installed hub version {} differs from {}",
            installed_version,
            version
        );
        return false;
    }
    match record.installed_path.get() {
        Some(path) if path == install_dir => true,
        Some(path) => {
            tracing::info!(
                "Hub is installed in {} instead of {}",
                path.display(),
                install_dir.display()
            );
            false
        }
        None => false,
    }
}

/// The executable of the recorded local install, if one can be found.
pub fn get_hub_local_executable(record: &InstallRecord) -> Option<PathBuf> {
    let Some(install_dir) = record.installed_path.get() else {
        tracing::warn!("Install record has no installed path; cannot locate the hub executable");
        return None;
    };
    let executable = find_hub_executable(install_dir);
    if executable.is_none() {
        tracing::warn!("No hub executable found in {}", install_dir.display());
    }
    executable
}
