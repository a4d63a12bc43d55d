//! Decides, on every invocation, whether to install, update, hand over to the
//! local install or carry on, and replaces the current process when needed.

use crate::config::{environ, HubConfig};
use crate::errors::HubError;
use crate::filesystem::HubLocalFilesystem;
use crate::install::{
    absolute_path, get_hub_local_executable, install_hub, is_hub_up_to_date,
};
use crate::locator::is_runtime_from_local_install;
use crate::record::read_record_or_none;
use crate::types::InstallRecord;
use crate::vendors::load_manifests;
use crate::vendors::sync::{sync_vendors, VendorDriver};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Hidden flag carrying the restart generation to the next process.
pub const RESTART_FLAG: &str = "--restarted__";
pub const FORCE_LOCAL_RESTART_FLAG: &str = "--force-local-restart";
/// Highest generation still allowed to restart.
pub const MAX_RESTARTS: u32 = 3;

/// Arguments for the next generation: `argv` without any restart bookkeeping,
/// prefixed with the incremented generation.
///
/// Bookkeeping flags are only recognized ahead of the subcommand; everything
/// from the first positional argument on belongs to the subcommand.
pub fn get_restart_args(argv: &[String], restarted: u32) -> Vec<String> {
    let mut args = vec![RESTART_FLAG.to_string(), (restarted + 1).to_string()];

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        if arg == RESTART_FLAG {
            iter.next();
        } else if arg.starts_with(&format!("{}=", RESTART_FLAG)) || arg == FORCE_LOCAL_RESTART_FLAG
        {
            continue;
        } else {
            args.push(arg.clone());
            if !arg.starts_with('-') || arg == "--" {
                break;
            }
        }
    }
    args.extend(iter.cloned());
    args
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    pub exe: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

/// Hands control over to another program.
pub trait ProcessLauncher {
    /// Run `request` in place of the current process and return the exit code
    /// the caller should exit with.
    fn replace(&mut self, request: &RestartRequest) -> Result<i32>;
}

/// Replaces the process image on unix, spawns and waits elsewhere.
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn replace(&mut self, request: &RestartRequest) -> Result<i32> {
        let mut cmd = Command::new(&request.exe);
        cmd.args(&request.args);
        cmd.envs(request.envs.iter().cloned());
        tracing::debug!("Executing: {:?} {:?}", request.exe, request.args);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // only returns on failure
            let err = cmd.exec();
            Err(err).with_context(|| format!("Could not execute {}", request.exe.display()))
        }
        #[cfg(not(unix))]
        {
            let status = cmd
                .status()
                .with_context(|| format!("Could not execute {}", request.exe.display()))?;
            Ok(status.code().unwrap_or(-1))
        }
    }
}

/// Fail when generation `restarted` is not allowed to restart again.
pub fn check_restart_limit(restarted: u32) -> Result<()> {
    if restarted > MAX_RESTARTS {
        tracing::error!(
            "Restart generation {} exceeds {}; refusing to restart",
            restarted,
            MAX_RESTARTS
        );
        return Err(HubError::RestartLimitExceeded(restarted).into());
    }
    Ok(())
}

/// Start `exe` as the next generation of this invocation.
pub fn restart<L: ProcessLauncher>(
    launcher: &mut L,
    exe: &Path,
    argv: &[String],
    restarted: u32,
) -> Result<i32> {
    check_restart_limit(restarted)?;

    let request = RestartRequest {
        exe: exe.to_path_buf(),
        args: get_restart_args(argv, restarted),
        envs: vec![(environ::RESTARTED.to_string(), "1".to_string())],
    };
    tracing::info!("Restarting into {}", exe.display());
    launcher.replace(&request)
}

/// What the current process knows about itself.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub executable: PathBuf,
    /// Command line arguments without the program name.
    pub argv: Vec<String>,
    pub restarted: u32,
    pub force_local_restart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Control was handed to another process; exit with this code.
    Exit(i32),
    /// Running from the right place with vendors in sync.
    Ready,
}

/// Run the install/update/restart state machine then synchronize vendors.
pub async fn bootstrap<L: ProcessLauncher, D: VendorDriver>(
    config: &HubConfig,
    layout: &HubLocalFilesystem,
    invocation: &Invocation,
    launcher: &mut L,
    driver: &mut D,
) -> Result<BootstrapOutcome> {
    // configuration errors must surface before anything is touched
    let vendors = load_manifests(&config.vendor_manifest_paths, &config.environ)?;

    let record_path = layout.install_record_path();
    let install_dir = absolute_path(&config.local_install_path)?;
    let is_local =
        is_runtime_from_local_install(&invocation.executable, &install_dir, config.force_local);

    if !is_local {
        match &config.installer {
            None => {
                tracing::info!(
                    "No installer declared; running from {}",
                    invocation.executable.display()
                );
            }
            Some(installer) => {
                // this branch always ends in a restart
                check_restart_limit(invocation.restarted)?;
                let record =
                    read_record_or_none::<InstallRecord>(&record_path, &config.environ)?;
                let up_to_date =
                    is_hub_up_to_date(record.as_ref(), &installer.version, &install_dir);
                let existing = if up_to_date {
                    record.as_ref().and_then(get_hub_local_executable)
                } else {
                    None
                };

                let exe = match existing {
                    Some(exe) => {
                        tracing::debug!("Hub {} is up to date", installer.version);
                        exe
                    }
                    None => install_hub(
                        &installer.path,
                        &install_dir,
                        &installer.version,
                        &record_path,
                    )?,
                };
                let code = restart(launcher, &exe, &invocation.argv, invocation.restarted)?;
                return Ok(BootstrapOutcome::Exit(code));
            }
        }
    } else if invocation.force_local_restart {
        let record = read_record_or_none::<InstallRecord>(&record_path, &config.environ)?;
        let exe = record
            .as_ref()
            .and_then(get_hub_local_executable)
            .ok_or_else(|| HubError::ExecutableNotFound(install_dir.clone()))?;
        let code = restart(launcher, &exe, &invocation.argv, invocation.restarted)?;
        return Ok(BootstrapOutcome::Exit(code));
    } else if invocation.restarted == 0 && !config.restarted_marker && !config.skip_local_check {
        tracing::error!(
            "{} was started directly from the local install {}",
            invocation.executable.display(),
            install_dir.display()
        );
        return Err(HubError::DirectLocalLaunch.into());
    }

    let report = sync_vendors(driver, &vendors, &record_path, &config.environ).await?;
    tracing::info!(
        "Vendors: {} installed, {} removed, {} up to date",
        report.installed.len(),
        report.uninstalled.len(),
        report.up_to_date.len()
    );
    Ok(BootstrapOutcome::Ready)
}
