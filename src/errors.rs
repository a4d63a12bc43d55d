use std::path::PathBuf;
use thiserror::Error;

/// Failures the launcher needs to tell apart.
///
/// Most call chains carry these inside `anyhow::Error`; callers that must branch
/// on a specific kind use `downcast_ref::<HubError>()`.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Missing '{0}' environment variable.")]
    MissingEnvVar(String),

    #[error("Cannot parse installer descriptor '{0}': expected 'version=path'")]
    InvalidInstallerDescriptor(String),

    #[error("Invalid vendor manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Unsupported vendor name '{name}'. Pick one out of {supported:?}.")]
    UnsupportedVendor {
        name: String,
        supported: Vec<&'static str>,
    },

    #[error("Vendor '{0}' is declared in more than one manifest")]
    DuplicateVendor(String),

    #[error("Record file not found: {0}")]
    RecordNotFound(PathBuf),

    #[error("Record file {path} is corrupted: {reason}")]
    RecordCorrupted { path: PathBuf, reason: String },

    #[error("Installer source {0} does not exist")]
    InstallerSourceMissing(PathBuf),

    #[error("No hub executable found in {0}")]
    ExecutableNotFound(PathBuf),

    #[error(
        "Prevented restart number {0} which is not normal. Investigate the logs to find why."
    )]
    RestartLimitExceeded(u32),

    #[error(
        "The local install was launched directly; start the hub from its distribution entry point instead."
    )]
    DirectLocalLaunch,

    #[error("Unsupported operating system '{0}'")]
    UnsupportedOs(String),
}
