use crate::errors::HubError;
use crate::record::Environ;
use anyhow::Result;
use std::env;
use std::path::PathBuf;

pub const APP_NAME: &str = "vendorhub";

/// Environment variables the launcher reads at startup.
pub mod environ {
    pub const LOCAL_INSTALL_PATH: &str = "VENDORHUB_LOCAL_INSTALL_PATH";
    pub const INSTALLER: &str = "VENDORHUB_INSTALLER";
    pub const VENDOR_INSTALLERS_CONFIG: &str = "VENDORHUB_VENDOR_INSTALLERS_CONFIG";
    pub const SKIP_LOCAL_CHECK: &str = "VENDORHUB_SKIP_LOCAL_CHECK";
    pub const DATA_ROOT: &str = "VENDORHUB_DATA_ROOT";
    /// Only meant for tests: pretend the runtime is the local install.
    pub const FORCE_LOCAL: &str = "VENDORHUB_FORCE_LOCAL";
    /// Set on every process started by a restart.
    pub const RESTARTED: &str = "VENDORHUB_RESTARTED";
}

/// Where a new hub distribution can be installed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerSource {
    pub version: String,
    /// A directory, or an archive to extract.
    pub path: PathBuf,
}

impl InstallerSource {
    /// Parse a `version=path` descriptor.
    pub fn parse(descriptor: &str) -> Result<Self, HubError> {
        let invalid = || HubError::InvalidInstallerDescriptor(descriptor.to_string());
        let (version, path) = descriptor.split_once('=').ok_or_else(invalid)?;
        let version = version.trim();
        let path = path.trim();
        if version.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            version: version.to_string(),
            path: PathBuf::from(path),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub local_install_path: PathBuf,
    pub installer: Option<InstallerSource>,
    pub vendor_manifest_paths: Vec<PathBuf>,
    pub skip_local_check: bool,
    pub data_root: Option<PathBuf>,
    pub force_local: bool,
    pub restarted_marker: bool,
    /// Snapshot the configuration was read from.
    pub environ: Environ,
}

impl HubConfig {
    pub fn from_environment() -> Result<Self> {
        Self::from_environ(env::vars().collect())
    }

    /// Build the configuration from an environment snapshot.
    ///
    /// Empty values count as unset.
    pub fn from_environ(environ: Environ) -> Result<Self> {
        let get = |name: &str| {
            environ
                .get(name)
                .map(|value| value.as_str())
                .filter(|value| !value.is_empty())
        };

        let local_install_path = get(environ::LOCAL_INSTALL_PATH)
            .map(PathBuf::from)
            .ok_or_else(|| HubError::MissingEnvVar(environ::LOCAL_INSTALL_PATH.to_string()))?;

        let installer = get(environ::INSTALLER)
            .map(InstallerSource::parse)
            .transpose()?;

        let vendor_manifest_paths = get(environ::VENDOR_INSTALLERS_CONFIG)
            .map(|value| {
                env::split_paths(value)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let skip_local_check = get(environ::SKIP_LOCAL_CHECK).is_some();
        let data_root = get(environ::DATA_ROOT).map(PathBuf::from);
        let force_local = get(environ::FORCE_LOCAL).is_some();
        let restarted_marker = get(environ::RESTARTED).is_some();

        let config = Self {
            local_install_path,
            installer,
            vendor_manifest_paths,
            skip_local_check,
            data_root,
            force_local,
            restarted_marker,
            environ,
        };
        tracing::debug!("Loaded configuration: {:?}", config.summary());
        Ok(config)
    }

    /// The configuration without the environment snapshot, for logging.
    pub fn summary(&self) -> String {
        format!(
            "local_install_path={} installer={:?} vendor_manifest_paths={:?} skip_local_check={} data_root={:?} force_local={} restarted_marker={}",
            self.local_install_path.display(),
            self.installer,
            self.vendor_manifest_paths,
            self.skip_local_check,
            self.data_root,
            self.force_local,
            self.restarted_marker,
        )
    }
}
