use anyhow::{Context, Result};
use std::env;
use std::path::{Component, Path, PathBuf};

/// Absolute, resolved path of the running executable.
pub fn current_executable() -> Result<PathBuf> {
    let exe = env::current_exe().context("Could not determine the current executable")?;
    Ok(exe.canonicalize().unwrap_or(exe))
}

/// Lexically normalize `path`: drop `.`, fold `..`, and on Windows ignore case
/// and separator style.
fn normalize(path: &Path) -> PathBuf {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in resolved.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if cfg!(windows) {
        let lowered = normalized
            .to_string_lossy()
            .replace('/', "\\")
            .to_lowercase();
        let lowered = lowered.strip_prefix(r"\\?\").unwrap_or(&lowered).to_string();
        PathBuf::from(lowered)
    } else {
        normalized
    }
}

/// True when `executable` lives somewhere under `install_dir`.
pub fn is_path_within(executable: &Path, install_dir: &Path) -> bool {
    normalize(executable).starts_with(normalize(install_dir))
}

/// True when the current process runs from the canonical local install.
///
/// `force_local` short-circuits the check so the bootstrap can be exercised
/// without a real install.
pub fn is_runtime_from_local_install(
    executable: &Path,
    install_dir: &Path,
    force_local: bool,
) -> bool {
    if force_local {
        tracing::debug!("Runtime forced to be considered local");
        return true;
    }
    let local = is_path_within(executable, install_dir);
    tracing::debug!(
        "Runtime {} local install {}: {}",
        executable.display(),
        install_dir.display(),
        local
    );
    local
}
