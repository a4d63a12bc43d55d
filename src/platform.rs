use crate::errors::HubError;
use crate::types::PlatformInfo;

pub const SUPPORTED_OS: [&str; 3] = ["linux", "macos", "windows"];

pub fn get_system_info() -> PlatformInfo {
    let os = std::env::consts::OS.to_string();
    let arch = std::env::consts::ARCH.to_string();

    let normalized_arch = match arch.as_str() {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        _ => arch,
    };

    PlatformInfo {
        os,
        arch: normalized_arch,
    }
}

pub fn is_windows() -> bool {
    cfg!(windows)
}

/// Fail when the launcher cannot manage installs on this operating system.
pub fn ensure_supported_os(info: &PlatformInfo) -> Result<(), HubError> {
    if SUPPORTED_OS.contains(&info.os.as_str()) {
        Ok(())
    } else {
        Err(HubError::UnsupportedOs(info.os.clone()))
    }
}

/// Suffix executables carry on the current platform.
pub fn executable_suffix() -> &'static str {
    std::env::consts::EXE_SUFFIX
}
