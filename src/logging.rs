use anyhow::{anyhow, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log files above this size are rotated at startup.
pub const MAX_LOG_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    pub debug: bool,
    pub no_coloring: bool,
}

fn backup_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Move `log_path` aside when it grew above `max_size`; only one backup is kept.
pub fn rotate_log(log_path: &Path, max_size: u64) -> Result<bool> {
    let Ok(metadata) = fs::metadata(log_path) else {
        return Ok(false);
    };
    if metadata.len() <= max_size {
        return Ok(false);
    }
    fs::rename(log_path, backup_path(log_path))?;
    Ok(true)
}

/// Log to stderr and, when `log_path` can be opened, to that file as well.
pub fn setup_logging(options: &LoggingOptions, log_path: Option<&Path>) -> Result<()> {
    if options.no_coloring {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let level = if options.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!options.no_coloring)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(filter);

    let mut file_error = None;
    let file_layer = match log_path.map(open_log_file).transpose() {
        Ok(Some(file)) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG),
        ),
        Ok(None) => None,
        Err(e) => {
            file_error = Some(e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Could not set up logging: {}", e))?;

    if let Some(e) = file_error {
        tracing::warn!("Logging to stderr only: {:#}", e);
    }
    Ok(())
}

fn open_log_file(log_path: &Path) -> Result<fs::File> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    rotate_log(log_path, MAX_LOG_SIZE)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    Ok(file)
}
