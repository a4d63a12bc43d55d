mod cli;
mod config;
mod download;
mod errors;
mod filesystem;
mod install;
mod locator;
mod logging;
mod platform;
mod record;
mod restart;
mod types;
mod uninstall;
mod vendors;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::{get_version, Cli, Commands};
use config::HubConfig;
use filesystem::HubLocalFilesystem;
use logging::{setup_logging, LoggingOptions};
use record::{read_record_or_none, Environ};
use restart::{bootstrap, BootstrapOutcome, Invocation, SystemLauncher};
use std::env;
use std::process::Command;
use types::{InstallRecord, VendorRecord};
use uninstall::{collect_paths, uninstall_paths};
use vendors::sync::SystemDriver;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match HubConfig::from_environment() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vendorhub: {:#}", e);
            std::process::exit(-1);
        }
    };

    if let Err(e) = platform::ensure_supported_os(&platform::get_system_info()) {
        eprintln!("vendorhub: {}", e);
        std::process::exit(-1);
    }

    let layout = match prepare_layout(&config) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("vendorhub: {:#}", e);
            std::process::exit(-1);
        }
    };

    let options = LoggingOptions {
        debug: cli.debug,
        no_coloring: cli.no_coloring,
    };
    if let Err(e) = setup_logging(&options, Some(&layout.log_path())) {
        eprintln!("vendorhub: {:#}", e);
    }

    let code = match run(cli, &config, &layout).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            -1
        }
    };
    std::process::exit(code);
}

fn prepare_layout(config: &HubConfig) -> Result<HubLocalFilesystem> {
    let layout = HubLocalFilesystem::from_config(config)?;
    layout
        .ensure_root()
        .with_context(|| format!("Could not create {}", layout.root_dir.display()))?;
    Ok(layout)
}

async fn run(cli: Cli, config: &HubConfig, layout: &HubLocalFilesystem) -> Result<i32> {
    tracing::debug!("Starting vendorhub {}", get_version());
    tracing::debug!("Configuration: {}", config.summary());
    if cli.log_environ {
        log_environ(&config.environ);
    }

    if cli.command == Some(Commands::Uninstall) {
        let paths = collect_paths(layout, &config.environ)?;
        return uninstall_paths(&paths, &mut SystemLauncher);
    }

    let invocation = Invocation {
        executable: locator::current_executable()?,
        argv: env::args().skip(1).collect(),
        restarted: cli.restarted,
        force_local_restart: cli.force_local_restart,
    };

    match bootstrap(
        config,
        layout,
        &invocation,
        &mut SystemLauncher,
        &mut SystemDriver,
    )
    .await?
    {
        BootstrapOutcome::Exit(code) => return Ok(code),
        BootstrapOutcome::Ready => {}
    }

    match cli.command {
        Some(Commands::About) => {
            print_about(config, layout)?;
            Ok(0)
        }
        Some(Commands::External(args)) => run_downstream(&args),
        _ => {
            tracing::info!("Hub is up to date");
            Ok(0)
        }
    }
}

fn log_environ(environ: &Environ) {
    tracing::info!("Environment:");
    for (key, value) in environ {
        tracing::info!("  {}={}", key, value);
    }
}

fn format_time(timestamp: Option<&f64>) -> String {
    timestamp
        .and_then(|secs| DateTime::<Utc>::from_timestamp(*secs as i64, 0))
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

fn print_about(config: &HubConfig, layout: &HubLocalFilesystem) -> Result<()> {
    println!("--- vendorhub {} ---", get_version());
    println!("  Executable:    {}", locator::current_executable()?.display());
    println!("  Data root:     {}", layout.root_dir.display());
    println!("  Local install: {}", config.local_install_path.display());
    println!("  Shortcuts:     {}", layout.shortcut_dir().display());
    let system = platform::get_system_info();
    println!("  Platform:      {}/{}", system.os, system.arch);

    let record =
        read_record_or_none::<InstallRecord>(&layout.install_record_path(), &config.environ)?;
    let Some(record) = record else {
        println!("  No install record found.");
        return Ok(());
    };

    println!(
        "  Installed:     {} at {}",
        record
            .installed_version
            .get()
            .map(String::as_str)
            .unwrap_or("unknown"),
        format_time(record.installed_time.get())
    );
    if let Some(path) = record.installed_path.get() {
        println!("  Installed in:  {}", path.display());
    }

    let vendors = record.vendor_records.into_option().unwrap_or_default();
    if vendors.is_empty() {
        println!("  No vendors installed.");
        return Ok(());
    }
    println!("  Vendors:");
    for (name, record_path) in vendors {
        match read_record_or_none::<VendorRecord>(&record_path, &config.environ)? {
            Some(vendor) => println!(
                "    - {} in {} (installed {})",
                name,
                vendor
                    .installed_path
                    .get()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                format_time(vendor.installed_time.get())
            ),
            None => println!("    - {} (record missing at {})", name, record_path.display()),
        }
    }
    Ok(())
}

/// Run the requested program and return its exit code.
fn run_downstream(args: &[String]) -> Result<i32> {
    let Some((program, program_args)) = args.split_first() else {
        return Ok(0);
    };
    tracing::debug!("Executing: {:?} {:?}", program, program_args);

    let mut child = Command::new(program)
        .args(program_args)
        .spawn()
        .with_context(|| format!("Could not start '{}'", program))?;
    let status = child.wait()?;
    Ok(status.code().unwrap_or(1))
}
