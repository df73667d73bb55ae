//! `pmwatch` — inspect and wait on GPU runtime power-management state.
//!
//! ```text
//! USAGE:
//!   pmwatch status                          Print the current power state
//!   pmwatch probe                           List GPUs and runtime-PM / PC8+ support
//!   pmwatch wait <active|suspended> [-t S]  Block until the state is reached
//!   pmwatch run [SUBTEST...]                Run validation subtests
//! ```
//!
//! Paths default to the integrated GPU and can be overridden with flags or
//! `PMWATCH_*` environment variables.

mod suite;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pm_watch::{discover_gpus, first_gpu, Environment, PmError, PowerState, Subtest, WatchConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use suite::ValidationSuite;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pmwatch", about = "GPU runtime power-management watcher", version)]
struct Cli {
    /// Device power/ directory (overrides PMWATCH_POWER_DIR).
    #[arg(long, global = true)]
    power_dir: Option<PathBuf>,

    /// MSR device for residency counters (overrides PMWATCH_MSR_PATH).
    #[arg(long, global = true)]
    msr_path: Option<PathBuf>,

    /// DRM debugfs directory (overrides PMWATCH_DEBUGFS_DIR).
    #[arg(long, global = true)]
    debugfs_dir: Option<PathBuf>,

    /// Derive device paths from the first display-class PCI device.
    #[arg(long, global = true)]
    discover: bool,

    /// sysfs mount point used by --discover and probe.
    #[arg(long, global = true, default_value = pm_regs::sysfs::SYSFS_ROOT)]
    sysfs_root: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the device's current runtime-PM state.
    Status,
    /// List GPUs and report runtime-PM and PC8+ residency support.
    Probe,
    /// Wait for the device to reach a state; exit 1 on timeout.
    Wait {
        /// Target state: active or suspended.
        state: PowerState,
        /// Deadline in seconds (default depends on strategy).
        #[arg(short, long)]
        timeout: Option<u32>,
    },
    /// Run validation subtests (all when none named).
    Run {
        /// Subtest names: rte, debugfs-read, sysfs-read, forcewake-user.
        subtests: Vec<String>,
        /// Show detail for passing and skipped subtests.
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Cmd::Status => cmd_status(config),
        Cmd::Probe => cmd_probe(&cli.sysfs_root, config),
        Cmd::Wait { state, timeout } => cmd_wait(config, state, timeout),
        Cmd::Run { subtests, verbose } => cmd_run(config, &subtests, verbose),
    }
}

fn build_config(cli: &Cli) -> Result<WatchConfig> {
    let mut config = WatchConfig::from_env();

    if cli.discover {
        let gpu = first_gpu(&cli.sysfs_root)?;
        tracing::info!("Using GPU {}", gpu.address());
        config = config.for_gpu(&gpu);
    }
    if let Some(dir) = &cli.power_dir {
        config.power_dir.clone_from(dir);
    }
    if let Some(path) = &cli.msr_path {
        config.msr_path.clone_from(path);
    }
    if let Some(dir) = &cli.debugfs_dir {
        config.debugfs_dir.clone_from(dir);
    }

    Ok(config)
}

fn cmd_status(config: WatchConfig) -> Result<ExitCode> {
    let mut env = Environment::setup(config)?;
    let state = env.current_state();
    env.teardown()?;

    println!("{}", state?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_probe(sysfs_root: &std::path::Path, config: WatchConfig) -> Result<ExitCode> {
    match discover_gpus(sysfs_root) {
        Ok(gpus) => {
            println!("GPUs: {}", gpus.len());
            for g in &gpus {
                println!(
                    "  {}  vendor {:#06x}  class {:#08x}",
                    g.address(),
                    g.vendor,
                    g.class
                );
            }
        }
        Err(e) => println!("GPUs: (discovery failed: {e})"),
    }
    println!();

    println!("Power dir    : {}", config.power_dir.display());
    println!("MSR device   : {}", config.msr_path.display());

    match Environment::setup(config) {
        Ok(env) => {
            println!("Runtime PM   : {}", yes_no(env.has_runtime_pm()));
            println!("PC8+         : {}", yes_no(env.has_deep_residency()));
            println!("Strategy     : {}", env.strategy_kind());
            env.teardown()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(PmError::UnsupportedPlatform { reason }) => {
            println!("Runtime PM   : no");
            println!("PC8+         : no");
            println!("Strategy     : (none: {reason})");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_wait(config: WatchConfig, state: PowerState, timeout: Option<u32>) -> Result<ExitCode> {
    let mut env = Environment::setup(config)?;

    let outcome = match (state, timeout) {
        (_, Some(s)) => env.watcher_mut().wait_for_state(state, s),
        (PowerState::Suspended, None) => env.wait_for_suspended(),
        (PowerState::Active, None) => env.wait_for_active(),
        (other, None) => {
            env.teardown()?;
            bail!("cannot wait for '{other}', only active or suspended");
        }
    };
    env.teardown()?;

    if outcome?.is_reached() {
        println!("{state}");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("timed out waiting for {state}");
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_run(config: WatchConfig, names: &[String], verbose: bool) -> Result<ExitCode> {
    let selected = if names.is_empty() {
        Subtest::ALL.to_vec()
    } else {
        names
            .iter()
            .map(|n| {
                Subtest::from_name(n).ok_or_else(|| {
                    let known: Vec<_> = Subtest::ALL.iter().map(|t| t.name()).collect();
                    anyhow::anyhow!("Unknown subtest '{n}' (known: {})", known.join(", "))
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut env = Environment::setup(config)?;

    println!("Strategy: {}", env.strategy_kind());
    println!();

    let mut suite = ValidationSuite::new(verbose);
    for subtest in selected {
        if !suite.run(subtest.name(), || env.run_subtest(subtest)) {
            break;
        }
    }

    env.teardown()?;
    Ok(if suite.finish() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

const fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
