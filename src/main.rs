//! Hookline CLI - load, check and replay script hooks.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hookline::cli::args::{CheckArgs, InitArgs, ReplayArgs};
use hookline::cli::replay;
use hookline::cli::{Cli, Command};
use hookline::{HookConfig, HookEngine};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().or_else(HookConfig::default_path);
    let config = HookConfig::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Init(args) => run_init(args, config_path),
        Command::Check(args) => run_check(args, config),
        Command::Replay(args) => run_replay(args, config),
    }
}

fn run_init(args: InitArgs, config_path: Option<PathBuf>) -> Result<()> {
    let Some(path) = config_path else {
        bail!("no config directory available on this platform; pass --config");
    };

    if args.if_needed && path.exists() {
        println!("Already initialized: {}", path.display());
        return Ok(());
    }

    HookConfig::default()
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn engine_for(config: &HookConfig, scripts: Option<PathBuf>) -> Result<HookEngine> {
    let mut config = config.clone();
    if let Some(scripts) = scripts {
        config.script_path = scripts;
    }
    HookEngine::new(&config).context("failed to create hook engine")
}

fn run_check(args: CheckArgs, config: HookConfig) -> Result<()> {
    let engine = engine_for(&config, args.scripts)?;
    let report = engine.load_scripts().context("failed to load scripts")?;

    for script in &report.loaded {
        println!("ok      {}", script);
    }
    for failure in &report.failed {
        println!("failed  {}: {}", failure.script, failure.error);
    }
    println!(
        "bindings: server={} packet={} vehicle={}",
        report.bindings.server, report.bindings.packet, report.bindings.vehicle
    );

    if !report.failed.is_empty() {
        bail!("{} script(s) failed to load", report.failed.len());
    }
    Ok(())
}

fn run_replay(args: ReplayArgs, config: HookConfig) -> Result<()> {
    let events = replay::load_events(&args.file)?;
    let engine = engine_for(&config, args.scripts)?;
    if args.disabled {
        engine.set_enabled(false);
    }

    let report = engine.load_scripts().context("failed to load scripts")?;
    for failure in &report.failed {
        tracing::warn!(script = %failure.script, "{}", failure.error);
    }

    for outcome in replay::replay_all(&engine, &events) {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    tracing::info!(
        events = events.len(),
        faults = engine.fault_count(),
        "replay finished"
    );
    Ok(())
}
