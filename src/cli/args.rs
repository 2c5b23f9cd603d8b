//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drive the script hook engine outside a running server.
#[derive(Parser, Debug)]
#[command(name = "hookline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the default configuration file.
    Init(InitArgs),

    /// Load every script and report what it registered.
    Check(CheckArgs),

    /// Feed recorded engine events through the hooks.
    Replay(ReplayArgs),
}

/// Arguments for the init command.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Only initialize if not already initialized.
    #[arg(long)]
    pub if_needed: bool,
}

/// Arguments for the check command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Script directory, overriding `script_path` from the config.
    #[arg(long)]
    pub scripts: Option<PathBuf>,
}

/// Arguments for the replay command.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// YAML list of events to dispatch.
    pub file: PathBuf,

    /// Script directory, overriding `script_path` from the config.
    #[arg(long)]
    pub scripts: Option<PathBuf>,

    /// Run with hook dispatch switched off.
    #[arg(long)]
    pub disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from([
            "hookline",
            "replay",
            "events.yaml",
            "--scripts",
            "scripts",
            "--disabled",
            "--config",
            "hookline.yaml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("hookline.yaml")));
        match cli.command {
            Command::Replay(args) => {
                assert_eq!(args.file, PathBuf::from("events.yaml"));
                assert_eq!(args.scripts, Some(PathBuf::from("scripts")));
                assert!(args.disabled);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_init_if_needed() {
        let cli = Cli::parse_from(["hookline", "init", "--if-needed"]);
        assert!(matches!(cli.command, Command::Init(InitArgs { if_needed: true })));
        assert!(cli.config.is_none());
    }
}
