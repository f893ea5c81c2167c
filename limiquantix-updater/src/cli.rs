//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// limiquantix Updater - OTA update lifecycle inspection tool
#[derive(Parser, Debug)]
#[command(name = "limiquantix-updater")]
#[command(about = "limiquantix Updater - inspect and reset the OTA update lifecycle state")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long, global = true, env = "LIMIQUANTIX_UPDATER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// State file (overrides the configured one)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the persisted state and the phase a cold start would resume
    Status,

    /// Print every phase's page as JSON
    Pages,

    /// Set the early-updates preference
    Enroll {
        #[arg(value_enum)]
        choice: EnrollChoice,
    },

    /// Clear all persisted lifecycle state
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrollChoice {
    Accept,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enroll() {
        let args = Args::parse_from(["limiquantix-updater", "enroll", "accept"]);
        assert!(matches!(
            args.command,
            Command::Enroll {
                choice: EnrollChoice::Accept
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "limiquantix-updater",
            "status",
            "--state-file",
            "/tmp/state.json",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(args.command, Command::Status));
        assert_eq!(args.state_file, Some(PathBuf::from("/tmp/state.json")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }
}
