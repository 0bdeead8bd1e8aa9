//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::DutyId;

/// progtrack - duty progress tracking and sync
#[derive(Parser)]
#[command(
    name = "pt",
    about = "Tracks duty progress and syncs it with the progress service",
    version,
    after_help = "Logs are written to: ~/.local/share/progtrack/logs/progtrack.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Show completion status for a duty
    Status {
        /// Duty id to check
        duty: DutyId,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a duty as completed
    Complete {
        /// Duty id to mark
        duty: DutyId,
    },

    /// Mark several duties as completed in one call
    CompleteBulk {
        /// Duty ids to mark
        #[arg(required = true)]
        duties: Vec<DutyId>,
    },

    /// List the progress points of a duty
    Points {
        /// Duty id to list
        duty: DutyId,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Reconcile local state with the remote service
    Refresh,

    /// Clear all local state (makes no remote calls)
    Reset,

    /// Replay a JSONL event log through the tracking pipeline
    Watch {
        /// Path to the event log
        log: PathBuf,

        /// Keep following the log for new events (like tail -f)
        #[arg(short, long)]
        follow: bool,
    },
}

/// Output format for status/points commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["pt"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["pt", "status", "42"]);
        match cli.command {
            Some(Command::Status { duty, .. }) => assert_eq!(duty, DutyId(42)),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_complete() {
        let cli = Cli::parse_from(["pt", "complete", "7"]);
        assert!(matches!(cli.command, Some(Command::Complete { duty }) if duty == DutyId(7)));
    }

    #[test]
    fn test_cli_parse_complete_bulk() {
        let cli = Cli::parse_from(["pt", "complete-bulk", "1", "2", "3"]);
        match cli.command {
            Some(Command::CompleteBulk { duties }) => {
                assert_eq!(duties, vec![DutyId(1), DutyId(2), DutyId(3)]);
            }
            _ => panic!("Expected CompleteBulk command"),
        }
    }

    #[test]
    fn test_cli_parse_bulk_requires_ids() {
        assert!(Cli::try_parse_from(["pt", "complete-bulk"]).is_err());
    }

    #[test]
    fn test_cli_parse_watch() {
        let cli = Cli::parse_from(["pt", "watch", "events.jsonl", "--follow"]);
        match cli.command {
            Some(Command::Watch { log, follow }) => {
                assert_eq!(log, PathBuf::from("events.jsonl"));
                assert!(follow);
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_duty_id() {
        assert!(Cli::try_parse_from(["pt", "status", "not-a-number"]).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["pt", "-c", "/path/to/config.yml", "refresh"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }
}
