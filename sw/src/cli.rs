//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::session::WorkflowKind;

/// Specwright - interactive planning assistant
#[derive(Parser)]
#[command(
    name = "sw",
    about = "Interview-driven planning: turn a feature request into an ADR or PRD",
    version,
    after_help = "Logs are written to: ~/.local/share/specwright/logs/specwright.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose (debug) logging")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start a planning session and enter the dialogue
    Start {
        /// The feature request, in plain words
        feature: String,

        /// Document to produce
        #[arg(short, long, value_name = "KIND")]
        kind: Option<WorkflowKind>,

        /// Pack only this subdirectory of the working tree
        #[arg(short, long, value_name = "SUBPATH")]
        path: Option<String>,
    },

    /// Continue a stored session interactively
    Resume {
        /// Session id (see `sw list`)
        id: String,
    },

    /// List stored sessions
    List,

    /// Generate the decision document for a ready session
    Generate {
        /// Session id
        id: String,

        /// Write the document to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Discover and print the tool catalogue
    Tools,

    /// Show logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Directory holding the log file
pub fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("specwright")
        .join("logs")
}

pub fn get_log_path() -> PathBuf {
    get_log_dir().join("specwright.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["sw"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_start() {
        let cli = Cli::parse_from(["sw", "start", "add dark mode toggle", "--kind", "prd", "--path", "web"]);
        let Some(Command::Start { feature, kind, path }) = cli.command else {
            panic!("Expected Start command");
        };
        assert_eq!(feature, "add dark mode toggle");
        assert_eq!(kind, Some(WorkflowKind::Prd));
        assert_eq!(path.as_deref(), Some("web"));
    }

    #[test]
    fn test_cli_parse_start_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["sw", "start", "x", "--kind", "rfc"]).is_err());
    }

    #[test]
    fn test_cli_parse_generate() {
        let cli = Cli::parse_from(["sw", "generate", "abc-123", "-o", "adr.md"]);
        assert!(matches!(
            cli.command,
            Some(Command::Generate { ref id, output: Some(ref out) }) if id == "abc-123" && out == &PathBuf::from("adr.md")
        ));
    }

    #[test]
    fn test_cli_parse_logs() {
        let cli = Cli::parse_from(["sw", "logs", "-f", "-n", "10"]);
        assert!(matches!(cli.command, Some(Command::Logs { follow: true, lines: 10 })));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["sw", "-c", "/path/to/config.yml", "-v", "list"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Command::List)));
    }
}
