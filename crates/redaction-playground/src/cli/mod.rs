//! Command-line interface for the redaction playground.
//!
//! This module provides the CLI structure for the `redplay` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ModeArg, PatternsCommand, PresetArg, RedactCommand};

use crate::logging::Verbosity;

/// redplay - Detect and redact PII in text
///
/// Runs deterministic local pattern detection, optionally augmented by a
/// remote AI assist pass, and prints the redacted text.
#[derive(Debug, Parser)]
#[command(name = "redplay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect and redact PII in text
    Redact(RedactCommand),

    /// List the loaded detection patterns
    Patterns(PatternsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "redplay");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_redact_text() {
        let cli = Cli::try_parse_from(["redplay", "redact", "Email me at a@b.com"]).unwrap();
        match cli.command {
            Command::Redact(cmd) => {
                assert_eq!(cmd.text.as_deref(), Some("Email me at a@b.com"));
                assert!(!cmd.assist);
                assert_eq!(cmd.format, OutputFormat::Plain);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_redact_options() {
        let cli = Cli::try_parse_from([
            "redplay", "redact", "--assist", "--api-key", "k-123", "--preset", "contact",
            "--mode", "mask", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Command::Redact(cmd) => {
                assert!(cmd.text.is_none());
                assert!(cmd.assist);
                assert_eq!(cmd.api_key.as_deref(), Some("k-123"));
                assert_eq!(cmd.preset, Some(PresetArg::Contact));
                assert_eq!(cmd.mode, Some(ModeArg::Mask));
                assert_eq!(cmd.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_patterns() {
        let cli = Cli::try_parse_from(["redplay", "patterns", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Patterns(PatternsCommand { json: true })
        ));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["redplay", "config", "validate", "-f", "/tmp/c.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli =
            Cli::try_parse_from(["redplay", "-c", "/custom/c.toml", "config", "path"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/c.toml")));
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["redplay", "-vv", "patterns"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Trace);

        let cli = Cli::try_parse_from(["redplay", "-q", "-v", "patterns"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);

        let cli = Cli::try_parse_from(["redplay", "patterns"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }
}
