//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::detector::{Preset, RedactionMode};
use crate::present::OutputFormat;

/// Redact command arguments.
#[derive(Debug, Args)]
pub struct RedactCommand {
    /// Text to redact (read from stdin when omitted)
    pub text: Option<String>,

    /// Also run remote AI assist
    #[arg(short, long)]
    pub assist: bool,

    /// API key for AI assist (overrides the configured key)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Category preset (overrides the configured preset)
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Redaction mode (overrides the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Patterns command arguments.
#[derive(Debug, Args)]
pub struct PatternsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Preset argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    /// Every category
    All,
    /// Emails, phones and addresses
    Contact,
    /// SSNs and card numbers
    Financial,
    /// Names, emails and SSNs
    Identity,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::All => Self::All,
            PresetArg::Contact => Self::Contact,
            PresetArg::Financial => Self::Financial,
            PresetArg::Identity => Self::Identity,
        }
    }
}

/// Redaction mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Bracketed tags such as [EMAIL]
    Placeholder,
    /// One asterisk per character
    Mask,
}

impl From<ModeArg> for RedactionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Placeholder => Self::Placeholder,
            ModeArg::Mask => Self::Mask,
        }
    }
}
