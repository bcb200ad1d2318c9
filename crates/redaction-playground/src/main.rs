//! `redplay` - CLI for the redaction playground
//!
//! This binary runs the detect-and-redact pipeline over text given on the
//! command line or stdin, and inspects the detection patterns and
//! configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use redaction_playground::cli::{Cli, Command, ConfigCommand, PatternsCommand, RedactCommand};
use redaction_playground::loader::DetectorLoader;
use redaction_playground::present::present;
use redaction_playground::{init_logging, Config, Playground, RunOptions};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Redact(cmd) => handle_redact(config, cmd).await,
        Command::Patterns(cmd) => handle_patterns(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_redact(mut config: Config, cmd: RedactCommand) -> anyhow::Result<ExitCode> {
    if let Some(preset) = cmd.preset {
        config.detector.preset = preset.into();
    }
    if let Some(mode) = cmd.mode {
        config.detector.mode = mode.into();
    }

    let text = match cmd.text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading text from stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let playground = match Playground::from_config(&config).await {
        Ok(playground) => playground,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let options = RunOptions {
        use_assist: cmd.assist || config.assist.enabled,
        api_key: cmd
            .api_key
            .or_else(|| config.assist.api_key().map(str::to_string)),
    };

    let result = match playground.run_redaction(&text, &options).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    if let Some(usage) = &result.usage {
        eprintln!("AI assist usage: {usage}");
    }

    println!(
        "{}",
        present(&result, cmd.format, config.limits.table_excerpt_chars)?
    );
    Ok(ExitCode::SUCCESS)
}

async fn handle_patterns(config: &Config, cmd: &PatternsCommand) -> anyhow::Result<ExitCode> {
    let factory = match DetectorLoader::new(config.detector.source.clone()).load().await {
        Ok(factory) => factory,
        Err(e) => {
            eprintln!("Could not load detection patterns. {e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let options = config.detector.detector_options();

    if cmd.json {
        let patterns: Vec<_> = factory
            .patterns()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.spec().name,
                    "kind": p.spec().kind,
                    "category": p.spec().category,
                    "enabled": options.includes(p.spec().category),
                    "description": p.spec().description,
                })
            })
            .collect();
        let doc = serde_json::json!({
            "source": config.detector.source.to_string(),
            "pack": factory.pack_name(),
            "version": factory.version(),
            "fingerprint": factory.fingerprint(),
            "preset": config.detector.preset,
            "patterns": patterns,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!(
            "Pack:        {} {}",
            factory.pack_name(),
            factory.version().unwrap_or("")
        );
        println!("Source:      {}", config.detector.source);
        println!("Fingerprint: {}", factory.fingerprint());
        println!("Preset:      {}", config.detector.preset);
        println!();
        for pattern in factory.patterns() {
            let spec = pattern.spec();
            let mark = if options.includes(spec.category) { "+" } else { "-" };
            println!(
                "{mark} {:<22} {:<14} {:<12} {}",
                spec.name,
                spec.kind,
                spec.category.to_string(),
                spec.description
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                let mut shown = config.clone();
                if shown.assist.api_key.is_some() {
                    shown.assist.api_key = Some("********".to_string());
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                print_config(config);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_config(config: &Config) {
    let options = config.detector.detector_options();

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Detector]");
    println!("  Source:             {}", config.detector.source);
    println!("  Preset:             {}", config.detector.preset);
    println!("  Mode:               {}", config.detector.mode);
    println!("  Overlap policy:     {}", config.detector.overlap_policy);
    println!("  Names:              {}", options.include_names);
    println!("  Emails:             {}", options.include_emails);
    println!("  Phones:             {}", options.include_phones);
    println!("  Addresses:          {}", options.include_addresses);
    println!("  SSN:                {}", options.include_ssn);
    println!("  Credit cards:       {}", options.include_credit_cards);
    println!();
    println!("[Assist]");
    println!("  Enabled:            {}", config.assist.enabled);
    println!("  Base URL:           {}", config.assist.base_url);
    println!(
        "  API key:            {}",
        config.assist.api_key().map_or("not set", |_| "set")
    );
    println!("  Timeout (ms):       {}", config.assist.timeout_ms);
    println!("  Max input chars:    {}", config.assist.max_input_chars);
    println!();
    println!("[Limits]");
    println!("  Max input chars:    {}", config.limits.max_input_chars);
    println!(
        "  Table excerpt:      {}",
        config.limits.table_excerpt_chars
    );
}
