//! `tagdoc` - CLI for tag documents
//!
//! This binary reads, writes, locks and unlocks the document stored on the
//! emulated tag described by the configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use tagdoc::cli::{Cli, Command, ConfigCommand};
use tagdoc::{
    codec, init_logging, Config, NfcHardware, OperationFacade, Outcome, TagDocument, TagEmulator,
    UnlockResult,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            info!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// The single line shown for a failed command. The full chain is logged at `-v`.
fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<tagdoc::Error>() {
        Some(tag_err) => tag_err.user_message(),
        None => format!("Error: {err:#}"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Validation loads its own file so a broken default config can still be checked.
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return Ok(validate_config(file.clone().or_else(|| cli.config.clone())));
    }

    let mut config = Config::load_from(cli.config.clone())?;
    if let Some(path) = cli.tag_image.clone() {
        config.emulator.image_path = Some(path);
    }

    match cli.command {
        Command::Config(cmd) => {
            handle_config(&config, cli.config.as_ref(), cmd)?;
            Ok(ExitCode::SUCCESS)
        }
        command => run_tag_command(&config, command, cli.quiet).await,
    }
}

async fn run_tag_command(
    config: &Config,
    command: Command,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let image = config.image_path();
    let emulator = Arc::new(TagEmulator::open_image(
        &image,
        config.emulator.capacity,
        config.emulator.read_only,
    )?);
    emulator
        .start()
        .await
        .context("failed to start NFC hardware")?;
    debug!("Using tag image at {}", image.display());

    let facade = OperationFacade::from_config(emulator.clone(), config)?;
    if !quiet {
        eprintln!("{}", config.nfc.alert_message);
    }

    let result = execute(&facade, command).await;
    emulator.shutdown().await;
    result
}

async fn execute(facade: &OperationFacade, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Read(cmd) => {
            if let Outcome::Completed(doc) = facade.perform_read().await? {
                print_document(&doc, cmd.json)?;
            }
        }
        Command::Write(cmd) => {
            if let Outcome::Completed(doc) = facade.perform_write(cmd.pairs()).await? {
                print_document(&doc, cmd.json)?;
            }
        }
        Command::Lock(cmd) => {
            if let Outcome::Completed(()) = facade.perform_lock(&cmd.password).await? {
                println!("Tag locked.");
            }
        }
        Command::Unlock(cmd) => {
            if let Outcome::Completed(result) = facade.perform_unlock(&cmd.password).await? {
                match result {
                    UnlockResult::Success => println!("Tag unlocked."),
                    UnlockResult::NotLocked => println!("Tag is not locked."),
                    UnlockResult::InvalidPassword => {
                        println!("Invalid password.");
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
        }
        Command::Dump => {
            if let Outcome::Completed(raw) = facade.perform_dump().await? {
                println!("UID:      {}", hex::encode(&raw.uid));
                match &raw.message {
                    Some(message) => {
                        println!("Message:  {} bytes", message.len());
                        println!("          {}", hex::encode(message));
                    }
                    None => println!("Message:  none"),
                }
                match codec::try_decode(raw.message.as_deref()) {
                    Ok(doc) => println!(
                        "Decoded:  {} field(s){}",
                        doc.len(),
                        if doc.is_locked() { ", locked" } else { "" }
                    ),
                    Err(err) => println!("Decoded:  empty document ({err})"),
                }
            }
        }
        Command::Erase => {
            if let Outcome::Completed(()) = facade.perform_erase().await? {
                println!("Tag erased.");
            }
        }
        Command::Config(_) => unreachable!("configuration commands never open a session"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the user fields and lock state. The password never leaves the tag.
fn print_document(doc: &TagDocument, json: bool) -> anyhow::Result<()> {
    if json {
        let mut object = serde_json::Map::new();
        for (label, value) in doc.fields() {
            object.insert(label.clone(), serde_json::Value::String(value.clone()));
        }
        if doc.is_locked() {
            object.insert("locked".to_string(), serde_json::Value::Bool(true));
        }
        println!("{}", serde_json::to_string_pretty(&object)?);
    } else {
        if doc.fields().is_empty() {
            println!("(empty)");
        }
        for (label, value) in doc.fields() {
            println!("{label}: {value}");
        }
        if doc.is_locked() {
            println!("[locked]");
        }
    }
    Ok(())
}

fn handle_config(
    config: &Config,
    config_path: Option<&PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[NFC]");
                println!("  Technology:         {}", config.nfc.technology);
                println!("  Language:           {}", config.nfc.language);
                println!("  Alert message:      {}", config.nfc.alert_message);
                println!();
                println!("[Emulator]");
                println!("  Tag image:          {}", config.image_path().display());
                println!("  Capacity (bytes):   {}", config.emulator.capacity);
                println!("  Read-only:          {}", config.emulator.read_only);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.cloned().unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { .. } => {}
    }
    Ok(())
}

fn validate_config(file: Option<PathBuf>) -> ExitCode {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => {
            println!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Configuration error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_for_tag_errors() {
        let err = anyhow::Error::from(tagdoc::Error::validation("label required"));
        let message = failure_message(&err);

        assert_eq!(message, "Please check your input: label required");
        assert_eq!(message.matches("label required").count(), 1);
    }

    #[test]
    fn test_failure_message_for_other_errors() {
        let err = anyhow::anyhow!("radio offline").context("failed to start NFC hardware");
        assert_eq!(
            failure_message(&err),
            "Error: failed to start NFC hardware: radio offline"
        );
    }
}
