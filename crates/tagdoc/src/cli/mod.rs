//! Command-line interface for tagdoc.
//!
//! This module provides the CLI structure for the `tagdoc` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, FieldArg, PasswordCommand, ReadCommand, WriteCommand};

use crate::logging::Verbosity;

/// tagdoc - Keep a small labelled document on an NFC tag
///
/// Reads and writes a JSON key/value document stored as a single NDEF text
/// record, with optional password locking.
#[derive(Debug, Parser)]
#[command(name = "tagdoc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the emulated tag image (overrides the configuration)
    #[arg(long, global = true, value_name = "FILE")]
    pub tag_image: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
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
    /// Read the document on the tag
    Read(ReadCommand),

    /// Merge LABEL=VALUE fields into the document on the tag
    Write(WriteCommand),

    /// Lock the tag with a password
    Lock(PasswordCommand),

    /// Unlock the tag with its password
    Unlock(PasswordCommand),

    /// Print the raw NDEF message and how it decodes
    Dump,

    /// Replace the document on the tag with an empty one
    Erase,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                2 => Verbosity::Debug,
                _ => Verbosity::Trace,
            }
        }
    }
}
