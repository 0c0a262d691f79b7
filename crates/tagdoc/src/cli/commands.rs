//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// A `LABEL=VALUE` pair given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldArg {
    /// Field label. May be blank; blank labels are dropped before writing.
    pub label: String,
    /// Field value. May be empty.
    pub value: String,
}

impl std::str::FromStr for FieldArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected LABEL=VALUE, got '{s}'"))?;
        Ok(Self {
            label: label.to_string(),
            value: value.to_string(),
        })
    }
}

/// Read command arguments.
#[derive(Debug, Args)]
pub struct ReadCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Write command arguments.
#[derive(Debug, Args)]
pub struct WriteCommand {
    /// Fields to merge into the tag document
    #[arg(value_name = "LABEL=VALUE", required = true)]
    pub fields: Vec<FieldArg>,

    /// Output the merged document as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl WriteCommand {
    /// The fields as `(label, value)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.fields
            .iter()
            .map(|field| (field.label.clone(), field.value.clone()))
    }
}

/// Lock and unlock command arguments.
#[derive(Debug, Args)]
pub struct PasswordCommand {
    /// Tag password
    #[arg(short, long)]
    pub password: String,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_arg_parse() {
        let field: FieldArg = "ID=DEV-42".parse().unwrap();
        assert_eq!(field.label, "ID");
        assert_eq!(field.value, "DEV-42");
    }

    #[test]
    fn test_field_arg_splits_on_first_equals() {
        let field: FieldArg = "expr=a=b".parse().unwrap();
        assert_eq!(field.label, "expr");
        assert_eq!(field.value, "a=b");
    }

    #[test]
    fn test_field_arg_allows_empty_parts() {
        let field: FieldArg = "=orphan".parse().unwrap();
        assert!(field.label.is_empty());

        let field: FieldArg = "note=".parse().unwrap();
        assert!(field.value.is_empty());
    }

    #[test]
    fn test_field_arg_requires_equals() {
        let err = "no-separator".parse::<FieldArg>().unwrap_err();
        assert!(err.contains("LABEL=VALUE"));
    }
}
