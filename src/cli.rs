//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the delegate runtime.

use clap::{Parser, Subcommand};

use crate::backend::CPU_REF_NAME;

/// Delegate Runtime - load and run ahead-of-time compiled delegates
///
/// Resolves backends by name, initializes compiled units on them, executes
/// them, and adjusts backend options at runtime.
#[derive(Parser, Debug)]
#[command(name = "delegate-runtime")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "DELEGATE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered backends and whether they can run here
    Backends,

    /// Load a compiled unit, execute it, and print the outputs
    Run {
        /// Compiled unit file
        program: String,

        /// Backend the unit was compiled for
        #[arg(short, long, default_value = CPU_REF_NAME)]
        backend: String,

        /// Compile spec passed to init (key=value, repeatable)
        #[arg(short, long = "spec", value_name = "KEY=VALUE")]
        specs: Vec<String>,

        /// Input tensor as comma-separated floats (repeatable, in order)
        #[arg(short, long = "input", value_name = "V,V,...")]
        inputs: Vec<String>,

        /// Named constant as name=v,v,... (repeatable)
        #[arg(long = "data", value_name = "NAME=V,V,...")]
        data: Vec<String>,

        /// Backend option applied before loading (key=value, repeatable)
        #[arg(short, long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Number of times to execute
        #[arg(short = 'n', long, default_value = "1")]
        iterations: u32,
    },

    /// Read or update backend options
    Option {
        #[command(subcommand)]
        subcommand: OptionSubcommand,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Option subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum OptionSubcommand {
    /// Print the current value of each key
    Get {
        /// Backend name
        backend: String,

        /// Option keys
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Apply key=value assignments
    Set {
        /// Backend name
        backend: String,

        /// Assignments (key=value)
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate,
}
