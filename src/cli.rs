//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the tutor engine.

use clap::{Parser, Subcommand};

/// Tutor Engine - lesson content-generation pipeline
///
/// Scores a learner's answer and produces a six-stage lesson voiced by a
/// rotating cast, illustrated when an image provider is configured.
#[derive(Parser, Debug)]
#[command(name = "tutor-engine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one lesson for an answer and print the response
    Lesson {
        /// Lesson number (1-60)
        #[arg(short, long)]
        lesson: u32,

        /// The learner's answer
        #[arg(short, long)]
        answer: String,

        /// Path to configuration file
        #[arg(short, long, env = "TUTOR_CONFIG")]
        config: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Skip the illustration provider for this run
        #[arg(long)]
        no_artifacts: bool,
    },

    /// Walk the rotation selector over a range of lessons
    Simulate {
        /// First lesson
        #[arg(long, default_value = "1")]
        from: u32,

        /// Last lesson (inclusive)
        #[arg(long, default_value = "60")]
        to: u32,

        /// Seed for a reproducible walk
        #[arg(long)]
        seed: Option<u64>,

        /// Path to configuration file
        #[arg(short, long, env = "TUTOR_CONFIG")]
        config: Option<String>,
    },

    /// List the persona pool
    Personas,

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

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
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
