//! Command-line interface for the parking puzzle client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solve Parking - sliding-block puzzle client
#[derive(Parser, Debug)]
#[command(name = "parking")]
#[command(about = "Client for the parking puzzle backend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the backend API
    #[arg(
        long,
        env = "PARKING_API_BASE",
        default_value = "http://127.0.0.1:8000/api"
    )]
    pub base_url: String,

    /// Session token attached to every request (generated when omitted)
    #[arg(long, env = "PARKING_SESSION")]
    pub session: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch and print the current puzzle state
    Show,

    /// Move a vehicle by a signed number of steps
    Move {
        /// Vehicle identifier, e.g. "X"
        vehicle: String,

        /// Signed step count (positive is down/right)
        #[arg(allow_hyphen_values = true)]
        steps: i32,
    },

    /// Reset the puzzle to the active stored layout
    Reset,

    /// Run the solver and replay its solution
    Solve,

    /// Validate a puzzle layout read as JSON from stdin
    Validate,

    /// Manage stored puzzle configurations
    #[command(subcommand)]
    Configs(ConfigCommand),
}

/// Stored-configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// List stored configurations
    List,

    /// Fetch one stored configuration
    Get {
        /// Configuration id
        id: i64,
    },

    /// Store the current puzzle (or a JSON file) under a name
    Save {
        /// Display name for the configuration
        name: String,

        /// Read the layout from this JSON file instead of the backend
        #[arg(long)]
        file: Option<PathBuf>,

        /// Store without making it the active configuration
        #[arg(long)]
        no_activate: bool,
    },

    /// Update a stored configuration from a JSON file
    Update {
        /// Configuration id
        id: i64,

        /// Read the replacement layout from this JSON file
        #[arg(long)]
        file: PathBuf,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// Set or clear the active flag
        #[arg(long)]
        activate: Option<bool>,
    },

    /// Make a stored configuration the active one
    Activate {
        /// Configuration id
        id: i64,
    },

    /// Delete a stored configuration
    Delete {
        /// Configuration id
        id: i64,
    },
}
