//! # Traitsmith CLI Module
//!
//! This module implements the CLI interface for Traitsmith.
//!
//! ## Available Commands
//!
//! - `validate` - Load a catalog and report integrity errors
//! - `generate` - Generate one trait set (optionally publish it)
//! - `address` - Compute the content address of a file
//! - `server` - Start the HTTP server

mod commands;

use crate::AppError;
use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Traitsmith - deterministic trait generator
///
/// Composes rarity-weighted, constraint-respecting trait sets from a catalog
/// and content-addresses the result.
#[derive(Parser, Debug)]
#[command(name = "traitsmith")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (default: ./traitsmith.toml if present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a catalog and check its integrity
    Validate {
        /// Catalog file (TOML or JSON)
        #[arg(short = 'C', long)]
        catalog: PathBuf,
    },

    /// Generate one trait set
    Generate {
        /// Catalog file (TOML or JSON)
        #[arg(short = 'C', long)]
        catalog: PathBuf,

        /// Required part type codes (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        parts: Vec<String>,

        /// RNG seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Pin a trait: PART=TRAIT or PART=TRAIT:#COLOR (repeatable)
        #[arg(long = "pin")]
        pins: Vec<String>,

        /// Retry exhausted runs with derived seeds
        #[arg(short, long)]
        retry: bool,

        /// Composite and store the artifact and its metadata
        #[arg(long)]
        publish: bool,

        /// Fixed backtrack budget (overrides the config file)
        #[arg(long)]
        budget: Option<usize>,
    },

    /// Compute the content address of a file
    Address {
        /// Input file
        #[arg(short, long)]
        file: PathBuf,

        /// Hash algorithm (sha2-256, blake3)
        #[arg(short, long)]
        algorithm: Option<String>,
    },

    /// Start HTTP server
    Server {
        /// Catalog file (TOML or JSON)
        #[arg(short = 'C', long)]
        catalog: PathBuf,

        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Validate { catalog } => cmd_validate(&catalog, json),
        Commands::Generate {
            catalog,
            parts,
            seed,
            pins,
            retry,
            publish,
            budget,
        } => {
            if budget.is_some() {
                config.generation.backtrack_budget = budget;
            }
            let options = GenerateOptions {
                parts,
                seed,
                pins,
                retry,
                publish,
            };
            cmd_generate(&config, &catalog, &options, json)
        }
        Commands::Address { file, algorithm } => {
            if let Some(name) = algorithm {
                config.generation.algorithm = name.parse()?;
            }
            cmd_address(&config, &file, json)
        }
        Commands::Server {
            catalog,
            host,
            port,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config, &catalog).await
        }
    }
}
