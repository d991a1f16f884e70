//! # Traitsmith
//!
//! The main binary for the Traitsmith trait generator.
//!
//! This application provides:
//! - CLI interface for catalog validation, generation and addressing
//! - HTTP REST API server (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              apps/traitsmith (THE BINARY)        │
//! │                                                  │
//! │   ┌─────────────┐            ┌─────────────┐     │
//! │   │    CLI      │            │  HTTP API   │     │
//! │   │   (clap)    │            │   (axum)    │     │
//! │   └──────┬──────┘            └──────┬──────┘     │
//! │          └──────────────┬───────────┘            │
//! │                         ▼                        │
//! │                ┌─────────────────┐               │
//! │                │ traitsmith-core │               │
//! │                │  (THE ENGINE)   │               │
//! │                └─────────────────┘               │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! traitsmith validate -C catalog.toml
//! traitsmith generate -C catalog.toml -p face,shirt -s 42 --pin face=F2
//! traitsmith address -f image.png
//! traitsmith server -C catalog.toml --port 8080
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use traitsmith::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // TRAITSMITH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TRAITSMITH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "traitsmith=debug,traitsmith_core=debug,tower_http=debug"
    } else {
        "traitsmith=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json && matches!(cli.command, cli::Commands::Server { .. }) {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Traitsmith startup banner.
fn print_banner() {
    println!(
        r#"
  ╔╦╗┬─┐┌─┐┬┌┬┐┌─┐┌┬┐┬┌┬┐┬ ┬
   ║ ├┬┘├─┤│ │ └─┐││││ │ ├─┤
   ╩ ┴└─┴ ┴┴ ┴ └─┘┴ ┴┴ ┴ ┴ ┴

  Trait Generator v{}

  Deterministic • Constraint-Respecting • Content-Addressed
"#,
        env!("CARGO_PKG_VERSION")
    );
}
