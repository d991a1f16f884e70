//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::AppError;
use crate::api::{self, AppState, CatalogSummary, GenerateResponse};
use crate::config::{AppConfig, FileCatalogSource};
use std::path::Path;
use std::sync::Arc;
use traitsmith_core::{
    Catalog, CompositionError, ContentAddresser, GenerationRequest, GenerationSession,
    ManifestCompositor, Pin,
};

/// Maximum file size for `address` (512 MB).
const MAX_ADDRESS_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Load and validate a catalog file.
fn load_catalog(path: &Path) -> Result<Catalog, AppError> {
    Ok(Catalog::load(&FileCatalogSource::new(path))?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| AppError::Io(format!("JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Load a catalog and report what it holds, or why it was refused.
pub fn cmd_validate(catalog_path: &Path, json: bool) -> Result<(), AppError> {
    let catalog = match load_catalog(catalog_path) {
        Ok(c) => c,
        Err(e) => {
            if json {
                print_json(&serde_json::json!({ "valid": false, "error": e.to_string() }))?;
            } else {
                println!("Catalog INVALID: {}", e);
            }
            return Err(e);
        }
    };

    let summary = CatalogSummary::from_catalog(&catalog);
    if json {
        return print_json(&serde_json::json!({ "valid": true, "catalog": summary }));
    }

    println!("Catalog OK: {}", catalog_path.display());
    println!();
    println!("Rarity tiers:");
    for tier in &summary.tiers {
        println!(
            "  {:>3}  {:<16} {:>3}.{:02}%{}",
            tier.code,
            tier.name,
            tier.percentage_bps / 100,
            tier.percentage_bps % 100,
            if tier.active { "" } else { "  (inactive)" }
        );
    }
    println!();
    println!("Part types:");
    for part in &summary.part_types {
        println!(
            "  {:<16} layer {:>3}  {:>4} traits{}",
            part.code,
            part.layer,
            part.trait_count,
            if part.colored { "  colored" } else { "" }
        );
    }
    println!();
    println!("Traits:           {}", summary.trait_count);
    println!("Colors:           {}", summary.color_count);
    println!("Dependency edges: {}", summary.edge_count);
    Ok(())
}

// =============================================================================
// GENERATE COMMAND
// =============================================================================

/// Arguments of `generate` beyond the catalog path.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub parts: Vec<String>,
    pub seed: u64,
    /// `PART=TRAIT` or `PART=TRAIT:#COLOR`.
    pub pins: Vec<String>,
    pub retry: bool,
    pub publish: bool,
}

/// Parse a `PART=TRAIT[:COLOR]` pin.
pub fn parse_pin(text: &str) -> Result<Pin, AppError> {
    let invalid = || {
        AppError::Composition(CompositionError::InvalidPin(format!(
            "'{}' is not PART=TRAIT or PART=TRAIT:COLOR",
            text
        )))
    };

    let (part, rest) = text.split_once('=').ok_or_else(invalid)?;
    let (trait_code, color) = match rest.split_once(':') {
        Some((t, c)) => (t, Some(c)),
        None => (rest, None),
    };
    if part.is_empty() || trait_code.is_empty() || color.is_some_and(str::is_empty) {
        return Err(invalid());
    }

    Ok(Pin {
        part: part.to_string(),
        trait_code: trait_code.to_string(),
        color: color.map(str::to_string),
    })
}

/// Generate one trait set and print it.
pub fn cmd_generate(
    config: &AppConfig,
    catalog_path: &Path,
    options: &GenerateOptions,
    json: bool,
) -> Result<(), AppError> {
    let catalog = load_catalog(catalog_path)?;
    let session = GenerationSession::new(Arc::new(catalog), config.session_config());

    let request = GenerationRequest {
        parts: options.parts.clone(),
        seed: options.seed,
        pins: options
            .pins
            .iter()
            .map(|p| parse_pin(p))
            .collect::<Result<_, _>>()?,
    };

    let outcome = if options.retry {
        session.generate_retrying(&request, config.generation.retry_seeds)?
    } else {
        session.generate(&request)?
    };

    let published = if options.publish {
        let store = config.open_store()?;
        Some(session.publish(&outcome, &ManifestCompositor, store.as_ref())?)
    } else {
        None
    };

    let response = GenerateResponse::success(session.catalog(), &outcome, published.as_ref());
    if json {
        return print_json(&response);
    }

    println!("Address:      {}", outcome.address);
    println!("Seed:         {}", outcome.traits.seed());
    println!("Rarity score: {}", outcome.rarity_score);
    println!(
        "Backtracks:   {} (budget {})",
        outcome.report.backtracks, outcome.report.budget
    );
    println!();
    for slot in &response.traits {
        println!(
            "  {:<16} {:<16} {:<12} {:<9} {}{}",
            slot.part,
            slot.trait_code,
            slot.tier,
            slot.color.as_deref().unwrap_or("-"),
            slot.origin,
            if slot.fallback { " (fallback)" } else { "" }
        );
    }
    if let Some(published) = &response.published {
        println!();
        println!("Image:        {}", published.image);
        println!("Metadata:     {}", published.metadata);
        println!("Edition:      #{}", published.edition);
    }
    Ok(())
}

// =============================================================================
// ADDRESS COMMAND
// =============================================================================

/// Print the content address of a file.
pub fn cmd_address(config: &AppConfig, file: &Path, json: bool) -> Result<(), AppError> {
    let metadata = std::fs::metadata(file)
        .map_err(|e| AppError::Io(format!("Cannot read '{}': {}", file.display(), e)))?;
    if metadata.len() > MAX_ADDRESS_FILE_SIZE {
        return Err(AppError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_ADDRESS_FILE_SIZE
        )));
    }
    let bytes = std::fs::read(file)
        .map_err(|e| AppError::Io(format!("Cannot read '{}': {}", file.display(), e)))?;

    let algorithm = config.generation.algorithm;
    let address = ContentAddresser::new(algorithm).address(&bytes);

    if json {
        print_json(&api::AddressResponse::success(
            address.to_string(),
            algorithm.to_string(),
            bytes.len(),
        ))
    } else {
        println!("{}", address);
        Ok(())
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig, catalog_path: &Path) -> Result<(), AppError> {
    let catalog = load_catalog(catalog_path)?;
    let session = GenerationSession::new(Arc::new(catalog), config.session_config());
    let store = config.open_store()?;

    println!("Traitsmith Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", config.server.host);
    println!("  Port:      {}", config.server.port);
    println!("  Catalog:   {}", catalog_path.display());
    println!("  Algorithm: {}", config.generation.algorithm);
    println!();
    println!("Endpoints:");
    println!("  GET  /health   - Health check");
    println!("  GET  /catalog  - Catalog summary");
    println!("  POST /generate - Generate a trait set");
    println!("  POST /address  - Content-address a payload");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(session, store)
        .with_retry_seeds(config.generation.retry_seeds)
        .with_body_limit(config.server.max_body_bytes);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::run_server(&addr, state).await
}
