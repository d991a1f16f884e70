//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        AddressRequest, AddressResponse, CatalogSummary, GenerateRequest, GenerateResponse,
        HealthResponse,
    },
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use traitsmith_core::{
    CompositionError, ContentAddresser, HashAlgorithm, PublishError, primitives::MAX_PINS,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for a failed generation run.
#[must_use]
pub fn composition_status(error: &CompositionError) -> StatusCode {
    match error {
        CompositionError::Exhausted { .. } | CompositionError::Unsatisfiable { .. } => {
            StatusCode::CONFLICT
        }
        CompositionError::Catalog(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CompositionError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CompositionError::NoPartTypes
        | CompositionError::RequestTooLarge(_)
        | CompositionError::UnknownPartType(_)
        | CompositionError::DuplicatePartType(_)
        | CompositionError::UnknownTrait(_)
        | CompositionError::UnknownColor(_)
        | CompositionError::InvalidPin(_) => StatusCode::BAD_REQUEST,
    }
}

/// HTTP status for a failed publish.
#[must_use]
pub fn publish_status(error: &PublishError) -> StatusCode {
    match error {
        PublishError::Composition(e) => composition_status(e),
        PublishError::Compositor(_) | PublishError::Store(_) => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// CATALOG HANDLER
// =============================================================================

/// Summary of the loaded catalog.
pub async fn catalog_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(CatalogSummary::from_catalog(state.session.catalog()))
}

// =============================================================================
// GENERATE HANDLER
// =============================================================================

/// Run one generation request, optionally publishing the result.
///
/// Composition is CPU-bound and runs on the blocking pool.
pub async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> impl IntoResponse {
    if request.pins.len() > MAX_PINS {
        return (
            StatusCode::BAD_REQUEST,
            Json(GenerateResponse::error(format!(
                "Too many pins: {} (max {})",
                request.pins.len(),
                MAX_PINS
            ))),
        );
    }

    let task = tokio::task::spawn_blocking(move || run_generate(&state, &request));
    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Generation task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GenerateResponse::error("Generation task failed")),
            )
        }
    }
}

fn run_generate(state: &AppState, request: &GenerateRequest) -> (StatusCode, Json<GenerateResponse>) {
    let session = state.session.as_ref();
    let generation = request.to_request();

    let result = if request.retry {
        session.generate_retrying(&generation, state.retry_seeds)
    } else {
        session.generate(&generation)
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::info!(seed = request.seed, error = %e, "Generation rejected");
            return (
                composition_status(&e),
                Json(GenerateResponse::error(e.to_string())),
            );
        }
    };

    let published = if request.publish {
        match session.publish(&outcome, state.compositor.as_ref(), state.store.as_ref()) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                tracing::warn!(address = %outcome.address, error = %e, "Publish failed");
                return (
                    publish_status(&e),
                    Json(GenerateResponse::error(e.to_string())),
                );
            }
        }
    } else {
        None
    };

    (
        StatusCode::OK,
        Json(GenerateResponse::success(
            session.catalog(),
            &outcome,
            published.as_ref(),
        )),
    )
}

// =============================================================================
// ADDRESS HANDLER
// =============================================================================

/// Content-address a base64 payload.
pub async fn address_handler(
    State(state): State<AppState>,
    Json(request): Json<AddressRequest>,
) -> impl IntoResponse {
    let algorithm = match request.algorithm.as_deref() {
        Some(name) => match name.parse::<HashAlgorithm>() {
            Ok(a) => a,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(AddressResponse::error(e.to_string())),
                );
            }
        },
        None => state.session.config().algorithm,
    };

    let bytes = match BASE64.decode(request.data.as_bytes()) {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(AddressResponse::error(format!("Invalid base64: {}", e))),
            );
        }
    };

    let address = ContentAddresser::new(algorithm).address(&bytes);
    (
        StatusCode::OK,
        Json(AddressResponse::success(
            address.to_string(),
            algorithm.to_string(),
            bytes.len(),
        )),
    )
}
