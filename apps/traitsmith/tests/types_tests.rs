//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use traitsmith::api::{
    AddressRequest, AddressResponse, GenerateRequest, GenerateResponse, HealthResponse,
    composition_status, publish_status,
};
use traitsmith_core::{
    CatalogError, CompositionError, CompositorError, PublishError, StoreError,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.4.2".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.4.2\""));
}

// =============================================================================
// GENERATE REQUEST TESTS
// =============================================================================

#[test]
fn test_generate_request_defaults() {
    let json = r#"{"parts":["face","shirt"],"seed":9}"#;
    let request: GenerateRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.parts, vec!["face", "shirt"]);
    assert_eq!(request.seed, 9);
    assert!(request.pins.is_empty());
    assert!(!request.retry);
    assert!(!request.publish);
}

#[test]
fn test_generate_request_pins() {
    let json = r##"{
        "parts": ["face", "shirt"],
        "seed": 1,
        "pins": [
            {"part": "face", "trait": "F2"},
            {"part": "shirt", "trait": "S2", "color": "#ff0000"}
        ]
    }"##;
    let request: GenerateRequest = serde_json::from_str(json).unwrap();
    let generation = request.to_request();

    assert_eq!(generation.pins.len(), 2);
    assert_eq!(generation.pins[0].trait_code, "F2");
    assert_eq!(generation.pins[0].color, None);
    assert_eq!(generation.pins[1].color.as_deref(), Some("#ff0000"));
}

#[test]
fn test_generate_request_missing_seed_rejected() {
    let json = r#"{"parts":["face"]}"#;
    assert!(serde_json::from_str::<GenerateRequest>(json).is_err());
}

// =============================================================================
// GENERATE RESPONSE TESTS
// =============================================================================

#[test]
fn test_generate_response_error() {
    let response = GenerateResponse::error("No part types requested");

    assert!(!response.success);
    assert!(response.address.is_none());
    assert!(response.traits.is_empty());
    assert_eq!(response.error.as_deref(), Some("No part types requested"));
}

#[test]
fn test_generate_response_slot_uses_trait_key() {
    let json = r#"{
        "success": true, "seed": 1, "address": "Qm", "rarity_score": 5,
        "backtracks": 0, "fallbacks": 0, "published": null, "error": null,
        "traits": [{"part":"face","trait":"F1","name":"Smile","tier":"Common",
                    "color":null,"origin":"sampled","fallback":false}]
    }"#;
    let response: GenerateResponse = serde_json::from_str(json).unwrap();
    assert_eq!(response.traits[0].trait_code, "F1");

    let back = serde_json::to_string(&response).unwrap();
    assert!(back.contains("\"trait\":\"F1\""));
}

// =============================================================================
// ADDRESS TYPES TESTS
// =============================================================================

#[test]
fn test_address_request_algorithm_optional() {
    let request: AddressRequest = serde_json::from_str(r#"{"data":"aGk="}"#).unwrap();
    assert_eq!(request.data, "aGk=");
    assert!(request.algorithm.is_none());
}

#[test]
fn test_address_response_success() {
    let response = AddressResponse::success("Qmabc".to_string(), "sha2-256".to_string(), 3);
    assert!(response.success);
    assert_eq!(response.size, Some(3));
    assert!(response.error.is_none());
}

// =============================================================================
// STATUS MAPPING TESTS
// =============================================================================

#[test]
fn test_composition_status_mapping() {
    assert_eq!(
        composition_status(&CompositionError::NoPartTypes),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        composition_status(&CompositionError::InvalidPin("x".to_string())),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        composition_status(&CompositionError::Exhausted {
            backtracks: 4,
            conflicts: 2
        }),
        StatusCode::CONFLICT
    );
    assert_eq!(
        composition_status(&CompositionError::Unsatisfiable { attempts: 8 }),
        StatusCode::CONFLICT
    );
    assert_eq!(
        composition_status(&CompositionError::Catalog(CatalogError::NoActiveTiers)),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn test_publish_status_mapping() {
    assert_eq!(
        publish_status(&PublishError::Store(StoreError::Poisoned)),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        publish_status(&PublishError::Compositor(CompositorError::MissingLayer(
            "h1.png".to_string()
        ))),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        publish_status(&PublishError::Composition(CompositionError::Serialization(
            "x".to_string()
        ))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
