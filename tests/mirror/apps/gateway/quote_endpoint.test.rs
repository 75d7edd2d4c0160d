// [tests/mirror/apps/gateway/quote_endpoint.test.rs]
/**
 * =================================================================
 * APARATO: QUOTE ENDPOINT TEST (V3.0 - OPEN PRICING GATE)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE COTIZACIÓN ABIERTA, COTAS DE
 *                  PAYLOAD Y TECHO DE RÁFAGAS
 * =================================================================
 */

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use espectro_domain_models::RawMetadataDocument;
use espectro_gateway::prelude::*;
use espectro_infra_db::DatabaseClient;
use espectro_infra_extractor::{ExtractionAssignment, ExtractorError, MetadataExtractor};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

struct InertEngine;

impl MetadataExtractor for InertEngine {
    fn extract<'call>(
        &'call self,
        _assignment: ExtractionAssignment,
    ) -> BoxFuture<'call, Result<RawMetadataDocument, ExtractorError>> {
        Box::pin(async move { Ok(RawMetadataDocument::default()) })
    }
}

async fn forge_plane(database_label: &str, config: GatewayConfig) -> (axum::Router, AppState) {
    let client = DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar el plano en memoria");

    let state = AppState::new(client, Arc::new(InertEngine), config);
    (create_gateway_router(state.clone()), state)
}

fn quote_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/quote")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn file_descriptor(name: &str, megapixels: f64) -> Value {
    json!({
        "original_filename": name,
        "declared_mime_type": "image/jpeg",
        "size_bytes": 2_097_152u64,
        "megapixels": megapixels
    })
}

async fn response_json(response: axum::response::Response) -> Value {
    let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body_bytes).expect("Respuesta JSON malformada")
}

/**
 * ESCENARIO: cotización anónima nominal. El precio es determinista y el
 * snapshot del tarifario viaja en la respuesta.
 */
#[tokio::test]
async fn certify_open_quote_returns_sealed_pricing() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing unauthenticated pricing gate...");

    let (plane, state) = forge_plane("quote_open_plane", GatewayConfig::default()).await;

    let response = plane
        .clone()
        .oneshot(quote_request(json!({
            "files": [file_descriptor("alpha.jpg", 8.0), file_descriptor("beta.jpg", 30.0)],
            "ops": { "embedding": true }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;

    // alpha: base 1 + embedding 2 + bucket(8) 0 = 3
    // beta:  base 1 + embedding 2 + bucket(30) 2 = 5
    assert_eq!(body["creditsTotal"], 8);
    assert_eq!(body["perFile"][0]["credit_cost"], 3);
    assert_eq!(body["perFile"][1]["credit_cost"], 5);
    assert_eq!(body["schedule"]["schedule_version"], 3);
    assert_eq!(body["limits"]["max_files"], 10);
    assert!(body["quoteId"].is_string());
    assert!(body["expiresAt"].is_string());

    // La fila persistida es recuperable y activa
    let persisted = state
        .quote_repository
        .load_quote(body["quoteId"].as_str().unwrap())
        .await
        .unwrap();
    assert_eq!(persisted.credits_total, 8);

    println!("   ✅ [SUCCESS]: Deterministic pricing certified over the wire.");
}

/**
 * ESCENARIO: cotas de payload. Más de 10 archivos rebota con 400; un
 * tipo MIME fuera del conjunto cerrado rebota con 403.
 */
#[tokio::test]
async fn certify_payload_bounds_are_enforced() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing payload ceilings...");

    let (plane, _state) = forge_plane("quote_bounds_plane", GatewayConfig::default()).await;

    // 1. Once archivos
    let oversized_set: Vec<Value> =
        (0..11).map(|index| file_descriptor(&format!("file_{}.jpg", index), 1.0)).collect();
    let count_response = plane
        .clone()
        .oneshot(quote_request(json!({ "files": oversized_set })))
        .await
        .unwrap();
    assert_eq!(count_response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(count_response).await["code"], "FILE_COUNT_EXCEEDED");

    // 2. Tipo ejecutable prohibido
    let forbidden_response = plane
        .clone()
        .oneshot(quote_request(json!({
            "files": [{
                "original_filename": "payload.exe",
                "declared_mime_type": "application/x-msdownload",
                "size_bytes": 1024u64,
                "megapixels": 0.0
            }]
        })))
        .await
        .unwrap();
    assert_eq!(forbidden_response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response_json(forbidden_response).await["code"], "MIME_TYPE_FORBIDDEN");

    // 3. Archivo por encima del techo de bytes
    let oversized_file_response = plane
        .clone()
        .oneshot(quote_request(json!({
            "files": [{
                "original_filename": "giant.jpg",
                "declared_mime_type": "image/jpeg",
                "size_bytes": 200_000_000u64,
                "megapixels": 1.0
            }]
        })))
        .await
        .unwrap();
    assert_eq!(oversized_file_response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(oversized_file_response).await["code"], "FILE_SIZE_EXCEEDED");

    println!("   ✅ [SUCCESS]: Bounded payload contract certified.");
}

/**
 * ESCENARIO: techo de ráfaga corta. Con burst de 2 por minuto, la
 * tercera cotización desde la misma IP rebota con 429.
 */
#[tokio::test]
async fn certify_burst_ceiling_throttles_third_quote() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing per-IP burst ceiling...");

    let mut config = GatewayConfig::default();
    config.rate_limit_quote_burst_max = 2;

    let (plane, _state) = forge_plane("quote_burst_plane", config).await;
    let payload = json!({ "files": [file_descriptor("probe.jpg", 1.0)] });

    for _ in 0..2 {
        let admitted = plane.clone().oneshot(quote_request(payload.clone())).await.unwrap();
        assert_eq!(admitted.status(), StatusCode::OK);
    }

    let throttled = plane.clone().oneshot(quote_request(payload)).await.unwrap();
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);

    let throttled_body = response_json(throttled).await;
    assert_eq!(throttled_body["code"], "RATE_WINDOW_EXCEEDED");
    assert!(throttled_body["retry_after"].as_u64().unwrap() >= 1);

    println!("   ✅ [SUCCESS]: Fixed window throttle certified.");
}
