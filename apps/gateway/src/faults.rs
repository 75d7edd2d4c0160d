// [apps/gateway/src/faults.rs]
/*!
 * =================================================================
 * APARATO: STRUCTURED FAULT EMITTER (V2.0 - WIRE CONTRACT)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: PAYLOADS DE FALLO UNIFORMES HACIA EL CLIENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE SHAPE: Todo fallo cruza el perímetro como
 *    {error, code, message, ...extras}; el Dashboard renderiza por 'code'.
 * 2. CORRELATION TRAIL: Los fallos 5xx portan un identificador de
 *    correlación estable para el rastreo en el Panóptico.
 * =================================================================
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

/// Fallo estructurado mínimo.
pub fn fault_response(status: StatusCode, code: &str, message: &str) -> Response {
    fault_response_with(status, code, message, json!({}))
}

/// Fallo estructurado con campos adicionales (retry_after, upgrade, ...).
pub fn fault_response_with(status: StatusCode, code: &str, message: &str, extras: Value) -> Response {
    let mut payload = json!({
        "error": true,
        "code": code,
        "message": message,
    });

    if let (Some(payload_map), Some(extra_map)) = (payload.as_object_mut(), extras.as_object()) {
        for (key, value) in extra_map {
            payload_map.insert(key.clone(), value.clone());
        }
    }

    (status, Json(payload)).into_response()
}

/// Fallo interno 5xx con identificador de correlación cristalizado.
pub fn internal_fault_response(status: StatusCode, code: &str, message: &str) -> Response {
    let correlation_identifier = Uuid::new_v4().to_string();
    fault_response_with(
        status,
        code,
        message,
        json!({ "correlation_id": correlation_identifier }),
    )
}

/// Sugerencias de mejora adjuntas a los rechazos 402.
pub fn upgrade_hints() -> Value {
    json!({
        "upgrade": {
            "purchase_endpoint": "/api/v1/credits/purchase",
            "quote_endpoint": "/api/v1/quote"
        }
    })
}
