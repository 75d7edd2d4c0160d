// [apps/gateway/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: PERIMETER GUARD MATRIX (V4.1 - FAIL CLOSED)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: IDENTIDAD OPCIONAL, SALUD DE BARRIDO Y RATE LIMITING
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OPTIONAL CITIZENSHIP: El guardia de identidad decodifica el JWT si
 *    viaja y deja pasar al anónimo; la decisión de acceso vive en el
 *    pipeline, no en el perímetro.
 * 2. FAIL CLOSED: Si el daemon de barrido no late dentro del umbral, los
 *    endpoints de cotización y extracción cierran con 503.
 * 3. WINDOWED THROTTLE: Techos de ráfaga por IP en ventana fija para los
 *    endpoints no autenticados.
 * =================================================================
 */

use crate::faults::{fault_response, fault_response_with};
use crate::state::rate_limiter::RateVerdict;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Identidad del llamador inyectada en el flujo de la petición.
/// 'None' es un ciudadano anónimo legítimo del plano.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user_identifier: Option<String>,
}

/// Estructura mínima para la decodificación de claims del JWT upstream.
#[derive(Debug, Deserialize)]
struct UpstreamJwtClaims {
    /// El Subject del token (User UUID).
    sub: String,
}

/**
 * Guardia de Identidad: decodifica el payload del JWT (segundo segmento)
 * cuando viaja en Authorization. La validación criptográfica de la firma
 * la ejecuta el API Gateway aguas arriba; aquí solo se extrae el sujeto.
 */
pub async fn identity_guard(mut request: Request, next: Next) -> Response {
    let mut resolved_identity = CallerIdentity { user_identifier: None };

    let authorization_content = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok());

    if let Some(header_value) = authorization_content {
        if let Some(token_raw) = header_value.strip_prefix("Bearer ") {
            let jwt_segments: Vec<&str> = token_raw.split('.').collect();
            if jwt_segments.len() == 3 {
                if let Ok(payload_decoded_bytes) = BASE64_URL.decode(jwt_segments[1]) {
                    if let Ok(claims) = serde_json::from_slice::<UpstreamJwtClaims>(&payload_decoded_bytes) {
                        debug!("👤 [IDENTITY]: Operator {} recognized via JWT.", claims.sub);
                        resolved_identity.user_identifier = Some(claims.sub);
                    }
                }
            }
        }
    }

    request.extensions_mut().insert(resolved_identity);
    next.run(request).await
}

/**
 * Guardia de Salud del Barrido: cierre fail-closed del plano de
 * cotización/extracción cuando el daemon no late dentro del umbral.
 */
pub async fn sweeper_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.sweeper_is_fresh() {
        warn!("⛔ [SWEEPER_STALE]: Maintenance pulse beyond threshold; closing plane.");
        return fault_response_with(
            StatusCode::SERVICE_UNAVAILABLE,
            "MAINTENANCE_PULSE_STALE",
            "Quote maintenance is not running; plane closed to protect the ledger.",
            json!({ "retry_after": 60 }),
        );
    }
    next.run(request).await
}

/// Dirección del cliente para el bucket de ráfagas. Primer salto de
/// X-Forwarded-For o 'direct' cuando el proxy no lo transporta.
fn resolve_client_address(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|forwarded_chain| forwarded_chain.split(',').next())
        .map(|first_hop| first_hop.trim().to_string())
        .unwrap_or_else(|| "direct".to_string())
}

fn throttled_response(retry_after_seconds: u64) -> Response {
    fault_response_with(
        StatusCode::TOO_MANY_REQUESTS,
        "RATE_WINDOW_EXCEEDED",
        "Burst ceiling reached for this endpoint.",
        json!({ "retry_after": retry_after_seconds }),
    )
}

/**
 * Techo de ráfagas del endpoint de cotización: ventana larga + ráfaga corta.
 */
pub async fn quote_rate_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client_address = resolve_client_address(&request);

    let sustained_verdict = state.rate_limiter.evaluate(
        &format!("{}:quote", client_address),
        Duration::from_secs(state.config.rate_limit_quote_window_seconds),
        state.config.rate_limit_quote_max,
    );
    if let RateVerdict::Throttled { retry_after_seconds } = sustained_verdict {
        return throttled_response(retry_after_seconds);
    }

    let burst_verdict = state.rate_limiter.evaluate(
        &format!("{}:quote_burst", client_address),
        Duration::from_secs(state.config.rate_limit_quote_burst_window_seconds),
        state.config.rate_limit_quote_burst_max,
    );
    if let RateVerdict::Throttled { retry_after_seconds } = burst_verdict {
        return throttled_response(retry_after_seconds);
    }

    next.run(request).await
}

/**
 * Techo de ráfagas del endpoint de extracción.
 */
pub async fn extract_rate_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client_address = resolve_client_address(&request);

    let verdict = state.rate_limiter.evaluate(
        &format!("{}:extract", client_address),
        Duration::from_secs(state.config.rate_limit_extract_window_seconds),
        state.config.rate_limit_extract_max,
    );

    match verdict {
        RateVerdict::Admitted => next.run(request).await,
        RateVerdict::Throttled { retry_after_seconds } => throttled_response(retry_after_seconds),
    }
}

/// Rechazo uniforme para peticiones sin identidad autenticada en los
/// endpoints de comercio.
pub fn unauthorized_response() -> Response {
    fault_response(
        StatusCode::UNAUTHORIZED,
        "AUTHENTICATION_REQUIRED",
        "This endpoint requires an authenticated account.",
    )
}
