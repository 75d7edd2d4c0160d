// INICIO DEL ARCHIVO [apps/gateway/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V4.1 - REQUEST PLANE TOPOLOGY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: TOPOLOGÍA DE EXTRACCIÓN, COMERCIO Y WEBHOOKS
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. EXTRACTION STRATUM: /quote y /extract bajo guardia de salud del
 *    barrido (fail-closed) y techos de ráfaga por IP.
 * 2. COMMERCE STRATUM: balance, historial y checkout autenticados.
 * 3. WEBHOOK GATE: ingesta cruda firmada del proveedor de pagos, sin
 *    límite de ráfaga (el proveedor reintenta con backoff propio).
 * =================================================================
 */

use crate::handlers::{
    credits::CreditHandler, extract::ExtractionPipelineHandler, quote::QuoteHandler,
    webhooks::PaymentWebhookHandler,
};
use crate::middleware::{extract_rate_guard, identity_guard, quote_rate_guard, sweeper_guard};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Techo del cuerpo JSON del plano de control. Los bytes de los archivos
/// viajan por el transporte de buffering, nunca por estos endpoints.
const CONTROL_PLANE_BODY_LIMIT_BYTES: usize = 1024 * 1024;

pub fn create_gateway_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS para el Dashboard y herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE EXTRACCIÓN: cotización abierta + extracción compuesta.
    let extraction_stratum = Router::new()
        .route(
            "/quote",
            post(QuoteHandler::handle_create_quote).layer(middleware::from_fn_with_state(
                application_shared_state.clone(),
                quote_rate_guard,
            )),
        )
        .route(
            "/extract",
            post(ExtractionPipelineHandler::handle_extract).layer(middleware::from_fn_with_state(
                application_shared_state.clone(),
                extract_rate_guard,
            )),
        )
        // Cierre fail-closed cuando el daemon de barrido no late.
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), sweeper_guard));

    // ESTRATO DE COMERCIO: superficie autenticada de la cuenta.
    let commerce_stratum = Router::new()
        .route("/credits/balance", get(CreditHandler::handle_get_balance))
        .route("/credits/history", get(CreditHandler::handle_get_history))
        .route("/credits/purchase", post(CreditHandler::handle_purchase_checkout));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest(
            "/api/v1",
            Router::new()
                .merge(extraction_stratum)
                .merge(commerce_stratum)
                .route("/webhooks/payment", post(PaymentWebhookHandler::handle_payment_event))
                // Identidad opcional inyectada para todos los estratos.
                .layer(middleware::from_fn(identity_guard)),
        )
        .layer(RequestBodyLimitLayer::new(CONTROL_PLANE_BODY_LIMIT_BYTES))
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/gateway/src/routes.rs]
