// [apps/gateway/src/handlers/webhooks.rs]
/*!
 * =================================================================
 * APARATO: PAYMENT WEBHOOK HANDLER (V3.1 - DOUBLE BARRIER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: INGESTA FIRMADA E IDEMPOTENTE DE EVENTOS DE PAGO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SIGNATURE FIRST: La firma HMAC se verifica sobre los bytes crudos
 *    del cuerpo, en tiempo constante, antes de cualquier parseo.
 * 2. REPLAY WINDOW: Eventos con timestamp fuera de la ventana (±5 min
 *    nominal) se rechazan con 400 y el proveedor no reintenta.
 * 3. DOUBLE BARRIER: La tabla durable de eventos + la idempotencia del
 *    grant por pago externo hacen seguro cualquier reintento, incluso a
 *    través de reinicios del proceso.
 *
 * # Mathematical Proof (At-Most-Once Grant):
 * Por cada event_id, a lo sumo una inserción cruza la barrera; por cada
 * payment_id, a lo sumo un grant cristaliza. Un fallo transitorio del
 * Ledger libera la barrera y responde 500, por lo que el reintento del
 * proveedor converge sin duplicar valor.
 * =================================================================
 */

use crate::faults::{fault_response, internal_fault_response};
use crate::security;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse as AxumResponse, Response},
    Json,
};
use chrono::Utc;
use espectro_domain_models::{
    BalanceKey, GrantSource, PaymentEventEnvelope, WebhookIngestOutcome,
    PAYMENT_SUCCEEDED_EVENT_KIND,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

/// Cabeceras del proveedor de pagos.
const EVENT_ID_HEADER: &str = "x-espectro-event-id";
const TIMESTAMP_HEADER: &str = "x-espectro-timestamp";
const SIGNATURE_HEADER: &str = "x-espectro-signature";

fn header_text<'h>(headers: &'h HeaderMap, header_name: &str) -> Option<&'h str> {
    headers.get(header_name).and_then(|header_value| header_value.to_str().ok())
}

pub struct PaymentWebhookHandler;

impl PaymentWebhookHandler {
    /**
     * Endpoint: POST /api/v1/webhooks/payment
     *
     * 200 en aceptación y en duplicado (idempotente); 400 ante firma o
     * timestamp inválidos (el proveedor no debe reintentar); 500 ante
     * fallo transitorio del Ledger (el proveedor debe reintentar).
     */
    #[instrument(skip(application_state, request_headers, raw_body))]
    pub async fn handle_payment_event(
        State(application_state): State<AppState>,
        request_headers: HeaderMap,
        raw_body: Bytes,
    ) -> Response {
        // --- FASE 1: EXTRACCIÓN DE CABECERAS DEL PROVEEDOR ---
        let (event_identifier, timestamp_label, presented_signature) = match (
            header_text(&request_headers, EVENT_ID_HEADER),
            header_text(&request_headers, TIMESTAMP_HEADER),
            header_text(&request_headers, SIGNATURE_HEADER),
        ) {
            (Some(event_identifier), Some(timestamp_label), Some(presented_signature)) => {
                (event_identifier, timestamp_label, presented_signature)
            }
            _ => {
                return fault_response(
                    StatusCode::BAD_REQUEST,
                    "WEBHOOK_HEADERS_MISSING",
                    "Provider event-id, timestamp and signature headers are required.",
                );
            }
        };

        // --- FASE 2: VENTANA DE REPLAY ---
        let event_timestamp_unix = match timestamp_label.parse::<i64>() {
            Ok(parsed_timestamp) => parsed_timestamp,
            Err(_) => {
                return fault_response(
                    StatusCode::BAD_REQUEST,
                    "WEBHOOK_TIMESTAMP_MALFORMED",
                    "The timestamp header is not a unix epoch value.",
                );
            }
        };

        let window_seconds = application_state.config.webhook_timestamp_window_seconds;
        if (Utc::now().timestamp() - event_timestamp_unix).abs() > window_seconds {
            warn!("⛔ [WEBHOOK_STALE]: Event [{}] outside the replay window.", event_identifier);
            return fault_response(
                StatusCode::BAD_REQUEST,
                "WEBHOOK_TIMESTAMP_STALE",
                "The event timestamp is outside the accepted window.",
            );
        }

        // --- FASE 3: FIRMA EN TIEMPO CONSTANTE SOBRE BYTES CRUDOS ---
        let signature_is_authentic = security::verify_webhook_signature(
            application_state.config.webhook_shared_secret.as_bytes(),
            event_identifier,
            timestamp_label,
            &raw_body,
            presented_signature,
        );

        if !signature_is_authentic {
            warn!("❌ [WEBHOOK_REJECTION]: Invalid signature for event [{}].", event_identifier);
            return fault_response(
                StatusCode::BAD_REQUEST,
                "WEBHOOK_SIGNATURE_INVALID",
                "The event signature does not authenticate.",
            );
        }

        // --- FASE 4: BARRERA DURABLE DE IDEMPOTENCIA ---
        let barrier_verdict = application_state
            .webhook_repository
            .register_event(
                event_identifier,
                &application_state.config.webhook_provider_label,
                "accepted",
            )
            .await;

        match barrier_verdict {
            Ok(WebhookIngestOutcome::Duplicate) => {
                return (StatusCode::OK, Json(json!({ "status": "duplicate" }))).into_response();
            }
            Ok(WebhookIngestOutcome::Accepted) => {}
            Err(barrier_fault) => {
                error!("❌ [WEBHOOK_FAULT]: Dedup barrier collapsed: {}", barrier_fault);
                return internal_fault_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WEBHOOK_BARRIER_FAILED",
                    "Durable deduplication is unavailable; retry the delivery.",
                );
            }
        }

        // --- FASE 5: PARSEO Y EMISIÓN DEL GRANT ---
        let envelope = match serde_json::from_slice::<PaymentEventEnvelope>(&raw_body) {
            Ok(envelope) => envelope,
            Err(decoding_fault) => {
                warn!("⚠️ [WEBHOOK_ENVELOPE]: Unparsable body for [{}]: {}", event_identifier, decoding_fault);
                // Firma válida con sobre corrupto: sellado como ignorado.
                return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
            }
        };

        if envelope.event_kind != PAYMENT_SUCCEEDED_EVENT_KIND {
            info!("➖ [WEBHOOK_IGNORED]: Event kind [{}] carries no ledger effect.", envelope.event_kind);
            return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
        }

        let grant_verdict = async {
            let user_identifier = application_state
                .user_repository
                .resolve_or_forge_by_provider_customer(
                    &envelope.data.provider_customer_identifier,
                    envelope.data.customer_email.as_deref(),
                )
                .await?;

            application_state
                .ledger_repository
                .grant(
                    &BalanceKey::User(user_identifier),
                    envelope.data.credit_amount,
                    &GrantSource::Pack(envelope.data.pack_identifier.clone()),
                    Some(&envelope.data.payment_identifier),
                )
                .await
        }
        .await;

        match grant_verdict {
            Ok(grant_identifier) => {
                info!(
                    "💰 [WEBHOOK_GRANTED]: Event [{}] crystallized grant [{}].",
                    event_identifier, grant_identifier
                );
                (StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response()
            }
            Err(ledger_fault) => {
                error!("❌ [WEBHOOK_FAULT]: Ledger grant collapsed: {}", ledger_fault);

                // Liberación de la barrera: el reintento del proveedor debe
                // reprocesar; la idempotencia del grant absorbe la carrera.
                if let Err(release_fault) = application_state
                    .webhook_repository
                    .release_event(event_identifier)
                    .await
                {
                    error!("💀 [WEBHOOK_FAULT]: Barrier release failed: {}", release_fault);
                }

                internal_fault_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WEBHOOK_LEDGER_FAILED",
                    "The credit grant could not be crystallized; retry the delivery.",
                )
            }
        }
    }
}
