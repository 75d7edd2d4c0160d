// [tests/mirror/apps/gateway/webhook_ingest.test.rs]
/**
 * =================================================================
 * APARATO: WEBHOOK INGEST TEST (V3.1 - SIGNED BARRIER)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE FIRMA, VENTANA DE REPLAY Y
 *                  GRANT ÚNICO POR EVENTO (P5 END-TO-END)
 * =================================================================
 */

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use espectro_domain_models::RawMetadataDocument;
use espectro_gateway::prelude::*;
use espectro_gateway::security::compute_webhook_signature;
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

async fn forge_plane(database_label: &str) -> (axum::Router, AppState) {
    let client = DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar el plano en memoria");

    let state = AppState::new(client, Arc::new(InertEngine), GatewayConfig::default());
    (create_gateway_router(state.clone()), state)
}

fn signed_webhook_request(
    state: &AppState,
    event_identifier: &str,
    timestamp_unix: i64,
    raw_body: &str,
    signature_override: Option<&str>,
) -> Request<Body> {
    let timestamp_label = timestamp_unix.to_string();
    let computed_signature = compute_webhook_signature(
        state.config.webhook_shared_secret.as_bytes(),
        event_identifier,
        &timestamp_label,
        raw_body.as_bytes(),
    );

    Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/payment")
        .header("Content-Type", "application/json")
        .header("x-espectro-event-id", event_identifier)
        .header("x-espectro-timestamp", timestamp_label)
        .header("x-espectro-signature", signature_override.unwrap_or(&computed_signature))
        .body(Body::from(raw_body.to_string()))
        .unwrap()
}

fn payment_body(payment_identifier: &str) -> String {
    json!({
        "type": "payment.succeeded",
        "data": {
            "payment_identifier": payment_identifier,
            "provider_customer_identifier": "cus_mirror_01",
            "customer_email": "operator@espectro.dev",
            "pack_identifier": "pack_pro_100",
            "credit_amount": 100
        }
    })
    .to_string()
}

async fn response_json(response: axum::response::Response) -> Value {
    let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body_bytes).expect("Respuesta JSON malformada")
}

async fn scalar_count(state: &AppState, sql: &str) -> i64 {
    let connection = state.database_client.get_connection().unwrap();
    let mut results = connection.query(sql, ()).await.unwrap();
    results.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
}

/**
 * ESCENARIO: el mismo evento entregado dos veces. Esperado 200 y 200,
 * con exactamente un grant, una transacción y una fila de barrera.
 */
#[tokio::test]
async fn certify_webhook_replay_yields_single_grant() {
    println!("\n🪝 [PROVING_GROUNDS]: Auditing signed replay convergence...");

    let (plane, state) = forge_plane("webhook_replay_plane").await;
    let raw_body = payment_body("pay_mirror_777");
    let now_unix = Utc::now().timestamp();

    let first_response = plane
        .clone()
        .oneshot(signed_webhook_request(&state, "evt_mirror_777", now_unix, &raw_body, None))
        .await
        .unwrap();
    assert_eq!(first_response.status(), StatusCode::OK);
    assert_eq!(response_json(first_response).await["status"], "accepted");

    let replay_response = plane
        .clone()
        .oneshot(signed_webhook_request(&state, "evt_mirror_777", now_unix, &raw_body, None))
        .await
        .unwrap();
    assert_eq!(replay_response.status(), StatusCode::OK);
    assert_eq!(response_json(replay_response).await["status"], "duplicate");

    // Estado del Ledger: un grant, una transacción 'grant', una barrera
    assert_eq!(scalar_count(&state, "SELECT COUNT(*) FROM credit_grants").await, 1);
    assert_eq!(
        scalar_count(&state, "SELECT COUNT(*) FROM credit_transactions WHERE kind = 'grant'").await,
        1
    );
    assert_eq!(
        scalar_count(&state, "SELECT COUNT(*) FROM processed_webhooks WHERE event_id = 'evt_mirror_777'").await,
        1
    );
    assert_eq!(
        scalar_count(&state, "SELECT COALESCE(SUM(credits), 0) FROM credit_balances").await,
        100
    );

    println!("   ✅ [SUCCESS]: Double barrier certified end-to-end.");
}

/**
 * ESCENARIO: firma inválida y timestamp rancio. Ambos rebotan con 400
 * sin dejar rastro en la barrera ni en el Ledger.
 */
#[tokio::test]
async fn certify_rejections_leave_no_trace() {
    println!("\n🪝 [PROVING_GROUNDS]: Auditing rejection purity...");

    let (plane, state) = forge_plane("webhook_reject_plane").await;
    let raw_body = payment_body("pay_mirror_900");
    let now_unix = Utc::now().timestamp();

    // 1. Firma forjada
    let forged_response = plane
        .clone()
        .oneshot(signed_webhook_request(
            &state,
            "evt_forged",
            now_unix,
            &raw_body,
            Some("deadbeef00"),
        ))
        .await
        .unwrap();
    assert_eq!(forged_response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(forged_response).await["code"], "WEBHOOK_SIGNATURE_INVALID");

    // 2. Timestamp fuera de la ventana de 5 minutos
    let stale_unix = now_unix - 3600;
    let stale_response = plane
        .clone()
        .oneshot(signed_webhook_request(&state, "evt_stale", stale_unix, &raw_body, None))
        .await
        .unwrap();
    assert_eq!(stale_response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(stale_response).await["code"], "WEBHOOK_TIMESTAMP_STALE");

    // 3. Cabeceras ausentes
    let bare_request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/payment")
        .header("Content-Type", "application/json")
        .body(Body::from(raw_body.clone()))
        .unwrap();
    let bare_response = plane.clone().oneshot(bare_request).await.unwrap();
    assert_eq!(bare_response.status(), StatusCode::BAD_REQUEST);

    // Pureza: ni barrera ni valor cristalizado
    assert_eq!(scalar_count(&state, "SELECT COUNT(*) FROM processed_webhooks").await, 0);
    assert_eq!(scalar_count(&state, "SELECT COUNT(*) FROM credit_grants").await, 0);

    println!("   ✅ [SUCCESS]: Never-retry rejections certified mutation-free.");
}

/**
 * ESCENARIO: evento firmado de naturaleza ajena al Ledger. Se sella en
 * la barrera y responde 200 'ignored' sin emitir valor.
 */
#[tokio::test]
async fn certify_foreign_event_kinds_are_sealed_but_inert() {
    let (plane, state) = forge_plane("webhook_inert_plane").await;

    let raw_body = json!({
        "type": "customer.updated",
        "data": {
            "payment_identifier": "pay_none",
            "provider_customer_identifier": "cus_mirror_02",
            "pack_identifier": "none",
            "credit_amount": 0
        }
    })
    .to_string();

    let response = plane
        .clone()
        .oneshot(signed_webhook_request(
            &state,
            "evt_foreign",
            Utc::now().timestamp(),
            &raw_body,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "ignored");

    assert_eq!(scalar_count(&state, "SELECT COUNT(*) FROM processed_webhooks").await, 1);
    assert_eq!(scalar_count(&state, "SELECT COUNT(*) FROM credit_grants").await, 0);
}
