// [tests/mirror/apps/gateway/extract_pipeline.test.rs]
/**
 * =================================================================
 * APARATO: EXTRACTION PIPELINE TEST (V4.2 - END TO END)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE CUOTA ANÓNIMA, REPLAY, REDACCIÓN
 *                  Y DEVOLUCIÓN ANTE FALLO DEL MOTOR
 * =================================================================
 */

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use espectro_domain_models::{
    BalanceKey, BurnedTextBlock, ComputedImageProperties, FileHashSet, GpsCoordinates,
    GrantSource, QuoteStatus, RawMetadataDocument, ThumbnailArtifact, TransactionKind,
};
use espectro_gateway::prelude::*;
use espectro_infra_db::DatabaseClient;
use espectro_infra_extractor::{ExtractionAssignment, ExtractorError, MetadataExtractor};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

// --- DOBLE DETERMINISTA DEL MOTOR DE EXTRACCIÓN ---

#[derive(Clone, Copy)]
enum EngineScript {
    RichDocument,
    Timeout,
}

struct ScriptedEngine {
    script: EngineScript,
}

fn rich_document() -> RawMetadataDocument {
    let mut document = RawMetadataDocument::default();
    document.raw_tag_dictionary = Some(json!({ "Make": "Canon", "Model": "EOS R5" }));
    document.computed_properties = Some(ComputedImageProperties {
        width_pixels: 4000,
        height_pixels: 3000,
        megapixels: 12.0,
        aspect_ratio: 1.333,
    });
    document.file_hashes = Some(FileHashSet {
        sha256_hexadecimal: "ab".repeat(32),
        md5_hexadecimal: None,
    });
    document.thumbnail = Some(ThumbnailArtifact {
        image_base64: "aGVsbG8=".to_string(),
        width_pixels: 160,
        height_pixels: 120,
    });
    document.gps_position = Some(GpsCoordinates {
        latitude_degrees: 37.7749295,
        longitude_degrees: -122.4194155,
        altitude_meters: Some(16.0),
        maps_url: Some("https://maps.google.com/?q=37.7749295,-122.4194155".to_string()),
    });
    document.burned_text = Some(BurnedTextBlock {
        extracted_text: "PATIENT ID 4411".to_string(),
        ocr_confidence: Some(0.93),
    });
    document
}

impl MetadataExtractor for ScriptedEngine {
    fn extract<'call>(
        &'call self,
        _assignment: ExtractionAssignment,
    ) -> BoxFuture<'call, Result<RawMetadataDocument, ExtractorError>> {
        Box::pin(async move {
            match self.script {
                EngineScript::RichDocument => Ok(rich_document()),
                EngineScript::Timeout => Err(ExtractorError::Timeout(60)),
            }
        })
    }
}

// --- FORJA DEL PLANO DE PRUEBAS ---

async fn forge_plane(database_label: &str, script: EngineScript) -> (axum::Router, AppState) {
    let client = DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar el plano en memoria");

    let state = AppState::new(client, Arc::new(ScriptedEngine { script }), GatewayConfig::default());
    (create_gateway_router(state.clone()), state)
}

fn forge_bearer(subject: &str) -> String {
    let jwt_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let jwt_payload = URL_SAFE_NO_PAD.encode(format!("{{\"sub\":\"{}\"}}", subject));
    format!("Bearer {}.{}.upstream-signature", jwt_header, jwt_payload)
}

fn extract_request(body: Value, bearer: Option<&str>, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/extract")
        .header("Content-Type", "application/json");

    if let Some(bearer_material) = bearer {
        builder = builder.header("Authorization", bearer_material);
    }
    if let Some(cookie_material) = cookies {
        builder = builder.header("Cookie", cookie_material);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn buffered_file_payload(buffered_path: &str) -> Value {
    json!({
        "original_filename": "probe.jpg",
        "declared_mime_type": "image/jpeg",
        "size_bytes": 1_048_576u64,
        "megapixels": 1.0,
        "buffered_disk_path": buffered_path
    })
}

fn harvest_cookies(response: &axum::response::Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|header_value| header_value.to_str().ok())
        .filter_map(|cookie_line| cookie_line.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

fn cookie_value<'c>(cookie_jar: &'c str, cookie_name: &str) -> Option<&'c str> {
    cookie_jar.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then_some(value)
    })
}

async fn response_json(response: axum::response::Response) -> Value {
    let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body_bytes).expect("Respuesta JSON malformada")
}

// --- CERTIFICACIONES ---

/**
 * ESCENARIO: dispositivo fresco, tres extracciones secuenciales sin
 * cotización. Esperado 200, 200, 402; contador del dispositivo en 2.
 */
#[tokio::test]
async fn certify_anonymous_device_cap_two_then_reject() {
    println!("\n🎟️ [PROVING_GROUNDS]: Auditing anonymous device cap (P6 end-to-end)...");

    let (plane, state) = forge_plane("pipeline_cap_test", EngineScript::RichDocument).await;
    let buffered_file = tempfile::NamedTempFile::new().unwrap();
    let buffered_path = buffered_file.path().to_string_lossy().to_string();
    let payload = json!({ "files": [buffered_file_payload(&buffered_path)] });

    // 1. Primer contacto: 200 + cookies de dispositivo y sesión selladas
    let first_response = plane
        .clone()
        .oneshot(extract_request(payload.clone(), None, None))
        .await
        .unwrap();
    assert_eq!(first_response.status(), StatusCode::OK);

    let cookie_jar = harvest_cookies(&first_response);
    assert!(cookie_value(&cookie_jar, "espectro_device").is_some(), "Device cookie not minted.");
    assert!(cookie_value(&cookie_jar, "espectro_session").is_some(), "Session cookie not minted.");

    let first_body = response_json(first_response).await;
    assert_eq!(first_body["access"]["mode"], "device_free");
    assert_eq!(first_body["access"]["free_used"], 1);
    assert_eq!(first_body["access"]["free_limit"], 2);

    // 2. Segunda ráfaga con la misma identidad: 200
    let second_response = plane
        .clone()
        .oneshot(extract_request(payload.clone(), None, Some(&cookie_jar)))
        .await
        .unwrap();
    assert_eq!(second_response.status(), StatusCode::OK);

    // 3. Tercera ráfaga: 402 con pistas de mejora
    let third_response = plane
        .clone()
        .oneshot(extract_request(payload.clone(), None, Some(&cookie_jar)))
        .await
        .unwrap();
    assert_eq!(third_response.status(), StatusCode::PAYMENT_REQUIRED);
    let third_body = response_json(third_response).await;
    assert_eq!(third_body["code"], "ACCESS_DENIED_PAYMENT_REQUIRED");
    assert!(third_body["upgrade"]["purchase_endpoint"].is_string());

    // 4. El contador persistido quedó exactamente en el techo
    let device_identifier = cookie_value(&cookie_jar, "espectro_device")
        .unwrap()
        .split('.')
        .next()
        .unwrap()
        .to_string();
    let session_identifier = cookie_value(&cookie_jar, "espectro_session").unwrap().to_string();

    let persisted_count = state
        .device_quota_repository
        .current(&device_identifier, &session_identifier)
        .await
        .unwrap();
    assert_eq!(persisted_count, 2, "L4_PIPELINE_FAULT: Device counter drifted from the cap.");

    println!("   ✅ [SUCCESS]: Cap 200/200/402 certified with counter at 2.");
}

/**
 * ESCENARIO: misma imagen con GPS exacto. El modo anónimo recibe 2
 * decimales sin URL de mapas ni texto OCR; el modo de pago recibe el
 * documento íntegro (P7/P9 end-to-end).
 */
#[tokio::test]
async fn certify_gps_redaction_by_access_mode() {
    println!("\n🛰️ [PROVING_GROUNDS]: Auditing GPS narrowing across modes...");

    let (plane, state) = forge_plane("pipeline_gps_test", EngineScript::RichDocument).await;
    let buffered_file = tempfile::NamedTempFile::new().unwrap();
    let buffered_path = buffered_file.path().to_string_lossy().to_string();
    let payload = json!({ "files": [buffered_file_payload(&buffered_path)] });

    // --- MODO ANÓNIMO (device_free) ---
    let anonymous_response = plane
        .clone()
        .oneshot(extract_request(payload.clone(), None, None))
        .await
        .unwrap();
    assert_eq!(anonymous_response.status(), StatusCode::OK);
    let anonymous_body = response_json(anonymous_response).await;

    let anonymous_document = &anonymous_body["metadata"][0]["document"];
    assert_eq!(anonymous_document["gps_position"]["latitude_degrees"], 37.77);
    assert_eq!(anonymous_document["gps_position"]["longitude_degrees"], -122.42);
    assert!(anonymous_document["gps_position"].get("maps_url").is_none());
    assert!(anonymous_document.get("burned_text").is_none());
    assert_eq!(anonymous_document["thumbnail"]["present"], true);
    assert!(anonymous_document["thumbnail"].get("image_base64").is_none());

    // --- MODO DE PAGO ---
    state
        .ledger_repository
        .grant(&BalanceKey::User("op_paid_gps".into()), 50, &GrantSource::Promo, None)
        .await
        .unwrap();

    let paid_response = plane
        .clone()
        .oneshot(extract_request(payload, Some(&forge_bearer("op_paid_gps")), None))
        .await
        .unwrap();
    assert_eq!(paid_response.status(), StatusCode::OK);
    let paid_body = response_json(paid_response).await;

    assert_eq!(paid_body["access"]["mode"], "paid");
    assert_eq!(paid_body["access"]["credits_charged"], 1);

    let paid_document = &paid_body["metadata"][0]["document"];
    assert_eq!(paid_document["gps_position"]["latitude_degrees"], 37.7749295);
    assert_eq!(paid_document["gps_position"]["longitude_degrees"], -122.4194155);
    assert!(paid_document["gps_position"]["maps_url"].is_string());
    assert_eq!(paid_document["burned_text"]["extracted_text"], "PATIENT ID 4411");

    println!("   ✅ [SUCCESS]: Neighborhood granularity certified for anonymous mode.");
}

/**
 * ESCENARIO: cotización de un solo uso presentada dos veces. La segunda
 * petición rebota con 400 y el balance refleja exactamente un cobro.
 */
#[tokio::test]
async fn certify_quote_single_use_and_single_charge() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing quote single-use defense (P4)...");

    let (plane, state) = forge_plane("pipeline_replay_test", EngineScript::RichDocument).await;
    let operator = "op_replay";
    let bearer = forge_bearer(operator);
    let owner = BalanceKey::User(operator.to_string());

    state.ledger_repository.grant(&owner, 20, &GrantSource::Promo, None).await.unwrap();

    let buffered_file = tempfile::NamedTempFile::new().unwrap();
    let buffered_path = buffered_file.path().to_string_lossy().to_string();

    // 1. Cotización sellada con sesión explícita (costo: base 1 + ocr 2)
    let quote_request = Request::builder()
        .method("POST")
        .uri("/api/v1/quote")
        .header("Content-Type", "application/json")
        .header("Authorization", &bearer)
        .body(Body::from(
            json!({
                "files": [{
                    "original_filename": "probe.jpg",
                    "declared_mime_type": "image/jpeg",
                    "size_bytes": 1_048_576u64,
                    "megapixels": 1.0
                }],
                "ops": { "ocr": true },
                "session_id": "sess-replay"
            })
            .to_string(),
        ))
        .unwrap();

    let quote_response = plane.clone().oneshot(quote_request).await.unwrap();
    assert_eq!(quote_response.status(), StatusCode::OK);
    let quote_body = response_json(quote_response).await;
    let quote_identifier = quote_body["quoteId"].as_str().unwrap().to_string();
    let credits_total = quote_body["creditsTotal"].as_i64().unwrap();
    assert_eq!(credits_total, 3);

    let extract_payload = json!({
        "files": [buffered_file_payload(&buffered_path)],
        "ops": { "ocr": true },
        "quote_id": quote_identifier,
        "session_id": "sess-replay"
    });

    // 2. Primer uso: 200 con cobro exacto
    let first_response = plane
        .clone()
        .oneshot(extract_request(extract_payload.clone(), Some(&bearer), None))
        .await
        .unwrap();
    assert_eq!(first_response.status(), StatusCode::OK);
    let first_body = response_json(first_response).await;
    assert_eq!(first_body["access"]["credits_charged"], credits_total);

    // 3. Replay: 400 sin cobro adicional
    let replay_response = plane
        .clone()
        .oneshot(extract_request(extract_payload, Some(&bearer), None))
        .await
        .unwrap();
    assert_eq!(replay_response.status(), StatusCode::BAD_REQUEST);
    let replay_body = response_json(replay_response).await;
    assert_eq!(replay_body["code"], "QUOTE_ALREADY_USED");

    // 4. Estado final: balance 17, cotización 'used', un único cobro
    assert_eq!(state.ledger_repository.balance(&owner).await.unwrap(), 20 - credits_total);

    let sealed_quote = state.quote_repository.load_quote(quote_body["quoteId"].as_str().unwrap()).await.unwrap();
    assert_eq!(sealed_quote.status, QuoteStatus::Used);

    let trail = state.ledger_repository.list_recent_transactions(&owner, 10).await.unwrap();
    let charge_count = trail.iter().filter(|t| t.kind == TransactionKind::Charge).count();
    let refund_count = trail.iter().filter(|t| t.kind == TransactionKind::Refund).count();
    assert_eq!(charge_count, 1);
    assert_eq!(refund_count, 0);

    println!("   ✅ [SUCCESS]: At-most-once quote consumption certified.");
}

/**
 * ESCENARIO: el motor colapsa por timeout tras la reserva. Esperado
 * 5xx, balance restaurado, cotización intacta y rastro cobro+reembolso.
 */
#[tokio::test]
async fn certify_engine_failure_unwinds_reservation() {
    println!("\n🔥 [PROVING_GROUNDS]: Auditing reservation unwinding (P8)...");

    let (plane, state) = forge_plane("pipeline_unwind_test", EngineScript::Timeout).await;
    let operator = "op_unwind";
    let bearer = forge_bearer(operator);
    let owner = BalanceKey::User(operator.to_string());

    state.ledger_repository.grant(&owner, 10, &GrantSource::Promo, None).await.unwrap();

    let buffered_file = tempfile::NamedTempFile::new().unwrap();
    let buffered_path = buffered_file.path().to_string_lossy().to_string();

    // Cotización de costo 4 (base 1 + forensics 3)
    let quote_request = Request::builder()
        .method("POST")
        .uri("/api/v1/quote")
        .header("Content-Type", "application/json")
        .header("Authorization", &bearer)
        .body(Body::from(
            json!({
                "files": [{
                    "original_filename": "probe.jpg",
                    "declared_mime_type": "image/jpeg",
                    "size_bytes": 1_048_576u64,
                    "megapixels": 1.0
                }],
                "ops": { "forensics": true },
                "session_id": "sess-unwind"
            })
            .to_string(),
        ))
        .unwrap();

    let quote_body = response_json(plane.clone().oneshot(quote_request).await.unwrap()).await;
    let quote_identifier = quote_body["quoteId"].as_str().unwrap().to_string();
    assert_eq!(quote_body["creditsTotal"], 4);

    let failure_response = plane
        .clone()
        .oneshot(extract_request(
            json!({
                "files": [buffered_file_payload(&buffered_path)],
                "ops": { "forensics": true },
                "quote_id": quote_identifier,
                "session_id": "sess-unwind"
            }),
            Some(&bearer),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(failure_response.status(), StatusCode::GATEWAY_TIMEOUT);
    let failure_body = response_json(failure_response).await;
    assert_eq!(failure_body["code"], "EXTRACTION_ENGINE_FAILED");
    assert!(failure_body["correlation_id"].is_string());

    // Balance restaurado y cotización sin consumir
    assert_eq!(state.ledger_repository.balance(&owner).await.unwrap(), 10);
    assert_eq!(state.ledger_repository.recompute_balance(&owner).await.unwrap(), 10);

    let surviving_quote = state
        .quote_repository
        .load_quote(quote_body["quoteId"].as_str().unwrap())
        .await
        .unwrap();
    assert_eq!(surviving_quote.status, QuoteStatus::Active);

    // Rastro: exactamente un cobro (-4) y su reembolso (+4)
    let trail = state.ledger_repository.list_recent_transactions(&owner, 10).await.unwrap();
    let charge_entry = trail.iter().find(|t| t.kind == TransactionKind::Charge).unwrap();
    let refund_entry = trail.iter().find(|t| t.kind == TransactionKind::Refund).unwrap();
    assert_eq!(charge_entry.amount, -4);
    assert_eq!(refund_entry.amount, 4);

    println!("   ✅ [SUCCESS]: Compensating action certified on the failure path.");
}

/**
 * ESCENARIO: una cotización de otra sesión rebota con 403 sin tocar
 * reserva alguna.
 */
#[tokio::test]
async fn certify_quote_ownership_mismatch_is_forbidden() {
    let (plane, state) = forge_plane("pipeline_ownership_test", EngineScript::RichDocument).await;
    let bearer = forge_bearer("op_owner");
    let owner = BalanceKey::User("op_owner".to_string());
    state.ledger_repository.grant(&owner, 10, &GrantSource::Promo, None).await.unwrap();

    let quote_request = Request::builder()
        .method("POST")
        .uri("/api/v1/quote")
        .header("Content-Type", "application/json")
        .header("Authorization", &bearer)
        .body(Body::from(
            json!({
                "files": [{
                    "original_filename": "probe.jpg",
                    "declared_mime_type": "image/jpeg",
                    "size_bytes": 1024u64,
                    "megapixels": 1.0
                }],
                "session_id": "sess-owner"
            })
            .to_string(),
        ))
        .unwrap();

    let quote_body = response_json(plane.clone().oneshot(quote_request).await.unwrap()).await;

    let buffered_file = tempfile::NamedTempFile::new().unwrap();
    let buffered_path = buffered_file.path().to_string_lossy().to_string();

    let mismatch_response = plane
        .clone()
        .oneshot(extract_request(
            json!({
                "files": [buffered_file_payload(&buffered_path)],
                "quote_id": quote_body["quoteId"].as_str().unwrap(),
                "session_id": "sess-intruder"
            }),
            Some(&bearer),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(mismatch_response.status(), StatusCode::FORBIDDEN);
    let mismatch_body = response_json(mismatch_response).await;
    assert_eq!(mismatch_body["code"], "QUOTE_OWNER_MISMATCH");

    // Sin reserva: el balance permanece íntegro
    assert_eq!(state.ledger_repository.balance(&owner).await.unwrap(), 10);
}
