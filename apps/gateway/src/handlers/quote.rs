// [apps/gateway/src/handlers/quote.rs]
/*!
 * =================================================================
 * APARATO: QUOTE STRATUM HANDLER (V3.2 - PRICING TRANSPARENCY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: COTIZACIÓN NO AUTENTICADA, ACOTADA Y SELLADA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OPEN PRICING: El endpoint cotiza sin autenticación; el techo de
 *    ráfagas y las cotas de payload viven en el perímetro.
 * 2. SEALED SCHEDULE: Cada cotización cristaliza el snapshot del
 *    tarifario vigente; el precio es reproducible tras cambios de tarifa.
 * 3. ZENITH COMPLIANCE: Salida JSON compatible con los esquemas Zod de L5.
 * =================================================================
 */

use crate::faults::internal_fault_response;
use crate::security::{self, SESSION_COOKIE_NAME};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse as AxumResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use espectro_domain_models::{QuoteRecord, QuoteStatus, UploadedFileDescriptor};
use espectro_domain_pricing::PremiumOperationFlags;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::middleware::CallerIdentity;

#[derive(Debug, Deserialize)]
pub struct QuoteRequestPayload {
    pub files: Vec<UploadedFileDescriptor>,

    #[serde(default)]
    pub ops: PremiumOperationFlags,

    /// Sesión explícita para clientes sin jar de cookies (CLI, SDKs).
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponsePayload {
    #[serde(rename = "quoteId")]
    pub quote_identifier: String,
    #[serde(rename = "creditsTotal")]
    pub credits_total: i64,
    #[serde(rename = "perFile")]
    pub per_file: Vec<espectro_domain_models::FileQuoteLine>,
    pub schedule: serde_json::Value,
    pub limits: serde_json::Value,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
    pub warnings: Vec<String>,
}

pub struct QuoteHandler;

impl QuoteHandler {
    /**
     * Endpoint: POST /api/v1/quote
     *
     * Calcula el costo determinista de la petición, sella el snapshot del
     * tarifario y persiste la cotización activa con TTL.
     */
    #[instrument(skip(application_state, request_headers, caller_identity, payload))]
    pub async fn handle_create_quote(
        State(application_state): State<AppState>,
        Extension(caller_identity): Extension<CallerIdentity>,
        request_headers: HeaderMap,
        Json(payload): Json<QuoteRequestPayload>,
    ) -> Response {
        if let Err(bound_rejection) =
            super::validate_file_bounds(&application_state, &payload.files, false)
        {
            return bound_rejection;
        }

        // --- RESOLUCIÓN DE SESIÓN (cookie > payload > forja) ---
        let mut minted_session_cookie = None;
        let session_identifier = security::read_cookie(&request_headers, SESSION_COOKIE_NAME)
            .or(payload.session_id.clone())
            .unwrap_or_else(|| {
                let fresh_session = Uuid::new_v4().to_string();
                minted_session_cookie = Some(security::build_session_cookie(&fresh_session));
                fresh_session
            });

        // --- ARITMÉTICA DETERMINISTA DE PRECIO ---
        let breakdown = application_state
            .pricing_schedule
            .compute_quote_breakdown(&payload.files, &payload.ops);

        let mut warnings = Vec::new();
        for file in &payload.files {
            if file.megapixels <= 0.0 {
                warnings.push(format!(
                    "File '{}' declared no megapixels; lowest bucket surcharge applied.",
                    file.original_filename
                ));
            }
        }

        // Las rutas de buffer no pertenecen a la cotización sellada.
        let quoted_files: Vec<UploadedFileDescriptor> = payload
            .files
            .iter()
            .map(|file| UploadedFileDescriptor { buffered_disk_path: None, ..file.clone() })
            .collect();

        let creation_instant = Utc::now();
        let quote_record = QuoteRecord {
            quote_identifier: Uuid::new_v4().to_string(),
            session_identifier: session_identifier.clone(),
            user_identifier: caller_identity.user_identifier.clone(),
            files: quoted_files,
            requested_operations_bitfield: payload.ops.to_bitfield(),
            credits_total: breakdown.credits_total,
            per_file_credits: breakdown.per_file_credits.clone(),
            schedule_snapshot: application_state.pricing_schedule.to_snapshot(),
            schedule_version: application_state.pricing_schedule.schedule_version,
            status: QuoteStatus::Active,
            created_at: creation_instant,
            expires_at: creation_instant + Duration::seconds(application_state.config.quote_ttl_seconds),
            used_at: None,
        };

        if let Err(persistence_fault) = application_state.quote_repository.create_quote(&quote_record).await {
            error!("❌ [QUOTE_FAULT]: Failed to crystallize quote: {}", persistence_fault);
            return internal_fault_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "QUOTE_PERSISTENCE_FAILED",
                "The quote could not be persisted; no quote id was issued.",
            );
        }

        info!(
            "📜 [QUOTE_ISSUED]: Quote [{}] for session [{}] at {} credits.",
            quote_record.quote_identifier, session_identifier, breakdown.credits_total
        );

        let response_payload = QuoteResponsePayload {
            quote_identifier: quote_record.quote_identifier.clone(),
            credits_total: breakdown.credits_total,
            per_file: breakdown.per_file_credits,
            schedule: quote_record.schedule_snapshot.clone(),
            limits: json!({
                "max_files": application_state.config.max_files_per_request,
                "max_file_bytes": application_state.config.max_file_bytes,
            }),
            expires_at: quote_record.expires_at.to_rfc3339(),
            warnings,
        };

        let mut response = (StatusCode::OK, Json(response_payload)).into_response();
        if let Some(session_cookie) = minted_session_cookie {
            response.headers_mut().append(header::SET_COOKIE, session_cookie);
        }
        response
    }
}
