// [apps/gateway/src/handlers/extract.rs]
/*!
 * =================================================================
 * APARATO: EXTRACTION PIPELINE HANDLER (V4.3 - RESERVATION GUARD)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: COMPOSICIÓN DE ACCESO, RESERVA, MOTOR Y REDACCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FROZEN DECISION: El modo de acceso se decide una vez, en orden de
 *    prioridad (trial -> device-free -> paid -> 402), y gobierna tanto
 *    la reserva como la redacción de la respuesta.
 * 2. RESERVATION WINDOW: Entre la reserva y el sellado de la cotización
 *    corre una sección crítica con acción compensatoria garantizada en
 *    todo camino de salida (fallo del motor, carrera de replay, 5xx).
 * 3. DISCONNECT PROOF: La sección crítica corre en una tarea desprendida;
 *    la desconexión del cliente no abandona la reserva a mitad de vuelo.
 *
 * # Mathematical Proof (Exactly-Once Charge):
 * Una respuesta exitosa implica: reserva aplicada ∧ cotización sellada
 * (si viajó) ∧ sin compensación. Todo otro desenlace registra exactamente
 * una compensación (refund o rollback) antes de responder.
 * =================================================================
 */

use crate::faults::{fault_response, fault_response_with, internal_fault_response, upgrade_hints};
use crate::middleware::CallerIdentity;
use crate::security::{self, DEVICE_COOKIE_NAME, SESSION_COOKIE_NAME};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse as AxumResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use espectro_domain_models::{
    AccessDescriptor, AccessMode, EngineTier, ExtractionRecord, RedactedMetadataView,
    UploadedFileDescriptor,
};
use espectro_domain_pricing::PremiumOperationFlags;
use espectro_domain_redaction::apply_access_redaction;
use espectro_infra_db::repositories::normalize_trial_email;
use espectro_infra_db::DbError;
use espectro_infra_extractor::ExtractionAssignment;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ExtractRequestPayload {
    pub files: Vec<UploadedFileDescriptor>,

    #[serde(default)]
    pub ops: PremiumOperationFlags,

    pub quote_id: Option<String>,
    pub trial_email: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileExtractionView {
    pub original_filename: String,
    pub document: RedactedMetadataView,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponsePayload {
    pub access: AccessDescriptor,
    pub metadata: Vec<FileExtractionView>,
    pub extraction_info: serde_json::Value,
}

/// Reserva viva de la petición; porta el material de su compensación.
#[derive(Debug, Clone)]
enum ReservationGuard {
    Charged { charge_transaction_identifier: String, credits_charged: i64 },
    DeviceSlot { device_identifier: String, session_identifier: String, used: u32, limit: u32 },
    TrialSlot { normalized_email: String, used: u32, limit: u32 },
}

/// Acción compensatoria de la reserva. Tolerante a la idempotencia:
/// un reembolso ya cristalizado no es fallo.
async fn release_reservation(state: &AppState, reservation: &ReservationGuard) {
    match reservation {
        ReservationGuard::Charged { charge_transaction_identifier, .. } => {
            match state.ledger_repository.refund(charge_transaction_identifier).await {
                Ok(refund_identifier) => {
                    info!("↩️  [PIPELINE_UNWIND]: Charge refunded as [{}].", refund_identifier);
                }
                Err(DbError::AlreadyRefunded) => {}
                Err(release_fault) => {
                    error!("💀 [PIPELINE_UNWIND_FAULT]: Refund failed: {}", release_fault);
                }
            }
        }
        ReservationGuard::DeviceSlot { device_identifier, session_identifier, .. } => {
            if let Err(release_fault) = state
                .device_quota_repository
                .rollback(device_identifier, session_identifier)
                .await
            {
                error!("💀 [PIPELINE_UNWIND_FAULT]: Device slot rollback failed: {}", release_fault);
            }
        }
        ReservationGuard::TrialSlot { normalized_email, .. } => {
            if let Err(release_fault) = state.trial_quota_repository.rollback(normalized_email).await {
                error!("💀 [PIPELINE_UNWIND_FAULT]: Trial slot rollback failed: {}", release_fault);
            }
        }
    }
}

fn access_descriptor_for(reservation: &ReservationGuard, mode: AccessMode) -> AccessDescriptor {
    match reservation {
        ReservationGuard::Charged { credits_charged, .. } => AccessDescriptor {
            mode,
            free_used: None,
            free_limit: None,
            credits_charged: Some(*credits_charged),
        },
        ReservationGuard::DeviceSlot { used, limit, .. } => AccessDescriptor {
            mode,
            free_used: Some(*used),
            free_limit: Some(*limit),
            credits_charged: None,
        },
        ReservationGuard::TrialSlot { used, limit, .. } => AccessDescriptor {
            mode,
            free_used: Some(*used),
            free_limit: Some(*limit),
            credits_charged: None,
        },
    }
}

fn payment_required_response(details: serde_json::Value) -> Response {
    fault_response_with(
        StatusCode::PAYMENT_REQUIRED,
        "ACCESS_DENIED_PAYMENT_REQUIRED",
        "Free quota exhausted and no payable balance covers this request.",
        {
            let mut merged = upgrade_hints();
            if let (Some(merged_map), Some(detail_map)) = (merged.as_object_mut(), details.as_object()) {
                for (key, value) in detail_map {
                    merged_map.insert(key.clone(), value.clone());
                }
            }
            merged
        },
    )
}

fn attach_identity_cookies(mut response: Response, minted_cookies: Vec<HeaderValue>) -> Response {
    for cookie_header in minted_cookies {
        response.headers_mut().append(header::SET_COOKIE, cookie_header);
    }
    response
}

pub struct ExtractionPipelineHandler;

impl ExtractionPipelineHandler {
    /**
     * Endpoint: POST /api/v1/extract
     *
     * Algoritmo por petición: cotas -> identidad de dispositivo/sesión ->
     * validación de cotización -> costo requerido -> decisión congelada ->
     * reserva -> sección crítica desprendida (motor, redacción, sellado,
     * auditoría) -> respuesta con descriptor de acceso.
     */
    #[instrument(skip(application_state, caller_identity, request_headers, payload))]
    pub async fn handle_extract(
        State(application_state): State<AppState>,
        Extension(caller_identity): Extension<CallerIdentity>,
        request_headers: HeaderMap,
        Json(payload): Json<ExtractRequestPayload>,
    ) -> Response {
        let mut minted_cookies: Vec<HeaderValue> = Vec::new();

        // --- FASE 1: COTAS DE PAYLOAD ---
        if let Err(bound_rejection) =
            super::validate_file_bounds(&application_state, &payload.files, true)
        {
            return bound_rejection;
        }

        // --- FASE 2: IDENTIDAD DE DISPOSITIVO Y SESIÓN ---
        let device_identifier = match security::read_cookie(&request_headers, DEVICE_COOKIE_NAME)
            .and_then(|cookie_material| {
                security::verify_device_token(
                    application_state.config.device_token_secret.as_bytes(),
                    &cookie_material,
                )
            }) {
            Some(verified_identity) => verified_identity.device_identifier,
            None => {
                let (fresh_identity, cookie_material) = security::mint_device_token(
                    application_state.config.device_token_secret.as_bytes(),
                    Utc::now().timestamp(),
                );
                minted_cookies.push(security::build_device_cookie(&cookie_material));
                fresh_identity.device_identifier
            }
        };

        let session_identifier = security::read_cookie(&request_headers, SESSION_COOKIE_NAME)
            .or(payload.session_id.clone())
            .unwrap_or_else(|| {
                let fresh_session = Uuid::new_v4().to_string();
                minted_cookies.push(security::build_session_cookie(&fresh_session));
                fresh_session
            });

        // --- FASE 3: VALIDACIÓN DE COTIZACIÓN (SI VIAJA) ---
        let mut validated_quote = None;
        if let Some(quote_identifier) = &payload.quote_id {
            let quote_record = match application_state.quote_repository.load_quote(quote_identifier).await {
                Ok(record) => record,
                Err(DbError::QuoteNotFound) => {
                    return attach_identity_cookies(
                        fault_response(StatusCode::BAD_REQUEST, "QUOTE_NOT_FOUND", "Unknown quote id."),
                        minted_cookies,
                    );
                }
                Err(lookup_fault) => {
                    error!("❌ [PIPELINE_FAULT]: Quote lookup collapsed: {}", lookup_fault);
                    return attach_identity_cookies(
                        internal_fault_response(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "QUOTE_LOOKUP_FAILED",
                            "Quote storage is unavailable.",
                        ),
                        minted_cookies,
                    );
                }
            };

            match quote_record.effective_status(Utc::now()) {
                espectro_domain_models::QuoteStatus::Active => {}
                espectro_domain_models::QuoteStatus::Expired => {
                    return attach_identity_cookies(
                        fault_response(StatusCode::BAD_REQUEST, "QUOTE_EXPIRED", "The quote TTL elapsed."),
                        minted_cookies,
                    );
                }
                espectro_domain_models::QuoteStatus::Used => {
                    return attach_identity_cookies(
                        fault_response(
                            StatusCode::BAD_REQUEST,
                            "QUOTE_ALREADY_USED",
                            "The quote was already consumed.",
                        ),
                        minted_cookies,
                    );
                }
            }

            let session_matches = quote_record.session_identifier == session_identifier;
            let user_matches = match (&quote_record.user_identifier, &caller_identity.user_identifier) {
                (Some(quote_user), Some(caller_user)) => quote_user == caller_user,
                (Some(_), None) => false,
                (None, _) => true,
            };

            if !session_matches || !user_matches {
                warn!("⛔ [PIPELINE_FORBIDDEN]: Quote ownership mismatch for [{}].", quote_identifier);
                return attach_identity_cookies(
                    fault_response(
                        StatusCode::FORBIDDEN,
                        "QUOTE_OWNER_MISMATCH",
                        "The quote belongs to a different session or account.",
                    ),
                    minted_cookies,
                );
            }

            validated_quote = Some(quote_record);
        }

        // --- FASE 4: COSTO REQUERIDO ---
        let required_credits = match &validated_quote {
            Some(quote_record) => quote_record.credits_total,
            None => application_state
                .pricing_schedule
                .compute_quote_breakdown(&payload.files, &payload.ops)
                .credits_total,
        };

        // --- FASE 5: DECISIÓN CONGELADA DE MODO DE ACCESO ---
        let trial_normalized_email = match &payload.trial_email {
            Some(raw_trial_email) => {
                if !raw_trial_email.contains('@') {
                    return attach_identity_cookies(
                        fault_response(
                            StatusCode::BAD_REQUEST,
                            "INVALID_TRIAL_EMAIL",
                            "The trial email marker is malformed.",
                        ),
                        minted_cookies,
                    );
                }
                Some(normalize_trial_email(
                    raw_trial_email,
                    application_state.config.trial_strip_plus_alias,
                ))
            }
            None => None,
        };

        let decided_mode: AccessMode = 'decision: {
            if let Some(normalized_email) = &trial_normalized_email {
                // Fallo de lectura = cuota agotada (fail-closed).
                let trials_used = application_state
                    .trial_quota_repository
                    .current(normalized_email)
                    .await
                    .unwrap_or(application_state.config.trial_email_limit);

                if trials_used < application_state.config.trial_email_limit {
                    break 'decision AccessMode::TrialLimited;
                }
            }

            if caller_identity.user_identifier.is_none() {
                let device_slots_used = application_state
                    .device_quota_repository
                    .current(&device_identifier, &session_identifier)
                    .await
                    .unwrap_or(application_state.config.device_free_limit);

                if device_slots_used < application_state.config.device_free_limit {
                    break 'decision AccessMode::DeviceFree;
                }
            }

            if let Some(user_identifier) = &caller_identity.user_identifier {
                let balance_key =
                    espectro_domain_models::BalanceKey::User(user_identifier.clone());
                let available_credits = match application_state.ledger_repository.balance(&balance_key).await {
                    Ok(credits) => credits,
                    Err(balance_fault) => {
                        error!("❌ [PIPELINE_FAULT]: Balance read collapsed: {}", balance_fault);
                        return attach_identity_cookies(
                            internal_fault_response(
                                StatusCode::SERVICE_UNAVAILABLE,
                                "LEDGER_UNAVAILABLE",
                                "Credit storage is unavailable.",
                            ),
                            minted_cookies,
                        );
                    }
                };

                if available_credits >= required_credits {
                    break 'decision AccessMode::Paid;
                }

                return attach_identity_cookies(
                    payment_required_response(json!({
                        "credits_required": required_credits,
                        "credits_available": available_credits,
                    })),
                    minted_cookies,
                );
            }

            return attach_identity_cookies(
                payment_required_response(json!({
                    "free_limit": application_state.config.device_free_limit,
                })),
                minted_cookies,
            );
        };

        // --- FASE 6: RESERVA ---
        let reservation = match decided_mode {
            AccessMode::DeviceFree => {
                match application_state
                    .device_quota_repository
                    .check_and_reserve(
                        &device_identifier,
                        &session_identifier,
                        application_state.config.device_free_limit,
                    )
                    .await
                {
                    Ok(used) => ReservationGuard::DeviceSlot {
                        device_identifier: device_identifier.clone(),
                        session_identifier: session_identifier.clone(),
                        used,
                        limit: application_state.config.device_free_limit,
                    },
                    // Techo alcanzado o almacenamiento caído: fail-closed.
                    Err(_) => {
                        return attach_identity_cookies(
                            payment_required_response(json!({
                                "free_limit": application_state.config.device_free_limit,
                                "free_used": application_state.config.device_free_limit,
                            })),
                            minted_cookies,
                        );
                    }
                }
            }
            AccessMode::TrialLimited => {
                let normalized_email = trial_normalized_email
                    .clone()
                    .expect("trial mode implies a normalized email");
                match application_state
                    .trial_quota_repository
                    .check_and_reserve(&normalized_email, application_state.config.trial_email_limit)
                    .await
                {
                    Ok(used) => ReservationGuard::TrialSlot {
                        normalized_email,
                        used,
                        limit: application_state.config.trial_email_limit,
                    },
                    Err(_) => {
                        return attach_identity_cookies(
                            payment_required_response(json!({
                                "trial_limit": application_state.config.trial_email_limit,
                            })),
                            minted_cookies,
                        );
                    }
                }
            }
            AccessMode::Paid => {
                let user_identifier = caller_identity
                    .user_identifier
                    .clone()
                    .expect("paid mode implies an authenticated user");
                let balance_key = espectro_domain_models::BalanceKey::User(user_identifier);

                let charge_description = match &validated_quote {
                    Some(quote_record) => {
                        format!("Extraction under quote {}", quote_record.quote_identifier)
                    }
                    None => format!("Extraction of {} file(s)", payload.files.len()),
                };

                match application_state
                    .ledger_repository
                    .charge(&balance_key, required_credits, &charge_description)
                    .await
                {
                    Ok(charge_receipt) => ReservationGuard::Charged {
                        charge_transaction_identifier: charge_receipt.transaction_identifier,
                        credits_charged: required_credits,
                    },
                    Err(DbError::InsufficientFunds) => {
                        return attach_identity_cookies(
                            payment_required_response(json!({
                                "credits_required": required_credits,
                            })),
                            minted_cookies,
                        );
                    }
                    Err(charge_fault) => {
                        error!("❌ [PIPELINE_FAULT]: Charge collapsed: {}", charge_fault);
                        return attach_identity_cookies(
                            internal_fault_response(
                                StatusCode::SERVICE_UNAVAILABLE,
                                "LEDGER_UNAVAILABLE",
                                "Credit storage is unavailable.",
                            ),
                            minted_cookies,
                        );
                    }
                }
            }
        };

        // --- FASE 7: SECCIÓN CRÍTICA DESPRENDIDA ---
        // La tarea completa su compensación o su sellado aunque el cliente
        // se desconecte a mitad de la extracción.
        let critical_state = application_state.clone();
        let critical_reservation = reservation.clone();
        let critical_quote_identifier = validated_quote
            .as_ref()
            .map(|quote_record| quote_record.quote_identifier.clone());
        let critical_files = payload.files.clone();
        let critical_user_identifier = caller_identity.user_identifier.clone();
        let critical_session_identifier = session_identifier.clone();

        let critical_section = tokio::spawn(async move {
            Self::execute_critical_section(
                critical_state,
                critical_reservation,
                decided_mode,
                critical_quote_identifier,
                critical_files,
                critical_user_identifier,
                critical_session_identifier,
            )
            .await
        });

        let section_verdict = match critical_section.await {
            Ok(verdict) => verdict,
            Err(join_fault) => {
                error!("💀 [PIPELINE_COLLAPSE]: Critical section task died: {}", join_fault);
                return attach_identity_cookies(
                    internal_fault_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "PIPELINE_TASK_COLLAPSED",
                        "The extraction task terminated abnormally.",
                    ),
                    minted_cookies,
                );
            }
        };

        match section_verdict {
            Ok(success_payload) => attach_identity_cookies(
                (StatusCode::OK, Json(success_payload)).into_response(),
                minted_cookies,
            ),
            Err(failure_response) => attach_identity_cookies(failure_response, minted_cookies),
        }
    }

    /// Motor -> redacción -> sellado de cotización -> auditoría.
    /// Todo camino de fallo libera la reserva antes de devolver.
    async fn execute_critical_section(
        state: AppState,
        reservation: ReservationGuard,
        decided_mode: AccessMode,
        quote_identifier: Option<String>,
        files: Vec<UploadedFileDescriptor>,
        user_identifier: Option<String>,
        session_identifier: String,
    ) -> Result<ExtractResponsePayload, Response> {
        let engine_tier = if decided_mode == AccessMode::TrialLimited {
            EngineTier::Free
        } else {
            EngineTier::Super
        };

        let extraction_started_at = Instant::now();
        let mut redacted_views = Vec::with_capacity(files.len());

        // --- INVOCACIÓN DEL MOTOR (COLABORADOR EXTERNO) ---
        for file in &files {
            let assignment = ExtractionAssignment {
                buffered_disk_path: file
                    .buffered_disk_path
                    .clone()
                    .expect("bounds validation guarantees a buffered path"),
                declared_mime_type: file.declared_mime_type.clone(),
                engine_tier_hint: engine_tier.as_engine_hint().to_string(),
            };

            match state.extractor.extract(assignment).await {
                Ok(raw_document) => {
                    redacted_views.push(FileExtractionView {
                        original_filename: file.original_filename.clone(),
                        document: apply_access_redaction(&raw_document, decided_mode),
                    });
                }
                Err(engine_fault) => {
                    warn!("🔥 [ENGINE_FAULT]: Extraction failed, unwinding: {}", engine_fault);
                    release_reservation(&state, &reservation).await;

                    let failure_status = if engine_fault.is_timeout() {
                        StatusCode::GATEWAY_TIMEOUT
                    } else {
                        StatusCode::BAD_GATEWAY
                    };
                    return Err(internal_fault_response(
                        failure_status,
                        "EXTRACTION_ENGINE_FAILED",
                        "The extraction engine failed; the reservation was released.",
                    ));
                }
            }
        }

        // --- SELLADO DE COTIZACIÓN (PUNTO DE SERIALIZACIÓN DEL REPLAY) ---
        if let Some(quote_identifier) = &quote_identifier {
            match state.quote_repository.mark_used(quote_identifier).await {
                Ok(()) => {}
                Err(DbError::QuoteNotActive) => {
                    // Perdimos la carrera: compensación y rechazo de replay.
                    release_reservation(&state, &reservation).await;
                    return Err(fault_response(
                        StatusCode::BAD_REQUEST,
                        "QUOTE_REPLAYED",
                        "The quote was consumed by a concurrent request; fetch a fresh quote.",
                    ));
                }
                Err(seal_fault) => {
                    error!("❌ [PIPELINE_FAULT]: Quote seal collapsed: {}", seal_fault);
                    release_reservation(&state, &reservation).await;
                    return Err(internal_fault_response(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "QUOTE_SEAL_FAILED",
                        "Quote storage failed during commit; the reservation was released.",
                    ));
                }
            }
        }

        // --- AUDITORÍA APPEND-ONLY (POST-COMMIT, NO DESHACE EL COBRO) ---
        let duration_milliseconds = extraction_started_at.elapsed().as_millis() as u64;
        let extraction_identifier = Uuid::new_v4().to_string();
        let credits_charged = match &reservation {
            ReservationGuard::Charged { credits_charged, .. } => *credits_charged,
            _ => 0,
        };

        for file in &files {
            let audit_record = ExtractionRecord {
                extraction_identifier: Uuid::new_v4().to_string(),
                user_identifier: user_identifier.clone(),
                session_identifier: session_identifier.clone(),
                original_filename: file.original_filename.clone(),
                declared_mime_type: file.declared_mime_type.clone(),
                size_bytes: file.size_bytes,
                access_mode: decided_mode,
                engine_tier,
                quote_identifier: quote_identifier.clone(),
                credits_charged,
                duration_milliseconds,
                created_at: Utc::now(),
            };

            if let Err(audit_fault) = state.extraction_log_repository.append(&audit_record).await {
                error!("⚠️ [AUDIT_FAULT]: Extraction record not crystallized: {}", audit_fault);
            }
        }

        info!(
            "🏁 [PIPELINE_COMPLETE]: {} file(s) served under mode [{}] in {}ms.",
            files.len(),
            decided_mode.as_db_label(),
            duration_milliseconds
        );

        Ok(ExtractResponsePayload {
            access: access_descriptor_for(&reservation, decided_mode),
            metadata: redacted_views,
            extraction_info: json!({
                "extraction_id": extraction_identifier,
                "engine_tier": engine_tier.as_engine_hint(),
                "duration_ms": duration_milliseconds,
                "files_processed": files.len(),
            }),
        })
    }
}
