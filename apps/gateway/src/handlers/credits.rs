// [apps/gateway/src/handlers/credits.rs]
/*!
 * =================================================================
 * APARATO: CREDIT COMMERCE HANDLER (V3.0 - ACCOUNT SURFACE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: BALANCE, HISTORIAL Y ARRANQUE DE COMPRA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AUTH REQUIRED: Las tres superficies exigen identidad autenticada;
 *    el anónimo recibe 401 uniforme.
 * 2. CHECKOUT HANDOFF: La compra no toca el Ledger: entrega la URL del
 *    proveedor y el webhook firmado cierra el circuito del valor.
 * =================================================================
 */

use crate::faults::{fault_response, internal_fault_response};
use crate::middleware::{unauthorized_response, CallerIdentity};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse as AxumResponse, Response},
    Extension, Json,
};
use espectro_domain_models::BalanceKey;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct PurchaseRequestPayload {
    pub pack: String,
}

/**
 * Forja la URL de checkout del proveedor.
 *
 * El pack y la cuenta viajan como pares de query codificados; material
 * hostil en el pack no puede inyectar ni pisar parámetros vecinos.
 */
fn forge_checkout_url(
    checkout_base_url: &str,
    pack_label: &str,
    account_identifier: &str,
) -> Result<String, url::ParseError> {
    let mut checkout_url =
        Url::parse(&format!("{}/checkout", checkout_base_url.trim_end_matches('/')))?;

    checkout_url
        .query_pairs_mut()
        .append_pair("pack", pack_label)
        .append_pair("account", account_identifier);

    Ok(checkout_url.into())
}

pub struct CreditHandler;

impl CreditHandler {
    /**
     * Endpoint: GET /api/v1/credits/balance
     */
    #[instrument(skip(application_state, caller_identity))]
    pub async fn handle_get_balance(
        State(application_state): State<AppState>,
        Extension(caller_identity): Extension<CallerIdentity>,
    ) -> Response {
        let Some(user_identifier) = caller_identity.user_identifier else {
            return unauthorized_response();
        };

        match application_state
            .ledger_repository
            .balance(&BalanceKey::User(user_identifier))
            .await
        {
            Ok(available_credits) => {
                (StatusCode::OK, Json(json!({ "credits": available_credits }))).into_response()
            }
            Err(balance_fault) => {
                error!("❌ [CREDITS_FAULT]: Balance read collapsed: {}", balance_fault);
                internal_fault_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_UNAVAILABLE",
                    "Credit storage is unavailable.",
                )
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/credits/history
     *
     * Rastro financiero reciente, más nuevo primero.
     */
    #[instrument(skip(application_state, caller_identity))]
    pub async fn handle_get_history(
        State(application_state): State<AppState>,
        Extension(caller_identity): Extension<CallerIdentity>,
    ) -> Response {
        let Some(user_identifier) = caller_identity.user_identifier else {
            return unauthorized_response();
        };

        match application_state
            .ledger_repository
            .list_recent_transactions(
                &BalanceKey::User(user_identifier),
                application_state.config.credit_history_limit,
            )
            .await
        {
            Ok(transaction_records) => {
                (StatusCode::OK, Json(json!({ "transactions": transaction_records }))).into_response()
            }
            Err(history_fault) => {
                error!("❌ [CREDITS_FAULT]: History read collapsed: {}", history_fault);
                internal_fault_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_UNAVAILABLE",
                    "Credit storage is unavailable.",
                )
            }
        }
    }

    /**
     * Endpoint: POST /api/v1/credits/purchase
     *
     * Entrega la URL de checkout del proveedor para el pack solicitado.
     */
    #[instrument(skip(application_state, caller_identity, payload))]
    pub async fn handle_purchase_checkout(
        State(application_state): State<AppState>,
        Extension(caller_identity): Extension<CallerIdentity>,
        Json(payload): Json<PurchaseRequestPayload>,
    ) -> Response {
        let Some(user_identifier) = caller_identity.user_identifier else {
            return unauthorized_response();
        };

        let pack_label = payload.pack.trim();
        if pack_label.is_empty() {
            return fault_response(
                StatusCode::BAD_REQUEST,
                "PACK_LABEL_EMPTY",
                "A pack identifier is required.",
            );
        }

        let checkout_url = match forge_checkout_url(
            &application_state.config.checkout_base_url,
            pack_label,
            &user_identifier,
        ) {
            Ok(forged_url) => forged_url,
            Err(parse_fault) => {
                error!("❌ [CHECKOUT_FAULT]: Checkout base URL unparsable: {}", parse_fault);
                return internal_fault_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CHECKOUT_URL_INVALID",
                    "The checkout endpoint is misconfigured.",
                );
            }
        };

        info!("🛒 [CHECKOUT_HANDOFF]: Account [{}] routed to pack [{}].", user_identifier, pack_label);
        (StatusCode::OK, Json(json!({ "checkout_url": checkout_url }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::forge_checkout_url;

    #[test]
    fn certify_checkout_url_carries_encoded_pairs() {
        let forged = forge_checkout_url("https://pay.espectro.dev/", "pack_pro_100", "op-77").unwrap();
        assert_eq!(forged, "https://pay.espectro.dev/checkout?pack=pack_pro_100&account=op-77");
    }

    /**
     * CERTIFICACIÓN: un pack hostil no puede inyectar ni pisar el
     * parámetro 'account' de la URL entregada.
     */
    #[test]
    fn certify_hostile_pack_label_cannot_inject_parameters() {
        let forged =
            forge_checkout_url("https://pay.espectro.dev", "pro&account=attacker", "op-77").unwrap();

        assert!(forged.contains("pack=pro%26account%3Dattacker"));
        assert!(forged.ends_with("&account=op-77"));
        assert_eq!(forged.matches("account=").count(), 1, "Parameter override breach.");
    }

    #[test]
    fn certify_malformed_base_url_is_rejected() {
        assert!(forge_checkout_url("not a url", "pack", "op-77").is_err());
    }
}
