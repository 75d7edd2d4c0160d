// [apps/gateway/src/security.rs]
/*!
 * =================================================================
 * APARATO: GALVANIC SECURITY FORGE (V3.2 - CONSTANT TIME)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: TOKENS DE DISPOSITIVO FIRMADOS Y FIRMAS DE WEBHOOK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OPAQUE DEVICE IDENTITY: El token de dispositivo es un valor opaco
 *    emitido por el servidor (uuid + issued_at + MAC), jamás una huella
 *    del navegador. Tokens forjados o sin firma se rechazan.
 * 2. CONSTANT TIME: Toda comparación de MACs delega en 'verify_slice';
 *    ninguna rama depende de bytes del material atacante.
 * 3. COOKIE GOVERNANCE: Cookies http-only emitidas por el servidor:
 *    dispositivo durable y sesión por navegador.
 * =================================================================
 */

use axum::http::{header, HeaderMap, HeaderValue};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Nombre de la cookie durable de identidad de dispositivo.
pub const DEVICE_COOKIE_NAME: &str = "espectro_device";
/// Nombre de la cookie de sesión por navegador.
pub const SESSION_COOKIE_NAME: &str = "espectro_session";

/// Vida nominal de la cookie de dispositivo (2 años).
const DEVICE_COOKIE_MAX_AGE_SECONDS: i64 = 2 * 365 * 24 * 3600;

/// Material de identidad de dispositivo verificado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_identifier: String,
    pub issued_at_unix: i64,
}

fn sign_device_payload(token_secret: &[u8], payload: &str) -> String {
    let mut mac_forge = HmacSha256::new_from_slice(token_secret)
        .expect("HMAC accepts keys of any length");
    mac_forge.update(payload.as_bytes());
    hex::encode(mac_forge.finalize().into_bytes())
}

/**
 * Forja un token de dispositivo nuevo: 'uuid.issued_at.mac_hex'.
 */
pub fn mint_device_token(token_secret: &[u8], issued_at_unix: i64) -> (DeviceIdentity, String) {
    let device_identifier = Uuid::new_v4().to_string();
    let signing_payload = format!("{}.{}", device_identifier, issued_at_unix);
    let signature_hexadecimal = sign_device_payload(token_secret, &signing_payload);

    let cookie_material = format!("{}.{}", signing_payload, signature_hexadecimal);
    (DeviceIdentity { device_identifier, issued_at_unix }, cookie_material)
}

/**
 * Verifica un token de dispositivo presentado. Devuelve la identidad
 * solo si la firma es auténtica; cualquier malformación es rechazo.
 */
pub fn verify_device_token(token_secret: &[u8], cookie_material: &str) -> Option<DeviceIdentity> {
    let mut segments = cookie_material.splitn(3, '.');
    let device_identifier = segments.next()?;
    let issued_at_label = segments.next()?;
    let signature_hexadecimal = segments.next()?;

    let issued_at_unix = issued_at_label.parse::<i64>().ok()?;
    let presented_signature = hex::decode(signature_hexadecimal).ok()?;

    let signing_payload = format!("{}.{}", device_identifier, issued_at_unix);
    let mut mac_forge = HmacSha256::new_from_slice(token_secret)
        .expect("HMAC accepts keys of any length");
    mac_forge.update(signing_payload.as_bytes());

    mac_forge.verify_slice(&presented_signature).ok()?;

    Some(DeviceIdentity {
        device_identifier: device_identifier.to_string(),
        issued_at_unix,
    })
}

/**
 * Calcula la firma esperada de un webhook: HMAC-SHA256 sobre
 * 'event_id.timestamp.cuerpo_crudo'.
 */
pub fn compute_webhook_signature(
    shared_secret: &[u8],
    event_identifier: &str,
    timestamp_label: &str,
    raw_body: &[u8],
) -> String {
    let mut mac_forge = HmacSha256::new_from_slice(shared_secret)
        .expect("HMAC accepts keys of any length");
    mac_forge.update(event_identifier.as_bytes());
    mac_forge.update(b".");
    mac_forge.update(timestamp_label.as_bytes());
    mac_forge.update(b".");
    mac_forge.update(raw_body);
    hex::encode(mac_forge.finalize().into_bytes())
}

/**
 * Verifica en tiempo constante la firma presentada por el proveedor.
 */
pub fn verify_webhook_signature(
    shared_secret: &[u8],
    event_identifier: &str,
    timestamp_label: &str,
    raw_body: &[u8],
    presented_signature_hexadecimal: &str,
) -> bool {
    let presented_signature = match hex::decode(presented_signature_hexadecimal) {
        Ok(decoded_material) => decoded_material,
        Err(_) => return false,
    };

    let mut mac_forge = HmacSha256::new_from_slice(shared_secret)
        .expect("HMAC accepts keys of any length");
    mac_forge.update(event_identifier.as_bytes());
    mac_forge.update(b".");
    mac_forge.update(timestamp_label.as_bytes());
    mac_forge.update(b".");
    mac_forge.update(raw_body);

    mac_forge.verify_slice(&presented_signature).is_ok()
}

// --- GOBERNANZA DE COOKIES ---

/// Extrae el valor de una cookie del mapa de cabeceras entrantes.
pub fn read_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    cookie_header.split(';').find_map(|cookie_pair| {
        let (name, value) = cookie_pair.trim().split_once('=')?;
        if name == cookie_name {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Construye la cabecera Set-Cookie durable de dispositivo.
pub fn build_device_cookie(cookie_material: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        DEVICE_COOKIE_NAME, cookie_material, DEVICE_COOKIE_MAX_AGE_SECONDS
    ))
    .expect("cookie material is header-safe")
}

/// Construye la cabecera Set-Cookie de sesión (vida de navegador).
pub fn build_session_cookie(session_identifier: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME, session_identifier
    ))
    .expect("session identifier is header-safe")
}
