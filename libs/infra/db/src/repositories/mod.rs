// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V4.0 - TOPOLOGY MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ACCESS SOVEREIGNTY: Centraliza la visibilidad de los repositorios
 *    tácticos para la inyección de dependencias en el Gateway.
 * 2. NOMINAL PARITY: 'LedgerRepository' es el ancla del valor adeudado;
 *    ningún otro módulo muta balances, grants ni transacciones.
 *
 * # Mathematical Proof (Modular Encapsulation):
 * El barrel file actúa como interfaz galvánica: los sub-módulos
 * permanecen aislados y solo las estructuras de autoridad
 * (Repositories) son expuestas al exterior.
 * =================================================================
 */

// --- ESTRATO 1: VALOR Y AUTORIZACIÓN (LEDGER) ---

/// Balances, grants FIFO, cobros atómicos y reembolsos exactos.
pub mod ledger;
/// Cotizaciones persistidas de uso único con expiración perezosa.
pub mod quotes;

// --- ESTRATO 2: CUOTAS GRATUITAS (FREE STRATA) ---

/// Contador condicional por identidad de dispositivo.
pub mod device_quota;
/// Contador condicional por email de prueba normalizado.
pub mod trial;

// --- ESTRATO 3: PAGOS E IDENTIDAD (COMMERCE) ---

/// Barrera de idempotencia durable de eventos del proveedor de pagos.
pub mod webhooks;
/// Resolución y forja de cuentas por identidad del proveedor.
pub mod users;

// --- ESTRATO 4: AUDITORÍA (PANOPTICON) ---

/// Rastro append-only de extracciones servidas.
pub mod extraction_log;

pub use device_quota::DeviceQuotaRepository;
pub use extraction_log::ExtractionLogRepository;
pub use ledger::LedgerRepository;
pub use quotes::QuoteRepository;
pub use trial::{normalize_trial_email, TrialQuotaRepository};
pub use users::UserRepository;
pub use webhooks::WebhookRepository;

use crate::errors::DbError;

/// Extrae una columna TEXT anulable de una fila del motor.
pub(crate) fn optional_text(data_row: &libsql::Row, column_index: i32) -> Result<Option<String>, DbError> {
    match data_row.get_value(column_index).map_err(DbError::from)? {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(text_material) => Ok(Some(text_material)),
        unexpected => Err(DbError::MappingError(format!(
            "EXPECTED_TEXT_AT_COLUMN_{}: {:?}",
            column_index, unexpected
        ))),
    }
}
