// [libs/domain/models/src/extraction.rs]
// =================================================================
// APARATO: EXTRACTION AUDIT RECORD (V1.2)
// RESPONSABILIDAD: RASTRO MÍNIMO APPEND-ONLY POR EXTRACCIÓN SERVIDA
// ESTADO: NO-REGRESSIONS / AUDIT-READY
// =================================================================

use crate::access::{AccessMode, EngineTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registro inmutable de una extracción completada, para auditoría y
/// reconciliación de ingresos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub extraction_identifier: String,

    pub user_identifier: Option<String>,
    pub session_identifier: String,

    pub original_filename: String,
    pub declared_mime_type: String,
    pub size_bytes: u64,

    pub access_mode: AccessMode,
    pub engine_tier: EngineTier,

    pub quote_identifier: Option<String>,
    pub credits_charged: i64,

    pub duration_milliseconds: u64,
    pub created_at: DateTime<Utc>,
}
