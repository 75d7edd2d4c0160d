// [libs/infra/db/src/stamps.rs]
// =================================================================
// APARATO: TEMPORAL STAMP GOVERNANCE (V1.1)
// RESPONSABILIDAD: FORMATO CANÓNICO DE TIMESTAMPS PERSISTIDOS
// =================================================================

use crate::errors::DbError;
use chrono::{DateTime, SecondsFormat, Utc};

/// Cristaliza un instante UTC en el formato canónico de persistencia.
/// Precisión fija de microsegundos y sufijo 'Z': el orden lexicográfico
/// de las cadenas coincide con el orden temporal, habilitando las
/// comparaciones de expiración directamente en SQL.
pub fn to_storage_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reconstruye el instante UTC desde la cadena persistida.
pub fn parse_storage_timestamp(raw_material: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw_material)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|parse_fault| {
            DbError::MappingError(format!("TIMESTAMP_CORRUPTION: '{}': {}", raw_material, parse_fault))
        })
}
