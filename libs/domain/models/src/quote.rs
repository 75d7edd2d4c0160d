// [libs/domain/models/src/quote.rs]
/*!
 * =================================================================
 * APARATO: QUOTE DOMAIN MODEL (V2.4 - SINGLE USE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: AUTORIZACIÓN DE PRECIO PERSISTIDA, EXPIRABLE Y DE UN USO
 *
 * # Mathematical Proof (Replay Defense):
 * Una cotización activa transiciona a 'used' mediante un compare-and-set
 * único. Cualquier segunda petición que presente el mismo identificador
 * observa 'NotActive', por lo que a lo sumo una respuesta exitosa puede
 * referenciar cada cotización.
 * =================================================================
 */

use crate::files::UploadedFileDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estados del ciclo de vida de una cotización.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Active,
    Used,
    Expired,
}

impl QuoteStatus {
    pub fn as_db_label(&self) -> &'static str {
        match self {
            QuoteStatus::Active => "active",
            QuoteStatus::Used => "used",
            QuoteStatus::Expired => "expired",
        }
    }

    pub fn from_db_label(label: &str) -> Option<Self> {
        match label {
            "active" => Some(QuoteStatus::Active),
            "used" => Some(QuoteStatus::Used),
            "expired" => Some(QuoteStatus::Expired),
            _ => None,
        }
    }
}

/// Costo individual de un archivo dentro de la cotización.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileQuoteLine {
    pub original_filename: String,
    pub credit_cost: i64,
}

/// Cotización persistida: sella el cálculo de precio contra una futura
/// llamada de extracción.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub quote_identifier: String,
    pub session_identifier: String,
    pub user_identifier: Option<String>,

    pub files: Vec<UploadedFileDescriptor>,

    /// Operaciones premium solicitadas (campo de bits del motor de precios).
    pub requested_operations_bitfield: u32,

    pub credits_total: i64,
    pub per_file_credits: Vec<FileQuoteLine>,

    /// Snapshot de la tabla de precios vigente al cotizar. La repetición
    /// del cálculo tras un cambio de tarifas reproduce el precio original.
    pub schedule_snapshot: serde_json::Value,
    pub schedule_version: u32,

    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl QuoteRecord {
    /// Clasificación perezosa: una fila 'active' cuyo plazo venció se
    /// observa como expirada sin requerir escritura.
    pub fn effective_status(&self, observation_instant: DateTime<Utc>) -> QuoteStatus {
        if self.status == QuoteStatus::Active && self.expires_at < observation_instant {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }
}
