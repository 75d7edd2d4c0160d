// [libs/domain/models/src/access.rs]
/*!
 * =================================================================
 * APARATO: ACCESS MODE MODEL (V2.1 - FROZEN DECISION)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA DEL MODO DE ACCESO Y NIVEL DE MOTOR
 *
 * # Mathematical Proof (Decision Freezing):
 * El modo de acceso se decide una sola vez por petición y queda
 * congelado: el mismo valor gobierna el cobro (reserva) y la
 * redacción (vista), eliminando desviaciones entre ambos estratos.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Clasificación congelada del acceso de una petición de extracción.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Acceso anónimo gratuito, gobernado por la cuota de dispositivo.
    DeviceFree,
    /// Acceso de prueba por email, con vista mínima del documento.
    TrialLimited,
    /// Acceso de pago, descontado del ledger de créditos.
    Paid,
}

impl AccessMode {
    /// Etiqueta persistida en el registro de auditoría.
    pub fn as_db_label(&self) -> &'static str {
        match self {
            AccessMode::DeviceFree => "device_free",
            AccessMode::TrialLimited => "trial_limited",
            AccessMode::Paid => "paid",
        }
    }
}

/// Pista de profundidad entregada al motor de extracción externo.
/// No guarda relación con niveles de suscripción de usuario.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineTier {
    /// Parseo superficial: cabeceras y propiedades computadas.
    Free,
    /// Parseo profundo: EXIF completo, OCR, analizadores pesados.
    Super,
}

impl EngineTier {
    pub fn as_engine_hint(&self) -> &'static str {
        match self {
            EngineTier::Free => "free",
            EngineTier::Super => "super",
        }
    }
}

/// Descriptor de acceso devuelto junto a cada respuesta de extracción.
/// Consumido por el componente 'Access Banner' del Dashboard.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDescriptor {
    pub mode: AccessMode,

    /// Extracciones gratuitas consumidas (solo modos de cuota).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_used: Option<u32>,

    /// Techo de extracciones gratuitas (solo modos de cuota).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_limit: Option<u32>,

    /// Créditos descontados en esta petición (solo modo de pago).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_charged: Option<i64>,
}
