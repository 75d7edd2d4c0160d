// [libs/infra/extractor-client/src/errors.rs]
//! =================================================================
//! APARATO: EXTRACTOR CLIENT ERRORS (V2.1 - TIMEOUT AWARE)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DEL MOTOR DE EXTRACCIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    /// El motor no respondió dentro de la ventana dura configurada.
    #[error("ENGINE_TIMEOUT: Extraction exceeded the hard window of {0} seconds")]
    Timeout(u64),

    /// Enlace de red imposible o cortado a mitad de ráfaga.
    #[error("ENGINE_UNREACHABLE: Failed to connect to extraction engine: {0}")]
    NetworkFault(#[from] reqwest::Error),

    /// El motor respondió con un estado de rechazo explícito.
    #[error("ENGINE_REJECTION: Engine returned status {0}")]
    EngineRejection(String),

    /// El formato del archivo no es procesable por el motor.
    #[error("UNSUPPORTED_FORMAT: Engine cannot parse declared type '{0}'")]
    UnsupportedFormat(String),

    /// El sobre devuelto no corresponde al documento de metadatos.
    #[error("ENVELOPE_CORRUPTION: Failed to decode metadata document: {0}")]
    DecodingFault(#[from] serde_json::Error),
}

impl ExtractorError {
    /// Un fallo del motor tras una reserva exitosa siempre dispara la
    /// devolución compensatoria en el pipeline; la distinción solo
    /// afecta al código de estado expuesto.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExtractorError::Timeout(_))
    }
}
