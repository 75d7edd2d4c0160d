// [libs/domain/models/src/files.rs]
// =================================================================
// APARATO: UPLOADED FILE DESCRIPTOR (V1.3)
// RESPONSABILIDAD: DESCRIPCIÓN DE ARCHIVOS YA BUFFERIZADOS EN DISCO
// ESTADO: NO-REGRESSIONS / AUDIT-READY
// =================================================================

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Descripción de un archivo subido. El transporte aguas arriba ya ha
/// volcado los bytes a disco cuando el plano de extracción lo recibe.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedFileDescriptor {
    /// Nombre original declarado por el cliente.
    pub original_filename: String,

    /// Tipo MIME declarado (validado contra el conjunto cerrado permitido).
    pub declared_mime_type: String,

    /// Tamaño en bytes del material bufferizado.
    pub size_bytes: u64,

    /// Megapíxeles del activo visual (0.0 si no es imagen).
    pub megapixels: f64,

    /// Ruta del buffer en disco. Ausente en cotizaciones puras, presente
    /// en peticiones de extracción.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffered_disk_path: Option<String>,
}
