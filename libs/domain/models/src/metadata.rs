// [libs/domain/models/src/metadata.rs]
/*!
 * =================================================================
 * APARATO: METADATA DOCUMENT MODELS (V4.0 - DUAL VIEW)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA DEL DOCUMENTO CRUDO Y DE SU VISTA REDACTADA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL STRATA: 'RawMetadataDocument' es la salida opaca del motor de
 *    extracción; 'RedactedMetadataView' es la única forma que cruza el
 *    perímetro HTTP.
 * 2. GROUPED FIELDS: Cada grupo de campos es una sub-entidad nominal,
 *    alineada 1:1 con la matriz de redacción del estrato L2-Redaction.
 * 3. NOMINAL PURITY: Erradicación total de abreviaciones.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use typeshare::typeshare;

/// Propiedades derivadas del análisis geométrico del activo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputedImageProperties {
    pub width_pixels: u32,
    pub height_pixels: u32,
    pub megapixels: f64,
    pub aspect_ratio: f64,
}

/// Huellas criptográficas del archivo físico.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileHashSet {
    pub sha256_hexadecimal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hexadecimal: Option<String>,
}

/// Huellas perceptuales para deduplicación visual.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerceptualHashSet {
    pub phash_hexadecimal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhash_hexadecimal: Option<String>,
}

/// Miniatura embebida extraída del contenedor.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThumbnailArtifact {
    pub image_base64: String,
    pub width_pixels: u32,
    pub height_pixels: u32,
}

/// Testimonio de existencia de miniatura sin el material binario.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThumbnailPresence {
    pub present: bool,
    pub width_pixels: u32,
    pub height_pixels: u32,
}

/// Forma de divulgación de la miniatura según el modo de acceso.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ThumbnailDisclosure {
    Full(ThumbnailArtifact),
    PresenceOnly(ThumbnailPresence),
}

/// Coordenadas GPS del activo. 'maps_url' solo sobrevive en modo de pago.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
}

/// Texto quemado en el activo recuperado vía OCR.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurnedTextBlock {
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f64>,
}

/// Contexto postal inferido por geocodificación inversa.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostalContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Rastro del sistema de archivos de origen.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilesystemTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inode_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_octal: Option<String>,
}

/// Forma de divulgación de atributos extendidos: mapa completo o solo llaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ExtendedAttributesDisclosure {
    Full(BTreeMap<String, String>),
    KeysOnly(Vec<String>),
}

/// Documento crudo devuelto por el motor de extracción externo.
/// Nunca cruza el perímetro HTTP sin pasar por la matriz de redacción.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawMetadataDocument {
    /// Diccionario EXIF/IPTC/XMP completo tal como lo emite el motor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_tag_dictionary: Option<Value>,

    pub computed_properties: Option<ComputedImageProperties>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hashes: Option<FileHashSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceptual_hashes: Option<PerceptualHashSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailArtifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_position: Option<GpsCoordinates>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub burned_text: Option<BurnedTextBlock>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_context: Option<PostalContext>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem_trace: Option<FilesystemTrace>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_attributes: Option<BTreeMap<String, String>>,

    /// Salida de analizadores empresariales pesados (telemetría de dron,
    /// análisis de medios sintéticos, procedencia blockchain), indexada
    /// por el identificador de módulo configurado.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_analyzers: Option<BTreeMap<String, Value>>,
}

/// Vista narrowed del documento según el modo de acceso congelado.
/// Es la única representación serializada hacia el cliente.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RedactedMetadataView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_tag_dictionary: Option<Value>,

    pub computed_properties: Option<ComputedImageProperties>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hashes: Option<FileHashSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceptual_hashes: Option<PerceptualHashSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailDisclosure>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_position: Option<GpsCoordinates>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub burned_text: Option<BurnedTextBlock>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_context: Option<PostalContext>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem_trace: Option<FilesystemTrace>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_attributes: Option<ExtendedAttributesDisclosure>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_analyzers: Option<BTreeMap<String, Value>>,
}
