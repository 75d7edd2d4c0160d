// [libs/infra/extractor-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EXTRACTOR CLIENT LIBRARY BARREL (V2.0 - SEAM EXPOSED)
 * CLASIFICACIÓN: INFRASTRUCTURE LIB (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN PÚBLICA DEL CONTRATO DE EXTRACCIÓN
 *
 * VISION HIPER-HOLÍSTICA:
 * Centraliza el contrato 'MetadataExtractor' (la costura inyectable
 * que el pipeline consume) junto al cliente HTTP de producción y el
 * catálogo de fallos del motor.
 * =================================================================
 */

pub mod client;
pub mod errors;

pub use client::{ExtractionAssignment, HttpExtractionEngineClient, MetadataExtractor};
pub use errors::ExtractorError;
