// [libs/domain/redaction/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ACCESS REDACTION MATRIX (V3.1 - SINGLE AUDITED ARTIFACT)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: NARROWING DETERMINISTA DEL DOCUMENTO POR MODO DE ACCESO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TABLE GOVERNANCE: El tratamiento de cada grupo de campos por modo
 *    vive en una única tabla constante auditable, no en condicionales
 *    dispersos por los handlers.
 * 2. PURE FUNCTION: (documento crudo, modo) -> vista. Sin I/O, sin reloj.
 * 3. PRIVACY FLOOR: El modo anónimo jamás emite un campo que permita
 *    ubicar una posición precisa ni identificar a una persona más allá
 *    de granularidad de vecindario.
 *
 * # Mathematical Proof (View Monotonicity):
 * Sobre el conjunto de campos emitidos rige el orden
 * trial_limited ⊆ device_free ⊆ paid: cada columna de la tabla es un
 * refinamiento de la anterior, y la función de aplicación preserva la
 * relación grupo a grupo.
 * =================================================================
 */

use espectro_domain_models::{
    AccessMode, ExtendedAttributesDisclosure, GpsCoordinates, PostalContext, RawMetadataDocument,
    RedactedMetadataView, ThumbnailDisclosure, ThumbnailPresence,
};
use serde_json::Value;

/// Grupos de campos del documento, alineados 1:1 con sus sub-entidades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    RawTagDictionary,
    ComputedProperties,
    FileHashes,
    PerceptualHashes,
    Thumbnail,
    GpsPosition,
    BurnedText,
    PostalContext,
    FilesystemTrace,
    ExtendedAttributes,
    EnterpriseAnalyzers,
}

/// Tratamiento aplicable a un grupo bajo un modo dado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTreatment {
    /// El grupo cruza el perímetro intacto.
    Full,
    /// El grupo se degrada a una forma de menor precisión (GPS a 2
    /// decimales, dirección postal a ciudad/región/país, atributos
    /// extendidos a solo llaves).
    Coarsened,
    /// Solo se atestigua la existencia del material, con dimensiones.
    PresenceOnly,
    /// El grupo se emite como contenedor vacío.
    EmptyShell,
    /// El grupo no se emite.
    Absent,
}

/// Columnas: [paid, device_free, trial_limited].
/// Cada fila DEBE degradar de izquierda a derecha; el test de
/// monotonicidad certifica la propiedad sobre la función aplicada.
const REDACTION_MATRIX: &[(FieldGroup, [FieldTreatment; 3])] = &[
    (FieldGroup::RawTagDictionary,   [FieldTreatment::Full, FieldTreatment::Full,         FieldTreatment::EmptyShell]),
    (FieldGroup::ComputedProperties, [FieldTreatment::Full, FieldTreatment::Full,         FieldTreatment::Full]),
    (FieldGroup::FileHashes,         [FieldTreatment::Full, FieldTreatment::Full,         FieldTreatment::Full]),
    (FieldGroup::PerceptualHashes,   [FieldTreatment::Full, FieldTreatment::Full,         FieldTreatment::Absent]),
    (FieldGroup::Thumbnail,          [FieldTreatment::Full, FieldTreatment::PresenceOnly, FieldTreatment::Absent]),
    (FieldGroup::GpsPosition,        [FieldTreatment::Full, FieldTreatment::Coarsened,    FieldTreatment::Absent]),
    (FieldGroup::BurnedText,         [FieldTreatment::Full, FieldTreatment::Absent,       FieldTreatment::Absent]),
    (FieldGroup::PostalContext,      [FieldTreatment::Full, FieldTreatment::Coarsened,    FieldTreatment::Absent]),
    (FieldGroup::FilesystemTrace,    [FieldTreatment::Full, FieldTreatment::Absent,       FieldTreatment::Absent]),
    (FieldGroup::ExtendedAttributes, [FieldTreatment::Full, FieldTreatment::Coarsened,    FieldTreatment::Absent]),
    (FieldGroup::EnterpriseAnalyzers,[FieldTreatment::Full, FieldTreatment::Absent,       FieldTreatment::Absent]),
];

fn matrix_column(mode: AccessMode) -> usize {
    match mode {
        AccessMode::Paid => 0,
        AccessMode::DeviceFree => 1,
        AccessMode::TrialLimited => 2,
    }
}

/// Tratamiento vigente para un grupo bajo un modo.
pub fn treatment_for(group: FieldGroup, mode: AccessMode) -> FieldTreatment {
    let column = matrix_column(mode);
    REDACTION_MATRIX
        .iter()
        .find(|(candidate_group, _)| *candidate_group == group)
        .map(|(_, treatments)| treatments[column])
        .unwrap_or(FieldTreatment::Absent)
}

/// Redondeo de coordenada a 2 decimales (~1.1 km de granularidad).
fn coarsen_coordinate(degrees: f64) -> f64 {
    (degrees * 100.0).round() / 100.0
}

fn coarsen_gps(position: &GpsCoordinates) -> GpsCoordinates {
    GpsCoordinates {
        latitude_degrees: coarsen_coordinate(position.latitude_degrees),
        longitude_degrees: coarsen_coordinate(position.longitude_degrees),
        // La altitud y la URL de mapas caen junto con la precisión.
        altitude_meters: None,
        maps_url: None,
    }
}

fn coarsen_postal_context(context: &PostalContext) -> PostalContext {
    PostalContext {
        street_address: None,
        city: context.city.clone(),
        state_region: context.state_region.clone(),
        country: context.country.clone(),
    }
}

/**
 * Aplica la matriz de redacción al documento crudo bajo el modo congelado.
 *
 * # Logic:
 * Cada grupo se resuelve de forma independiente consultando su fila de la
 * tabla. Un grupo ausente en el documento crudo permanece ausente en toda
 * vista (la redacción nunca inventa material).
 */
pub fn apply_access_redaction(
    document: &RawMetadataDocument,
    mode: AccessMode,
) -> RedactedMetadataView {
    let mut view = RedactedMetadataView::default();

    if document.raw_tag_dictionary.is_some() {
        match treatment_for(FieldGroup::RawTagDictionary, mode) {
            FieldTreatment::Full => view.raw_tag_dictionary = document.raw_tag_dictionary.clone(),
            FieldTreatment::EmptyShell => {
                view.raw_tag_dictionary = Some(Value::Object(serde_json::Map::new()));
            }
            _ => {}
        }
    }

    if treatment_for(FieldGroup::ComputedProperties, mode) == FieldTreatment::Full {
        view.computed_properties = document.computed_properties.clone();
    }

    if treatment_for(FieldGroup::FileHashes, mode) == FieldTreatment::Full {
        view.file_hashes = document.file_hashes.clone();
    }

    if treatment_for(FieldGroup::PerceptualHashes, mode) == FieldTreatment::Full {
        view.perceptual_hashes = document.perceptual_hashes.clone();
    }

    if let Some(thumbnail) = &document.thumbnail {
        match treatment_for(FieldGroup::Thumbnail, mode) {
            FieldTreatment::Full => {
                view.thumbnail = Some(ThumbnailDisclosure::Full(thumbnail.clone()));
            }
            FieldTreatment::PresenceOnly => {
                view.thumbnail = Some(ThumbnailDisclosure::PresenceOnly(ThumbnailPresence {
                    present: true,
                    width_pixels: thumbnail.width_pixels,
                    height_pixels: thumbnail.height_pixels,
                }));
            }
            _ => {}
        }
    }

    if let Some(position) = &document.gps_position {
        match treatment_for(FieldGroup::GpsPosition, mode) {
            FieldTreatment::Full => view.gps_position = Some(position.clone()),
            FieldTreatment::Coarsened => view.gps_position = Some(coarsen_gps(position)),
            _ => {}
        }
    }

    if treatment_for(FieldGroup::BurnedText, mode) == FieldTreatment::Full {
        view.burned_text = document.burned_text.clone();
    }

    if let Some(context) = &document.location_context {
        match treatment_for(FieldGroup::PostalContext, mode) {
            FieldTreatment::Full => view.location_context = Some(context.clone()),
            FieldTreatment::Coarsened => {
                view.location_context = Some(coarsen_postal_context(context));
            }
            _ => {}
        }
    }

    if treatment_for(FieldGroup::FilesystemTrace, mode) == FieldTreatment::Full {
        view.filesystem_trace = document.filesystem_trace.clone();
    }

    if let Some(attributes) = &document.extended_attributes {
        match treatment_for(FieldGroup::ExtendedAttributes, mode) {
            FieldTreatment::Full => {
                view.extended_attributes =
                    Some(ExtendedAttributesDisclosure::Full(attributes.clone()));
            }
            FieldTreatment::Coarsened => {
                view.extended_attributes = Some(ExtendedAttributesDisclosure::KeysOnly(
                    attributes.keys().cloned().collect(),
                ));
            }
            _ => {}
        }
    }

    if treatment_for(FieldGroup::EnterpriseAnalyzers, mode) == FieldTreatment::Full {
        view.enterprise_analyzers = document.enterprise_analyzers.clone();
    }

    view
}
