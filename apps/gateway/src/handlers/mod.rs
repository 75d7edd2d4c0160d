// [apps/gateway/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER BARREL (V4.0 - ADAPTER TOPOLOGY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN DE ADAPTADORES HTTP Y COTAS COMPARTIDAS
 * =================================================================
 */

pub mod credits;
pub mod extract;
pub mod quote;
pub mod webhooks;

use crate::faults::{fault_response, fault_response_with};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::Response;
use espectro_domain_models::UploadedFileDescriptor;
use serde_json::json;

/**
 * Cotas de payload compartidas por cotización y extracción.
 *
 * La extracción exige además la ruta del buffer: el transporte aguas
 * arriba ya volcó los bytes a disco cuando el plano recibe la petición.
 */
pub(crate) fn validate_file_bounds(
    state: &AppState,
    files: &[UploadedFileDescriptor],
    require_buffered_path: bool,
) -> Result<(), Response> {
    if files.is_empty() {
        return Err(fault_response(
            StatusCode::BAD_REQUEST,
            "EMPTY_FILE_SET",
            "At least one file descriptor is required.",
        ));
    }

    if files.len() > state.config.max_files_per_request {
        return Err(fault_response_with(
            StatusCode::BAD_REQUEST,
            "FILE_COUNT_EXCEEDED",
            "Too many files for a single request.",
            json!({ "max_files": state.config.max_files_per_request }),
        ));
    }

    for file in files {
        if file.size_bytes > state.config.max_file_bytes {
            return Err(fault_response_with(
                StatusCode::BAD_REQUEST,
                "FILE_SIZE_EXCEEDED",
                "A file exceeds the configured byte ceiling.",
                json!({
                    "file": file.original_filename,
                    "max_file_bytes": state.config.max_file_bytes
                }),
            ));
        }

        if !state.config.is_mime_type_allowed(&file.declared_mime_type) {
            return Err(fault_response_with(
                StatusCode::FORBIDDEN,
                "MIME_TYPE_FORBIDDEN",
                "Declared file type is outside the allowed set.",
                json!({ "file": file.original_filename, "declared": file.declared_mime_type }),
            ));
        }

        if require_buffered_path && file.buffered_disk_path.is_none() {
            return Err(fault_response_with(
                StatusCode::BAD_REQUEST,
                "BUFFERED_PATH_MISSING",
                "Extraction requires the transport to have buffered bytes to disk.",
                json!({ "file": file.original_filename }),
            ));
        }
    }

    Ok(())
}
