// [libs/infra/db/src/repositories/extraction_log.rs]
// =================================================================
// APARATO: EXTRACTION AUDIT REPOSITORY (V1.2)
// RESPONSABILIDAD: RASTRO APPEND-ONLY DE EXTRACCIONES SERVIDAS
// =================================================================

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::stamps::to_storage_timestamp;
use espectro_domain_models::ExtractionRecord;
use libsql::params;
use tracing::instrument;

const APPEND_EXTRACTION_RECORD: &str = r#"
    INSERT INTO extraction_records (
        id, user_id, session_id, original_filename, mime_type, size_bytes,
        access_mode, engine_tier, quote_id, credits_charged, duration_ms, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
"#;

pub struct ExtractionLogRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl ExtractionLogRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    /// Cristaliza el registro mínimo de una extracción servida.
    #[instrument(skip(self, record))]
    pub async fn append(&self, record: &ExtractionRecord) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection
            .execute(
                APPEND_EXTRACTION_RECORD,
                params![
                    record.extraction_identifier.clone(),
                    record.user_identifier.clone(),
                    record.session_identifier.clone(),
                    record.original_filename.clone(),
                    record.declared_mime_type.clone(),
                    record.size_bytes as i64,
                    record.access_mode.as_db_label(),
                    record.engine_tier.as_engine_hint(),
                    record.quote_identifier.clone(),
                    record.credits_charged,
                    record.duration_milliseconds as i64,
                    to_storage_timestamp(record.created_at)
                ],
            )
            .await?;

        Ok(())
    }
}
