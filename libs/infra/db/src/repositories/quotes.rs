// [libs/infra/db/src/repositories/quotes.rs]
/*!
 * =================================================================
 * APARATO: QUOTE STORE REPOSITORY (V3.1 - SINGLE USE GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA, EXPIRACIÓN Y USO ÚNICO DE COTIZACIONES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CAS TRANSITION: 'active -> used' es un compare-and-set SQL; el
 *    conteo de filas afectadas decide al único ganador de la carrera.
 * 2. LAZY EXPIRY: Una fila 'active' vencida se clasifica como expirada
 *    en lectura, sin requerir escritura.
 * 3. SWEEP DISCIPLINE: El barrido físico respeta un período de gracia
 *    posterior a la expiración y opera por lotes acotados.
 *
 * # Mathematical Proof (At-Most-Once Use):
 * El UPDATE de consumo porta 'status = active AND expires_at > now' en
 * su WHERE. SQLite serializa escritores, por lo que exactamente una de
 * N transiciones concurrentes observa la guardia verdadera.
 * =================================================================
 */

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::repositories::optional_text;
use crate::stamps::{parse_storage_timestamp, to_storage_timestamp};
use chrono::Utc;
use espectro_domain_models::{QuoteRecord, QuoteStatus, UploadedFileDescriptor};
use libsql::params;
use tracing::{debug, info, instrument};

const INITIALIZE_QUOTE: &str = r#"
    INSERT INTO quotes (
        id, session_id, user_id, files_json, ops_bitfield,
        credits_total, per_file_json, schedule_json, schedule_version,
        status, created_at, expires_at, used_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active', ?10, ?11, NULL)
"#;

const FIND_QUOTE: &str = r#"
    SELECT id, session_id, user_id, files_json, ops_bitfield,
           credits_total, per_file_json, schedule_json, schedule_version,
           status, created_at, expires_at, used_at
    FROM quotes
    WHERE id = ?1
"#;

/// Transición CAS de consumo: solo una fila activa y no vencida muta.
const MARK_QUOTE_USED: &str = r#"
    UPDATE quotes
    SET status = 'used', used_at = ?1
    WHERE id = ?2 AND status = 'active' AND expires_at > ?1
"#;

/// Barrido físico por lotes de filas vencidas más allá de la gracia.
const SWEEP_EXPIRED_BATCH: &str = r#"
    DELETE FROM quotes
    WHERE id IN (
        SELECT id FROM quotes WHERE expires_at < ?1 LIMIT ?2
    )
"#;

pub struct QuoteRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl QuoteRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Cristaliza una cotización recién calculada con estado 'active'.
     */
    #[instrument(skip(self, quote_record))]
    pub async fn create_quote(&self, quote_record: &QuoteRecord) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        let files_json = serde_json::to_string(&quote_record.files)
            .map_err(|serialization_fault| DbError::MappingError(serialization_fault.to_string()))?;
        let per_file_json = serde_json::to_string(&quote_record.per_file_credits)
            .map_err(|serialization_fault| DbError::MappingError(serialization_fault.to_string()))?;
        let schedule_json = quote_record.schedule_snapshot.to_string();

        database_connection
            .execute(
                INITIALIZE_QUOTE,
                params![
                    quote_record.quote_identifier.clone(),
                    quote_record.session_identifier.clone(),
                    quote_record.user_identifier.clone(),
                    files_json,
                    quote_record.requested_operations_bitfield as i64,
                    quote_record.credits_total,
                    per_file_json,
                    schedule_json,
                    quote_record.schedule_version as i64,
                    to_storage_timestamp(quote_record.created_at),
                    to_storage_timestamp(quote_record.expires_at)
                ],
            )
            .await?;

        info!(
            "📜 [QUOTE_SEALED]: Quote [{}] crystallized for {} credits.",
            quote_record.quote_identifier, quote_record.credits_total
        );
        Ok(())
    }

    /**
     * Recupera una cotización por identificador.
     *
     * La clasificación perezosa de expiración corre por cuenta del
     * llamador vía 'QuoteRecord::effective_status'.
     *
     * # Errors:
     * - `DbError::QuoteNotFound`: identificador inexistente.
     */
    #[instrument(skip(self))]
    pub async fn load_quote(&self, quote_identifier: &str) -> Result<QuoteRecord, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut lookup_results = database_connection
            .query(FIND_QUOTE, params![quote_identifier.to_string()])
            .await?;

        let data_row = lookup_results.next().await?.ok_or(DbError::QuoteNotFound)?;

        let files_json: String = data_row.get(3)?;
        let files: Vec<UploadedFileDescriptor> = serde_json::from_str(&files_json)
            .map_err(|decoding_fault| DbError::MappingError(decoding_fault.to_string()))?;

        let per_file_json: String = data_row.get(6)?;
        let per_file_credits = serde_json::from_str(&per_file_json)
            .map_err(|decoding_fault| DbError::MappingError(decoding_fault.to_string()))?;

        let schedule_json: String = data_row.get(7)?;
        let schedule_snapshot = serde_json::from_str(&schedule_json)
            .map_err(|decoding_fault| DbError::MappingError(decoding_fault.to_string()))?;

        let status_label: String = data_row.get(9)?;
        let created_at_stamp: String = data_row.get(10)?;
        let expires_at_stamp: String = data_row.get(11)?;

        let used_at = match optional_text(&data_row, 12)? {
            Some(used_stamp) => Some(parse_storage_timestamp(&used_stamp)?),
            None => None,
        };

        Ok(QuoteRecord {
            quote_identifier: data_row.get(0)?,
            session_identifier: data_row.get(1)?,
            user_identifier: optional_text(&data_row, 2)?,
            files,
            requested_operations_bitfield: data_row.get::<i64>(4)? as u32,
            credits_total: data_row.get(5)?,
            per_file_credits,
            schedule_snapshot,
            schedule_version: data_row.get::<i64>(8)? as u32,
            status: QuoteStatus::from_db_label(&status_label)
                .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_QUOTE_STATUS: {}", status_label)))?,
            created_at: parse_storage_timestamp(&created_at_stamp)?,
            expires_at: parse_storage_timestamp(&expires_at_stamp)?,
            used_at,
        })
    }

    /**
     * Consume la cotización mediante compare-and-set atómico.
     *
     * # Errors:
     * - `DbError::QuoteNotActive`: otra petición ganó la carrera, o la
     *   fila está vencida o inexistente.
     */
    #[instrument(skip(self))]
    pub async fn mark_used(&self, quote_identifier: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let now_stamp = to_storage_timestamp(Utc::now());

        let affected_rows = database_connection
            .execute(MARK_QUOTE_USED, params![now_stamp, quote_identifier.to_string()])
            .await?;

        if affected_rows == 1 {
            info!("🔒 [QUOTE_CONSUMED]: Quote [{}] transitioned to 'used'.", quote_identifier);
            Ok(())
        } else {
            debug!("⚔️ [QUOTE_RACE]: Quote [{}] was not active for consumption.", quote_identifier);
            Err(DbError::QuoteNotActive)
        }
    }

    /**
     * Barrido físico de cotizaciones vencidas más allá de la gracia.
     * Devuelve el número de filas purgadas del lote.
     */
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, grace_seconds: i64, batch_limit: u32) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let eviction_threshold = Utc::now() - chrono::Duration::seconds(grace_seconds);
        let purged_rows = database_connection
            .execute(
                SWEEP_EXPIRED_BATCH,
                params![to_storage_timestamp(eviction_threshold), batch_limit as i64],
            )
            .await?;

        if purged_rows > 0 {
            info!("💀 [QUOTE_SWEEP]: Evicted {} expired quotes beyond grace window.", purged_rows);
        }
        Ok(purged_rows)
    }
}
