// [libs/infra/db/src/repositories/device_quota.rs]
/*!
 * =================================================================
 * APARATO: DEVICE QUOTA REPOSITORY (V2.2 - HARD CEILING)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CONTADOR CONDICIONAL DE EXTRACCIONES GRATUITAS
 *
 * # Mathematical Proof (Ceiling Under Concurrency):
 * El incremento porta 'extraction_count < limit' en su WHERE. SQLite
 * serializa escritores sobre la fila (device_id, session_id), por lo
 * que bajo cualquier concurrencia a lo sumo 'limit' incrementos
 * observan la guardia verdadera.
 * =================================================================
 */

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::stamps::to_storage_timestamp;
use chrono::Utc;
use libsql::params;
use tracing::{debug, info, instrument};

const SEED_QUOTA_ROW: &str = r#"
    INSERT OR IGNORE INTO device_quota (device_id, session_id, extraction_count, last_used_at)
    VALUES (?1, ?2, 0, ?3)
"#;

/// Incremento condicional: cero filas afectadas significa techo alcanzado.
const RESERVE_QUOTA_SLOT: &str = r#"
    UPDATE device_quota
    SET extraction_count = extraction_count + 1, last_used_at = ?1
    WHERE device_id = ?2 AND session_id = ?3 AND extraction_count < ?4
"#;

/// Devolución acotada en cero tras un fallo posterior a la reserva.
const RELEASE_QUOTA_SLOT: &str = r#"
    UPDATE device_quota
    SET extraction_count = extraction_count - 1
    WHERE device_id = ?1 AND session_id = ?2 AND extraction_count > 0
"#;

const READ_QUOTA_COUNT: &str = r#"
    SELECT extraction_count FROM device_quota
    WHERE device_id = ?1 AND session_id = ?2
"#;

pub struct DeviceQuotaRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl DeviceQuotaRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Reserva un cupo gratuito si el contador está bajo el techo.
     * Devuelve el consumo resultante tras la reserva.
     *
     * # Errors:
     * - `DbError::QuotaExhausted`: el techo ya fue alcanzado.
     */
    #[instrument(skip(self))]
    pub async fn check_and_reserve(
        &self,
        device_identifier: &str,
        session_identifier: &str,
        quota_limit: u32,
    ) -> Result<u32, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let now_stamp = to_storage_timestamp(Utc::now());

        database_connection
            .execute(
                SEED_QUOTA_ROW,
                params![device_identifier.to_string(), session_identifier.to_string(), now_stamp.clone()],
            )
            .await?;

        let affected_rows = database_connection
            .execute(
                RESERVE_QUOTA_SLOT,
                params![
                    now_stamp,
                    device_identifier.to_string(),
                    session_identifier.to_string(),
                    quota_limit as i64
                ],
            )
            .await?;

        if affected_rows != 1 {
            debug!("⛔ [QUOTA_CEILING]: Device [{}] hit the free ceiling.", device_identifier);
            return Err(DbError::QuotaExhausted);
        }

        let used_after_reservation = self.current(device_identifier, session_identifier).await?;
        info!(
            "🎟️ [QUOTA_RESERVED]: Device [{}] consumed slot {}/{}.",
            device_identifier, used_after_reservation, quota_limit
        );
        Ok(used_after_reservation)
    }

    /// Libera la reserva tras un fallo de extracción. Acotado en cero.
    #[instrument(skip(self))]
    pub async fn rollback(
        &self,
        device_identifier: &str,
        session_identifier: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                RELEASE_QUOTA_SLOT,
                params![device_identifier.to_string(), session_identifier.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Consumo vigente del dispositivo (0 si jamás reservó).
    pub async fn current(
        &self,
        device_identifier: &str,
        session_identifier: &str,
    ) -> Result<u32, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut count_results = database_connection
            .query(
                READ_QUOTA_COUNT,
                params![device_identifier.to_string(), session_identifier.to_string()],
            )
            .await?;

        match count_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u32),
            None => Ok(0),
        }
    }
}
