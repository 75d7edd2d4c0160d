// [libs/infra/db/src/repositories/trial.rs]
/*!
 * =================================================================
 * APARATO: TRIAL QUOTA REPOSITORY (V2.1 - EMAIL NORMALIZED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CONTADOR CONDICIONAL DE PRUEBAS POR EMAIL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NORMALIZATION FIRST: El contador se indexa por email normalizado
 *    (minúsculas + recorte); el descarte de alias con '+' es una
 *    política configurable del despliegue.
 * 2. SAME INVARIANTS: Mismo techo condicional atómico que la cuota de
 *    dispositivo, con devolución acotada en cero.
 * =================================================================
 */

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::stamps::to_storage_timestamp;
use chrono::Utc;
use libsql::params;
use tracing::{debug, info, instrument};

const SEED_TRIAL_ROW: &str = r#"
    INSERT OR IGNORE INTO trial_usages (normalized_email, extraction_count, last_used_at)
    VALUES (?1, 0, ?2)
"#;

const RESERVE_TRIAL_SLOT: &str = r#"
    UPDATE trial_usages
    SET extraction_count = extraction_count + 1, last_used_at = ?1
    WHERE normalized_email = ?2 AND extraction_count < ?3
"#;

const RELEASE_TRIAL_SLOT: &str = r#"
    UPDATE trial_usages
    SET extraction_count = extraction_count - 1
    WHERE normalized_email = ?1 AND extraction_count > 0
"#;

const READ_TRIAL_COUNT: &str = r#"
    SELECT extraction_count FROM trial_usages WHERE normalized_email = ?1
"#;

/**
 * Normaliza un email de prueba para la búsqueda del contador.
 *
 * # Logic:
 * Minúsculas + recorte de espacios siempre; si la política de alias está
 * activa, descarta el sufijo '+etiqueta' de la parte local.
 */
pub fn normalize_trial_email(raw_email: &str, strip_plus_alias: bool) -> String {
    let lowered_email = raw_email.trim().to_lowercase();

    if !strip_plus_alias {
        return lowered_email;
    }

    match lowered_email.split_once('@') {
        Some((local_part, domain_part)) => {
            let canonical_local = local_part.split('+').next().unwrap_or(local_part);
            format!("{}@{}", canonical_local, domain_part)
        }
        None => lowered_email,
    }
}

pub struct TrialQuotaRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl TrialQuotaRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Reserva un cupo de prueba para el email normalizado.
     *
     * # Errors:
     * - `DbError::QuotaExhausted`: el email agotó sus pruebas.
     */
    #[instrument(skip(self))]
    pub async fn check_and_reserve(
        &self,
        normalized_email: &str,
        trial_limit: u32,
    ) -> Result<u32, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let now_stamp = to_storage_timestamp(Utc::now());

        database_connection
            .execute(SEED_TRIAL_ROW, params![normalized_email.to_string(), now_stamp.clone()])
            .await?;

        let affected_rows = database_connection
            .execute(
                RESERVE_TRIAL_SLOT,
                params![now_stamp, normalized_email.to_string(), trial_limit as i64],
            )
            .await?;

        if affected_rows != 1 {
            debug!("⛔ [TRIAL_CEILING]: Email [{}] exhausted its trials.", normalized_email);
            return Err(DbError::QuotaExhausted);
        }

        let used_after_reservation = self.current(normalized_email).await?;
        info!(
            "✉️ [TRIAL_RESERVED]: Email [{}] consumed trial {}/{}.",
            normalized_email, used_after_reservation, trial_limit
        );
        Ok(used_after_reservation)
    }

    /// Libera la reserva tras un fallo de extracción. Acotado en cero.
    #[instrument(skip(self))]
    pub async fn rollback(&self, normalized_email: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(RELEASE_TRIAL_SLOT, params![normalized_email.to_string()])
            .await?;
        Ok(())
    }

    /// Consumo vigente del email (0 si jamás reservó).
    pub async fn current(&self, normalized_email: &str) -> Result<u32, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut count_results = database_connection
            .query(READ_TRIAL_COUNT, params![normalized_email.to_string()])
            .await?;

        match count_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u32),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_trial_email;

    #[test]
    fn certify_email_normalization_lowers_and_trims() {
        assert_eq!(normalize_trial_email("  Ana.Lopez@Example.COM ", false), "ana.lopez@example.com");
    }

    #[test]
    fn certify_plus_alias_policy_is_configurable() {
        assert_eq!(normalize_trial_email("ana+promo@example.com", true), "ana@example.com");
        assert_eq!(normalize_trial_email("ana+promo@example.com", false), "ana+promo@example.com");
        // Sin arroba: la cadena normalizada se conserva íntegra.
        assert_eq!(normalize_trial_email("not-an-email", true), "not-an-email");
    }
}
