// [libs/infra/db/src/repositories/webhooks.rs]
/*!
 * =================================================================
 * APARATO: PROCESSED WEBHOOK REPOSITORY (V2.0 - DURABLE BARRIER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: BARRERA DE IDEMPOTENCIA DURABLE POR EVENT_ID
 *
 * # Mathematical Proof (At-Most-Once Ingestion):
 * La inserción sobre la llave primaria event_id es la serialización:
 * de N ingestas concurrentes del mismo evento, exactamente una inserta
 * y las demás observan la violación de unicidad como 'Duplicate'.
 * La durabilidad de la tabla preserva la barrera a través de reinicios,
 * ventana en la que el proveedor de pagos reintenta con normalidad.
 * =================================================================
 */

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::stamps::to_storage_timestamp;
use chrono::Utc;
use espectro_domain_models::WebhookIngestOutcome;
use libsql::params;
use tracing::{debug, info, instrument};

const REGISTER_EVENT: &str = r#"
    INSERT INTO processed_webhooks (event_id, provider, processed_at, result)
    VALUES (?1, ?2, ?3, ?4)
"#;

const PRUNE_OLD_EVENTS: &str = r#"
    DELETE FROM processed_webhooks WHERE processed_at < ?1
"#;

const RELEASE_EVENT: &str = r#"
    DELETE FROM processed_webhooks WHERE event_id = ?1
"#;

pub struct WebhookRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl WebhookRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Registra el evento en la barrera durable.
     *
     * Devuelve 'Accepted' en el primer procesamiento y 'Duplicate' si la
     * llave ya existe; cualquier otro fallo del motor se propaga.
     */
    #[instrument(skip(self))]
    pub async fn register_event(
        &self,
        event_identifier: &str,
        provider_label: &str,
        result_label: &str,
    ) -> Result<WebhookIngestOutcome, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let insertion_verdict = database_connection
            .execute(
                REGISTER_EVENT,
                params![
                    event_identifier.to_string(),
                    provider_label.to_string(),
                    to_storage_timestamp(Utc::now()),
                    result_label.to_string()
                ],
            )
            .await;

        match insertion_verdict {
            Ok(_) => {
                info!("🪝 [WEBHOOK_BARRIER]: Event [{}] registered first-time.", event_identifier);
                Ok(WebhookIngestOutcome::Accepted)
            }
            Err(insertion_fault) => {
                let mapped_fault = DbError::from(insertion_fault);
                if mapped_fault.is_unique_violation("processed_webhooks.event_id") {
                    debug!("♻️  [WEBHOOK_BARRIER]: Event [{}] already sealed.", event_identifier);
                    Ok(WebhookIngestOutcome::Duplicate)
                } else {
                    Err(mapped_fault)
                }
            }
        }
    }

    /**
     * Libera la barrera de un evento cuyo efecto aguas abajo falló.
     *
     * El reintento del proveedor vuelve a cruzar la barrera completa; la
     * idempotencia del grant por pago externo absorbe cualquier carrera.
     */
    #[instrument(skip(self))]
    pub async fn release_event(&self, event_identifier: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(RELEASE_EVENT, params![event_identifier.to_string()])
            .await?;
        Ok(())
    }

    /// Purga eventos más antiguos que la retención configurada.
    #[instrument(skip(self))]
    pub async fn prune_old_events(&self, retention_seconds: i64) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let eviction_threshold = Utc::now() - chrono::Duration::seconds(retention_seconds);

        let purged_rows = database_connection
            .execute(PRUNE_OLD_EVENTS, params![to_storage_timestamp(eviction_threshold)])
            .await?;

        if purged_rows > 0 {
            info!("💀 [WEBHOOK_SWEEP]: Evicted {} events beyond retention.", purged_rows);
        }
        Ok(purged_rows)
    }
}
