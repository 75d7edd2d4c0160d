// [libs/infra/db/src/repositories/users.rs]
/*!
 * =================================================================
 * APARATO: USER IDENTITY REPOSITORY (V2.0 - PROVIDER RESOLUTION)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: RESOLUCIÓN Y FORJA DE CUENTAS POR IDENTIDAD DE PAGO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FIRST CONTACT FORGE: Un pago de un cliente desconocido forja la
 *    cuenta en el acto; el grant aterriza sin intervención manual.
 * 2. TIER NEUTRALITY: La columna 'legacy_tier' es rastro informativo
 *    para el Dashboard y jamás participa en decisiones de acceso.
 * =================================================================
 */

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::stamps::to_storage_timestamp;
use chrono::Utc;
use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;

const FIND_USER_BY_PROVIDER_CUSTOMER: &str = r#"
    SELECT id FROM users WHERE provider_customer_id = ?1
"#;

const FIND_USER_BY_EMAIL: &str = r#"
    SELECT id FROM users WHERE email = ?1
"#;

const INITIALIZE_USER: &str = r#"
    INSERT INTO users (id, email, provider_customer_id, created_at)
    VALUES (?1, ?2, ?3, ?4)
"#;

const BIND_PROVIDER_CUSTOMER: &str = r#"
    UPDATE users SET provider_customer_id = ?1 WHERE id = ?2
"#;

pub struct UserRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl UserRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Resuelve la cuenta destino de un pago por identidad del proveedor,
     * forjándola en primer contacto.
     *
     * # Logic:
     * 1. Búsqueda por provider_customer_id -> cuenta existente.
     * 2. Búsqueda por email del evento -> vincula el customer_id.
     * 3. Forja de cuenta nueva (email sintético si el evento no lo trae).
     */
    #[instrument(skip(self))]
    pub async fn resolve_or_forge_by_provider_customer(
        &self,
        provider_customer_identifier: &str,
        customer_email: Option<&str>,
    ) -> Result<String, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut customer_results = database_connection
            .query(
                FIND_USER_BY_PROVIDER_CUSTOMER,
                params![provider_customer_identifier.to_string()],
            )
            .await?;

        if let Some(data_row) = customer_results.next().await? {
            return Ok(data_row.get::<String>(0)?);
        }

        if let Some(email_material) = customer_email {
            let mut email_results = database_connection
                .query(FIND_USER_BY_EMAIL, params![email_material.to_lowercase()])
                .await?;

            if let Some(data_row) = email_results.next().await? {
                let user_identifier: String = data_row.get(0)?;
                database_connection
                    .execute(
                        BIND_PROVIDER_CUSTOMER,
                        params![provider_customer_identifier.to_string(), user_identifier.clone()],
                    )
                    .await?;
                info!(
                    "🔗 [IDENTITY_BIND]: Customer [{}] bound to account [{}].",
                    provider_customer_identifier, user_identifier
                );
                return Ok(user_identifier);
            }
        }

        // Forja de primer contacto. Email sintético reservado cuando el
        // proveedor no lo transporta; el onboarding lo reemplaza después.
        let user_identifier = Uuid::new_v4().to_string();
        let account_email = customer_email
            .map(|email_material| email_material.to_lowercase())
            .unwrap_or_else(|| format!("{}@pending.invalid", provider_customer_identifier));

        database_connection
            .execute(
                INITIALIZE_USER,
                params![
                    user_identifier.clone(),
                    account_email,
                    provider_customer_identifier.to_string(),
                    to_storage_timestamp(Utc::now())
                ],
            )
            .await?;

        info!(
            "🧬 [IDENTITY_FORGE]: Account [{}] forged for customer [{}].",
            user_identifier, provider_customer_identifier
        );
        Ok(user_identifier)
    }
}
