// [libs/infra/db/src/repositories/ledger/mod.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER REPOSITORY (V4.2 - ATOMIC VALUE GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: AUTORIDAD ÚNICA DEL VALOR ADEUDADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FIFO CONSUMPTION: Los cobros drenan grants por antigüedad dentro
 *    de una transacción serializable con guardias por fila.
 * 2. DOUBLE IDEMPOTENCY: Los grants son idempotentes por
 *    external_payment_id; los reembolsos, únicos por transacción de
 *    cobro mediante índice parcial.
 * 3. SEMANTIC ERROR HANDLING: 'InsufficientFunds' es un desenlace de
 *    negocio; 'TransactionError' es contención reintentada con tope.
 * 4. HYGIENE: Documentación técnica exhaustiva y rastro #[instrument].
 *
 * # Mathematical Proof (Transactional Exclusivity):
 * Cada mutación de balance coexiste en su transacción SQL con exactamente
 * una fila de credit_transactions cuya magnitud firmada es igual al delta.
 * Dos cobros paralelos sobre el mismo balance serializan: el perdedor
 * observa guardias fallidas, colapsa y reintenta sobre el estado nuevo.
 * =================================================================
 */

pub mod queries;

use crate::client::DatabaseClient;
use crate::errors::DbError;
use crate::repositories::optional_text;
use crate::stamps::{parse_storage_timestamp, to_storage_timestamp};
use chrono::Utc;
use espectro_domain_models::{
    BalanceKey, ChargeReceipt, CreditTransactionRecord, GrantConsumption, GrantSource,
    TransactionKind,
};
use libsql::params;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use self::queries as sql_registry;

/// Tope de reintentos ante colapso por contención de guardias.
const MAX_CHARGE_ATTEMPTS: u8 = 3;

/**
 * Repositorio de autoridad única para balances, grants y transacciones.
 */
pub struct LedgerRepository {
    /// Cliente táctico para el enlace de persistencia.
    database_client: DatabaseClient,
}

impl LedgerRepository {
    pub fn new(client: DatabaseClient) -> Self {
        Self { database_client: client }
    }

    fn balance_lookup_sql(balance_key: &BalanceKey) -> &'static str {
        match balance_key {
            BalanceKey::User(_) => sql_registry::FIND_BALANCE_BY_USER,
            BalanceKey::Session(_) => sql_registry::FIND_BALANCE_BY_SESSION,
        }
    }

    /// Localiza (o forja) la fila de balance del propietario dentro de la
    /// transacción vigente, devolviendo su identificador.
    async fn ensure_balance_in_transaction(
        transaction_tunnel: &libsql::Transaction,
        balance_key: &BalanceKey,
        now_stamp: &str,
    ) -> Result<String, DbError> {
        let mut lookup_results = transaction_tunnel
            .query(Self::balance_lookup_sql(balance_key), params![balance_key.owner_value().to_string()])
            .await?;

        if let Some(data_row) = lookup_results.next().await? {
            return Ok(data_row.get::<String>(0)?);
        }

        let balance_identifier = Uuid::new_v4().to_string();
        let initialization_sql = match balance_key {
            BalanceKey::User(_) => sql_registry::INITIALIZE_BALANCE_FOR_USER,
            BalanceKey::Session(_) => sql_registry::INITIALIZE_BALANCE_FOR_SESSION,
        };

        transaction_tunnel
            .execute(
                initialization_sql,
                params![
                    balance_identifier.clone(),
                    balance_key.owner_value().to_string(),
                    now_stamp.to_string()
                ],
            )
            .await?;

        Ok(balance_identifier)
    }

    /**
     * Emite un grant de créditos, idempotente por pago externo.
     *
     * # Logic:
     * Si 'external_payment_id' ya respalda un grant, la llamada es un
     * no-op que devuelve el identificador original. La carrera entre dos
     * ingestas simultáneas del mismo pago la decide la unicidad de la
     * columna; el perdedor re-lee y devuelve el grant del ganador.
     *
     * # Errors:
     * - `DbError::InvalidMagnitude`: monto no positivo.
     */
    #[instrument(skip(self, balance_key, source))]
    pub async fn grant(
        &self,
        balance_key: &BalanceKey,
        amount: i64,
        source: &GrantSource,
        external_payment_id: Option<&str>,
    ) -> Result<String, DbError> {
        if amount <= 0 {
            return Err(DbError::InvalidMagnitude);
        }

        let database_connection = self.database_client.get_connection()?;
        let transaction_tunnel = database_connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now_stamp = to_storage_timestamp(Utc::now());

        // --- FASE 1: BARRERA DE IDEMPOTENCIA POR PAGO EXTERNO ---
        if let Some(external_identifier) = external_payment_id {
            let mut existing_results = transaction_tunnel
                .query(
                    sql_registry::FIND_GRANT_BY_EXTERNAL_PAYMENT,
                    params![external_identifier.to_string()],
                )
                .await?;

            if let Some(data_row) = existing_results.next().await? {
                let existing_grant_identifier: String = data_row.get(0)?;
                transaction_tunnel.rollback().await.ok();
                info!(
                    "♻️  [LEDGER_IDEMPOTENT]: Grant for payment [{}] already crystallized.",
                    external_identifier
                );
                return Ok(existing_grant_identifier);
            }
        }

        // --- FASE 2: FORJA DE GRANT, ABONO Y RASTRO ---
        let balance_identifier =
            Self::ensure_balance_in_transaction(&transaction_tunnel, balance_key, &now_stamp).await?;

        let grant_identifier = Uuid::new_v4().to_string();

        let grant_insertion = transaction_tunnel
            .execute(
                sql_registry::INITIALIZE_GRANT,
                params![
                    grant_identifier.clone(),
                    balance_identifier.clone(),
                    amount,
                    source.as_db_label(),
                    external_payment_id.map(|value| value.to_string()),
                    now_stamp.clone(),
                    Option::<String>::None
                ],
            )
            .await;

        if let Err(insertion_fault) = grant_insertion {
            let mapped_fault = DbError::from(insertion_fault);
            if mapped_fault.is_unique_violation("credit_grants.external_payment_id") {
                // Perdimos la carrera de ingesta: devolvemos el grant ganador.
                drop(transaction_tunnel);
                let mut winner_results = database_connection
                    .query(
                        sql_registry::FIND_GRANT_BY_EXTERNAL_PAYMENT,
                        params![external_payment_id.unwrap_or_default().to_string()],
                    )
                    .await?;
                let winner_row = winner_results.next().await?.ok_or(DbError::TransactionError)?;
                return Ok(winner_row.get::<String>(0)?);
            }
            return Err(mapped_fault);
        }

        transaction_tunnel
            .execute(
                sql_registry::CREDIT_BALANCE,
                params![amount, now_stamp.clone(), balance_identifier.clone()],
            )
            .await?;

        let ledger_transaction_identifier = Uuid::new_v4().to_string();
        transaction_tunnel
            .execute(
                sql_registry::INITIALIZE_TRANSACTION,
                params![
                    ledger_transaction_identifier,
                    balance_identifier,
                    Some(grant_identifier.clone()),
                    TransactionKind::Grant.as_db_label(),
                    amount,
                    format!("Credit grant ({})", source.as_db_label()),
                    external_payment_id.map(|value| value.to_string()),
                    Option::<String>::None,
                    Option::<String>::None,
                    now_stamp
                ],
            )
            .await?;

        transaction_tunnel.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("💳 [LEDGER_GRANT]: Crystallized {} credits into grant [{}].", amount, grant_identifier);
        Ok(grant_identifier)
    }

    /**
     * Cobro atómico FIFO contra el balance del propietario.
     *
     * # Logic:
     * Selecciona grants consumibles por antigüedad, drena remanentes con
     * guardia por fila, debita el balance con guardia de no-negatividad y
     * cristaliza la transacción de cobro con el desglose exacto. Cualquier
     * guardia fallida colapsa el intento; la contención se reintenta con
     * tope de {MAX_CHARGE_ATTEMPTS}.
     *
     * # Errors:
     * - `DbError::InsufficientFunds`: el disponible no cubre la magnitud.
     * - `DbError::TransactionError`: contención persistente tras reintentos.
     */
    #[instrument(skip(self, balance_key, description))]
    pub async fn charge(
        &self,
        balance_key: &BalanceKey,
        amount: i64,
        description: &str,
    ) -> Result<ChargeReceipt, DbError> {
        if amount <= 0 {
            return Err(DbError::InvalidMagnitude);
        }

        let mut attempt_counter: u8 = 0;
        loop {
            attempt_counter += 1;

            match self.execute_charge_attempt(balance_key, amount, description).await {
                Ok(charge_receipt) => return Ok(charge_receipt),
                Err(DbError::TransactionError) if attempt_counter < MAX_CHARGE_ATTEMPTS => {
                    warn!(
                        "🔁 [LEDGER_CONTENTION]: Charge attempt {}/{} collapsed; re-reading strata.",
                        attempt_counter, MAX_CHARGE_ATTEMPTS
                    );
                    continue;
                }
                Err(terminal_fault) => return Err(terminal_fault),
            }
        }
    }

    async fn execute_charge_attempt(
        &self,
        balance_key: &BalanceKey,
        amount: i64,
        description: &str,
    ) -> Result<ChargeReceipt, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let transaction_tunnel = database_connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now_stamp = to_storage_timestamp(Utc::now());

        // --- FASE 1: LECTURA DEL BALANCE PROPIETARIO ---
        let mut balance_results = transaction_tunnel
            .query(Self::balance_lookup_sql(balance_key), params![balance_key.owner_value().to_string()])
            .await?;

        let balance_row = match balance_results.next().await? {
            Some(data_row) => data_row,
            None => {
                transaction_tunnel.rollback().await.ok();
                return Err(DbError::InsufficientFunds);
            }
        };

        let balance_identifier: String = balance_row.get(0)?;
        let available_credits: i64 = balance_row.get(1)?;

        if available_credits < amount {
            transaction_tunnel.rollback().await.ok();
            return Err(DbError::InsufficientFunds);
        }

        // --- FASE 2: PLAN DE CONSUMO FIFO ---
        let mut candidate_results = transaction_tunnel
            .query(
                sql_registry::FIND_CONSUMABLE_GRANTS_FIFO,
                params![balance_identifier.clone(), now_stamp.clone()],
            )
            .await?;

        let mut consumption_plan: Vec<GrantConsumption> = Vec::new();
        let mut outstanding_amount = amount;

        while let Some(data_row) = candidate_results.next().await? {
            if outstanding_amount == 0 {
                break;
            }
            let grant_identifier: String = data_row.get(0)?;
            let remaining_credits: i64 = data_row.get(1)?;

            let consumed_amount = remaining_credits.min(outstanding_amount);
            outstanding_amount -= consumed_amount;
            consumption_plan.push(GrantConsumption { grant_identifier, consumed_amount });
        }

        if outstanding_amount > 0 {
            // El caché decía que alcanzaba pero los grants vivos no cubren:
            // desenlace de negocio, sin mutación.
            transaction_tunnel.rollback().await.ok();
            return Err(DbError::InsufficientFunds);
        }

        // --- FASE 3: DRENAJE GUARDADO POR FILA ---
        for consumption in &consumption_plan {
            let affected_rows = transaction_tunnel
                .execute(
                    sql_registry::CONSUME_GRANT_REMAINING,
                    params![consumption.consumed_amount, consumption.grant_identifier.clone()],
                )
                .await?;

            if affected_rows != 1 {
                debug!(
                    "⚔️ [LEDGER_RACE]: Grant [{}] mutated underneath us; collapsing attempt.",
                    consumption.grant_identifier
                );
                transaction_tunnel.rollback().await.ok();
                return Err(DbError::TransactionError);
            }
        }

        // --- FASE 4: DÉBITO GUARDADO DEL BALANCE ---
        let affected_rows = transaction_tunnel
            .execute(
                sql_registry::DEBIT_BALANCE_GUARDED,
                params![amount, now_stamp.clone(), balance_identifier.clone()],
            )
            .await?;

        if affected_rows != 1 {
            transaction_tunnel.rollback().await.ok();
            return Err(DbError::TransactionError);
        }

        // --- FASE 5: CRISTALIZACIÓN DEL RASTRO ---
        let charge_transaction_identifier = Uuid::new_v4().to_string();
        let consumption_breakdown_json = serde_json::to_string(&consumption_plan)
            .map_err(|serialization_fault| DbError::MappingError(serialization_fault.to_string()))?;

        transaction_tunnel
            .execute(
                sql_registry::INITIALIZE_TRANSACTION,
                params![
                    charge_transaction_identifier.clone(),
                    balance_identifier,
                    Option::<String>::None,
                    TransactionKind::Charge.as_db_label(),
                    -amount,
                    description.to_string(),
                    Option::<String>::None,
                    Some(consumption_breakdown_json),
                    Option::<String>::None,
                    now_stamp
                ],
            )
            .await?;

        transaction_tunnel.commit().await.map_err(|_| DbError::TransactionError)?;

        info!(
            "⚡ [LEDGER_CHARGE]: Debited {} credits across {} grants.",
            amount,
            consumption_plan.len()
        );

        Ok(ChargeReceipt {
            transaction_identifier: charge_transaction_identifier,
            consumed_grants: consumption_plan,
        })
    }

    /**
     * Reembolso exacto de un cobro, idempotente por transacción.
     *
     * # Logic:
     * Restaura los remanentes de los grants exactos del desglose original
     * y abona el balance en la misma magnitud. El índice parcial
     * 'idx_transactions_refund_once' sella la unicidad ante carreras.
     *
     * # Errors:
     * - `DbError::ChargeNotFound`: el identificador no es un cobro.
     * - `DbError::AlreadyRefunded`: el cobro ya posee reembolso.
     */
    #[instrument(skip(self))]
    pub async fn refund(&self, charge_transaction_id: &str) -> Result<String, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let transaction_tunnel = database_connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now_stamp = to_storage_timestamp(Utc::now());

        // --- FASE 1: LOCALIZACIÓN DEL COBRO ORIGINAL ---
        let mut charge_results = transaction_tunnel
            .query(sql_registry::FIND_CHARGE_TRANSACTION, params![charge_transaction_id.to_string()])
            .await?;

        let charge_row = match charge_results.next().await? {
            Some(data_row) => data_row,
            None => {
                transaction_tunnel.rollback().await.ok();
                return Err(DbError::ChargeNotFound);
            }
        };

        let balance_identifier: String = charge_row.get(0)?;
        let signed_amount: i64 = charge_row.get(1)?;
        let consumption_breakdown_json = optional_text(&charge_row, 2)?
            .ok_or_else(|| DbError::MappingError("CHARGE_WITHOUT_BREAKDOWN".to_string()))?;

        // --- FASE 2: BARRERA DE UNICIDAD DE REEMBOLSO ---
        let mut existing_refund_results = transaction_tunnel
            .query(sql_registry::FIND_REFUND_FOR_CHARGE, params![charge_transaction_id.to_string()])
            .await?;

        if existing_refund_results.next().await?.is_some() {
            transaction_tunnel.rollback().await.ok();
            return Err(DbError::AlreadyRefunded);
        }

        // --- FASE 3: RESTAURACIÓN EXACTA DE REMANENTES ---
        let consumption_plan: Vec<GrantConsumption> = serde_json::from_str(&consumption_breakdown_json)
            .map_err(|decoding_fault| DbError::MappingError(decoding_fault.to_string()))?;

        for consumption in &consumption_plan {
            let affected_rows = transaction_tunnel
                .execute(
                    sql_registry::RESTORE_GRANT_REMAINING,
                    params![consumption.consumed_amount, consumption.grant_identifier.clone()],
                )
                .await?;

            if affected_rows != 1 {
                transaction_tunnel.rollback().await.ok();
                return Err(DbError::TransactionError);
            }
        }

        let restored_magnitude = -signed_amount;
        transaction_tunnel
            .execute(
                sql_registry::CREDIT_BALANCE,
                params![restored_magnitude, now_stamp.clone(), balance_identifier.clone()],
            )
            .await?;

        // --- FASE 4: CRISTALIZACIÓN DEL REEMBOLSO ---
        let refund_transaction_identifier = Uuid::new_v4().to_string();
        let refund_insertion = transaction_tunnel
            .execute(
                sql_registry::INITIALIZE_TRANSACTION,
                params![
                    refund_transaction_identifier.clone(),
                    balance_identifier,
                    Option::<String>::None,
                    TransactionKind::Refund.as_db_label(),
                    restored_magnitude,
                    format!("Refund of charge {}", charge_transaction_id),
                    Option::<String>::None,
                    Option::<String>::None,
                    Some(charge_transaction_id.to_string()),
                    now_stamp
                ],
            )
            .await;

        if let Err(insertion_fault) = refund_insertion {
            let mapped_fault = DbError::from(insertion_fault);
            if mapped_fault.is_unique_violation("credit_transactions.refund_of_transaction_id") {
                return Err(DbError::AlreadyRefunded);
            }
            return Err(mapped_fault);
        }

        transaction_tunnel.commit().await.map_err(|_| DbError::TransactionError)?;

        info!(
            "↩️  [LEDGER_REFUND]: Charge [{}] restored as refund [{}].",
            charge_transaction_id, refund_transaction_identifier
        );
        Ok(refund_transaction_identifier)
    }

    /// Lee el balance cacheado del propietario (0 si jamás fue forjado).
    pub async fn balance(&self, balance_key: &BalanceKey) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut balance_results = database_connection
            .query(Self::balance_lookup_sql(balance_key), params![balance_key.owner_value().to_string()])
            .await?;

        match balance_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(1)?),
            None => Ok(0),
        }
    }

    /// Recalcula el balance desde los remanentes vivos. Sonda de
    /// consistencia: debe coincidir con el caché fuera de vuelo.
    pub async fn recompute_balance(&self, balance_key: &BalanceKey) -> Result<i64, DbError> {
        let recompute_sql = match balance_key {
            BalanceKey::User(_) => sql_registry::RECOMPUTE_BALANCE_FOR_USER,
            BalanceKey::Session(_) => sql_registry::RECOMPUTE_BALANCE_FOR_SESSION,
        };

        let database_connection = self.database_client.get_connection()?;
        let mut recompute_results = database_connection
            .query(recompute_sql, params![balance_key.owner_value().to_string()])
            .await?;

        match recompute_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    /// Rastro financiero reciente del propietario, más nuevo primero.
    #[instrument(skip(self, balance_key))]
    pub async fn list_recent_transactions(
        &self,
        balance_key: &BalanceKey,
        limit: u32,
    ) -> Result<Vec<CreditTransactionRecord>, DbError> {
        let listing_sql = match balance_key {
            BalanceKey::User(_) => sql_registry::LIST_TRANSACTIONS_FOR_USER,
            BalanceKey::Session(_) => sql_registry::LIST_TRANSACTIONS_FOR_SESSION,
        };

        let database_connection = self.database_client.get_connection()?;
        let mut listing_results = database_connection
            .query(listing_sql, params![balance_key.owner_value().to_string(), limit as i64])
            .await?;

        let mut transaction_records = Vec::new();
        while let Some(data_row) = listing_results.next().await? {
            let kind_label: String = data_row.get(1)?;
            let created_at_stamp: String = data_row.get(5)?;

            transaction_records.push(CreditTransactionRecord {
                transaction_identifier: data_row.get(0)?,
                kind: TransactionKind::from_db_label(&kind_label)
                    .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_KIND: {}", kind_label)))?,
                amount: data_row.get(2)?,
                description: data_row.get(3)?,
                external_payment_identifier: optional_text(&data_row, 4)?,
                created_at: parse_storage_timestamp(&created_at_stamp)?,
            });
        }

        Ok(transaction_records)
    }
}
