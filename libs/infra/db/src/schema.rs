// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: REQUEST PLANE DATABASE SCHEMA (V4.2 - LEDGER STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. LEDGER STRATA: Tablas de balances, grants y transacciones con
 *    rastro append-only del valor adeudado.
 * 2. REPLAY SHIELDS: Unicidad durable en processed_webhooks(event_id),
 *    credit_grants(external_payment_id) y un índice parcial que sella
 *    un único reembolso por transacción de cobro.
 * 3. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * 4. PERFORMANCE: Índices de aceleración para el despacho FIFO y el
 *    barrido de cotizaciones expiradas.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del plano de extracción.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_USERS", r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            provider_customer_id TEXT UNIQUE,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CREDIT_BALANCES", r#"
        CREATE TABLE IF NOT EXISTS credit_balances (
            id TEXT PRIMARY KEY,
            user_id TEXT UNIQUE,
            session_id TEXT UNIQUE,
            credits INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CREDIT_GRANTS", r#"
        CREATE TABLE IF NOT EXISTS credit_grants (
            id TEXT PRIMARY KEY,
            balance_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            remaining INTEGER NOT NULL,
            source TEXT NOT NULL,
            external_payment_id TEXT UNIQUE,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CREDIT_TRANSACTIONS", r#"
        CREATE TABLE IF NOT EXISTS credit_transactions (
            id TEXT PRIMARY KEY,
            balance_id TEXT NOT NULL,
            grant_id TEXT,
            kind TEXT NOT NULL,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            external_payment_id TEXT,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_QUOTES", r#"
        CREATE TABLE IF NOT EXISTS quotes (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            user_id TEXT,
            files_json TEXT NOT NULL,
            ops_bitfield INTEGER NOT NULL DEFAULT 0,
            credits_total INTEGER NOT NULL DEFAULT 0,
            per_file_json TEXT NOT NULL,
            schedule_json TEXT NOT NULL,
            schedule_version INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            used_at TEXT
        );
    "#),
    ("TABLE_TRIAL_USAGES", r#"
        CREATE TABLE IF NOT EXISTS trial_usages (
            normalized_email TEXT PRIMARY KEY,
            extraction_count INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT
        );
    "#),
    ("TABLE_DEVICE_QUOTA", r#"
        CREATE TABLE IF NOT EXISTS device_quota (
            device_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            extraction_count INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT,
            PRIMARY KEY(device_id, session_id)
        );
    "#),
    ("TABLE_PROCESSED_WEBHOOKS", r#"
        CREATE TABLE IF NOT EXISTS processed_webhooks (
            event_id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            processed_at TEXT NOT NULL,
            result TEXT
        );
    "#),
    ("TABLE_EXTRACTION_RECORDS", r#"
        CREATE TABLE IF NOT EXISTS extraction_records (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            session_id TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            access_mode TEXT NOT NULL,
            engine_tier TEXT NOT NULL,
            quote_id TEXT,
            credits_charged INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas existentes se adapten a las nuevas capacidades.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    // --- LEDGER: EXPIRACIÓN DE GRANTS Y REEMBOLSOS EXACTOS ---
    ("GRANT_EXPIRY", "ALTER TABLE credit_grants ADD COLUMN expires_at TEXT"),
    ("TXN_CONSUMPTION_BREAKDOWN", "ALTER TABLE credit_transactions ADD COLUMN consumption_breakdown_json TEXT"),
    ("TXN_REFUND_LINK", "ALTER TABLE credit_transactions ADD COLUMN refund_of_transaction_id TEXT"),

    // --- IDENTIDAD: RASTRO INFORMATIVO DE SUSCRIPCIÓN HEREDADA ---
    // Columna de solo lectura para el Dashboard. Jamás participa en el gating.
    ("USER_LEGACY_TIER", "ALTER TABLE users ADD COLUMN legacy_tier TEXT"),

    // --- AUDITORÍA: CRONOMETRÍA DE EXTRACCIONES ---
    ("EXTRACTION_DURATION", "ALTER TABLE extraction_records ADD COLUMN duration_ms INTEGER DEFAULT 0"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración y Escudos)
 * Optimiza el consumo FIFO, el barrido de expiradas y sella la
 * unicidad de reembolsos.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_GRANTS_FIFO", "CREATE INDEX IF NOT EXISTS idx_grants_balance_age ON credit_grants(balance_id, created_at);"),
    ("IDX_TXN_BALANCE", "CREATE INDEX IF NOT EXISTS idx_transactions_balance_age ON credit_transactions(balance_id, created_at);"),
    ("IDX_QUOTES_SESSION", "CREATE INDEX IF NOT EXISTS idx_quotes_session ON quotes(session_id);"),
    ("IDX_QUOTES_EXPIRY", "CREATE INDEX IF NOT EXISTS idx_quotes_expiry ON quotes(expires_at);"),
    ("IDX_QUOTES_STATUS", "CREATE INDEX IF NOT EXISTS idx_quotes_status ON quotes(status);"),
    ("IDX_REFUND_ONCE", "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_refund_once ON credit_transactions(refund_of_transaction_id) WHERE refund_of_transaction_id IS NOT NULL;"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace de persistencia.
 */
#[instrument(skip(database_connection))]
pub async fn apply_request_plane_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V4.2...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Request-plane ledger V4.2 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(repair_fault) => {
                let message = repair_fault.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
