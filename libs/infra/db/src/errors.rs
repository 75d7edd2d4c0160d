// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V4.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BUSINESS VERDICTS: Los desenlaces de negocio (fondos insuficientes,
 *    cuota agotada, cotización consumida) son variantes de primera clase,
 *    no cadenas embebidas: los handlers mapean cada una a su código HTTP.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijo de estrato para su
 *    renderizado cromático en el Dashboard.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster de persistencia.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DEL LEDGER DE CRÉDITOS (L2/L3) ---

    /// Magnitud no positiva en una operación de valor.
    #[error("[L3_LEDGER_FAULT]: NON_POSITIVE_MAGNITUDE")]
    InvalidMagnitude,

    /// El balance disponible no cubre el cobro solicitado. Desenlace de
    /// negocio normal: se expone al llamador, no se reintenta.
    #[error("[L3_LEDGER_FAULT]: INSUFFICIENT_FUNDS")]
    InsufficientFunds,

    /// La transacción de cobro referenciada no existe.
    #[error("[L3_LEDGER_FAULT]: CHARGE_NOT_FOUND")]
    ChargeNotFound,

    /// El cobro referenciado ya posee un reembolso cristalizado.
    #[error("[L3_LEDGER_FAULT]: ALREADY_REFUNDED")]
    AlreadyRefunded,

    // --- ESTRATO DE COTIZACIONES ---

    /// La cotización solicitada no existe en las tablas activas.
    #[error("[L3_QUOTE_FAULT]: IDENTIFIER_NOT_FOUND")]
    QuoteNotFound,

    /// La cotización no está en estado apto: consumida o expirada.
    #[error("[L3_QUOTE_FAULT]: QUOTE_NOT_ACTIVE")]
    QuoteNotActive,

    // --- ESTRATO DE CUOTAS GRATUITAS ---

    /// El contador condicional alcanzó su techo.
    #[error("[L3_QUOTA_FAULT]: QUOTA_EXHAUSTED")]
    QuotaExhausted,
}

impl DbError {
    /// Discrimina violaciones de unicidad reportadas por el motor, para
    /// convertirlas en veredictos de negocio (duplicado / idempotencia).
    pub fn is_unique_violation(&self, constraint_hint: &str) -> bool {
        match self {
            DbError::QueryError(engine_fault) => {
                let message = engine_fault.to_string();
                message.contains("UNIQUE constraint failed") && message.contains(constraint_hint)
            }
            _ => false,
        }
    }
}
