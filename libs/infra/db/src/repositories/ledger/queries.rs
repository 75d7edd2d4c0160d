// [libs/infra/db/src/repositories/ledger/queries.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER SQL STORE (V4.0 - ATOMIC VALUE SQL)
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DE SENTENCIAS ATÓMICAS DEL LEDGER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. GUARDED MUTATIONS: Toda mutación de remanente o balance porta su
 *    guardia en el WHERE (remaining >= take, credits >= amount); el
 *    conteo de filas afectadas es el veredicto de atomicidad.
 * 2. FIFO DISCIPLINE: El consumo de grants ordena por antigüedad con
 *    desempate estable por identificador.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta en constantes.
 *
 * # Mathematical Proof (ACID Consistency):
 * Un cobro muta N filas de grants + 1 fila de balance + 1 inserción de
 * transacción dentro de una única transacción SQL. Si cualquier guardia
 * falla, la secuencia colapsa completa y el reintento re-lee el estado.
 * =================================================================
 */

// --- ESTRATO DE BALANCES ---

pub const FIND_BALANCE_BY_USER: &str = r#"
    SELECT id, credits FROM credit_balances WHERE user_id = ?1
"#;

pub const FIND_BALANCE_BY_SESSION: &str = r#"
    SELECT id, credits FROM credit_balances WHERE session_id = ?1
"#;

pub const INITIALIZE_BALANCE_FOR_USER: &str = r#"
    INSERT INTO credit_balances (id, user_id, session_id, credits, updated_at)
    VALUES (?1, ?2, NULL, 0, ?3)
"#;

pub const INITIALIZE_BALANCE_FOR_SESSION: &str = r#"
    INSERT INTO credit_balances (id, user_id, session_id, credits, updated_at)
    VALUES (?1, NULL, ?2, 0, ?3)
"#;

/// Abono guardado contra doble aplicación: el delta es positivo y el
/// balance siempre existe cuando se invoca (forjado en la misma tx).
pub const CREDIT_BALANCE: &str = r#"
    UPDATE credit_balances
    SET credits = credits + ?1, updated_at = ?2
    WHERE id = ?3
"#;

/// Débito con guardia de no-negatividad. Cero filas afectadas significa
/// que otro cobro ganó la carrera y el intento debe reiniciarse.
pub const DEBIT_BALANCE_GUARDED: &str = r#"
    UPDATE credit_balances
    SET credits = credits - ?1, updated_at = ?2
    WHERE id = ?3 AND credits >= ?1
"#;

// --- ESTRATO DE GRANTS (FIFO) ---

pub const FIND_GRANT_BY_EXTERNAL_PAYMENT: &str = r#"
    SELECT id FROM credit_grants WHERE external_payment_id = ?1
"#;

pub const INITIALIZE_GRANT: &str = r#"
    INSERT INTO credit_grants (
        id, balance_id, amount, remaining, source,
        external_payment_id, created_at, expires_at
    ) VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7)
"#;

/// Candidatos de consumo en disciplina FIFO estricta: remanente vivo y
/// sin expiración vencida, ordenados por antigüedad.
pub const FIND_CONSUMABLE_GRANTS_FIFO: &str = r#"
    SELECT id, remaining
    FROM credit_grants
    WHERE balance_id = ?1
      AND remaining > 0
      AND (expires_at IS NULL OR expires_at > ?2)
    ORDER BY created_at ASC, id ASC
"#;

/// Consumo guardado por fila: si el remanente observado ya no alcanza,
/// cero filas afectadas y la transacción colapsa para reintento.
pub const CONSUME_GRANT_REMAINING: &str = r#"
    UPDATE credit_grants
    SET remaining = remaining - ?1
    WHERE id = ?2 AND remaining >= ?1
"#;

/// Restauración guardada: el remanente jamás excede la magnitud original.
pub const RESTORE_GRANT_REMAINING: &str = r#"
    UPDATE credit_grants
    SET remaining = remaining + ?1
    WHERE id = ?2 AND remaining + ?1 <= amount
"#;

// --- ESTRATO DE TRANSACCIONES (APPEND-ONLY) ---

pub const INITIALIZE_TRANSACTION: &str = r#"
    INSERT INTO credit_transactions (
        id, balance_id, grant_id, kind, amount, description,
        external_payment_id, consumption_breakdown_json,
        refund_of_transaction_id, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#;

pub const FIND_CHARGE_TRANSACTION: &str = r#"
    SELECT balance_id, amount, consumption_breakdown_json
    FROM credit_transactions
    WHERE id = ?1 AND kind = 'charge'
"#;

pub const FIND_REFUND_FOR_CHARGE: &str = r#"
    SELECT id FROM credit_transactions WHERE refund_of_transaction_id = ?1
"#;

// --- ESTRATO DE CONSULTA Y AUDITORÍA ---

pub const RECOMPUTE_BALANCE_FOR_USER: &str = r#"
    SELECT COALESCE(SUM(g.remaining), 0)
    FROM credit_grants g
    JOIN credit_balances b ON g.balance_id = b.id
    WHERE b.user_id = ?1
"#;

pub const RECOMPUTE_BALANCE_FOR_SESSION: &str = r#"
    SELECT COALESCE(SUM(g.remaining), 0)
    FROM credit_grants g
    JOIN credit_balances b ON g.balance_id = b.id
    WHERE b.session_id = ?1
"#;

pub const LIST_TRANSACTIONS_FOR_USER: &str = r#"
    SELECT t.id, t.kind, t.amount, t.description, t.external_payment_id, t.created_at
    FROM credit_transactions t
    JOIN credit_balances b ON t.balance_id = b.id
    WHERE b.user_id = ?1
    ORDER BY t.created_at DESC, t.id DESC
    LIMIT ?2
"#;

pub const LIST_TRANSACTIONS_FOR_SESSION: &str = r#"
    SELECT t.id, t.kind, t.amount, t.description, t.external_payment_id, t.created_at
    FROM credit_transactions t
    JOIN credit_balances b ON t.balance_id = b.id
    WHERE b.session_id = ?1
    ORDER BY t.created_at DESC, t.id DESC
    LIMIT ?2
"#;
