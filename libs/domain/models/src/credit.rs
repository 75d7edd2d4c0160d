// [libs/domain/models/src/credit.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER MODELS (V3.2 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA DEL VALOR ADEUDADO Y SU RASTRO FORENSE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PACK-BASED GOVERNANCE: El acceso se modela como packs de créditos
 *    consumidos FIFO; ningún campo de suscripción participa en el gating.
 * 2. SIGNED AUDIT TRAIL: Toda mutación de balance corresponde a exactamente
 *    una transacción con magnitud firmada equivalente.
 * 3. NOMINAL PURITY: Nomenclatura nominal absoluta.
 *
 * # Mathematical Proof (Ledger Consistency):
 * balance.credits == Σ grant.remaining para cada balance. Los cobros
 * consumen remanentes en orden de antigüedad y los reembolsos restauran
 * exactamente las proporciones registradas en el desglose del cobro.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Llave de propiedad de un balance: cuenta autenticada o sesión anónima.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceKey {
    User(String),
    Session(String),
}

impl BalanceKey {
    /// Columna y valor con los que el balance se localiza en persistencia.
    pub fn owner_column(&self) -> &'static str {
        match self {
            BalanceKey::User(_) => "user_id",
            BalanceKey::Session(_) => "session_id",
        }
    }

    pub fn owner_value(&self) -> &str {
        match self {
            BalanceKey::User(value) => value,
            BalanceKey::Session(value) => value,
        }
    }
}

/// Origen de una asignación de créditos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantSource {
    /// Compra de un pack identificado en el proveedor de pagos.
    Pack(String),
    /// Cortesía promocional emitida por operaciones.
    Promo,
    /// Restauración de remanente por reembolso de un cobro.
    Refund,
}

impl GrantSource {
    pub fn as_db_label(&self) -> String {
        match self {
            GrantSource::Pack(pack_identifier) => format!("pack:{}", pack_identifier),
            GrantSource::Promo => "promo".to_string(),
            GrantSource::Refund => "refund".to_string(),
        }
    }
}

/// Naturaleza de una transacción del rastro append-only.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Grant,
    Charge,
    Refund,
}

impl TransactionKind {
    pub fn as_db_label(&self) -> &'static str {
        match self {
            TransactionKind::Grant => "grant",
            TransactionKind::Charge => "charge",
            TransactionKind::Refund => "refund",
        }
    }

    pub fn from_db_label(label: &str) -> Option<Self> {
        match label {
            "grant" => Some(TransactionKind::Grant),
            "charge" => Some(TransactionKind::Charge),
            "refund" => Some(TransactionKind::Refund),
            _ => None,
        }
    }
}

/// Porción de un cobro tomada de un grant concreto. El desglose completo
/// se cristaliza en la transacción de cobro para reembolsos exactos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrantConsumption {
    pub grant_identifier: String,
    pub consumed_amount: i64,
}

/// Recibo devuelto por un cobro atómico exitoso.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeReceipt {
    pub transaction_identifier: String,
    pub consumed_grants: Vec<GrantConsumption>,
}

/// Entrada del rastro histórico financiero expuesta al Dashboard.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransactionRecord {
    pub transaction_identifier: String,
    pub kind: TransactionKind,

    /// Magnitud firmada: positiva en grants y reembolsos, negativa en cobros.
    pub amount: i64,
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_payment_identifier: Option<String>,

    pub created_at: DateTime<Utc>,
}
