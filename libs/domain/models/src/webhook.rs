// [libs/domain/models/src/webhook.rs]
// =================================================================
// APARATO: PAYMENT WEBHOOK MODELS (V2.0)
// RESPONSABILIDAD: SOBRES DE EVENTOS DEL PROVEEDOR DE PAGOS
// ESTADO: NO-REGRESSIONS / AUDIT-READY
// =================================================================

use serde::{Deserialize, Serialize};

/// Discriminador de evento emitido por el proveedor de pagos.
pub const PAYMENT_SUCCEEDED_EVENT_KIND: &str = "payment.succeeded";

/// Sobre deserializado del cuerpo crudo del webhook. La firma se valida
/// sobre los bytes originales antes de cualquier parseo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventEnvelope {
    /// Naturaleza del evento (ej. "payment.succeeded").
    #[serde(rename = "type")]
    pub event_kind: String,

    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventData {
    /// Identificador del pago en el proveedor. Llave de idempotencia del grant.
    pub payment_identifier: String,

    /// Identificador del cliente en el proveedor; resuelve la cuenta destino.
    pub provider_customer_identifier: String,

    /// Email del cliente, usado para forjar la cuenta en primer contacto.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    /// Pack comprado.
    pub pack_identifier: String,

    /// Créditos contenidos en el pack.
    pub credit_amount: i64,
}

/// Veredicto de ingesta devuelto al proveedor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookIngestOutcome {
    /// Primer procesamiento del evento: grant emitido.
    Accepted,
    /// Evento ya visto: sin efecto adicional.
    Duplicate,
}
