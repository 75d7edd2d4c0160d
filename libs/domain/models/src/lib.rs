// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS ROOT (V3.0 - SINGLE SOURCE OF TRUTH)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DE ENTIDADES DEL PLANO DE EXTRACCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NOMINAL PURITY: Erradicación total de abreviaciones en los campos
 *    de cada entidad del dominio.
 * 2. TYPESHARE ALIGNMENT: Los DTOs expuestos al Dashboard llevan el
 *    atributo #[typeshare] para la sincronía de esquemas en L5.
 * 3. ZERO LOGIC: Este estrato define la gramática del dominio; la
 *    aritmética de precios y la redacción viven en sus propias crates.
 * =================================================================
 */

pub mod access;
pub mod credit;
pub mod extraction;
pub mod files;
pub mod metadata;
pub mod quote;
pub mod webhook;

pub use access::{AccessDescriptor, AccessMode, EngineTier};
pub use credit::{
    BalanceKey, ChargeReceipt, CreditTransactionRecord, GrantConsumption, GrantSource,
    TransactionKind,
};
pub use extraction::ExtractionRecord;
pub use files::UploadedFileDescriptor;
pub use metadata::{
    BurnedTextBlock, ComputedImageProperties, ExtendedAttributesDisclosure, FileHashSet,
    GpsCoordinates, PerceptualHashSet, PostalContext, RawMetadataDocument, RedactedMetadataView,
    FilesystemTrace, ThumbnailArtifact, ThumbnailDisclosure, ThumbnailPresence,
};
pub use quote::{FileQuoteLine, QuoteRecord, QuoteStatus};
pub use webhook::{
    PaymentEventData, PaymentEventEnvelope, WebhookIngestOutcome, PAYMENT_SUCCEEDED_EVENT_KIND,
};
