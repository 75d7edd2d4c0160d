// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V3.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DEL PLANO DE EXTRACCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. WIRE CONTRACT: Valida que los discriminadores snake_case de los
 *    enums del dominio coincidan con los esquemas Zod del Dashboard.
 * 2. DATA INTEGRITY: Certifica que los sobres de webhook y las vistas
 *    redactadas sobrevivan el roundtrip JSON sin deriva de esquema.
 * =================================================================
 */
