// [apps/gateway/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: BACKGROUND SERVICES BARREL (V4.0)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN DE DAEMONS DE MANTENIMIENTO
 * =================================================================
 */

pub mod sweeper;

pub use sweeper::spawn_quote_sweeper;
