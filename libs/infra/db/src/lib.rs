// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DATABASE LIBRARY BARREL (V4.0 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE LIB (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN PÚBLICA DE CLIENTE, ESQUEMA Y REPOSITORIOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE ENTRY: El resto del monorepo consume esta crate como única
 *    autoridad de persistencia; ninguna app forja SQL por su cuenta.
 * 2. NOMINAL PURITY: Nomenclatura nominal absoluta en la exposición.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;
pub mod stamps;

pub use client::DatabaseClient;
pub use errors::DbError;
