// [apps/gateway/src/lib.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY LIBRARY ROOT (V4.0 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODULE HIERARCHY: Autoridad única de módulos para que 'crate::'
 *    resuelva determinista en librería, binario y Proving Grounds.
 * 2. PUBLIC INTERFACE: Expone 'prelude' para la ignición del Kernel
 *    desde 'main.rs' y la forja de estado desde los tests espejo.
 * =================================================================
 */

// --- ESTRATO DE ARRANQUE Y CONFIGURACIÓN ---
/// Resolución única de mandos desde el entorno.
pub mod config;
/// Núcleo de mando para la ignición de servicios.
pub mod kernel;

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Gestor del sistema nervioso central del gateway.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para ráfagas HTTP.
pub mod handlers;
/// El túnel de mando: definición de rutas y topología de red.
pub mod routes;

// --- ESTRATO DE SEGURIDAD Y SOPORTE ---
/// Emisión uniforme de fallos estructurados.
pub mod faults;
/// Guardianes perimetrales de identidad, salud y ráfagas.
pub mod middleware;
/// Forja de tokens de dispositivo y firmas de webhook.
pub mod security;
/// Daemons de mantenimiento del plano.
pub mod services;

/**
 * PRELUDIO DEL GATEWAY
 *
 * Re-exportación estratégica de los componentes necesarios para la
 * ignición mínima del sistema.
 */
pub mod prelude {
    pub use crate::config::GatewayConfig;
    pub use crate::kernel::GatewayKernel;
    pub use crate::routes::create_gateway_router;
    pub use crate::state::AppState;
}
