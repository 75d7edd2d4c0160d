// [apps/gateway/src/main.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY MAIN ENTRY POINT (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta en la captura
 *    de entorno y configuración de red.
 * 2. RUNTIME REFINERY: Runtime multi-hilo explícito de Tokio.
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso enciende el daemon de barrido antes de abrir el socket
 * TCP, garantizando que el guardia fail-closed jamás observe un pulso
 * inexistente sobre tráfico real.
 * =================================================================
 */

use espectro_gateway::prelude::*;

use dotenvy::dotenv;
use espectro_shared_vigia::init_tracing;
use tracing::info;

/**
 * Punto de ignición supremo del binario del Gateway.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (VIGÍA)
    init_tracing("espectro_gateway");

    // 3. CONFIGURACIÓN DEL RUNTIME
    let runtime_gateway = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_gateway.block_on(async {
        info!("🛰️  [REQUEST_PLANE]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS TÁCTICAS
        let database_connection_url = std::env::var("DATABASE_URL")
            .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment.");

        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        let listening_network_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        // 5. RESOLUCIÓN ÚNICA DE MANDOS
        let gateway_config = GatewayConfig::from_environment();

        // 6. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = GatewayKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_network_port,
            gateway_config,
        )
        .await;

        // 7. IGNICIÓN DE OPERACIONES DEL PLANO
        info!("🚀 [ESPECTRO_ONLINE]: System fully operational on port {}.", listening_network_port);
        kernel_instance.launch_gateway_operations().await;

        Ok(())
    })
}
