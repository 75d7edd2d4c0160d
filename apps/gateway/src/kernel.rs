// INICIO DEL ARCHIVO [apps/gateway/src/kernel.rs]
/**
 * =================================================================
 * APARATO: GATEWAY SOVEREIGN KERNEL (V4.2 - GUARD ACTIVE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan los servicios del plano.
 * El daemon de barrido se enciende ANTES de abrir el socket TCP: el
 * guardia fail-closed exige un pulso vivo desde la primera petición.
 * =================================================================
 */

use crate::config::GatewayConfig;
use crate::routes::create_gateway_router;
use crate::services::spawn_quote_sweeper;
use crate::state::AppState;
use espectro_infra_db::DatabaseClient;
use espectro_infra_extractor::HttpExtractionEngineClient;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct GatewayKernel {
    pub server_network_port: u16,
    pub application_shared_state: AppState,
}

impl GatewayKernel {
    /**
     * Realiza la ignición del cliente táctico y el estado del plano.
     * Establece la conexión a la base de datos antes de levantar servicios.
     */
    #[instrument(skip(database_access_token, gateway_config))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
        gateway_config: GatewayConfig,
    ) -> Self {
        let database_client = DatabaseClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        // Túnel de producción hacia el motor de extracción.
        let extraction_engine_client = Arc::new(HttpExtractionEngineClient::new(
            gateway_config.extractor_engine_url.clone(),
            gateway_config.extractor_engine_token.clone(),
            gateway_config.extractor_timeout_seconds,
            gateway_config.extractor_mime_timeout_overrides.clone(),
        ));

        Self {
            server_network_port: listening_port,
            application_shared_state: AppState::new(
                database_client,
                extraction_engine_client,
                gateway_config,
            ),
        }
    }

    /**
     * Lanza los daemons de mantenimiento y el servidor HTTP principal.
     */
    pub async fn launch_gateway_operations(self) {
        let shared_application_state = self.application_shared_state.clone();

        // --- 1. DAEMON DE BARRIDO (INVARIANTE DE DESPLIEGUE) ---
        spawn_quote_sweeper(shared_application_state.clone()).await;

        // --- 2. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let gateway_router = create_gateway_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().unwrap(),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Extraction request plane listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        if let Err(server_error) = axum::serve(tcp_listener, gateway_router).await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }
    }
}
// FIN DEL ARCHIVO [apps/gateway/src/kernel.rs]
