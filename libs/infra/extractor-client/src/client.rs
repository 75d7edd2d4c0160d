// [libs/infra/extractor-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN EXTRACTION UPLINK (V2.4 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INVOCACIÓN DEL MOTOR DE EXTRACCIÓN CON TIMEOUT DURO
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. SEAM FIRST: El pipeline consume el contrato 'MetadataExtractor';
 *    el cliente HTTP es solo la implementación de producción. Los
 *    Proving Grounds inyectan dobles deterministas por la misma costura.
 * 2. HARD WINDOW: Cada invocación corre bajo 'tokio::time::timeout'
 *    con la ventana por tipo MIME; un motor colgado jamás retiene la
 *    reserva de la petición más allá del plazo.
 * =================================================================
 */

use crate::errors::ExtractorError;
use espectro_domain_models::{EngineTier, RawMetadataDocument};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Directiva de trabajo enviada al motor por cada archivo bufferizado.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAssignment {
    /// Ruta del buffer en disco compartido con el motor.
    pub buffered_disk_path: String,

    /// Tipo MIME declarado del activo.
    pub declared_mime_type: String,

    /// Pista de profundidad de parseo ('free' | 'super').
    pub engine_tier_hint: String,
}

/// Contrato de invocación del motor de extracción. El motor es un
/// colaborador externo opaco: recibe ruta + pista de nivel y devuelve
/// un documento de metadatos crudo.
pub trait MetadataExtractor: Send + Sync {
    fn extract<'call>(
        &'call self,
        assignment: ExtractionAssignment,
    ) -> BoxFuture<'call, Result<RawMetadataDocument, ExtractorError>>;
}

/// Cliente de producción: túnel HTTP autenticado hacia el motor.
pub struct HttpExtractionEngineClient {
    network_session_client: Client,
    engine_base_endpoint: String,

    /// Ventana dura por tipo MIME, en segundos.
    per_mime_timeout_seconds: HashMap<String, u64>,
    default_timeout_seconds: u64,
}

impl HttpExtractionEngineClient {
    /**
     * Inicializa el túnel hacia el motor con cabecera de autenticación fija.
     *
     * @param base_url Endpoint raíz del motor de extracción.
     * @param engine_token Token maestro del handshake con el motor.
     * @param default_timeout_seconds Ventana dura por defecto.
     * @param per_mime_timeout_seconds Overrides por tipo MIME.
     */
    pub fn new(
        base_url: String,
        engine_token: String,
        default_timeout_seconds: u64,
        per_mime_timeout_seconds: HashMap<String, u64>,
    ) -> Self {
        let mut header_map = reqwest::header::HeaderMap::new();
        let auth_value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", engine_token))
            .expect("CRITICAL: Invalid Engine Token Format.");
        header_map.insert(reqwest::header::AUTHORIZATION, auth_value);

        Self {
            network_session_client: Client::builder()
                .default_headers(header_map)
                .user_agent("Espectro-Gateway/V2.4-Gold")
                .build()
                .expect("FATAL: Engine client initialization failed."),
            engine_base_endpoint: base_url.trim_end_matches('/').to_string(),
            per_mime_timeout_seconds,
            default_timeout_seconds,
        }
    }

    fn hard_window_seconds(&self, declared_mime_type: &str) -> u64 {
        self.per_mime_timeout_seconds
            .get(declared_mime_type)
            .copied()
            .unwrap_or(self.default_timeout_seconds)
    }

    #[instrument(skip(self, assignment))]
    async fn invoke_engine(
        &self,
        assignment: ExtractionAssignment,
    ) -> Result<RawMetadataDocument, ExtractorError> {
        let hard_window = self.hard_window_seconds(&assignment.declared_mime_type);
        let target_url = format!("{}/engine/v1/extract", self.engine_base_endpoint);

        info!(
            "🔬 [ENGINE_UPLINK]: Dispatching assignment [{}] tier [{}] window [{}s].",
            assignment.buffered_disk_path, assignment.engine_tier_hint, hard_window
        );

        let invocation = async {
            let network_response = self
                .network_session_client
                .post(&target_url)
                .json(&assignment)
                .send()
                .await?;

            match network_response.status() {
                StatusCode::OK => {
                    let document = network_response.json::<RawMetadataDocument>().await?;
                    Ok(document)
                }
                StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                    Err(ExtractorError::UnsupportedFormat(assignment.declared_mime_type.clone()))
                }
                rejected_status => {
                    Err(ExtractorError::EngineRejection(format!("HTTP_{}", rejected_status)))
                }
            }
        };

        match tokio::time::timeout(Duration::from_secs(hard_window), invocation).await {
            Ok(engine_verdict) => engine_verdict,
            Err(_elapsed) => {
                warn!(
                    "⏱️ [ENGINE_TIMEOUT]: Assignment [{}] exceeded {}s window.",
                    assignment.buffered_disk_path, hard_window
                );
                Err(ExtractorError::Timeout(hard_window))
            }
        }
    }
}

impl MetadataExtractor for HttpExtractionEngineClient {
    fn extract<'call>(
        &'call self,
        assignment: ExtractionAssignment,
    ) -> BoxFuture<'call, Result<RawMetadataDocument, ExtractorError>> {
        Box::pin(self.invoke_engine(assignment))
    }
}

/// Pista nominal para un nivel de motor dado.
pub fn engine_tier_hint(tier: EngineTier) -> String {
    tier.as_engine_hint().to_string()
}
