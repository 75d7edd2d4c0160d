// [apps/gateway/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY STATE ORCHESTRATOR (V4.0 - REQUEST PLANE HUB)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, MOTOR Y PULSO DE BARRIDO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: Centraliza los 7 repositorios tácticos, la costura
 *    del motor de extracción y el tarifario vigente bajo Arc<T>.
 * 2. SWEEPER PULSE: Rastro del último barrido completado; el guardia
 *    perimetral cierra el plano (503) cuando el pulso envejece más allá
 *    del umbral configurado.
 * 3. NOMINAL PURITY: Erradicación total de abreviaciones.
 *
 * # Mathematical Proof (Deterministic State Hub):
 * Toda mutación de valor u autorización fluye por los repositorios aquí
 * inyectados; ningún handler abre SQL propio, por lo que las invariantes
 * del Ledger son auditables en un único estrato.
 * =================================================================
 */

pub mod rate_limiter;

use crate::config::GatewayConfig;
use chrono::{DateTime, Utc};
use espectro_domain_pricing::PricingSchedule;
use espectro_infra_db::repositories::{
    DeviceQuotaRepository, ExtractionLogRepository, LedgerRepository, QuoteRepository,
    TrialQuotaRepository, UserRepository, WebhookRepository,
};
use espectro_infra_db::DatabaseClient;
use espectro_infra_extractor::MetadataExtractor;
use rate_limiter::FixedWindowRateLimiter;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

/**
 * Contenedor de estado compartido (Thread-Safe) para el Gateway.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico de persistencia (Turso / libSQL).
    pub database_client: DatabaseClient,

    // --- ESTRATO L3: REPOSITORIOS DE AUTORIDAD ---
    pub ledger_repository: Arc<LedgerRepository>,
    pub quote_repository: Arc<QuoteRepository>,
    pub device_quota_repository: Arc<DeviceQuotaRepository>,
    pub trial_quota_repository: Arc<TrialQuotaRepository>,
    pub webhook_repository: Arc<WebhookRepository>,
    pub user_repository: Arc<UserRepository>,
    pub extraction_log_repository: Arc<ExtractionLogRepository>,

    // --- ESTRATO L3: COLABORADOR EXTERNO ---
    /// Costura del motor de extracción (HTTP en producción, doble en tests).
    pub extractor: Arc<dyn MetadataExtractor>,

    // --- ESTRATO L1-APP: GOBIERNO DE LA PETICIÓN ---
    pub pricing_schedule: Arc<PricingSchedule>,
    pub config: Arc<GatewayConfig>,
    pub rate_limiter: Arc<FixedWindowRateLimiter>,

    /// Instante del último barrido completado de cotizaciones.
    pub sweeper_pulse: Arc<RwLock<DateTime<Utc>>>,
}

impl AppState {
    /**
     * Forja una nueva instancia del Estado Maestro inyectando dependencias.
     */
    pub fn new(
        database_client: DatabaseClient,
        extractor: Arc<dyn MetadataExtractor>,
        config: GatewayConfig,
    ) -> Self {
        debug!("🧬 [APP_STATE]: Executing gateway ignition sequence V4.0...");

        let pricing_schedule = Arc::new(config.pricing_schedule.clone());

        Self {
            ledger_repository: Arc::new(LedgerRepository::new(database_client.clone())),
            quote_repository: Arc::new(QuoteRepository::new(database_client.clone())),
            device_quota_repository: Arc::new(DeviceQuotaRepository::new(database_client.clone())),
            trial_quota_repository: Arc::new(TrialQuotaRepository::new(database_client.clone())),
            webhook_repository: Arc::new(WebhookRepository::new(database_client.clone())),
            user_repository: Arc::new(UserRepository::new(database_client.clone())),
            extraction_log_repository: Arc::new(ExtractionLogRepository::new(database_client.clone())),

            extractor,
            pricing_schedule,
            config: Arc::new(config),
            rate_limiter: Arc::new(FixedWindowRateLimiter::new()),

            // El pulso nace fresco: el daemon ejecuta su primer ciclo en la
            // ignición, antes de que el listener acepte tráfico.
            sweeper_pulse: Arc::new(RwLock::new(Utc::now())),

            database_client,
        }
    }

    /// Cristaliza el instante del barrido recién completado.
    pub fn record_sweep_pulse(&self) {
        match self.sweeper_pulse.write() {
            Ok(mut pulse_guard) => {
                *pulse_guard = Utc::now();
                info!("💓 [SWEEPER_PULSE]: Maintenance heartbeat recorded.");
            }
            Err(lock_poison_fault) => {
                error!("💀 [KERNEL_CRASH]: Sweeper pulse lock poisoned: {}", lock_poison_fault);
            }
        }
    }

    /**
     * Evalúa la frescura del barrido. Un cerrojo envenenado se reporta
     * como rancio: el plano cierra (fail-closed) en lugar de acumular
     * cotizaciones sin barrer.
     */
    pub fn sweeper_is_fresh(&self) -> bool {
        match self.sweeper_pulse.read() {
            Ok(pulse_guard) => {
                let pulse_age_seconds = (Utc::now() - *pulse_guard).num_seconds();
                pulse_age_seconds <= self.config.sweeper_staleness_seconds
            }
            Err(lock_poison_fault) => {
                error!("💀 [KERNEL_CRASH]: Sweeper pulse lock poisoned: {}", lock_poison_fault);
                false
            }
        }
    }
}
