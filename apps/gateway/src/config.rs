// [apps/gateway/src/config.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY CONFIGURATION RESOLVER (V3.0 - ENV SOVEREIGN)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: RESOLUCIÓN ÚNICA DE TODOS LOS MANDOS DEL PLANO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE RESOLUTION: El entorno se lee una sola vez en la ignición;
 *    el resto del proceso consume la estructura inmutable vía Arc.
 * 2. NOMINAL DEFAULTS: Cada mando porta su valor nominal de despliegue;
 *    el entorno solo declara desviaciones.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use espectro_domain_pricing::PricingSchedule;
use std::collections::HashMap;
use tracing::warn;

/// Mandos completos del plano de extracción, resueltos en la ignición.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // --- LÍMITES DE CARGA ---
    pub max_files_per_request: usize,
    pub max_file_bytes: u64,
    pub allowed_mime_types: Vec<String>,

    // --- CUOTAS GRATUITAS ---
    pub device_free_limit: u32,
    pub trial_email_limit: u32,
    pub trial_strip_plus_alias: bool,

    // --- COTIZACIONES Y BARRIDO ---
    pub quote_ttl_seconds: i64,
    pub quote_sweep_interval_seconds: u64,
    pub quote_sweep_grace_seconds: i64,
    pub quote_sweep_batch_limit: u32,
    pub sweeper_staleness_seconds: i64,

    // --- WEBHOOKS DE PAGO ---
    pub webhook_timestamp_window_seconds: i64,
    pub webhook_retention_seconds: i64,
    pub webhook_shared_secret: String,
    pub webhook_provider_label: String,

    // --- IDENTIDAD DE DISPOSITIVO ---
    pub device_token_secret: String,

    // --- MOTOR DE EXTRACCIÓN ---
    pub extractor_engine_url: String,
    pub extractor_engine_token: String,
    pub extractor_timeout_seconds: u64,
    pub extractor_mime_timeout_overrides: HashMap<String, u64>,

    // --- COMERCIO ---
    pub checkout_base_url: String,
    pub credit_history_limit: u32,

    // --- RATE LIMITING (ventana fija por IP) ---
    pub rate_limit_quote_window_seconds: u64,
    pub rate_limit_quote_max: u32,
    pub rate_limit_quote_burst_window_seconds: u64,
    pub rate_limit_quote_burst_max: u32,
    pub rate_limit_extract_window_seconds: u64,
    pub rate_limit_extract_max: u32,

    // --- TARIFARIO VIGENTE ---
    pub pricing_schedule: PricingSchedule,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_files_per_request: 10,
            max_file_bytes: 100 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/tiff".to_string(),
                "image/webp".to_string(),
                "image/heic".to_string(),
                "image/gif".to_string(),
            ],

            device_free_limit: 2,
            trial_email_limit: 2,
            trial_strip_plus_alias: true,

            quote_ttl_seconds: 15 * 60,
            quote_sweep_interval_seconds: 3600,
            quote_sweep_grace_seconds: 3600,
            quote_sweep_batch_limit: 500,
            sweeper_staleness_seconds: 3 * 3600,

            webhook_timestamp_window_seconds: 5 * 60,
            webhook_retention_seconds: 72 * 3600,
            webhook_shared_secret: "development_webhook_secret".to_string(),
            webhook_provider_label: "primary".to_string(),

            device_token_secret: "development_device_secret".to_string(),

            extractor_engine_url: "http://127.0.0.1:7700".to_string(),
            extractor_engine_token: "development_engine_token".to_string(),
            extractor_timeout_seconds: 60,
            extractor_mime_timeout_overrides: HashMap::new(),

            checkout_base_url: "https://pay.espectro.dev".to_string(),
            credit_history_limit: 50,

            rate_limit_quote_window_seconds: 15 * 60,
            rate_limit_quote_max: 50,
            rate_limit_quote_burst_window_seconds: 60,
            rate_limit_quote_burst_max: 10,
            rate_limit_extract_window_seconds: 15 * 60,
            rate_limit_extract_max: 30,

            pricing_schedule: PricingSchedule::default(),
        }
    }
}

fn environment_text(variable_name: &str, default_value: &str) -> String {
    std::env::var(variable_name).unwrap_or_else(|_| default_value.to_string())
}

fn environment_parsed<T: std::str::FromStr>(variable_name: &str, default_value: T) -> T {
    match std::env::var(variable_name) {
        Ok(raw_value) => raw_value.parse::<T>().unwrap_or_else(|_| {
            warn!("⚠️ [CONFIG_FAULT]: {} unparsable; falling back to default.", variable_name);
            default_value
        }),
        Err(_) => default_value,
    }
}

impl GatewayConfig {
    /**
     * Resuelve los mandos desde el entorno del proceso.
     *
     * Formatos compuestos:
     * - ALLOWED_MIME_TYPES: lista separada por comas.
     * - EXTRACTOR_MIME_TIMEOUTS: pares 'mime=segundos' separados por comas.
     * - PRICING_SCHEDULE: JSON del tarifario completo.
     */
    pub fn from_environment() -> Self {
        let defaults = Self::default();

        let allowed_mime_types = match std::env::var("ALLOWED_MIME_TYPES") {
            Ok(raw_list) => raw_list
                .split(',')
                .map(|entry| entry.trim().to_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
            Err(_) => defaults.allowed_mime_types.clone(),
        };

        let extractor_mime_timeout_overrides = match std::env::var("EXTRACTOR_MIME_TIMEOUTS") {
            Ok(raw_pairs) => raw_pairs
                .split(',')
                .filter_map(|pair| {
                    let (mime_label, seconds_label) = pair.split_once('=')?;
                    let window_seconds = seconds_label.trim().parse::<u64>().ok()?;
                    Some((mime_label.trim().to_lowercase(), window_seconds))
                })
                .collect(),
            Err(_) => HashMap::new(),
        };

        let pricing_schedule = match std::env::var("PRICING_SCHEDULE") {
            Ok(raw_schedule) => serde_json::from_str::<PricingSchedule>(&raw_schedule)
                .unwrap_or_else(|schedule_fault| {
                    warn!("⚠️ [CONFIG_FAULT]: PRICING_SCHEDULE unparsable ({}); using default tariff.", schedule_fault);
                    PricingSchedule::default()
                }),
            Err(_) => PricingSchedule::default(),
        };

        Self {
            max_files_per_request: environment_parsed("MAX_FILES_PER_REQUEST", defaults.max_files_per_request),
            max_file_bytes: environment_parsed("MAX_FILE_BYTES", defaults.max_file_bytes),
            allowed_mime_types,

            device_free_limit: environment_parsed("DEVICE_FREE_LIMIT", defaults.device_free_limit),
            trial_email_limit: environment_parsed("TRIAL_EMAIL_LIMIT", defaults.trial_email_limit),
            trial_strip_plus_alias: environment_parsed("TRIAL_STRIP_PLUS_ALIAS", defaults.trial_strip_plus_alias),

            quote_ttl_seconds: environment_parsed("QUOTE_TTL_SECONDS", defaults.quote_ttl_seconds),
            quote_sweep_interval_seconds: environment_parsed("QUOTE_SWEEP_INTERVAL_SECONDS", defaults.quote_sweep_interval_seconds),
            quote_sweep_grace_seconds: environment_parsed("QUOTE_SWEEP_GRACE_SECONDS", defaults.quote_sweep_grace_seconds),
            quote_sweep_batch_limit: environment_parsed("QUOTE_SWEEP_BATCH_LIMIT", defaults.quote_sweep_batch_limit),
            sweeper_staleness_seconds: environment_parsed("SWEEPER_STALENESS_SECONDS", defaults.sweeper_staleness_seconds),

            webhook_timestamp_window_seconds: environment_parsed("WEBHOOK_TIMESTAMP_WINDOW_SECONDS", defaults.webhook_timestamp_window_seconds),
            webhook_retention_seconds: environment_parsed("WEBHOOK_RETENTION_SECONDS", defaults.webhook_retention_seconds),
            webhook_shared_secret: environment_text("WEBHOOK_SHARED_SECRET", &defaults.webhook_shared_secret),
            webhook_provider_label: environment_text("WEBHOOK_PROVIDER_LABEL", &defaults.webhook_provider_label),

            device_token_secret: environment_text("DEVICE_TOKEN_SECRET", &defaults.device_token_secret),

            extractor_engine_url: environment_text("EXTRACTOR_ENGINE_URL", &defaults.extractor_engine_url),
            extractor_engine_token: environment_text("EXTRACTOR_ENGINE_TOKEN", &defaults.extractor_engine_token),
            extractor_timeout_seconds: environment_parsed("EXTRACTOR_TIMEOUT_SECONDS", defaults.extractor_timeout_seconds),
            extractor_mime_timeout_overrides,

            checkout_base_url: environment_text("CHECKOUT_BASE_URL", &defaults.checkout_base_url),
            credit_history_limit: environment_parsed("CREDIT_HISTORY_LIMIT", defaults.credit_history_limit),

            rate_limit_quote_window_seconds: environment_parsed("RATE_LIMIT_QUOTE_WINDOW_SECONDS", defaults.rate_limit_quote_window_seconds),
            rate_limit_quote_max: environment_parsed("RATE_LIMIT_QUOTE_MAX", defaults.rate_limit_quote_max),
            rate_limit_quote_burst_window_seconds: environment_parsed("RATE_LIMIT_QUOTE_BURST_WINDOW_SECONDS", defaults.rate_limit_quote_burst_window_seconds),
            rate_limit_quote_burst_max: environment_parsed("RATE_LIMIT_QUOTE_BURST_MAX", defaults.rate_limit_quote_burst_max),
            rate_limit_extract_window_seconds: environment_parsed("RATE_LIMIT_EXTRACT_WINDOW_SECONDS", defaults.rate_limit_extract_window_seconds),
            rate_limit_extract_max: environment_parsed("RATE_LIMIT_EXTRACT_MAX", defaults.rate_limit_extract_max),

            pricing_schedule,
        }
    }

    /// Veredicto de admisión para un tipo MIME declarado.
    pub fn is_mime_type_allowed(&self, declared_mime_type: &str) -> bool {
        let normalized = declared_mime_type.to_lowercase();
        self.allowed_mime_types.iter().any(|allowed| allowed == &normalized)
    }
}
