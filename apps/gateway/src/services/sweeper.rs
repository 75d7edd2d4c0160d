// [apps/gateway/src/services/sweeper.rs]
/**
 * =================================================================
 * APARATO: QUOTE SWEEPER SYSTEM SERVICE (V4.1 - DEPLOYMENT INVARIANT)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: BARRIDO DE COTIZACIONES, RETENCIÓN Y PULSO DE SALUD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DEPLOYMENT INVARIANT: Este daemon SIEMPRE corre; sin él la tabla
 *    de cotizaciones crece sin cota y el guardia perimetral cierra el
 *    plano con 503 al envejecer el pulso.
 * 2. TRIPLE HYGIENE: Cada ciclo purga cotizaciones vencidas más allá de
 *    la gracia, eventos de webhook fuera de retención y ventanas de
 *    ráfaga obsoletas.
 * 3. PULSE DISCIPLINE: El pulso solo se cristaliza cuando el barrido de
 *    cotizaciones completó; un ciclo fallido deja el pulso envejecer.
 * =================================================================
 */

use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/**
 * Inicia el servicio de barrido perpetuo en el runtime de Tokio.
 *
 * El primer tick dispara inmediato: el plano arranca con pulso fresco
 * antes de aceptar tráfico.
 */
pub async fn spawn_quote_sweeper(application_state: AppState) {
    let mut maintenance_ticker =
        interval(Duration::from_secs(application_state.config.quote_sweep_interval_seconds));

    tokio::spawn(async move {
        info!("🧹 [SWEEPER_ACTIVE]: Quote maintenance daemon initiated.");

        loop {
            maintenance_ticker.tick().await;

            // 1. BARRIDO FÍSICO DE COTIZACIONES VENCIDAS (tras la gracia)
            let sweep_verdict = application_state
                .quote_repository
                .sweep_expired(
                    application_state.config.quote_sweep_grace_seconds,
                    application_state.config.quote_sweep_batch_limit,
                )
                .await;

            match sweep_verdict {
                Ok(purged_quotes) => {
                    if purged_quotes > 0 {
                        info!("🧹 [SWEEPER_CYCLE]: Evicted {} expired quotes.", purged_quotes);
                    }
                    application_state.record_sweep_pulse();
                }
                Err(sweep_fault) => {
                    // Sin pulso: el guardia perimetral cerrará el plano si
                    // la condición persiste más allá del umbral.
                    error!("💀 [SWEEPER_FAULT]: Quote sweep collapsed: {}", sweep_fault);
                }
            }

            // 2. RETENCIÓN DE EVENTOS DE WEBHOOK
            if let Err(retention_fault) = application_state
                .webhook_repository
                .prune_old_events(application_state.config.webhook_retention_seconds)
                .await
            {
                error!("💀 [SWEEPER_FAULT]: Webhook retention prune collapsed: {}", retention_fault);
            }

            // 3. HIGIENE DE VENTANAS DE RÁFAGA EN RAM
            let staleness_horizon = Duration::from_secs(
                application_state
                    .config
                    .rate_limit_quote_window_seconds
                    .max(application_state.config.rate_limit_extract_window_seconds)
                    * 2,
            );
            application_state.rate_limiter.prune_stale(staleness_horizon);
        }
    });
}
