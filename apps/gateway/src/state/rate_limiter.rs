// [apps/gateway/src/state/rate_limiter.rs]
/*!
 * =================================================================
 * APARATO: FIXED WINDOW RATE LIMITER (V2.0 - RAM STRATA)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: TECHO DE RÁFAGAS POR IP EN VENTANA FIJA
 *
 * # Mathematical Proof (Window Ceiling):
 * Cada bucket (ip, endpoint, ventana) acumula un contador bajo el
 * cerrojo. Dentro de una ventana viva, el contador admite a lo sumo
 * 'max' observaciones; la expiración de la ventana reinicia el bucket.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info};

struct WindowCounter {
    window_started_at: Instant,
    observed_requests: u32,
}

/// Veredicto de una evaluación de ráfaga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateVerdict {
    Admitted,
    /// Rechazada; segundos restantes de la ventana vigente.
    Throttled { retry_after_seconds: u64 },
}

pub struct FixedWindowRateLimiter {
    window_buckets: Mutex<HashMap<String, WindowCounter>>,
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self { window_buckets: Mutex::new(HashMap::with_capacity(256)) }
    }

    /**
     * Evalúa una ráfaga contra el bucket nominal.
     *
     * Un cerrojo envenenado admite la ráfaga y deja rastro de error.
     */
    pub fn evaluate(
        &self,
        bucket_key: &str,
        window_duration: Duration,
        maximum_requests: u32,
    ) -> RateVerdict {
        let mut buckets_guard = match self.window_buckets.lock() {
            Ok(guard) => guard,
            Err(lock_poison_fault) => {
                error!("💀 [RATE_LIMITER_FAULT]: Bucket lock poisoned: {}", lock_poison_fault);
                return RateVerdict::Admitted;
            }
        };

        let observation_instant = Instant::now();
        let counter = buckets_guard
            .entry(bucket_key.to_string())
            .or_insert(WindowCounter { window_started_at: observation_instant, observed_requests: 0 });

        let window_age = observation_instant.duration_since(counter.window_started_at);
        if window_age >= window_duration {
            counter.window_started_at = observation_instant;
            counter.observed_requests = 0;
        }

        if counter.observed_requests >= maximum_requests {
            let remaining = window_duration.saturating_sub(
                observation_instant.duration_since(counter.window_started_at),
            );
            return RateVerdict::Throttled { retry_after_seconds: remaining.as_secs().max(1) };
        }

        counter.observed_requests += 1;
        RateVerdict::Admitted
    }

    /// Purga buckets cuya ventana quedó atrás del horizonte dado.
    pub fn prune_stale(&self, staleness_horizon: Duration) -> usize {
        let mut buckets_guard = match self.window_buckets.lock() {
            Ok(guard) => guard,
            Err(lock_poison_fault) => {
                error!("💀 [RATE_LIMITER_FAULT]: Bucket lock poisoned: {}", lock_poison_fault);
                return 0;
            }
        };

        let observation_instant = Instant::now();
        let bucket_count_before = buckets_guard.len();

        buckets_guard.retain(|_, counter| {
            observation_instant.duration_since(counter.window_started_at) < staleness_horizon
        });

        let pruned_count = bucket_count_before - buckets_guard.len();
        if pruned_count > 0 {
            info!("💀 [RATE_LIMITER_SWEEP]: Evicted {} stale rate windows.", pruned_count);
        }
        pruned_count
    }
}
