// [tests/mirror/libs/infra/db/webhook_dedup.test.rs]
/**
 * =================================================================
 * APARATO: WEBHOOK DEDUP TEST (V2.1 - DURABLE BARRIER)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE LA BARRERA POR EVENT_ID (P5)
 * =================================================================
 */

use espectro_domain_models::WebhookIngestOutcome;
use espectro_infra_db::repositories::WebhookRepository;
use espectro_infra_db::DatabaseClient;
use std::time::Duration;

async fn forge_barrier(database_label: &str) -> WebhookRepository {
    let client = DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar la barrera en memoria");

    WebhookRepository::new(client)
}

#[tokio::test]
async fn certify_event_barrier_admits_exactly_once() {
    println!("\n🪝 [PROVING_GROUNDS]: Auditing durable event barrier...");

    let barrier = forge_barrier("webhook_barrier_test").await;

    // ingest(E) ; ingest(E) => {accepted, duplicate}
    let first = barrier.register_event("evt_mirror_001", "primary", "accepted").await.unwrap();
    let second = barrier.register_event("evt_mirror_001", "primary", "accepted").await.unwrap();

    assert_eq!(first, WebhookIngestOutcome::Accepted);
    assert_eq!(second, WebhookIngestOutcome::Duplicate);

    // Un evento distinto cruza su propia barrera
    let other = barrier.register_event("evt_mirror_002", "primary", "accepted").await.unwrap();
    assert_eq!(other, WebhookIngestOutcome::Accepted);

    println!("   ✅ [SUCCESS]: Barrier admits each event exactly once.");
}

#[tokio::test]
async fn certify_release_reopens_the_barrier() {
    println!("\n🪝 [PROVING_GROUNDS]: Auditing compensating barrier release...");

    let barrier = forge_barrier("webhook_release_test").await;

    barrier.register_event("evt_failed_grant", "primary", "accepted").await.unwrap();

    // El efecto aguas abajo falló: la barrera se libera para el reintento
    barrier.release_event("evt_failed_grant").await.unwrap();

    let retried = barrier.register_event("evt_failed_grant", "primary", "accepted").await.unwrap();
    assert_eq!(retried, WebhookIngestOutcome::Accepted);

    println!("   ✅ [SUCCESS]: Provider retries converge after a transient fault.");
}

#[tokio::test]
async fn certify_retention_prune_evicts_old_events() {
    let barrier = forge_barrier("webhook_retention_test").await;

    barrier.register_event("evt_ancient", "primary", "accepted").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Retención cero: todo lo procesado antes de 'ahora' se purga
    let purged = barrier.prune_old_events(0).await.unwrap();
    assert_eq!(purged, 1);

    let reopened = barrier.register_event("evt_ancient", "primary", "accepted").await.unwrap();
    assert_eq!(reopened, WebhookIngestOutcome::Accepted);
}
