// [tests/mirror/libs/infra/db/quote_lifecycle.test.rs]
/**
 * =================================================================
 * APARATO: QUOTE LIFECYCLE TEST (V3.1 - REPLAY SHIELD)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE CAS, EXPIRACIÓN PEREZOSA Y BARRIDO
 * =================================================================
 */

use chrono::{Duration, Utc};
use espectro_domain_models::{FileQuoteLine, QuoteRecord, QuoteStatus, UploadedFileDescriptor};
use espectro_infra_db::repositories::QuoteRepository;
use espectro_infra_db::{DatabaseClient, DbError};
use uuid::Uuid;

fn forge_quote_record(ttl_seconds: i64) -> QuoteRecord {
    let creation_instant = Utc::now();
    QuoteRecord {
        quote_identifier: Uuid::new_v4().to_string(),
        session_identifier: "SESSION_MIRROR_01".to_string(),
        user_identifier: None,
        files: vec![UploadedFileDescriptor {
            original_filename: "probe.jpg".to_string(),
            declared_mime_type: "image/jpeg".to_string(),
            size_bytes: 1_048_576,
            megapixels: 12.0,
            buffered_disk_path: None,
        }],
        requested_operations_bitfield: 0b010,
        credits_total: 3,
        per_file_credits: vec![FileQuoteLine {
            original_filename: "probe.jpg".to_string(),
            credit_cost: 3,
        }],
        schedule_snapshot: serde_json::json!({ "schedule_version": 3 }),
        schedule_version: 3,
        status: QuoteStatus::Active,
        created_at: creation_instant,
        expires_at: creation_instant + Duration::seconds(ttl_seconds),
        used_at: None,
    }
}

async fn forge_store(database_label: &str) -> QuoteRepository {
    let client = DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar el Quote Store en memoria");

    QuoteRepository::new(client)
}

#[tokio::test]
async fn certify_mark_used_is_single_winner_cas() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing single-use CAS transition...");

    let store = forge_store("quote_cas_test").await;
    let record = forge_quote_record(900);
    store.create_quote(&record).await.expect("Cristalización de cotización");

    // Roundtrip de persistencia
    let recovered = store.load_quote(&record.quote_identifier).await.unwrap();
    assert_eq!(recovered.credits_total, 3);
    assert_eq!(recovered.effective_status(Utc::now()), QuoteStatus::Active);
    assert_eq!(recovered.files[0].original_filename, "probe.jpg");

    // mark_used(q) ; mark_used(q) => a lo sumo un 'ok' (P4)
    store.mark_used(&record.quote_identifier).await.expect("Primer consumo gana");

    match store.mark_used(&record.quote_identifier).await {
        Err(DbError::QuoteNotActive) => {}
        other => panic!("L3_QUOTE_FAULT: Second consumption must lose the race, got {:?}", other),
    }

    let consumed = store.load_quote(&record.quote_identifier).await.unwrap();
    assert_eq!(consumed.status, QuoteStatus::Used);
    assert!(consumed.used_at.is_some(), "L3_QUOTE_FAULT: used_at must crystallize with the CAS.");

    println!("   ✅ [SUCCESS]: Replay race admits exactly one winner.");
}

#[tokio::test]
async fn certify_lazy_expiry_blocks_consumption() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing lazy expiry classification...");

    let store = forge_store("quote_expiry_test").await;

    // TTL negativo: la fila nace 'active' pero ya vencida
    let stale_record = forge_quote_record(-60);
    store.create_quote(&stale_record).await.unwrap();

    let recovered = store.load_quote(&stale_record.quote_identifier).await.unwrap();
    assert_eq!(recovered.status, QuoteStatus::Active, "La fila física permanece 'active'.");
    assert_eq!(recovered.effective_status(Utc::now()), QuoteStatus::Expired);

    // La guardia temporal del CAS también rechaza el consumo
    assert!(matches!(
        store.mark_used(&stale_record.quote_identifier).await,
        Err(DbError::QuoteNotActive)
    ));

    println!("   ✅ [SUCCESS]: Expired quotes are unusable without any write.");
}

#[tokio::test]
async fn certify_sweep_respects_grace_window() {
    println!("\n📜 [PROVING_GROUNDS]: Auditing batched sweep with grace...");

    let store = forge_store("quote_sweep_test").await;

    // Vencida hace 2 horas: más allá de la gracia de 1 hora
    let ancient_record = forge_quote_record(-7200);
    store.create_quote(&ancient_record).await.unwrap();

    // Vencida hace 10 minutos: dentro de la gracia, debe sobrevivir
    let recent_record = forge_quote_record(-600);
    store.create_quote(&recent_record).await.unwrap();

    // Activa fresca: intocable
    let living_record = forge_quote_record(900);
    store.create_quote(&living_record).await.unwrap();

    let purged_count = store.sweep_expired(3600, 100).await.expect("Barrido por lotes");
    assert_eq!(purged_count, 1, "L3_QUOTE_FAULT: Grace window violated by the sweep.");

    assert!(matches!(
        store.load_quote(&ancient_record.quote_identifier).await,
        Err(DbError::QuoteNotFound)
    ));
    assert!(store.load_quote(&recent_record.quote_identifier).await.is_ok());
    assert!(store.load_quote(&living_record.quote_identifier).await.is_ok());

    println!("   ✅ [SUCCESS]: Sweep evicts only beyond-grace strata.");
}
