// [tests/mirror/libs/infra/db/device_quota.test.rs]
/**
 * =================================================================
 * APARATO: FREE QUOTA TEST (V2.2 - HARD CEILING)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE TECHOS CONDICIONALES Y ROLLBACK
 * =================================================================
 */

use espectro_infra_db::repositories::{
    normalize_trial_email, DeviceQuotaRepository, TrialQuotaRepository,
};
use espectro_infra_db::{DatabaseClient, DbError};

async fn forge_client(database_label: &str) -> DatabaseClient {
    DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar la cuota en memoria")
}

#[tokio::test]
async fn certify_device_ceiling_and_bounded_rollback() {
    println!("\n🎟️ [PROVING_GROUNDS]: Auditing device free ceiling (P6)...");

    let quota = DeviceQuotaRepository::new(forge_client("device_quota_test").await);
    let device = "DEVICE_MIRROR_01";
    let session = "SESSION_MIRROR_01";

    // 1. Techo nominal de 2: dos reservas entran, la tercera rebota
    assert_eq!(quota.check_and_reserve(device, session, 2).await.unwrap(), 1);
    assert_eq!(quota.check_and_reserve(device, session, 2).await.unwrap(), 2);

    match quota.check_and_reserve(device, session, 2).await {
        Err(DbError::QuotaExhausted) => {}
        other => panic!("L3_QUOTA_FAULT: Third reservation breached the ceiling: {:?}", other),
    }
    assert_eq!(quota.current(device, session).await.unwrap(), 2);

    // 2. Rollback acotado en cero
    quota.rollback(device, session).await.unwrap();
    assert_eq!(quota.current(device, session).await.unwrap(), 1);
    quota.rollback(device, session).await.unwrap();
    quota.rollback(device, session).await.unwrap(); // Piso: sin efecto
    assert_eq!(quota.current(device, session).await.unwrap(), 0);

    // 3. Tras liberar, el cupo vuelve a admitir
    assert_eq!(quota.check_and_reserve(device, session, 2).await.unwrap(), 1);

    // 4. Otra sesión del mismo dispositivo porta su propio contador
    assert_eq!(quota.check_and_reserve(device, "SESSION_MIRROR_02", 2).await.unwrap(), 1);

    println!("   ✅ [SUCCESS]: Conditional ceiling certified under the limit.");
}

#[tokio::test]
async fn certify_trial_counter_follows_normalized_email() {
    println!("\n✉️ [PROVING_GROUNDS]: Auditing trial email ceiling...");

    let trial = TrialQuotaRepository::new(forge_client("trial_quota_test").await);

    // La política de alias colapsa variantes al mismo bucket
    let canonical = normalize_trial_email("  Ana+promo@Example.COM ", true);
    assert_eq!(canonical, "ana@example.com");
    let alias_variant = normalize_trial_email("ana+otra@example.com", true);
    assert_eq!(alias_variant, canonical);

    assert_eq!(trial.check_and_reserve(&canonical, 2).await.unwrap(), 1);
    assert_eq!(trial.check_and_reserve(&alias_variant, 2).await.unwrap(), 2);

    assert!(matches!(
        trial.check_and_reserve(&canonical, 2).await,
        Err(DbError::QuotaExhausted)
    ));

    // Rollback y re-admisión
    trial.rollback(&canonical).await.unwrap();
    assert_eq!(trial.current(&canonical).await.unwrap(), 1);
    assert_eq!(trial.check_and_reserve(&canonical, 2).await.unwrap(), 2);

    println!("   ✅ [SUCCESS]: Trial ceiling certified over normalized identity.");
}
