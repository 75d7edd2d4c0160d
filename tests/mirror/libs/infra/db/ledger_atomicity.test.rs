// [tests/mirror/libs/infra/db/ledger_atomicity.test.rs]
/**
 * =================================================================
 * APARATO: LEDGER ATOMICITY TEST (V4.1 - VALUE INTEGRITY)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE FIFO, REEMBOLSOS E IDEMPOTENCIA
 * =================================================================
 */

use espectro_domain_models::{BalanceKey, GrantSource, TransactionKind};
use espectro_infra_db::repositories::LedgerRepository;
use espectro_infra_db::{DatabaseClient, DbError};
use std::time::Duration;

async fn forge_ledger(database_label: &str) -> (DatabaseClient, LedgerRepository) {
    let client = DatabaseClient::connect(
        &format!("file:{}?mode=memory&cache=shared", database_label),
        None,
    )
    .await
    .expect("Fallo al solidificar el Ledger en memoria");

    let repository = LedgerRepository::new(client.clone());
    (client, repository)
}

#[tokio::test]
async fn certify_fifo_consumption_charge_and_exact_refund() {
    println!("\n💳 [PROVING_GROUNDS]: Auditing FIFO charge and exact refund...");

    let (_client, ledger) = forge_ledger("ledger_fifo_test").await;
    let owner = BalanceKey::User("OPERATOR_ALPHA".to_string());

    // 1. SETUP: dos grants con antigüedad distinguible (5 viejo, 10 nuevo)
    ledger.grant(&owner, 5, &GrantSource::Promo, None).await.expect("Grant A");
    tokio::time::sleep(Duration::from_millis(5)).await;
    ledger.grant(&owner, 10, &GrantSource::Pack("pack_pro".into()), None).await.expect("Grant B");

    assert_eq!(ledger.balance(&owner).await.unwrap(), 15);

    // 2. EXECUTION: cobro de 7 debe drenar el grant viejo completo (5) y 2 del nuevo
    let receipt = ledger.charge(&owner, 7, "Extraction batch").await.expect("Cobro atómico");
    assert_eq!(receipt.consumed_grants.len(), 2, "L3_LEDGER_FAULT: FIFO plan drift.");
    assert_eq!(receipt.consumed_grants[0].consumed_amount, 5);
    assert_eq!(receipt.consumed_grants[1].consumed_amount, 2);

    // 3. VALIDATION A: balance cacheado y recomputado coinciden (P2)
    assert_eq!(ledger.balance(&owner).await.unwrap(), 8);
    assert_eq!(ledger.recompute_balance(&owner).await.unwrap(), 8);

    // 4. VALIDATION B: el rastro porta magnitudes firmadas exactas (P3)
    let trail = ledger.list_recent_transactions(&owner, 10).await.unwrap();
    let charge_entry = trail.iter().find(|t| t.kind == TransactionKind::Charge).unwrap();
    assert_eq!(charge_entry.amount, -7);

    // 5. EXECUTION: el reembolso restaura balance y remanentes exactos
    let refund_id = ledger.refund(&receipt.transaction_identifier).await.expect("Reembolso");
    assert!(!refund_id.is_empty());
    assert_eq!(ledger.balance(&owner).await.unwrap(), 15);
    assert_eq!(ledger.recompute_balance(&owner).await.unwrap(), 15);

    // 6. VALIDATION C: idempotencia del reembolso por cobro
    match ledger.refund(&receipt.transaction_identifier).await {
        Err(DbError::AlreadyRefunded) => {}
        other => panic!("L3_LEDGER_FAULT: Second refund must be rejected, got {:?}", other.map(|_| ())),
    }

    // 7. VALIDATION D: tras el reembolso la disciplina FIFO sigue intacta
    let second_receipt = ledger.charge(&owner, 5, "Post-refund charge").await.unwrap();
    assert_eq!(second_receipt.consumed_grants[0].consumed_amount, 5);

    println!("   ✅ [SUCCESS]: FIFO lifecycle certified bit-perfect.");
}

#[tokio::test]
async fn certify_insufficient_funds_leaves_no_mutation() {
    println!("\n💳 [PROVING_GROUNDS]: Auditing InsufficientFunds purity...");

    let (_client, ledger) = forge_ledger("ledger_purity_test").await;
    let owner = BalanceKey::User("OPERATOR_BETA".to_string());

    ledger.grant(&owner, 3, &GrantSource::Promo, None).await.unwrap();

    match ledger.charge(&owner, 10, "Over-budget charge").await {
        Err(DbError::InsufficientFunds) => {}
        other => panic!("L3_LEDGER_FAULT: Expected InsufficientFunds, got {:?}", other.map(|_| ())),
    }

    // Sin mutación: balance, remanentes y rastro intactos (P1, P2, P8)
    assert_eq!(ledger.balance(&owner).await.unwrap(), 3);
    assert_eq!(ledger.recompute_balance(&owner).await.unwrap(), 3);

    let trail = ledger.list_recent_transactions(&owner, 10).await.unwrap();
    assert_eq!(trail.len(), 1, "L3_LEDGER_FAULT: Failed charge must not leave trail rows.");
    assert_eq!(trail[0].kind, TransactionKind::Grant);

    // Un balance jamás forjado cobra InsufficientFunds, no pánico
    let ghost = BalanceKey::Session("SESSION_GHOST".to_string());
    assert!(matches!(ledger.charge(&ghost, 1, "Ghost").await, Err(DbError::InsufficientFunds)));

    println!("   ✅ [SUCCESS]: Business rejection certified mutation-free.");
}

#[tokio::test]
async fn certify_grant_idempotency_by_external_payment() {
    println!("\n💳 [PROVING_GROUNDS]: Auditing external payment idempotency (P5 ledger half)...");

    let (_client, ledger) = forge_ledger("ledger_idempotency_test").await;
    let owner = BalanceKey::User("OPERATOR_GAMMA".to_string());

    let first_grant = ledger
        .grant(&owner, 100, &GrantSource::Pack("pack_studio".into()), Some("pay_duplicated_01"))
        .await
        .unwrap();

    let second_grant = ledger
        .grant(&owner, 100, &GrantSource::Pack("pack_studio".into()), Some("pay_duplicated_01"))
        .await
        .unwrap();

    // grant(id=X) ; grant(id=X) => un grant, una transacción, un abono
    assert_eq!(first_grant, second_grant, "L3_LEDGER_FAULT: Idempotent grant forged twice.");
    assert_eq!(ledger.balance(&owner).await.unwrap(), 100);

    let trail = ledger.list_recent_transactions(&owner, 10).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].amount, 100);
    assert_eq!(trail[0].external_payment_identifier.as_deref(), Some("pay_duplicated_01"));

    println!("   ✅ [SUCCESS]: Double barrier half certified on the ledger side.");
}

#[tokio::test]
async fn certify_non_positive_magnitudes_are_rejected() {
    let (_client, ledger) = forge_ledger("ledger_magnitude_test").await;
    let owner = BalanceKey::User("OPERATOR_DELTA".to_string());

    assert!(matches!(ledger.grant(&owner, 0, &GrantSource::Promo, None).await, Err(DbError::InvalidMagnitude)));
    assert!(matches!(ledger.charge(&owner, -4, "Negative").await, Err(DbError::InvalidMagnitude)));
}
