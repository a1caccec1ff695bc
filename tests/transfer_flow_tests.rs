mod common;

use common::*;
use pixflow::application::orchestrator::TransferOrchestrator;
use pixflow::application::receipts::Receipts;
use pixflow::domain::clock::SystemClock;
use pixflow::domain::funding::FundingSource;
use pixflow::domain::ledger::RecordKind;
use pixflow::domain::limit::LimitCategory;
use pixflow::domain::money::Balance;
use pixflow::domain::ports::{
    AccountStore, CreditLineStore, LedgerStore, LimitStore, StoreHandle, TransferStore,
};
use pixflow::domain::receipt::ReceiptDirection;
use pixflow::domain::transfer::{SettlementStep, TransferStatus};
use pixflow::error::PaymentError;
use rust_decimal_macros::dec;
use std::sync::Arc;

async fn balance(store: &StoreHandle, account_id: &str) -> Balance {
    store.get_account(account_id).await.unwrap().unwrap().balance
}

#[tokio::test]
async fn test_internal_transfer_moves_money_and_writes_history() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let transfer = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(100), "idem-1"))
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::Completed);
    assert!(transfer.settlement_issues.is_empty());
    assert!(transfer.executed_at.is_some());
    assert!(transfer.receipt_id.is_some());
    assert_eq!(transfer.destination_name.as_deref(), Some("Bob Comercio LTDA"));
    assert_eq!(transfer.destination_customer_id.as_deref(), Some(BOB));

    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(900)));
    assert_eq!(balance(&store, BOB_ACCOUNT).await, Balance::new(dec!(150)));

    let sent = store.records_for_customer(ANA).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, RecordKind::PixSent);
    assert_eq!(sent[0].amount, dec!(-100));
    assert_eq!(sent[0].description, "Pix sent - Bob Comercio LTDA");

    let received = store.records_for_customer(BOB).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].kind, RecordKind::PixReceived);
    assert_eq!(received[0].amount, dec!(100));
    assert_eq!(received[0].description, "Pix received - Ana Lima");

    let stored = store.get_transfer(transfer.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransferStatus::Completed);
    assert_eq!(stored.receipt_id, transfer.receipt_id);
}

#[tokio::test]
async fn test_same_token_replays_without_paying_twice() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let first = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(100), "idem-1"))
        .await
        .unwrap();
    let second = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(100), "idem-1"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.end_to_end_id, second.end_to_end_id);
    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(900)));
    assert_eq!(balance(&store, BOB_ACCOUNT).await, Balance::new(dec!(150)));
    assert_eq!(store.records_for_customer(ANA).await.unwrap().len(), 1);
    assert_eq!(store.records_for_customer(BOB).await.unwrap().len(), 1);
    assert_eq!(store.list_transfers(ANA, 1, 20).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_submissions_with_one_token_pay_once() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .submit(ANA, transfer_to(BOB_PHONE, dec!(10), "idem-race"))
                .await
                .unwrap()
                .id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(990)));
    assert_eq!(store.records_for_customer(ANA).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_tokens_are_scoped_per_customer() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let ana = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(10), "shared"))
        .await
        .unwrap();
    let mut from_bob = transfer_to("ana@pixflow.dev", dec!(10), "shared");
    from_bob.source_account_id = BOB_ACCOUNT.into();
    let bob = orchestrator.submit(BOB, from_bob).await.unwrap();

    assert_ne!(ana.id, bob.id);
}

#[tokio::test]
async fn test_unknown_key_is_an_external_payee() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let transfer = orchestrator
        .submit(ANA, transfer_to("someone@otherbank.com", dec!(40), "idem-ext"))
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::Completed);
    assert!(!transfer.is_internal());
    assert_eq!(transfer.destination_name, None);
    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(960)));
    assert_eq!(
        store.records_for_customer(ANA).await.unwrap()[0].description,
        "Pix sent - someone@otherbank.com"
    );

    let receipts = Receipts::new(store.clone());
    let receipt = receipts.by_transfer(ANA, transfer.id).await.unwrap();
    assert_eq!(receipt.recipient.name, "someone@otherbank.com");
    assert_eq!(receipts.list(ANA).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_external_payee_history_keeps_the_raw_key() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let transfer = orchestrator
        .submit(ANA, transfer_to("39053344705", dec!(15), "idem-cpf"))
        .await
        .unwrap();

    assert!(!transfer.is_internal());
    assert_eq!(
        store.records_for_customer(ANA).await.unwrap()[0].description,
        "Pix sent - 39053344705"
    );
}

#[tokio::test]
async fn test_inactive_key_is_not_resolved() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let transfer = orchestrator
        .submit(ANA, transfer_to("old@bob.com", dec!(10), "idem-old"))
        .await
        .unwrap();

    assert!(!transfer.is_internal());
    assert_eq!(balance(&store, BOB_ACCOUNT).await, Balance::new(dec!(50)));
}

#[tokio::test]
async fn test_paying_yourself_is_rejected_without_side_effects() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let err = orchestrator
        .submit(ANA, transfer_to("ana@pixflow.dev", dec!(10), "idem-self"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Validation { ref field, .. } if field == "destination_key_value"));
    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(1000)));
    assert!(store.list_transfers(ANA, 1, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_limit_is_enforced() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let err = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(501), "idem-big"))
        .await
        .unwrap_err();

    match err {
        PaymentError::LimitExceeded {
            which,
            ceiling,
            attempted,
        } => {
            assert_eq!(which, "single_pix");
            assert_eq!(ceiling, dec!(500));
            assert_eq!(attempted, dec!(501));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(
        orchestrator
            .submit(ANA, transfer_to(BOB_PHONE, dec!(500), "idem-edge"))
            .await
            .is_ok()
    );
    assert!(store.get_limit(ANA, LimitCategory::Pix).await.unwrap().is_some());
}

#[tokio::test]
async fn test_shortfall_reports_available_and_required() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let mut request = transfer_to("ana@pixflow.dev", dec!(100), "idem-short");
    request.source_account_id = BOB_ACCOUNT.into();
    let err = orchestrator.submit(BOB, request).await.unwrap_err();

    match err {
        PaymentError::InsufficientFunds {
            available,
            required,
        } => {
            assert_eq!(available, dec!(50));
            assert_eq!(required, dec!(100));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(balance(&store, BOB_ACCOUNT).await, Balance::new(dec!(50)));
    assert!(store.list_transfers(BOB, 1, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_account_checks() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let mut someone_elses = transfer_to(BOB_PHONE, dec!(10), "idem-a");
    someone_elses.source_account_id = BOB_ACCOUNT.into();
    assert!(matches!(
        orchestrator.submit(ANA, someone_elses).await,
        Err(PaymentError::NotFound { resource: "account", .. })
    ));

    let mut blocked = transfer_to(BOB_PHONE, dec!(10), "idem-b");
    blocked.source_account_id = "acc-cid".into();
    assert!(matches!(
        orchestrator.submit(CID, blocked).await,
        Err(PaymentError::AccountBlocked(_))
    ));
}

#[tokio::test]
async fn test_credit_line_funding_with_installments() {
    let (memory, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let mut request = transfer_to(BOB_PHONE, dec!(100), "idem-card");
    request.funding_source = Some(FundingSource::CreditLine);
    request.credit_line_id = Some(ANA_CARD.into());
    request.installments = Some(3);
    let transfer = orchestrator.submit(ANA, request).await.unwrap();

    assert_eq!(transfer.funding.source(), FundingSource::CreditLine);
    assert_eq!(transfer.total_with_fees(), dec!(104.00));
    assert_eq!(transfer.funding.fee(), dec!(4.00));

    // balance untouched, payee still receives the face value
    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(1000)));
    assert_eq!(balance(&store, BOB_ACCOUNT).await, Balance::new(dec!(150)));

    let line = store.get_credit_line(ANA, ANA_CARD).await.unwrap().unwrap();
    assert_eq!(line.used_limit, dec!(104.00));
    assert_eq!(line.available_limit, dec!(4896.00));
    assert_eq!(line.pix_credit_used, dec!(104.00));

    let entries = memory.credit_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, dec!(104.00));
    assert_eq!(entries[0].installments, 3);

    assert_eq!(store.records_for_customer(ANA).await.unwrap()[0].amount, dec!(-104.00));

    let receipts = Receipts::new(store.clone());
    let sender_copy = receipts.by_transfer(ANA, transfer.id).await.unwrap();
    assert_eq!(sender_copy.fee_amount, dec!(4.00));
    assert_eq!(sender_copy.total_amount, dec!(104.00));
    assert_eq!(sender_copy.installments, 3);

    let payee_copies = receipts.list(BOB).await.unwrap();
    assert_eq!(payee_copies.len(), 1);
    assert_eq!(payee_copies[0].direction, ReceiptDirection::Received);
    assert_eq!(payee_copies[0].fee_amount, dec!(0));
    assert_eq!(payee_copies[0].total_amount, dec!(100));
}

#[tokio::test]
async fn test_disabled_credit_line_is_rejected() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let mut request = transfer_to("ana@pixflow.dev", dec!(10), "idem-card");
    request.source_account_id = BOB_ACCOUNT.into();
    request.funding_source = Some(FundingSource::CreditLine);
    request.credit_line_id = Some("card-bob".into());

    assert!(matches!(
        orchestrator.submit(BOB, request).await,
        Err(PaymentError::Validation { ref field, .. }) if field == "credit_line_id"
    ));
}

#[tokio::test]
async fn test_failed_settlement_step_is_recorded_not_rolled_back() {
    let (memory, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    memory.fail_next("insert_record", 1);
    let transfer = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(100), "idem-flaky"))
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(transfer.settlement_issues.len(), 1);
    assert_eq!(transfer.settlement_issues[0].step, SettlementStep::SenderHistory);

    // later steps still ran
    assert_eq!(balance(&store, ANA_ACCOUNT).await, Balance::new(dec!(900)));
    assert_eq!(balance(&store, BOB_ACCOUNT).await, Balance::new(dec!(150)));
    assert!(store.records_for_customer(ANA).await.unwrap().is_empty());
    assert_eq!(store.records_for_customer(BOB).await.unwrap().len(), 1);

    let stored = store.get_transfer(transfer.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransferStatus::Completed);
    assert_eq!(stored.settlement_issues, transfer.settlement_issues);
}

#[tokio::test]
async fn test_completed_transfer_cannot_be_cancelled() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let transfer = orchestrator
        .submit(ANA, transfer_to(BOB_PHONE, dec!(10), "idem-c"))
        .await
        .unwrap();

    assert!(matches!(
        orchestrator.cancel(ANA, transfer.id).await,
        Err(PaymentError::Validation { .. })
    ));
    assert!(matches!(
        orchestrator.get(BOB, transfer.id).await,
        Err(PaymentError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_listing_is_paged_newest_first() {
    let (_, store) = seeded_store().await;
    let orchestrator = TransferOrchestrator::new(store.clone(), Arc::new(SystemClock));

    let mut ids = Vec::new();
    for i in 0..3 {
        let transfer = orchestrator
            .submit(ANA, transfer_to(BOB_PHONE, dec!(1), &format!("idem-{i}")))
            .await
            .unwrap();
        ids.push(transfer.id);
    }

    let first_page = orchestrator.list(ANA, Some(1), Some(2)).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].id, ids[2]);
    let second_page = orchestrator.list(ANA, Some(2), Some(2)).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, ids[0]);
    assert!(orchestrator.list(BOB, None, None).await.unwrap().is_empty());

    assert!(matches!(
        orchestrator.list(ANA, Some(0), None).await,
        Err(PaymentError::Validation { .. })
    ));
    assert!(matches!(
        orchestrator.list(ANA, None, Some(101)).await,
        Err(PaymentError::Validation { .. })
    ));
}
