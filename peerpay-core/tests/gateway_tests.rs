//! Gateway tests: async submission, cancellation and event logging

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tempfile::TempDir;

use peerpay_core::adapters::memory::InMemoryRepository;
use peerpay_core::ports::Repository;
use peerpay_core::services::{
    EntryPoint, LoggingService, StatusCategory, TransferEngine, TransferGateway, TransferRequest,
};
use peerpay_core::{Account, Identity};

fn id(s: &str) -> Identity {
    Identity::parse(s).unwrap()
}

fn setup(lock_timeout: Duration) -> (Arc<InMemoryRepository>, TransferGateway) {
    let repo = Arc::new(InMemoryRepository::new(lock_timeout));
    for (name, cents) in [("alice", 100000i64), ("bob", 50000)] {
        repo.open_account(&Account::new(id(name), name, Decimal::new(cents, 2)))
            .unwrap();
    }
    let engine = Arc::new(TransferEngine::new(repo.clone()));
    (repo, TransferGateway::new(engine))
}

#[tokio::test]
async fn test_submit_runs_transfer() {
    let (repo, gateway) = setup(Duration::from_secs(1));

    let response = gateway
        .submit(TransferRequest::new("alice", "250.50", "bob").with_display_name("Bob"))
        .await;

    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("Payment Successful"));
    assert_eq!(repo.balance_of(&id("alice")).unwrap(), Decimal::new(74950, 2));
    assert_eq!(repo.balance_of(&id("bob")).unwrap(), Decimal::new(75050, 2));
}

#[tokio::test]
async fn test_concurrent_submissions_never_overspend() {
    let (repo, gateway) = setup(Duration::from_secs(30));

    let submissions = (0..12).map(|_| {
        let gateway = gateway.clone();
        async move {
            gateway
                .submit(TransferRequest::new("alice", "100.00", "shop@upi"))
                .await
        }
    });
    let handles: Vec<_> = submissions.map(tokio::spawn).collect();

    let mut succeeded = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        if response.success {
            succeeded += 1;
        } else {
            assert_eq!(response.error.as_deref(), Some("Insufficient Balance"));
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(repo.balance_of(&id("alice")).unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn test_contention_is_retryable_server_error() {
    let (repo, gateway) = setup(Duration::from_millis(50));
    let _held = repo.begin(&[&id("bob")]).unwrap();

    let response = gateway
        .submit(TransferRequest::new("alice", "1.00", "bob"))
        .await;

    assert!(!response.success);
    assert!(response.retryable);
    assert_eq!(response.category, StatusCategory::ServerError);
    assert_eq!(response.http_status(), 503);
}

#[tokio::test]
async fn test_abandoned_submission_rolls_back() {
    let dir = TempDir::new().unwrap();
    let events = Arc::new(LoggingService::new(dir.path(), EntryPoint::Gateway, "test").unwrap());
    let (repo, gateway) = setup(Duration::from_secs(5));
    let gateway = gateway.with_event_log(events.clone());

    {
        // Hold bob so the worker blocks inside the engine
        let held = repo.begin(&[&id("bob")]).unwrap();

        let pending = gateway.submit(TransferRequest::new("alice", "10.00", "bob"));
        let outcome = tokio::time::timeout(Duration::from_millis(100), pending).await;
        assert!(outcome.is_err(), "submission should still be waiting");

        drop(held);
    }

    // The worker wakes up, sees the cancellation and rolls back
    let mut cancelled = false;
    for _ in 0..100 {
        let errors = events.get_errors(10).unwrap();
        if errors.iter().any(|e| e.error_kind.as_deref() == Some("cancelled")) {
            cancelled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(cancelled, "worker never reported the cancellation");
    assert_eq!(repo.balance_of(&id("alice")).unwrap(), Decimal::new(100000, 2));
    assert_eq!(repo.balance_of(&id("bob")).unwrap(), Decimal::new(50000, 2));
    assert_eq!(repo.transfer_count().unwrap(), 0);
}

#[tokio::test]
async fn test_event_log_records_outcomes_without_details() {
    let dir = TempDir::new().unwrap();
    let events = Arc::new(LoggingService::new(dir.path(), EntryPoint::Gateway, "test").unwrap());
    let (_repo, gateway) = setup(Duration::from_secs(1));
    let gateway = gateway.with_event_log(events.clone());

    gateway.submit(TransferRequest::new("alice", "1.00", "bob")).await;
    gateway.submit(TransferRequest::new("ghost", "1.00", "bob")).await;
    gateway.handle_json(r#"{"senderIdentity":"alice","amount":"0","recipientHandle":"bob"}"#);

    let entries = events.get_recent(10).unwrap();
    assert_eq!(entries.len(), 3);
    let mut kinds: Vec<_> = entries.iter().map(|e| e.error_kind.clone()).collect();
    kinds.sort();
    assert_eq!(
        kinds,
        vec![
            None,
            Some("account_not_found".to_string()),
            Some("invalid_amount".to_string()),
        ]
    );

    let serialized = serde_json::to_string(&entries).unwrap();
    assert!(!serialized.contains("alice"));
    assert!(!serialized.contains("ghost"));
    assert!(!serialized.contains("1.00"));
}
