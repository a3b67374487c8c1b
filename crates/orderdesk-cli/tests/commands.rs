//! Command tests against a scripted backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use chrono::Utc;
use rust_decimal::Decimal;
use tempfile::TempDir;

use orderdesk_cli::commands::check::{CheckArgs, check};
use orderdesk_cli::commands::reconcile::{apply, delta_rows, load_items};
use orderdesk_cli::commands::submit::{load_cart, submit};
use orderdesk_core::{AreaId, OrderId, OrderStatus, UserId};
use orderdesk_flow::consolidation::decision::DecisionState;
use orderdesk_flow::consolidation::submitter::SubmitRejection;
use orderdesk_flow::error::Error;
use orderdesk_flow::items::reconciler::ItemReconciler;
use orderdesk_test_utils::{ApiOp, TestContext, cart, draft_item, summary};

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write temp file");
    path
}

#[tokio::test]
async fn check_reports_pinned_day() {
    let ctx = TestContext::new();
    let engine = ctx.engine();

    let args = CheckArgs {
        user: 5,
        area: 2,
        day: Some("2025-01-15".to_string()),
    };
    let report = check(&engine, &args).await.unwrap();
    assert_eq!(report.key.day.as_str(), "2025-01-15");
    assert_eq!(report.decision, DecisionState::NoOrder);

    let bad = CheckArgs {
        day: Some("15/01/2025".to_string()),
        ..args
    };
    assert!(check(&engine, &bad).await.is_err());
}

#[tokio::test]
async fn submit_refusal_keeps_typed_reason() {
    let ctx = TestContext::new();
    ctx.api.seed_order(
        UserId::new(5),
        summary(77, OrderStatus::Confirmed, 2),
        Utc::now(),
    );
    let engine = ctx.engine();

    let mut cart = cart(&[(9, 1)]);
    let err = submit(&engine, UserId::new(5), AreaId::new(2), &mut cart, None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Submission refused"));
    let reason = err
        .downcast_ref::<Error>()
        .and_then(Error::rejection)
        .cloned();
    assert_eq!(
        reason,
        Some(SubmitRejection::StatusNotCreated {
            order_id: OrderId::new(77),
            status: OrderStatus::Confirmed,
        })
    );
}

#[tokio::test]
async fn submit_from_cart_file_creates_order() {
    let ctx = TestContext::new();
    let engine = ctx.engine();
    let dir = TempDir::new().expect("create temp dir");
    let path = write_file(
        dir.path(),
        "cart.json",
        r#"[{"productId":9,"unitMeasurementId":1,"quantity":"2","price":"4.50"}]"#,
    );

    let mut cart = load_cart(&path).unwrap();
    let receipt = submit(&engine, UserId::new(5), AreaId::new(2), &mut cart, None)
        .await
        .unwrap();

    assert!(!receipt.merged);
    assert_eq!(receipt.order.total_amount, Decimal::new(900, 2));
    assert!(cart.is_empty());
    assert_eq!(ctx.api.count(ApiOp::CreateOrder), 1);
}

#[tokio::test]
async fn reconcile_apply_updates_backend_items() {
    let ctx = TestContext::new();
    ctx.api.seed_order(
        UserId::new(5),
        summary(40, OrderStatus::Created, 2),
        Utc::now(),
    );
    let kept = ctx.api.seed_item(OrderId::new(40), draft_item(1, 2));
    let dropped = ctx.api.seed_item(OrderId::new(40), draft_item(2, 1));

    let dir = TempDir::new().expect("create temp dir");
    let snapshot_path = write_file(
        dir.path(),
        "snapshot.json",
        &serde_json::to_string(&vec![kept.clone(), dropped]).unwrap(),
    );
    let snapshot = load_items(&snapshot_path).unwrap();

    let draft = vec![kept, draft_item(7, 3)];
    let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();
    assert_eq!(delta_rows(&delta).len(), 2);

    let report = apply(&ctx.applier(2), OrderId::new(40), &delta).await;
    assert!(report.is_success());

    let items = ctx.api.backend().items(OrderId::new(40)).unwrap();
    let products: Vec<u64> = items.iter().map(|item| item.product_id.get()).collect();
    assert_eq!(products, vec![1, 7]);
}
