//! Integration tests for order consolidation against a scripted backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use orderdesk_core::{AreaId, OrderId, OrderStatus, UserId};
use orderdesk_flow::api::ExistenceResponse;
use orderdesk_flow::consolidation::decision::DecisionState;
use orderdesk_flow::consolidation::submitter::SubmitRejection;
use orderdesk_flow::error::Error;
use orderdesk_test_utils::{
    ApiCall, ApiOp, TestContext, assert_blocked_by, assert_rejected, cart, init_test_logging,
    key, summary, utc,
};

const USER: UserId = UserId::new(5);
const AREA: AreaId = AreaId::new(2);

/// Probe unreachable, listing shows a delivered order for today: blocked.
#[tokio::test]
async fn delivered_order_found_by_fallback_blocks_submission() {
    init_test_logging();
    let ctx = TestContext::new();
    ctx.api
        .seed_order(USER, summary(77, OrderStatus::Delivered, 2), Utc::now());
    ctx.api.fail_next(ApiOp::ProbeExistence);
    let engine = ctx.engine();

    let state = engine.select(Some(USER), Some(AREA)).await.unwrap();
    assert_blocked_by(&state, OrderStatus::Delivered);
    assert!(ctx.api.count(ApiOp::ListOrders) >= 1);

    let mut cart = cart(&[(9, 2)]);
    let result = engine.submit(&mut cart, None).await;
    assert_rejected(
        &result,
        &SubmitRejection::StatusNotCreated {
            order_id: OrderId::new(77),
            status: OrderStatus::Delivered,
        },
    );
    assert_eq!(cart.len(), 1);
    assert_eq!(ctx.api.count(ApiOp::CreateOrder), 0);
    assert_eq!(ctx.api.count(ApiOp::AppendOrderItems), 0);
}

#[tokio::test]
async fn no_order_creates_and_records_session() {
    let ctx = TestContext::new();
    let engine = ctx.engine();

    assert_eq!(
        engine.select(Some(USER), Some(AREA)).await.unwrap(),
        DecisionState::NoOrder
    );

    let mut cart = cart(&[(9, 2), (4, 1)]);
    let receipt = engine
        .submit(&mut cart, Some("leave at the gate".to_string()))
        .await
        .unwrap();

    assert!(!receipt.merged);
    assert_eq!(receipt.lines, 2);
    assert_eq!(receipt.order.total_amount, Decimal::from(30));
    assert!(cart.is_empty());
    assert!(ctx.ledger.contains(AREA));
    assert_eq!(engine.state().unwrap(), DecisionState::Checking);

    let stored = ctx.api.backend().order(receipt.order.id).unwrap().unwrap();
    assert_eq!(stored.observation.as_deref(), Some("leave at the gate"));
    assert_eq!(stored.items.len(), 2);
}

#[tokio::test]
async fn open_order_receives_merged_lines() {
    let ctx = TestContext::new();
    ctx.api
        .seed_order(USER, summary(40, OrderStatus::Created, 2), Utc::now());
    let engine = ctx.engine();

    let state = engine.select(Some(USER), Some(AREA)).await.unwrap();
    assert!(matches!(state, DecisionState::OpenMergeable(ref s) if s.id == OrderId::new(40)));

    let mut cart = cart(&[(9, 2), (4, 3)]);
    let receipt = engine.submit(&mut cart, None).await.unwrap();

    assert!(receipt.merged);
    assert_eq!(receipt.order.id, OrderId::new(40));
    assert_eq!(ctx.api.count(ApiOp::CreateOrder), 0);
    assert_eq!(ctx.api.backend().items(OrderId::new(40)).unwrap().len(), 2);
    assert_eq!(receipt.order.total_amount, Decimal::from(50));
}

#[tokio::test]
async fn second_submission_for_area_is_refused_until_session_ends() {
    let ctx = TestContext::new();
    let engine = ctx.engine();
    engine.select(Some(USER), Some(AREA)).await.unwrap();

    let mut first = cart(&[(9, 1)]);
    engine.submit(&mut first, None).await.unwrap();

    let mut second = cart(&[(4, 1)]);
    let result = engine.submit(&mut second, None).await;
    assert_rejected(
        &result,
        &SubmitRejection::AlreadySubmittedThisSession { area_id: AREA },
    );
    assert_eq!(second.len(), 1);

    // The ledger is shared across engines of one session.
    let other = ctx.engine();
    other.select(Some(USER), Some(AREA)).await.unwrap();
    let result = other.submit(&mut second, None).await;
    assert_rejected(
        &result,
        &SubmitRejection::AlreadySubmittedThisSession { area_id: AREA },
    );

    // Another area is unaffected.
    other.select(Some(USER), Some(AreaId::new(3))).await.unwrap();
    other.submit(&mut second, None).await.unwrap();

    engine.end_session().unwrap();
    assert!(ctx.ledger.is_empty());
    assert_eq!(engine.current_key().unwrap(), None);
}

#[tokio::test]
async fn ambiguous_probe_blocks_without_scanning() {
    let ctx = TestContext::new();
    ctx.api.script_probe(ExistenceResponse::ambiguous());
    let engine = ctx.engine();

    let state = engine.select(Some(USER), Some(AREA)).await.unwrap();
    assert_eq!(state, DecisionState::Blocked(None));
    assert_eq!(ctx.api.count(ApiOp::ListOrders), 0);

    let mut cart = cart(&[(9, 1)]);
    let result = engine.submit(&mut cart, None).await;
    assert_rejected(&result, &SubmitRejection::AlreadyExists);
}

#[tokio::test]
async fn validation_runs_before_any_backend_call() {
    let ctx = TestContext::new();
    let engine = ctx.engine();
    engine.select(Some(USER), None).await.unwrap();

    let mut filled = cart(&[(9, 1)]);
    let result = engine.submit(&mut filled, None).await;
    assert!(matches!(
        result,
        Err(Error::Rejected(SubmitRejection::Validation { .. }))
    ));

    engine.select(Some(USER), Some(AREA)).await.unwrap();
    ctx.api.clear_calls();
    let mut empty = cart(&[]);
    let result = engine.submit(&mut empty, None).await;
    assert!(matches!(
        result,
        Err(Error::Rejected(SubmitRejection::Validation { .. }))
    ));
    assert!(ctx.api.calls().is_empty());
}

#[tokio::test]
async fn failed_submission_leaves_everything_in_place() {
    let ctx = TestContext::new();
    let engine = ctx.engine();
    engine.select(Some(USER), Some(AREA)).await.unwrap();
    ctx.api.fail_next(ApiOp::CreateOrder);

    let mut cart = cart(&[(9, 2)]);
    let result = engine.submit(&mut cart, None).await;
    assert!(matches!(result, Err(Error::Transport { .. })));
    assert_eq!(cart.len(), 1);
    assert!(ctx.ledger.is_empty());
    assert_eq!(engine.state().unwrap(), DecisionState::NoOrder);

    let receipt = engine.submit(&mut cart, None).await.unwrap();
    assert!(!receipt.merged);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn unreachable_backend_blocks_until_retry() {
    let ctx = TestContext::new();
    ctx.api.fail_always(ApiOp::ProbeExistence);
    ctx.api.fail_always(ApiOp::ListOrders);
    let engine = ctx.engine();

    let state = engine.select(Some(USER), Some(AREA)).await.unwrap();
    assert_eq!(state, DecisionState::Blocked(None));

    // Failures are cached for the key until a retry.
    engine.select(Some(USER), Some(AREA)).await.unwrap();
    assert_eq!(ctx.api.count(ApiOp::ProbeExistence), 1);

    ctx.api.clear_failures();
    assert_eq!(engine.retry().await.unwrap(), DecisionState::NoOrder);
    assert_eq!(ctx.api.count(ApiOp::ProbeExistence), 2);
}

#[tokio::test]
async fn result_for_previous_key_is_discarded() {
    init_test_logging();
    let ctx = TestContext::new();
    ctx.api.seed_order(
        USER,
        summary(11, OrderStatus::Delivered, 2),
        utc(2025, 1, 15, 9, 0),
    );
    let engine = Arc::new(ctx.engine());

    let mut held = ctx.api.hold_next(ApiOp::ProbeExistence);
    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.select_key(key(5, 2, "2025-01-15")).await }
    });
    held.reached().await;

    let second = key(5, 3, "2025-01-15");
    let state = engine.select_key(second.clone()).await.unwrap();
    assert_eq!(state, DecisionState::NoOrder);

    held.release();
    first.await.unwrap().unwrap();

    assert_eq!(engine.current_key().unwrap(), Some(second));
    assert_eq!(engine.state().unwrap(), DecisionState::NoOrder);
}

#[tokio::test]
async fn concurrent_submission_for_same_area_is_refused() {
    let ctx = TestContext::new();
    let engine = Arc::new(ctx.engine());
    engine.select(Some(USER), Some(AREA)).await.unwrap();

    let mut held = ctx.api.hold_next(ApiOp::CreateOrder);
    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            let mut cart = cart(&[(9, 1)]);
            engine.submit(&mut cart, None).await
        }
    });
    held.reached().await;

    let mut cart = cart(&[(4, 1)]);
    let result = engine.submit(&mut cart, None).await;
    assert_rejected(&result, &SubmitRejection::SubmissionInFlight);

    held.release();
    first.await.unwrap().unwrap();
    assert_eq!(ctx.api.count(ApiOp::CreateOrder), 1);
}

#[tokio::test]
async fn dropped_submission_releases_area() {
    init_test_logging();
    let ctx = TestContext::new();
    let engine = Arc::new(ctx.engine());
    engine.select(Some(USER), Some(AREA)).await.unwrap();

    let mut held = ctx.api.hold_next(ApiOp::CreateOrder);
    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            let mut cart = cart(&[(9, 1)]);
            engine.submit(&mut cart, None).await
        }
    });
    held.reached().await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    assert_eq!(engine.state().unwrap(), DecisionState::NoOrder);
    assert!(ctx.api.backend().orders().unwrap().is_empty());

    let mut cart = cart(&[(4, 1)]);
    let receipt = engine.submit(&mut cart, None).await.unwrap();
    assert!(!receipt.merged);
    assert!(engine.ledger().contains(AREA));
    assert_eq!(ctx.api.backend().orders().unwrap().len(), 1);
}

#[tokio::test]
async fn canonical_day_follows_configured_timezone() {
    let ctx = TestContext::with_timezone("America/Lima");
    // 23:30 on the 15th in Lima.
    ctx.api.seed_order(
        USER,
        summary(21, OrderStatus::Created, 2),
        utc(2025, 1, 16, 4, 30),
    );
    ctx.api.fail_always(ApiOp::ProbeExistence);
    let engine = ctx.engine();

    let state = engine.select_key(key(5, 2, "2025-01-15")).await.unwrap();
    assert!(matches!(state, DecisionState::OpenMergeable(ref s) if s.id == OrderId::new(21)));

    ctx.api.clear_failures();
    let state = engine.select_key(key(5, 2, "2025-01-16")).await.unwrap();
    assert_eq!(state, DecisionState::NoOrder);
}

#[tokio::test]
async fn merge_payload_targets_existing_order() {
    let ctx = TestContext::new();
    ctx.api
        .seed_order(USER, summary(40, OrderStatus::Created, 2), Utc::now());
    let engine = ctx.engine();
    engine.select(Some(USER), Some(AREA)).await.unwrap();

    let mut cart = cart(&[(9, 2)]);
    engine.submit(&mut cart, None).await.unwrap();

    let appended = ctx
        .api
        .calls()
        .into_iter()
        .find_map(|call| match call {
            ApiCall::AppendOrderItems { order_id, items } => Some((order_id, items)),
            _ => None,
        })
        .unwrap();
    assert_eq!(appended.0, OrderId::new(40));
    assert_eq!(appended.1.len(), 1);
    assert_eq!(appended.1[0].quantity, Decimal::from(2));
}
