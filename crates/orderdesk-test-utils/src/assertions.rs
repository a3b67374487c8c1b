//! Custom assertion helpers for integration tests.

use std::collections::BTreeSet;

use orderdesk_core::{ItemId, OrderStatus};
use orderdesk_flow::consolidation::decision::DecisionState;
use orderdesk_flow::consolidation::submitter::SubmitRejection;
use orderdesk_flow::error::{Error, Result};
use orderdesk_flow::items::reconciler::ReconciliationDelta;

/// Asserts that a submission was refused with `expected`.
///
/// # Panics
///
/// Panics if the result is not [`Error::Rejected`] with the expected reason.
pub fn assert_rejected<T: std::fmt::Debug>(result: &Result<T>, expected: &SubmitRejection) {
    match result {
        Err(Error::Rejected(reason)) => assert_eq!(
            reason, expected,
            "Expected rejection {expected:?}, got {reason:?}"
        ),
        other => panic!("Expected rejection {expected:?}, got {other:?}"),
    }
}

/// Asserts that the decision blocks submissions because of an order with
/// `status`.
///
/// # Panics
///
/// Panics if the state is not `Blocked` with a summary in that status.
pub fn assert_blocked_by(state: &DecisionState, status: OrderStatus) {
    match state {
        DecisionState::Blocked(Some(summary)) => assert_eq!(
            summary.status, status,
            "Expected order blocked by {status}, got {}",
            summary.status
        ),
        other => panic!("Expected Blocked by {status}, got {other:?}"),
    }
}

/// Asserts that no identity appears in more than one bucket of `delta`, and
/// that no identity is repeated within a bucket.
///
/// # Panics
///
/// Panics if an identity is touched twice.
pub fn assert_identities_disjoint(delta: &ReconciliationDelta) {
    let mut seen: BTreeSet<ItemId> = BTreeSet::new();
    let created = delta.creates.iter().filter_map(|item| item.id);
    let updated = delta.updates.iter().map(|update| update.id);
    for id in created.chain(updated).chain(delta.deletes.iter().copied()) {
        assert!(seen.insert(id), "Identity {id} appears more than once in {delta:?}");
    }
    assert!(
        delta.creates.iter().all(|item| item.id.is_none()),
        "Creates must not carry an identity: {delta:?}"
    );
}
