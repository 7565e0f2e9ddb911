//! Tests for cancellation scopes and delay policies

use std::time::Duration;

use prometheus_async_core::core::{task_added_at, Context, DelayPolicy, TaskOptions, TASK_ADDED_AT};
use tokio_util::sync::CancellationToken;

#[test]
fn test_context_from_token_shares_cancellation() {
    let token = CancellationToken::new();
    let ctx = Context::from(token.clone());
    token.cancel();
    assert!(ctx.is_cancelled());
}

#[test]
fn test_grandchild_inherits_values_and_cancellation() {
    let root = Context::new().with_value("request_id", 77_u64);
    let grandchild = root.child().child();
    assert_eq!(grandchild.value::<u64>("request_id"), Some(&77));

    root.cancel();
    assert!(grandchild.is_cancelled());
}

#[test]
fn test_added_at_key_is_stable() {
    assert_eq!(TASK_ADDED_AT, "TaskAddedAt");
    assert!(task_added_at(&Context::new().with_value(TASK_ADDED_AT, "not an instant")).is_none());
}

#[tokio::test]
async fn test_cancelled_future_resolves() {
    let ctx = Context::new();
    let waiter = ctx.clone();
    let handle = tokio::spawn(async move { waiter.cancelled().await });
    ctx.cancel();
    handle.await.unwrap();
}

#[test]
fn test_exponential_policy_caps() {
    let policy = DelayPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
    assert_eq!(policy.delay_for(0), Duration::ZERO);
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    assert_eq!(policy.delay_for(5), Duration::from_secs(1));
    assert_eq!(policy.delay_for(60), Duration::from_secs(1));
}

#[test]
fn test_task_options_defaults_and_clamp() {
    let options = TaskOptions::new();
    assert_eq!(options.max_attempts(), 1);
    assert_eq!(options.delay_policy().delay_for(7), Duration::ZERO);
    assert_eq!(TaskOptions::new().with_max_attempts(0).max_attempts(), 1);
}
