//! Integration tests for streaming-error recovery.

mod common;

use async_trait::async_trait;
use bridge_traits::time::ManualDelay;
use common::settle;
use core_playback::{PlaybackError, PlayerConfig, RetryAction, RetryState, StreamRecovery};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Records invocations and replays scripted outcomes.
#[derive(Default)]
struct ScriptedAction {
    calls: Mutex<Vec<u32>>,
    outcomes: Mutex<VecDeque<core_playback::Result<()>>>,
}

impl ScriptedAction {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_outcome(&self, outcome: core_playback::Result<()>) {
        self.outcomes.lock().push_back(outcome);
    }

    fn calls(&self) -> Vec<u32> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RetryAction for ScriptedAction {
    async fn retry(&self, attempt: u32) -> core_playback::Result<()> {
        self.calls.lock().push(attempt);
        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

fn recovery() -> (Arc<StreamRecovery>, Arc<ManualDelay>, Arc<ScriptedAction>) {
    let delay = Arc::new(ManualDelay::new());
    let recovery = StreamRecovery::new(
        PlayerConfig::default(),
        Arc::clone(&delay) as _,
        EventBus::new(16),
    );
    let action = ScriptedAction::new();
    recovery.set_action(Arc::clone(&action) as _);
    (recovery, delay, action)
}

fn reset_error() -> PlaybackError {
    PlaybackError::ConnectionReset("mid-stream".to_string())
}

async fn advance(delay: &ManualDelay, by: Duration) {
    settle().await;
    delay.advance(by);
    settle().await;
}

#[tokio::test]
async fn non_retryable_error_fails_immediately() {
    let (recovery, delay, action) = recovery();

    let scheduled =
        recovery.handle_error("ep-1", PlaybackError::MalformedUrl("htp:/x".to_string()));
    assert!(!scheduled);
    assert_eq!(recovery.state(), RetryState::Failed);

    advance(&delay, Duration::from_secs(60)).await;
    assert!(action.calls().is_empty());
}

#[tokio::test]
async fn retryable_error_schedules_attempt_after_backoff() {
    let (recovery, delay, action) = recovery();

    assert!(recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 1 });

    // One second short of the 5s base delay: nothing fires.
    advance(&delay, Duration::from_secs(4)).await;
    assert!(action.calls().is_empty());

    advance(&delay, Duration::from_secs(1)).await;
    assert_eq!(action.calls(), vec![1]);
    // The scripted default outcome is Ok, which resets the engine.
    assert_eq!(recovery.state(), RetryState::Idle);
}

#[tokio::test]
async fn consecutive_errors_escalate_then_exhaust() {
    let (recovery, _delay, _action) = recovery();

    // Four consecutive retryable errors without firing any attempt.
    assert!(recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 1 });
    assert!(recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 2 });
    assert!(recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 3 });
    assert!(!recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Failed);

    // Still exhausted on the next error.
    assert!(!recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Failed);
}

#[tokio::test]
async fn failed_attempts_chain_through_the_backoff_schedule() {
    let (recovery, delay, action) = recovery();
    action.push_outcome(Err(reset_error()));
    action.push_outcome(Err(reset_error()));
    action.push_outcome(Err(reset_error()));

    assert!(recovery.handle_error("ep-1", reset_error()));

    advance(&delay, Duration::from_secs(5)).await;
    assert_eq!(action.calls(), vec![1]);
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 2 });

    advance(&delay, Duration::from_secs(15)).await;
    assert_eq!(action.calls(), vec![1, 2]);
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 3 });

    advance(&delay, Duration::from_secs(45)).await;
    assert_eq!(action.calls(), vec![1, 2, 3]);
    // The third failure exhausts the budget.
    assert_eq!(recovery.state(), RetryState::Failed);
}

#[tokio::test]
async fn reset_restores_full_attempt_budget() {
    let (recovery, _delay, _action) = recovery();

    recovery.handle_error("ep-1", reset_error());
    recovery.handle_error("ep-1", reset_error());
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 2 });

    recovery.reset();
    assert_eq!(recovery.state(), RetryState::Idle);

    assert!(recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 1 });
}

#[tokio::test]
async fn reset_invalidates_in_flight_attempt() {
    let (recovery, delay, action) = recovery();

    recovery.handle_error("ep-1", reset_error());
    settle().await;
    recovery.reset();

    advance(&delay, Duration::from_secs(60)).await;
    assert!(action.calls().is_empty());
}

#[tokio::test]
async fn non_retryable_error_supersedes_pending_retry() {
    let (recovery, delay, action) = recovery();

    assert!(recovery.handle_error("ep-1", reset_error()));
    settle().await;

    // A terminal error arrives while attempt 1 waits on its backoff.
    assert!(!recovery.handle_error(
        "ep-1",
        PlaybackError::StreamFailed("codec".to_string())
    ));
    assert_eq!(recovery.state(), RetryState::Failed);

    // The superseded attempt never fires.
    advance(&delay, Duration::from_secs(60)).await;
    assert!(action.calls().is_empty());
    assert_eq!(recovery.state(), RetryState::Failed);
}

#[tokio::test]
async fn cancel_retry_drops_schedule_but_keeps_state() {
    let (recovery, delay, action) = recovery();

    recovery.handle_error("ep-1", reset_error());
    settle().await;
    recovery.cancel_retry("ep-1");

    advance(&delay, Duration::from_secs(60)).await;
    assert!(action.calls().is_empty());
    // Last reported state is untouched by cancellation.
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 1 });
}

#[tokio::test]
async fn successful_attempt_emits_recovered_and_resets() {
    let (recovery, delay, action) = recovery();
    let mut retry_states = recovery.subscribe_state();

    recovery.handle_error("ep-1", reset_error());
    advance(&delay, Duration::from_secs(5)).await;

    assert_eq!(action.calls(), vec![1]);
    assert_eq!(*retry_states.borrow_and_update(), RetryState::Idle);

    // Next error starts over at attempt 1.
    assert!(recovery.handle_error("ep-1", reset_error()));
    assert_eq!(recovery.state(), RetryState::Retrying { attempt: 1 });
}

#[tokio::test]
async fn classification_is_pure() {
    assert!(StreamRecovery::is_retryable(&PlaybackError::Timeout(
        "read".to_string()
    )));
    assert!(!StreamRecovery::is_retryable(&PlaybackError::StreamFailed(
        "codec".to_string()
    )));
}
