//! # Streaming Error Recovery
//!
//! Classifies streaming errors and schedules bounded exponential-backoff
//! retries for the transient ones.
//!
//! Classification is a pure function of the error variant
//! ([`PlaybackError::is_retryable`]); the engine only tracks the attempt
//! counter. Scheduled attempts are generation-checked at delivery time so
//! `reset()` and `cancel_retry()` also invalidate an attempt whose
//! backoff delay is already running.

use crate::config::PlayerConfig;
use crate::error::PlaybackError;
use crate::state::RetryState;
use async_trait::async_trait;
use bridge_traits::time::DelayProvider;
use core_runtime::events::{CoreEvent, EventBus, RetryEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Action invoked when a scheduled retry attempt fires.
///
/// The session facade registers an action that re-issues `play` at the
/// failure position. The outcome feeds back into the engine: `Ok` resets
/// it, `Err` escalates to the next attempt.
#[async_trait]
pub trait RetryAction: Send + Sync {
    async fn retry(&self, attempt: u32) -> crate::error::Result<()>;
}

struct RecoveryInner {
    attempt: u32,
    generation: u64,
}

/// Bounded-retry engine for transient streaming errors.
pub struct StreamRecovery {
    config: PlayerConfig,
    delay: Arc<dyn DelayProvider>,
    events: EventBus,
    state_tx: watch::Sender<RetryState>,
    inner: Mutex<RecoveryInner>,
    action: Mutex<Option<Arc<dyn RetryAction>>>,
}

impl StreamRecovery {
    pub fn new(config: PlayerConfig, delay: Arc<dyn DelayProvider>, events: EventBus) -> Arc<Self> {
        let (state_tx, _) = watch::channel(RetryState::Idle);
        Arc::new(Self {
            config,
            delay,
            events,
            state_tx,
            inner: Mutex::new(RecoveryInner {
                attempt: 0,
                generation: 0,
            }),
            action: Mutex::new(None),
        })
    }

    /// Register the action scheduled attempts will invoke.
    pub fn set_action(&self, action: Arc<dyn RetryAction>) {
        *self.action.lock() = Some(action);
    }

    /// Subscribe to retry state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<RetryState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current retry state.
    pub fn state(&self) -> RetryState {
        *self.state_tx.borrow()
    }

    /// Pure retryability classification.
    pub fn is_retryable(error: &PlaybackError) -> bool {
        error.is_retryable()
    }

    /// React to a streaming error.
    ///
    /// Returns `true` when a retry attempt was scheduled, `false` when the
    /// error is not retryable or the attempt budget is exhausted (the
    /// retry state moves to `Failed` in both cases).
    pub fn handle_error(self: &Arc<Self>, episode_id: &str, error: PlaybackError) -> bool {
        if !error.is_retryable() {
            // A terminal error also retires any attempt still waiting on
            // its backoff delay.
            self.inner.lock().generation += 1;
            debug!(%error, "error not retryable");
            self.state_tx.send_replace(RetryState::Failed);
            return false;
        }

        let (attempt, generation) = {
            let mut inner = self.inner.lock();
            if inner.attempt >= self.config.max_retry_attempts {
                drop(inner);
                warn!(%error, attempts = self.config.max_retry_attempts, "retry attempts exhausted");
                self.state_tx.send_replace(RetryState::Failed);
                self.events
                    .emit(CoreEvent::Retry(RetryEvent::Exhausted {
                        episode_id: episode_id.to_string(),
                        attempts: self.config.max_retry_attempts,
                        message: error.to_string(),
                    }))
                    .ok();
                return false;
            }
            inner.attempt += 1;
            inner.generation += 1;
            (inner.attempt, inner.generation)
        };

        let delay = self.config.retry_delay(attempt);
        self.state_tx.send_replace(RetryState::Retrying { attempt });
        info!(attempt, delay_ms = delay.as_millis() as u64, %error, "retry scheduled");
        self.events
            .emit(CoreEvent::Retry(RetryEvent::AttemptScheduled {
                episode_id: episode_id.to_string(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            }))
            .ok();

        let this = Arc::clone(self);
        let episode_id = episode_id.to_string();
        tokio::spawn(async move {
            this.delay.delay(delay).await;

            // A reset or cancellation since scheduling retires this attempt.
            if this.inner.lock().generation != generation {
                return;
            }

            this.events
                .emit(CoreEvent::Retry(RetryEvent::AttemptStarted {
                    episode_id: episode_id.clone(),
                    attempt,
                }))
                .ok();

            let action = this.action.lock().clone();
            let Some(action) = action else {
                warn!("retry fired with no action registered");
                return;
            };

            match action.retry(attempt).await {
                Ok(()) => {
                    info!(attempt, "playback recovered");
                    this.events
                        .emit(CoreEvent::Retry(RetryEvent::Recovered {
                            episode_id: episode_id.clone(),
                            attempt,
                        }))
                        .ok();
                    this.reset();
                }
                Err(error) => {
                    // Escalate. handle_error caps the attempt count.
                    this.handle_error(&episode_id, error);
                }
            }
        });
        true
    }

    /// Clear the attempt counter after a successful resumption.
    ///
    /// Also invalidates any attempt still waiting on its backoff delay.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.attempt = 0;
        inner.generation += 1;
        drop(inner);
        self.state_tx.send_replace(RetryState::Idle);
    }

    /// Invalidate any scheduled retry without touching the observable
    /// retry state.
    pub fn cancel_retry(&self, episode_id: &str) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        drop(inner);
        self.events
            .emit(CoreEvent::Retry(RetryEvent::Cancelled {
                episode_id: episode_id.to_string(),
            }))
            .ok();
    }
}
