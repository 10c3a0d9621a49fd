//! # Network Interruption Coordinator
//!
//! Pauses streaming playback when connectivity drops and schedules a
//! cancelable auto-resume once it comes back.
//!
//! The resume is deliberately delayed by a grace period so a flapping
//! connection that drops again right away does not restart playback.
//! Cancellation is generation-based: every event that invalidates a
//! pending resume bumps the generation, and the resume task rechecks the
//! generation under the lock at delivery time, not just when it was
//! cancelled.

use crate::player::Player;
use bridge_traits::network::{ConnectivityStatus, ConnectivityStream};
use bridge_traits::time::DelayProvider;
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Default)]
struct CoordinatorState {
    last_status: Option<ConnectivityStatus>,
    // True only when the coordinator itself paused playback.
    was_playing_before_loss: bool,
    resume_position: Duration,
    episode_id: Option<String>,
    resume_pending: bool,
    generation: u64,
}

/// Coordinates playback with the host connectivity signal.
pub struct InterruptionCoordinator {
    player: Arc<Player>,
    delay: Arc<dyn DelayProvider>,
    events: EventBus,
    grace_period: Duration,
    state: Mutex<CoordinatorState>,
}

impl InterruptionCoordinator {
    pub fn new(
        player: Arc<Player>,
        delay: Arc<dyn DelayProvider>,
        events: EventBus,
        grace_period: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            player,
            delay,
            events,
            grace_period,
            state: Mutex::new(CoordinatorState::default()),
        })
    }

    /// Drive the coordinator from a connectivity stream until the stream
    /// closes or the token is cancelled.
    #[instrument(skip_all)]
    pub async fn run(
        self: Arc<Self>,
        mut stream: Box<dyn ConnectivityStream>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("connectivity driver cancelled");
                    break;
                }
                status = stream.next() => {
                    match status {
                        Some(status) => self.handle_status(status).await,
                        None => {
                            debug!("connectivity stream closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// React to a connectivity status report.
    ///
    /// Duplicate statuses are ignored; `Unknown` is treated as no change.
    pub async fn handle_status(self: &Arc<Self>, status: ConnectivityStatus) {
        if status == ConnectivityStatus::Unknown {
            return;
        }
        {
            let state = self.state.lock();
            if state.last_status == Some(status) {
                return;
            }
        }
        match status {
            ConnectivityStatus::Connected => self.handle_recovery().await,
            ConnectivityStatus::Disconnected => self.handle_loss().await,
            ConnectivityStatus::Unknown => {}
        }
    }

    /// Suppress a pending auto-resume because the user paused manually.
    ///
    /// Called by the session facade before it forwards a manual pause.
    pub fn notify_manual_pause(&self) {
        let cancelled = {
            let mut state = self.state.lock();
            state.generation += 1;
            let was_pending = state.resume_pending;
            state.resume_pending = false;
            state.was_playing_before_loss = false;
            was_pending.then(|| state.episode_id.clone()).flatten()
        };
        if let Some(episode_id) = cancelled {
            debug!("manual pause suppressed pending auto-resume");
            self.events
                .emit(CoreEvent::Network(NetworkEvent::AutoResumeCancelled {
                    episode_id,
                    reason: "manual_pause".to_string(),
                }))
                .ok();
        }
    }

    async fn handle_loss(self: &Arc<Self>) {
        let (playing, event) = {
            let mut state = self.state.lock();
            // The player snapshot must be taken under this lock so a
            // manual pause cannot land between the read and the flag
            // update below.
            let playing = self.player.is_playing();
            state.last_status = Some(ConnectivityStatus::Disconnected);
            // A second loss while a resume is pending cancels it.
            state.generation += 1;
            let cancelled = state.resume_pending;
            state.resume_pending = false;

            let event = if playing {
                let position = self.player.current_position().unwrap_or(Duration::ZERO);
                let episode_id = self
                    .player
                    .state()
                    .episode_id()
                    .map(str::to_string)
                    .unwrap_or_default();
                state.was_playing_before_loss = true;
                state.resume_position = position;
                state.episode_id = Some(episode_id.clone());
                Some(CoreEvent::Network(NetworkEvent::ConnectionLost {
                    episode_id,
                    position_ms: position.as_millis() as u64,
                }))
            } else if cancelled {
                // Stay interrupted: the earlier loss still owns the pause.
                state.was_playing_before_loss = true;
                state.episode_id.clone().map(|episode_id| {
                    CoreEvent::Network(NetworkEvent::AutoResumeCancelled {
                        episode_id,
                        reason: "connection_lost".to_string(),
                    })
                })
            } else {
                None
            };
            (playing, event)
        };

        if playing {
            if let Err(error) = self.player.pause().await {
                warn!(%error, "pause on connection loss failed");
            }
            info!("connection lost while streaming, playback paused");
        }
        if let Some(event) = event {
            self.events.emit(event).ok();
        }
    }

    async fn handle_recovery(self: &Arc<Self>) {
        let scheduled = {
            let mut state = self.state.lock();
            state.last_status = Some(ConnectivityStatus::Connected);
            if !state.was_playing_before_loss {
                return;
            }
            state.generation += 1;
            state.resume_pending = true;
            let generation = state.generation;
            let episode_id = state.episode_id.clone().unwrap_or_default();
            let position = state.resume_position;
            (generation, episode_id, position)
        };
        let (generation, episode_id, position) = scheduled;

        info!(
            grace_ms = self.grace_period.as_millis() as u64,
            "connection restored, auto-resume scheduled"
        );
        self.events
            .emit(CoreEvent::Network(NetworkEvent::ConnectionRestored {
                episode_id: episode_id.clone(),
                grace_period_ms: self.grace_period.as_millis() as u64,
            }))
            .ok();

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.delay.delay(this.grace_period).await;

            // Validity is decided here, under the lock, not when the
            // cancelling event happened.
            {
                let mut state = this.state.lock();
                if state.generation != generation || !state.resume_pending {
                    return;
                }
                state.resume_pending = false;
                state.was_playing_before_loss = false;
            }

            if let Err(error) = this.player.resume().await {
                warn!(%error, "auto-resume failed");
                return;
            }
            info!("playback auto-resumed after grace period");
            this.events
                .emit(CoreEvent::Network(NetworkEvent::AutoResumed {
                    episode_id,
                    position_ms: position.as_millis() as u64,
                }))
                .ok();
        });
    }
}
