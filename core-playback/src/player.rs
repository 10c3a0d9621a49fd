//! # Playback State Machine
//!
//! Drives an episode through `Idle → Playing → Paused/Finished/Failed`
//! transitions, advancing position on a fixed tick quantum scaled by the
//! playback rate.
//!
//! ## Serialization model
//!
//! All async commands go through one `tokio::sync::Mutex` so only one
//! command is in flight at a time. Mutable state lives behind a
//! `parking_lot::Mutex` that is never held across an await. The ticker
//! task revalidates an epoch counter under that lock before every
//! advance, so a tick that was already scheduled when `pause()` ran
//! observes the pause and becomes a no-op. Every transition out of
//! `Playing` bumps the epoch, which retires the running ticker.

use crate::config::PlayerConfig;
use crate::episode::{Chapter, Episode};
use crate::error::{PlaybackError, Result};
use crate::state::PlaybackState;
use bridge_traits::audio::AudioBackend;
use bridge_traits::time::TickerSource;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

struct PlayerInner {
    state: PlaybackState,
    episode: Option<Episode>,
    rate: f32,
    chapter_index: Option<usize>,
    // Bumped on every transition out of Playing; a ticker only advances
    // while its captured epoch matches.
    epoch: u64,
}

struct Shared {
    config: PlayerConfig,
    inner: Mutex<PlayerInner>,
    state_tx: watch::Sender<PlaybackState>,
    events: EventBus,
}

impl Shared {
    /// One ticker step. Returns `false` when the ticker must stop.
    fn advance(&self, epoch: u64, quantum: Duration) -> bool {
        let event = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || !inner.state.is_playing() {
                return false;
            }
            let PlaybackState::Playing {
                episode_id,
                position,
                duration,
            } = inner.state.clone()
            else {
                return false;
            };

            let step = quantum.mul_f64(inner.rate as f64);
            let new_position = (position + step).min(duration);

            if new_position >= duration {
                inner.epoch += 1;
                inner.chapter_index = None;
                inner.state = PlaybackState::Finished {
                    episode_id: episode_id.clone(),
                    duration,
                };
                self.state_tx.send_replace(inner.state.clone());
                CoreEvent::Playback(PlaybackEvent::Completed { episode_id })
            } else {
                inner.chapter_index = inner
                    .episode
                    .as_ref()
                    .and_then(|ep| ep.chapter_at(new_position));
                inner.state = PlaybackState::Playing {
                    episode_id: episode_id.clone(),
                    position: new_position,
                    duration,
                };
                self.state_tx.send_replace(inner.state.clone());
                CoreEvent::Playback(PlaybackEvent::PositionChanged {
                    episode_id,
                    position_ms: new_position.as_millis() as u64,
                    duration_ms: duration.as_millis() as u64,
                })
            }
        };
        let keep_going = !matches!(
            event,
            CoreEvent::Playback(PlaybackEvent::Completed { .. })
        );
        self.events.emit(event).ok();
        keep_going
    }
}

/// The playback state machine.
///
/// Transport commands are forwarded to the injected [`AudioBackend`];
/// position advancement comes from the injected [`TickerSource`], never
/// from wall-clock reads, which keeps the machine deterministic under
/// test.
pub struct Player {
    shared: Arc<Shared>,
    backend: Arc<dyn AudioBackend>,
    ticker_source: Arc<dyn TickerSource>,
    // Serializes async commands. Held across backend awaits.
    op_lock: tokio::sync::Mutex<()>,
}

impl Player {
    /// Create a player.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        ticker_source: Arc<dyn TickerSource>,
        config: PlayerConfig,
        events: EventBus,
    ) -> core_runtime::Result<Self> {
        config.validate().map_err(core_runtime::Error::Config)?;
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(PlayerInner {
                    state: PlaybackState::Idle,
                    episode: None,
                    rate: 1.0,
                    chapter_index: None,
                    epoch: 0,
                }),
                state_tx,
                events,
            }),
            backend,
            ticker_source,
            op_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Subscribe to state changes. Emits on every transition and every tick.
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state.clone()
    }

    /// Current position, if an episode is loaded.
    pub fn current_position(&self) -> Option<Duration> {
        self.shared.inner.lock().state.position()
    }

    /// Whether the machine is in `Playing`.
    pub fn is_playing(&self) -> bool {
        self.shared.inner.lock().state.is_playing()
    }

    /// The effective (clamped) playback rate.
    pub fn current_rate(&self) -> f32 {
        self.shared.inner.lock().rate
    }

    /// The chapter containing the current position, if any.
    pub fn current_chapter(&self) -> Option<Chapter> {
        let inner = self.shared.inner.lock();
        let idx = inner.chapter_index?;
        inner
            .episode
            .as_ref()
            .and_then(|ep| ep.chapters.get(idx).cloned())
    }

    /// Start playing an episode.
    ///
    /// Position is clamped to `[0, duration]`; a missing or zero duration
    /// is replaced by the configured fallback. Rate is clamped to the
    /// configured bounds; `None` keeps the current rate.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` (after transitioning to `Failed`) when the
    /// episode has no source; propagates translated backend faults, also
    /// after transitioning to `Failed`.
    #[instrument(skip(self, episode), fields(episode_id = %episode.id))]
    pub async fn play(
        &self,
        episode: Episode,
        initial_position: Option<Duration>,
        rate: Option<f32>,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let Some(source) = episode.source.clone() else {
            warn!("episode has no playable source");
            let error = PlaybackError::Unavailable(format!("episode {} has no source", episode.id));
            self.enter_failed(
                Some(episode.id.clone()),
                initial_position.unwrap_or(Duration::ZERO),
                episode.duration.unwrap_or(Duration::ZERO),
                error.clone(),
            );
            return Err(error);
        };

        let backend_duration = match self.backend.load(source).await {
            Ok(d) => d,
            Err(e) => {
                let error = PlaybackError::from(e);
                self.enter_failed(
                    Some(episode.id.clone()),
                    initial_position.unwrap_or(Duration::ZERO),
                    episode.duration.unwrap_or(Duration::ZERO),
                    error.clone(),
                );
                return Err(error);
            }
        };

        let duration = episode
            .duration
            .filter(|d| !d.is_zero())
            .or(backend_duration.filter(|d| !d.is_zero()))
            .unwrap_or(self.shared.config.fallback_duration);
        let position = initial_position.unwrap_or(Duration::ZERO).min(duration);
        let rate = self
            .shared
            .config
            .clamp_rate(rate.unwrap_or_else(|| self.current_rate()));

        if let Err(e) = self.forward_start(position, rate).await {
            let error = PlaybackError::from(e);
            self.enter_failed(Some(episode.id.clone()), position, duration, error.clone());
            return Err(error);
        }

        let epoch = {
            let mut inner = self.shared.inner.lock();
            inner.epoch += 1;
            inner.rate = rate;
            inner.chapter_index = episode.chapter_at(position);
            inner.state = PlaybackState::Playing {
                episode_id: episode.id.clone(),
                position,
                duration,
            };
            inner.episode = Some(episode.clone());
            self.shared.state_tx.send_replace(inner.state.clone());
            inner.epoch
        };
        self.start_ticker(epoch);
        info!(position_ms = position.as_millis() as u64, rate, "playback started");
        self.shared
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Started {
                episode_id: episode.id,
            }))
            .ok();
        Ok(())
    }

    /// Pause playback. No-op outside `Playing`; idempotent.
    pub async fn pause(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let paused = {
            let mut inner = self.shared.inner.lock();
            let PlaybackState::Playing {
                episode_id,
                position,
                duration,
            } = inner.state.clone()
            else {
                return Ok(());
            };
            inner.epoch += 1;
            inner.state = PlaybackState::Paused {
                episode_id: episode_id.clone(),
                position,
                duration,
            };
            self.state_replace(&mut inner);
            (episode_id, position)
        };

        self.backend.pause().await.map_err(PlaybackError::from)?;
        debug!(position_ms = paused.1.as_millis() as u64, "playback paused");
        self.shared
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Paused {
                episode_id: paused.0,
                position_ms: paused.1.as_millis() as u64,
            }))
            .ok();
        Ok(())
    }

    /// Resume from `Paused` at the current position. No-op otherwise.
    pub async fn resume(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let resumed = {
            let inner = self.shared.inner.lock();
            let PlaybackState::Paused {
                episode_id,
                position,
                duration,
            } = inner.state.clone()
            else {
                return Ok(());
            };
            (episode_id, position, duration)
        };

        self.backend.play().await.map_err(PlaybackError::from)?;

        let epoch = {
            let mut inner = self.shared.inner.lock();
            // State may have moved while the backend call was in flight.
            if !matches!(inner.state, PlaybackState::Paused { .. }) {
                return Ok(());
            }
            inner.epoch += 1;
            inner.state = PlaybackState::Playing {
                episode_id: resumed.0.clone(),
                position: resumed.1,
                duration: resumed.2,
            };
            self.state_replace(&mut inner);
            inner.epoch
        };
        self.start_ticker(epoch);
        self.shared
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Resumed {
                episode_id: resumed.0,
                position_ms: resumed.1.as_millis() as u64,
            }))
            .ok();
        Ok(())
    }

    /// Seek to an absolute position, clamped to `[0, duration]`.
    ///
    /// While `Playing` the ticker restarts from the new position; while
    /// `Paused` only the position moves. No-op in other states.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let (clamped, episode_id, duration, restart_epoch) = {
            let mut inner = self.shared.inner.lock();
            match inner.state.clone() {
                PlaybackState::Playing {
                    episode_id,
                    duration,
                    ..
                } => {
                    let clamped = position.min(duration);
                    inner.epoch += 1;
                    inner.chapter_index = inner
                        .episode
                        .as_ref()
                        .and_then(|ep| ep.chapter_at(clamped));
                    inner.state = PlaybackState::Playing {
                        episode_id: episode_id.clone(),
                        position: clamped,
                        duration,
                    };
                    self.state_replace(&mut inner);
                    (clamped, episode_id, duration, Some(inner.epoch))
                }
                PlaybackState::Paused {
                    episode_id,
                    duration,
                    ..
                } => {
                    let clamped = position.min(duration);
                    inner.chapter_index = inner
                        .episode
                        .as_ref()
                        .and_then(|ep| ep.chapter_at(clamped));
                    inner.state = PlaybackState::Paused {
                        episode_id: episode_id.clone(),
                        position: clamped,
                        duration,
                    };
                    self.state_replace(&mut inner);
                    (clamped, episode_id, duration, None)
                }
                _ => return Ok(()),
            }
        };

        if let Err(e) = self.backend.seek(clamped).await {
            // The epoch bump above retired the ticker; Playing must not
            // survive without one.
            let error = PlaybackError::from(e);
            self.enter_failed(Some(episode_id), clamped, duration, error.clone());
            return Err(error);
        }
        if let Some(epoch) = restart_epoch {
            self.start_ticker(epoch);
        }
        debug!(position_ms = clamped.as_millis() as u64, "seeked");
        Ok(())
    }

    /// Set the playback rate, clamped to the configured bounds.
    ///
    /// Affects every subsequent tick (`quantum × rate`).
    pub async fn set_rate(&self, rate: f32) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let clamped = self.shared.config.clamp_rate(rate);
        let episode_id = {
            let mut inner = self.shared.inner.lock();
            inner.rate = clamped;
            inner.state.episode_id().map(str::to_string)
        };

        self.backend
            .set_rate(clamped)
            .await
            .map_err(PlaybackError::from)?;
        if let Some(episode_id) = episode_id {
            self.shared
                .events
                .emit(CoreEvent::Playback(PlaybackEvent::RateChanged {
                    episode_id,
                    rate_permille: (clamped * 1000.0).round() as u32,
                }))
                .ok();
        }
        Ok(())
    }

    /// Record a playback failure.
    ///
    /// From `Playing` or `Paused` transitions to `Failed` preserving the
    /// last known position. No-op in other states.
    pub async fn fail(&self, error: PlaybackError) {
        let _guard = self.op_lock.lock().await;
        let mut inner = self.shared.inner.lock();
        let (episode_id, position, duration) = match inner.state.clone() {
            PlaybackState::Playing {
                episode_id,
                position,
                duration,
            }
            | PlaybackState::Paused {
                episode_id,
                position,
                duration,
            } => (Some(episode_id), position, duration),
            _ => return,
        };
        inner.epoch += 1;
        inner.state = PlaybackState::Failed {
            episode_id: episode_id.clone(),
            position,
            duration,
            error: error.clone(),
        };
        self.state_replace(&mut inner);
        drop(inner);
        warn!(%error, "playback failed");
        self.shared
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Failed {
                episode_id,
                message: error.to_string(),
                recoverable: error.is_retryable(),
            }))
            .ok();
    }

    /// Mark the episode as played through to the end.
    pub async fn finish(&self) {
        let _guard = self.op_lock.lock().await;
        let mut inner = self.shared.inner.lock();
        let (episode_id, duration) = match inner.state.clone() {
            PlaybackState::Playing {
                episode_id,
                duration,
                ..
            }
            | PlaybackState::Paused {
                episode_id,
                duration,
                ..
            } => (episode_id, duration),
            _ => return,
        };
        inner.epoch += 1;
        inner.chapter_index = None;
        inner.state = PlaybackState::Finished {
            episode_id: episode_id.clone(),
            duration,
        };
        self.state_replace(&mut inner);
        drop(inner);
        info!("episode finished");
        self.shared
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Completed { episode_id }))
            .ok();
    }

    /// Administrative state restore.
    ///
    /// The ticker runs iff the injected state is `Playing`. No backend
    /// commands are replayed; the caller is responsible for the backend
    /// matching the injected state.
    pub async fn inject_state(&self, state: PlaybackState) {
        let _guard = self.op_lock.lock().await;
        let epoch = {
            let mut inner = self.shared.inner.lock();
            inner.epoch += 1;
            inner.chapter_index = match (&state, inner.episode.as_ref()) {
                (PlaybackState::Playing { position, .. }, Some(ep))
                | (PlaybackState::Paused { position, .. }, Some(ep)) => ep.chapter_at(*position),
                _ => None,
            };
            inner.state = state.clone();
            self.state_replace(&mut inner);
            state.is_playing().then_some(inner.epoch)
        };
        if let Some(epoch) = epoch {
            self.start_ticker(epoch);
        }
    }

    /// Adopt a backend-reported position without restarting the ticker.
    ///
    /// Clamped to `[0, duration]`; applies only in `Playing` and `Paused`.
    pub fn resync_position(&self, position: Duration) {
        let event = {
            let mut inner = self.shared.inner.lock();
            let (episode_id, duration, playing) = match inner.state.clone() {
                PlaybackState::Playing {
                    episode_id,
                    duration,
                    ..
                } => (episode_id, duration, true),
                PlaybackState::Paused {
                    episode_id,
                    duration,
                    ..
                } => (episode_id, duration, false),
                _ => return,
            };
            let clamped = position.min(duration);
            inner.chapter_index = inner
                .episode
                .as_ref()
                .and_then(|ep| ep.chapter_at(clamped));
            inner.state = if playing {
                PlaybackState::Playing {
                    episode_id: episode_id.clone(),
                    position: clamped,
                    duration,
                }
            } else {
                PlaybackState::Paused {
                    episode_id: episode_id.clone(),
                    position: clamped,
                    duration,
                }
            };
            self.state_replace(&mut inner);
            CoreEvent::Playback(PlaybackEvent::PositionChanged {
                episode_id,
                position_ms: clamped.as_millis() as u64,
                duration_ms: duration.as_millis() as u64,
            })
        };
        self.shared.events.emit(event).ok();
    }

    /// Re-issue `play` for the episode recorded in the `Failed` state,
    /// resuming from the failure position. Used by the retry engine.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when not in `Failed` or the failed episode is
    /// unknown; otherwise propagates the `play` outcome.
    pub async fn replay_after_failure(&self) -> Result<()> {
        let (episode, position) = {
            let inner = self.shared.inner.lock();
            let PlaybackState::Failed { position, .. } = inner.state.clone() else {
                return Err(PlaybackError::Unavailable(
                    "no failed playback to retry".to_string(),
                ));
            };
            let Some(episode) = inner.episode.clone() else {
                return Err(PlaybackError::Unavailable(
                    "failed playback has no episode".to_string(),
                ));
            };
            (episode, position)
        };
        self.play(episode, Some(position), None).await
    }

    fn enter_failed(
        &self,
        episode_id: Option<String>,
        position: Duration,
        duration: Duration,
        error: PlaybackError,
    ) {
        let mut inner = self.shared.inner.lock();
        inner.epoch += 1;
        inner.chapter_index = None;
        inner.state = PlaybackState::Failed {
            episode_id: episode_id.clone(),
            position: position.min(duration),
            duration,
            error: error.clone(),
        };
        self.state_replace(&mut inner);
        drop(inner);
        self.shared
            .events
            .emit(CoreEvent::Playback(PlaybackEvent::Failed {
                episode_id,
                message: error.to_string(),
                recoverable: error.is_retryable(),
            }))
            .ok();
    }

    fn state_replace(&self, inner: &mut PlayerInner) {
        self.shared.state_tx.send_replace(inner.state.clone());
    }

    async fn forward_start(&self, position: Duration, rate: f32) -> bridge_traits::error::Result<()> {
        self.backend.seek(position).await?;
        self.backend.set_rate(rate).await?;
        self.backend.play().await
    }

    fn start_ticker(&self, epoch: u64) {
        let mut ticker = self.ticker_source.ticker();
        let quantum = self.ticker_source.quantum();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            while ticker.next_tick().await {
                if !shared.advance(epoch, quantum) {
                    break;
                }
            }
        });
    }
}
