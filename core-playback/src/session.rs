//! # Playback Session
//!
//! Facade composing the playback state machine, the interruption
//! coordinator and the retry engine into the single surface hosts talk
//! to. It owns the wiring the parts cannot do themselves: the retry
//! action that re-issues `play` at the failure position, the backend
//! event pump, and the manual-pause notification that suppresses a
//! pending auto-resume.

use crate::config::PlayerConfig;
use crate::episode::Episode;
use crate::error::{PlaybackError, Result};
use crate::interruption::InterruptionCoordinator;
use crate::player::Player;
use crate::retry::{RetryAction, StreamRecovery};
use crate::state::{PlaybackState, RetryState};
use async_trait::async_trait;
use bridge_traits::audio::{AudioBackend, BackendEvent};
use bridge_traits::network::ConnectivityMonitor;
use bridge_traits::storage::PositionStore;
use bridge_traits::time::{DelayProvider, TickerSource};
use core_runtime::events::{EventBus, EventStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

struct ReplayAction {
    player: Arc<Player>,
}

#[async_trait]
impl RetryAction for ReplayAction {
    async fn retry(&self, _attempt: u32) -> Result<()> {
        self.player.replay_after_failure().await
    }
}

/// Builder for [`PlaybackSession`].
pub struct SessionBuilder {
    backend: Arc<dyn AudioBackend>,
    ticker_source: Arc<dyn TickerSource>,
    delay: Arc<dyn DelayProvider>,
    config: PlayerConfig,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    position_store: Option<Arc<dyn PositionStore>>,
    events: Option<EventBus>,
}

impl SessionBuilder {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        ticker_source: Arc<dyn TickerSource>,
        delay: Arc<dyn DelayProvider>,
    ) -> Self {
        Self {
            backend,
            ticker_source,
            delay,
            config: PlayerConfig::default(),
            connectivity: None,
            position_store: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_connectivity(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    pub fn with_position_store(mut self, store: Arc<dyn PositionStore>) -> Self {
        self.position_store = Some(store);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn build(self) -> core_runtime::Result<PlaybackSession> {
        let events = self.events.unwrap_or_else(EventBus::default);
        let player = Arc::new(Player::new(
            Arc::clone(&self.backend),
            self.ticker_source,
            self.config.clone(),
            events.clone(),
        )?);
        let coordinator = InterruptionCoordinator::new(
            Arc::clone(&player),
            Arc::clone(&self.delay),
            events.clone(),
            self.config.grace_period,
        );
        let recovery = StreamRecovery::new(self.config, self.delay, events.clone());
        recovery.set_action(Arc::new(ReplayAction {
            player: Arc::clone(&player),
        }));
        Ok(PlaybackSession {
            player,
            coordinator,
            recovery,
            backend: self.backend,
            connectivity: self.connectivity,
            position_store: self.position_store,
            events,
            cancel_token: CancellationToken::new(),
        })
    }
}

/// The single logical owner of a playback session.
pub struct PlaybackSession {
    player: Arc<Player>,
    coordinator: Arc<InterruptionCoordinator>,
    recovery: Arc<StreamRecovery>,
    backend: Arc<dyn AudioBackend>,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    position_store: Option<Arc<dyn PositionStore>>,
    events: EventBus,
    cancel_token: CancellationToken,
}

impl PlaybackSession {
    /// Spawn the background drivers: the backend event pump and, when a
    /// connectivity monitor was provided, the interruption driver.
    ///
    /// # Errors
    ///
    /// Propagates subscription failures from the backend or the monitor.
    pub async fn start(&self) -> Result<()> {
        let backend_events = self
            .backend
            .subscribe_events()
            .await
            .map_err(PlaybackError::from)?;
        self.spawn_event_pump(backend_events);

        if let Some(monitor) = &self.connectivity {
            let stream = monitor
                .subscribe_changes()
                .await
                .map_err(PlaybackError::from)?;
            let coordinator = Arc::clone(&self.coordinator);
            let token = self.cancel_token.clone();
            tokio::spawn(coordinator.run(stream, token));
        }
        Ok(())
    }

    /// Stop the background drivers.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Start playing an episode.
    ///
    /// When no initial position is supplied, the persisted resume
    /// position for the episode is used if a store is configured.
    #[instrument(skip(self, episode), fields(episode_id = %episode.id))]
    pub async fn play(
        &self,
        episode: Episode,
        initial_position: Option<Duration>,
        rate: Option<f32>,
    ) -> Result<()> {
        let position = match initial_position {
            Some(p) => Some(p),
            None => self.load_saved_position(&episode.id).await,
        };
        let result = self.player.play(episode, position, rate).await;
        if result.is_ok() {
            self.recovery.reset();
        }
        result
    }

    /// Pause playback.
    ///
    /// A manual pause also suppresses any pending auto-resume and
    /// persists the pause position.
    pub async fn pause(&self) -> Result<()> {
        self.coordinator.notify_manual_pause();
        self.player.pause().await?;
        self.save_current_position().await;
        Ok(())
    }

    /// Resume from a manual pause.
    pub async fn resume(&self) -> Result<()> {
        self.player.resume().await
    }

    /// Seek to an absolute position.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.player.seek(position).await
    }

    /// Set the playback rate.
    pub async fn set_rate(&self, rate: f32) -> Result<()> {
        self.player.set_rate(rate).await
    }

    /// Administrative state restore.
    pub async fn inject_state(&self, state: PlaybackState) {
        self.player.inject_state(state).await;
    }

    /// The underlying state machine.
    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    /// Observable playback state.
    pub fn subscribe_playback(&self) -> watch::Receiver<PlaybackState> {
        self.player.subscribe_state()
    }

    /// Observable retry state.
    pub fn subscribe_retry(&self) -> watch::Receiver<RetryState> {
        self.recovery.subscribe_state()
    }

    /// The session's event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to the session's event stream.
    ///
    /// The returned stream can be narrowed with
    /// [`EventStream::filter`], e.g. to network events only.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    fn spawn_event_pump(&self, mut stream: Box<dyn bridge_traits::audio::BackendEventStream>) {
        let player = Arc::clone(&self.player);
        let recovery = Arc::clone(&self.recovery);
        let position_store = self.position_store.clone();
        let token = self.cancel_token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = stream.next() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                match event {
                    BackendEvent::Position(position) => {
                        player.resync_position(position);
                    }
                    BackendEvent::Completed => {
                        let episode_id = player.state().episode_id().map(str::to_string);
                        player.finish().await;
                        if let (Some(store), Some(id)) = (&position_store, episode_id) {
                            if let Err(error) = store.clear_position(&id).await {
                                warn!(%error, "failed to clear saved position");
                            }
                        }
                    }
                    BackendEvent::Error(bridge_error) => {
                        let error = PlaybackError::from(bridge_error);
                        let episode_id = player
                            .state()
                            .episode_id()
                            .map(str::to_string)
                            .unwrap_or_default();
                        // The Failed state stays observable even while a
                        // retry is pending.
                        player.fail(error.clone()).await;
                        let scheduled = recovery.handle_error(&episode_id, error);
                        debug!(scheduled, "backend error handled");
                    }
                }
            }
        });
    }

    async fn load_saved_position(&self, episode_id: &str) -> Option<Duration> {
        let store = self.position_store.as_ref()?;
        match store.load_position(episode_id).await {
            Ok(position) => position,
            Err(error) => {
                warn!(%error, "failed to load saved position");
                None
            }
        }
    }

    async fn save_current_position(&self) {
        let Some(store) = &self.position_store else {
            return;
        };
        let state = self.player.state();
        let (Some(id), Some(position)) = (state.episode_id(), state.position()) else {
            return;
        };
        if let Err(error) = store.save_position(id, position).await {
            warn!(%error, "failed to save position");
        }
    }
}
