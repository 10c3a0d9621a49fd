//! Shared test doubles for the playback integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::audio::{AudioBackend, BackendEvent, BackendEventStream, MediaSource};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::network::{ConnectivityMonitor, ConnectivityStatus, ConnectivityStream};
use core_playback::{Chapter, Episode, PlaybackState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Transport command recorded by [`FakeBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Load,
    Play,
    Pause,
    Seek(Duration),
    SetRate(f32),
}

/// Scriptable audio backend.
///
/// Records every transport command, reports a configurable duration from
/// `load`, can fail a number of `play` calls, and lets tests push
/// transport events into the subscribed stream.
#[derive(Default)]
pub struct FakeBackend {
    commands: Mutex<Vec<BackendCommand>>,
    load_duration: Mutex<Option<Duration>>,
    play_failures: Mutex<u32>,
    seek_failures: Mutex<u32>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<BackendEvent>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_load_duration(&self, duration: Option<Duration>) {
        *self.load_duration.lock() = duration;
    }

    /// Make the next `count` calls to `play` fail with a connection reset.
    pub fn fail_next_plays(&self, count: u32) {
        *self.play_failures.lock() = count;
    }

    /// Make the next `count` calls to `seek` fail with a connection reset.
    pub fn fail_next_seeks(&self, count: u32) {
        *self.seek_failures.lock() = count;
    }

    pub fn commands(&self) -> Vec<BackendCommand> {
        self.commands.lock().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().clear();
    }

    /// Push a transport event into the subscribed stream.
    pub fn push_event(&self, event: BackendEvent) {
        let tx = self.events_tx.lock();
        tx.as_ref()
            .expect("no event subscriber")
            .send(event)
            .expect("event stream closed");
    }

    fn record(&self, command: BackendCommand) {
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn load(&self, _source: MediaSource) -> Result<Option<Duration>> {
        self.record(BackendCommand::Load);
        Ok(*self.load_duration.lock())
    }

    async fn play(&self) -> Result<()> {
        let mut failures = self.play_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(BridgeError::ConnectionReset("simulated".to_string()));
        }
        drop(failures);
        self.record(BackendCommand::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(BackendCommand::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        let mut failures = self.seek_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(BridgeError::ConnectionReset("simulated".to_string()));
        }
        drop(failures);
        self.record(BackendCommand::Seek(position));
        Ok(())
    }

    async fn set_rate(&self, rate: f32) -> Result<()> {
        self.record(BackendCommand::SetRate(rate));
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<Box<dyn BackendEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events_tx.lock() = Some(tx);
        Ok(Box::new(FakeEventStream { rx }))
    }
}

struct FakeEventStream {
    rx: mpsc::UnboundedReceiver<BackendEvent>,
}

#[async_trait]
impl BackendEventStream for FakeEventStream {
    async fn next(&mut self) -> Option<BackendEvent> {
        self.rx.recv().await
    }
}

/// Scriptable connectivity monitor.
pub struct FakeConnectivity {
    status: Mutex<ConnectivityStatus>,
    changes_tx: Mutex<Option<mpsc::UnboundedSender<ConnectivityStatus>>>,
}

impl FakeConnectivity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(ConnectivityStatus::Connected),
            changes_tx: Mutex::new(None),
        })
    }

    pub fn push_status(&self, status: ConnectivityStatus) {
        *self.status.lock() = status;
        if let Some(tx) = self.changes_tx.lock().as_ref() {
            // The driver may already have shut down.
            let _ = tx.send(status);
        }
    }
}

#[async_trait]
impl ConnectivityMonitor for FakeConnectivity {
    async fn current_status(&self) -> Result<ConnectivityStatus> {
        Ok(*self.status.lock())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn ConnectivityStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.changes_tx.lock() = Some(tx);
        Ok(Box::new(FakeConnectivityStream { rx }))
    }
}

struct FakeConnectivityStream {
    rx: mpsc::UnboundedReceiver<ConnectivityStatus>,
}

#[async_trait]
impl ConnectivityStream for FakeConnectivityStream {
    async fn next(&mut self) -> Option<ConnectivityStatus> {
        self.rx.recv().await
    }
}

/// A one-minute remote episode.
pub fn remote_episode(id: &str) -> Episode {
    Episode::new(
        id,
        MediaSource::RemoteStream {
            url: format!("https://cdn.example.com/{id}.mp3"),
            headers: Default::default(),
        },
    )
    .with_duration(Duration::from_secs(60))
}

/// A one-minute remote episode with three chapters.
pub fn chaptered_episode(id: &str) -> Episode {
    remote_episode(id).with_chapters(vec![
        Chapter::new("ch-1", "Intro", Duration::ZERO, Duration::from_secs(20)),
        Chapter::new(
            "ch-2",
            "Main",
            Duration::from_secs(20),
            Duration::from_secs(50),
        ),
        Chapter::new(
            "ch-3",
            "Outro",
            Duration::from_secs(50),
            Duration::from_secs(60),
        ),
    ])
}

/// Let spawned tasks run to quiescence on the current-thread runtime.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Wait (bounded) until the watched playback state satisfies `pred`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<PlaybackState>,
    pred: impl Fn(&PlaybackState) -> bool,
) -> PlaybackState {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            {
                let state = rx.borrow();
                if pred(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.expect("state channel closed");
        }
    })
    .await
    .expect("timed out waiting for state")
}
