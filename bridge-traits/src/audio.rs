//! Audio backend abstraction.
//!
//! The playback core drives a platform media engine (AVPlayer, ExoPlayer,
//! a desktop pipeline, ...) exclusively through [`AudioBackend`]. The
//! backend accepts transport commands and reports position, completion and
//! error events back through a [`BackendEventStream`]; the core funnels
//! those events into its single serialized owner rather than letting host
//! callbacks mutate state directly.

use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Source of audio data handed to the backend.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Audio file accessible to the host runtime.
    LocalFile {
        /// Absolute path to the audio file.
        path: PathBuf,
    },

    /// Remote HTTP(S) stream fetched by the host.
    RemoteStream {
        /// Full URL to the audio resource.
        url: String,
        /// HTTP headers to include in the request (e.g., Authorization).
        headers: HashMap<String, String>,
    },

    /// Pre-fetched audio data supplied in memory.
    MemoryBuffer {
        /// Raw encoded audio data.
        data: Bytes,
    },
}

impl MediaSource {
    /// Returns `true` if this source requires network access.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::RemoteStream { .. })
    }

    /// Returns the in-memory size in bytes, if the data is already local.
    pub fn buffered_size(&self) -> Option<usize> {
        match self {
            MediaSource::MemoryBuffer { data } => Some(data.len()),
            _ => None,
        }
    }
}

/// Transport event reported by the backend.
#[derive(Debug)]
pub enum BackendEvent {
    /// Periodic position report from the media engine.
    Position(Duration),
    /// The stream played through to its end.
    Completed,
    /// The backend hit a fault it could not recover from on its own.
    Error(BridgeError),
}

/// Trait for platform audio backends.
///
/// All commands address the currently loaded stream; `load` replaces it.
/// Implementations must be safe to share across async tasks.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Load a media source and prepare it for playback.
    ///
    /// Returns the stream duration when the backend can determine it
    /// up front (local files, containers with a duration header).
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened or the format is
    /// not supported by the host engine.
    async fn load(&self, source: MediaSource) -> Result<Option<Duration>>;

    /// Begin or resume playback of the loaded stream.
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the stream loaded.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position within the loaded stream.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Set the playback rate. The core clamps the value before calling.
    async fn set_rate(&self, rate: f32) -> Result<()>;

    /// Subscribe to transport events.
    ///
    /// Returns a stream of position/completion/error events. The core
    /// consumes exactly one subscription per session.
    async fn subscribe_events(&self) -> Result<Box<dyn BackendEventStream>>;
}

/// Stream of transport events from an [`AudioBackend`].
#[async_trait]
pub trait BackendEventStream: Send {
    /// Get the next backend event.
    ///
    /// Returns `None` when the backend has shut down.
    async fn next(&mut self) -> Option<BackendEvent>;
}
