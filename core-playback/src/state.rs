//! Observable playback and retry state.

use crate::error::PlaybackError;
use std::time::Duration;

/// The playback state machine's observable state.
///
/// Every variant that refers to an episode carries the position and
/// duration so observers never need a second lookup. Position is always
/// within `[0, duration]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// No episode loaded.
    Idle,
    /// Actively playing; position advances on each tick.
    Playing {
        episode_id: String,
        position: Duration,
        duration: Duration,
    },
    /// Paused at a position; the ticker is stopped.
    Paused {
        episode_id: String,
        position: Duration,
        duration: Duration,
    },
    /// Played through to the end; position equals duration.
    Finished {
        episode_id: String,
        duration: Duration,
    },
    /// Playback failed. The last known position is preserved so a retry
    /// or manual restart can resume from it.
    Failed {
        episode_id: Option<String>,
        position: Duration,
        duration: Duration,
        error: PlaybackError,
    },
}

impl PlaybackState {
    /// Returns `true` while the ticker should be running.
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }

    /// Current position, where one is meaningful.
    pub fn position(&self) -> Option<Duration> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Playing { position, .. } | PlaybackState::Paused { position, .. } => {
                Some(*position)
            }
            PlaybackState::Finished { duration, .. } => Some(*duration),
            PlaybackState::Failed { position, .. } => Some(*position),
        }
    }

    /// The episode this state refers to, if any.
    pub fn episode_id(&self) -> Option<&str> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Playing { episode_id, .. }
            | PlaybackState::Paused { episode_id, .. }
            | PlaybackState::Finished { episode_id, .. } => Some(episode_id),
            PlaybackState::Failed { episode_id, .. } => episode_id.as_deref(),
        }
    }
}

/// Observable state of the streaming-error retry engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    /// No recovery in progress.
    #[default]
    Idle,
    /// A retry attempt is scheduled or executing. Attempts start at 1.
    Retrying { attempt: u32 },
    /// Retries were exhausted or the error was not retryable.
    Failed,
}
