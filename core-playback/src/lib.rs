//! # Playback Module
//!
//! The playback runtime for a podcast client: a deterministic playback
//! state machine, network-interruption handling with auto-resume, and
//! bounded retry for transient streaming errors.
//!
//! ## Overview
//!
//! This module handles:
//! - Playback state transitions with tick-driven position advancement
//! - Chapter tracking and playback-rate scaling
//! - Pause-on-loss / grace-period auto-resume around connectivity drops
//! - Exponential-backoff retry for transient streaming errors
//!
//! Hosts construct a [`PlaybackSession`](session::PlaybackSession) via
//! [`SessionBuilder`](session::SessionBuilder), injecting their platform
//! [`AudioBackend`](bridge_traits::audio::AudioBackend) and, optionally, a
//! connectivity monitor and a position store.

pub mod config;
pub mod episode;
pub mod error;
pub mod interruption;
pub mod player;
pub mod retry;
pub mod session;
pub mod state;

pub use config::PlayerConfig;
pub use episode::{Chapter, Episode};
pub use error::{PlaybackError, Result};
pub use interruption::InterruptionCoordinator;
pub use player::Player;
pub use retry::{RetryAction, StreamRecovery};
pub use session::{PlaybackSession, SessionBuilder};
pub use state::{PlaybackState, RetryState};
