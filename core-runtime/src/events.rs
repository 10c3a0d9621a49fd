//! # Event Bus System
//!
//! Provides an event-driven architecture for the playback core using
//! `tokio::sync::broadcast`. This module enables decoupled communication
//! between the player, the interruption coordinator and the retry engine
//! on one side and host UI layers on the other.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//! - **Subscription Management**: Multiple subscribers can listen independently
//!
//! ## Usage
//!
//! ### Creating an Event Bus
//!
//! ```rust
//! use core_runtime::events::EventBus;
//!
//! let event_bus = EventBus::new(100); // Buffer size of 100 events
//! ```
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, PlaybackEvent};
//!
//! # let event_bus = EventBus::new(100);
//! let event = CoreEvent::Playback(PlaybackEvent::Started {
//!     episode_id: "ep-001".to_string(),
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent};
//! use tokio::sync::broadcast::error::RecvError;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! tokio::spawn(async move {
//!     loop {
//!         match stream.recv().await {
//!             Ok(event) => println!("Received: {:?}", event),
//!             Err(RecvError::Lagged(n)) => {
//!                 eprintln!("Missed {} events", n);
//!             }
//!             Err(RecvError::Closed) => break,
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types of errors:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Subscribers should handle `Lagged` gracefully and treat `Closed` as a signal to exit.
//!
//! ## Thread Safety
//!
//! The event bus is fully thread-safe (`Send + Sync`). It can be safely shared across
//! async tasks using `Arc`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// This value balances memory usage with the ability to handle bursts of events.
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
///
/// This is the main event type published and received through the event bus.
/// It wraps domain-specific event types for different modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback transport events
    Playback(PlaybackEvent),
    /// Connectivity and interruption-handling events
    Network(NetworkEvent),
    /// Streaming-error retry events
    Retry(RetryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Network(e) => e.description(),
            CoreEvent::Retry(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Retry(RetryEvent::Exhausted { .. }) => EventSeverity::Error,
            CoreEvent::Network(NetworkEvent::ConnectionLost { .. }) => EventSeverity::Warning,
            CoreEvent::Retry(RetryEvent::AttemptScheduled { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Network(NetworkEvent::AutoResumed { .. }) => EventSeverity::Info,
            CoreEvent::Retry(RetryEvent::Recovered { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to playback transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Playback started for an episode.
    Started {
        /// The episode being played.
        episode_id: String,
    },
    /// Playback paused.
    Paused {
        /// The episode.
        episode_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Playback resumed after pause.
    Resumed {
        /// The episode.
        episode_id: String,
        /// Position when resumed (milliseconds).
        position_ms: u64,
    },
    /// Playback position changed (tick, seek or backend resync).
    PositionChanged {
        /// The episode.
        episode_id: String,
        /// New position (milliseconds).
        position_ms: u64,
        /// Episode duration (milliseconds).
        duration_ms: u64,
    },
    /// Playback rate changed.
    RateChanged {
        /// The episode.
        episode_id: String,
        /// Effective rate after clamping.
        rate_permille: u32,
    },
    /// Episode finished playing naturally.
    Completed {
        /// The episode that completed.
        episode_id: String,
    },
    /// Playback failed and could not be recovered.
    Failed {
        /// The episode if one was active.
        episode_id: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Whether a manual retry has a chance of succeeding.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::RateChanged { .. } => "Playback rate changed",
            PlaybackEvent::Completed { .. } => "Episode completed",
            PlaybackEvent::Failed { .. } => "Playback failed",
        }
    }
}

// ============================================================================
// Network Events
// ============================================================================

/// Events related to connectivity and interruption handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NetworkEvent {
    /// Connectivity was lost while streaming; playback was paused.
    ConnectionLost {
        /// The episode that was interrupted.
        episode_id: String,
        /// Position at the moment of interruption (milliseconds).
        position_ms: u64,
    },
    /// Connectivity came back; the recovery grace period is running.
    ConnectionRestored {
        /// The episode awaiting auto-resume.
        episode_id: String,
        /// Grace period before resuming (milliseconds).
        grace_period_ms: u64,
    },
    /// The grace period elapsed and playback resumed automatically.
    AutoResumed {
        /// The resumed episode.
        episode_id: String,
        /// Position playback resumed from (milliseconds).
        position_ms: u64,
    },
    /// A pending auto-resume was cancelled.
    AutoResumeCancelled {
        /// The episode whose auto-resume was dropped.
        episode_id: String,
        /// What cancelled it (e.g., "manual_pause", "connection_lost").
        reason: String,
    },
}

impl NetworkEvent {
    fn description(&self) -> &str {
        match self {
            NetworkEvent::ConnectionLost { .. } => "Connection lost, playback paused",
            NetworkEvent::ConnectionRestored { .. } => "Connection restored, resume pending",
            NetworkEvent::AutoResumed { .. } => "Playback auto-resumed",
            NetworkEvent::AutoResumeCancelled { .. } => "Auto-resume cancelled",
        }
    }
}

// ============================================================================
// Retry Events
// ============================================================================

/// Events related to streaming-error recovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RetryEvent {
    /// A retry attempt was scheduled after a transient streaming error.
    AttemptScheduled {
        /// The episode being recovered.
        episode_id: String,
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Backoff delay before the attempt runs (milliseconds).
        delay_ms: u64,
    },
    /// A scheduled retry attempt is now executing.
    AttemptStarted {
        /// The episode being recovered.
        episode_id: String,
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// A retry attempt succeeded and playback recovered.
    Recovered {
        /// The recovered episode.
        episode_id: String,
        /// The attempt that succeeded.
        attempt: u32,
    },
    /// All retry attempts failed.
    Exhausted {
        /// The episode that could not be recovered.
        episode_id: String,
        /// Total attempts made.
        attempts: u32,
        /// The final error message.
        message: String,
    },
    /// In-flight retries were invalidated (stop, new episode, manual action).
    Cancelled {
        /// The episode whose retries were dropped.
        episode_id: String,
    },
}

impl RetryEvent {
    fn description(&self) -> &str {
        match self {
            RetryEvent::AttemptScheduled { .. } => "Retry attempt scheduled",
            RetryEvent::AttemptStarted { .. } => "Retry attempt started",
            RetryEvent::Recovered { .. } => "Playback recovered after retry",
            RetryEvent::Exhausted { .. } => "Retry attempts exhausted",
            RetryEvent::Cancelled { .. } => "Retries cancelled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, PlaybackEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
///
/// // Subscribe to events
/// let mut subscriber1 = event_bus.subscribe();
/// let mut subscriber2 = event_bus.subscribe();
///
/// // Emit an event
/// let event = CoreEvent::Playback(PlaybackEvent::Started {
///     episode_id: "ep-001".to_string(),
/// });
/// event_bus.emit(event).ok();
///
/// // Both subscribers receive the event
/// # tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// This provides a more ergonomic API for consuming events with optional filtering
/// by event type or severity.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe());
///
/// // Filter for retry events only
/// let mut retry_stream = stream.filter(|event| {
///     matches!(event, CoreEvent::Retry(_))
/// });
/// # }
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// This will skip events that don't match the filter and return the next matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            // If no filter, return immediately
            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            // Apply filter
            if filter(&event) {
                return Ok(event);
            }

            // Event didn't match filter, continue to next event
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    // If no filter, return immediately
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    // Apply filter
                    if filter(&event) {
                        return Some(Ok(event));
                    }

                    // Event didn't match filter, continue
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
