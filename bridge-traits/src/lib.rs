//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform
//! (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Media
//! - [`AudioBackend`](audio::AudioBackend) - Transport commands against the host media engine
//! - [`BackendEventStream`](audio::BackendEventStream) - Position/completion/error events from the engine
//!
//! ### Platform Integration
//! - [`ConnectivityMonitor`](network::ConnectivityMonitor) - Network reachability signal
//! - [`PositionStore`](storage::PositionStore) - Per-episode resume position persistence
//!
//! ### Utilities
//! - [`DelayProvider`](time::DelayProvider) - Injectable delay scheduling for deterministic testing
//! - [`TickerSource`](time::TickerSource) - Periodic playback tick source
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Preserve network-fault identity (DNS failure, connection reset, ...) so
//!   the core can classify retryability
//! - Provide actionable error messages
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.
//!
//! ## Examples
//!
//! ### Implementing AudioBackend
//!
//! ```ignore
//! use bridge_traits::audio::{AudioBackend, BackendEventStream, MediaSource};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::time::Duration;
//!
//! pub struct MyAudioBackend {
//!     // handle to the platform media engine
//! }
//!
//! #[async_trait]
//! impl AudioBackend for MyAudioBackend {
//!     async fn load(&self, source: MediaSource) -> Result<Option<Duration>> {
//!         todo!()
//!     }
//!
//!     async fn play(&self) -> Result<()> {
//!         todo!()
//!     }
//!
//!     // ...
//! }
//! ```

pub mod audio;
pub mod error;
pub mod network;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use audio::{AudioBackend, BackendEvent, BackendEventStream, MediaSource};
pub use network::{ConnectivityMonitor, ConnectivityStatus, ConnectivityStream};
pub use storage::{MemoryPositionStore, PositionStore};
pub use time::{
    DelayProvider, IntervalTickerSource, ManualDelay, ManualTickerSource, Ticker, TickerSource,
    TokioDelay,
};
