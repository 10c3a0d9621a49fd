//! Network Monitoring Abstraction
//!
//! Provides the connectivity signal consumed by the playback core's
//! interruption handling.

use crate::error::Result;
use async_trait::async_trait;

/// Network connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    /// Connected to a network.
    Connected,
    /// Not connected to any network.
    Disconnected,
    /// Connection status unknown or indeterminate.
    Unknown,
}

/// Connectivity monitor trait.
///
/// Provides network reachability information so the core can pause
/// streaming playback on loss and schedule an auto-resume on recovery.
///
/// # Platform Support
///
/// - **Desktop**: NetworkManager, SystemConfiguration, Windows Network List Manager
/// - **iOS**: Network framework, Reachability
/// - **Android**: ConnectivityManager
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    /// Get the current connectivity status.
    async fn current_status(&self) -> Result<ConnectivityStatus>;

    /// Check if currently connected to any network.
    async fn is_connected(&self) -> bool {
        matches!(self.current_status().await, Ok(ConnectivityStatus::Connected))
    }

    /// Subscribe to connectivity changes.
    ///
    /// Returns a stream of status updates. Implementations should emit an
    /// event whenever reachability changes; emitting duplicate statuses is
    /// allowed (the core deduplicates).
    async fn subscribe_changes(&self) -> Result<Box<dyn ConnectivityStream>>;
}

/// Stream of connectivity status changes.
#[async_trait]
pub trait ConnectivityStream: Send {
    /// Get the next status update.
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<ConnectivityStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_equality() {
        assert_eq!(ConnectivityStatus::Connected, ConnectivityStatus::Connected);
        assert_ne!(ConnectivityStatus::Connected, ConnectivityStatus::Disconnected);
        assert_ne!(ConnectivityStatus::Unknown, ConnectivityStatus::Disconnected);
    }
}
