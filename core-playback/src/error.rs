//! # Playback Error Types
//!
//! Closed error taxonomy for playback operations.
//!
//! Backend-native faults are translated into this taxonomy at the edge
//! (`From<BridgeError>`); retryability is a pure function of the variant
//! and never depends on prior state.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Episode has no playable source. Non-recoverable, never retried.
    #[error("No playable source: {0}")]
    Unavailable(String),

    // ========================================================================
    // Network Faults (retryable)
    // ========================================================================
    /// The stream request took too long to complete.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Host resolution failed for the stream URL.
    #[error("DNS resolution failed: {0}")]
    DnsFailure(String),

    /// The remote peer reset the connection mid-stream.
    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    /// No network connection was available.
    #[error("Not connected to a network")]
    NotConnected,

    /// The remote host could not be reached.
    #[error("Cannot connect to host: {0}")]
    HostUnreachable(String),

    // ========================================================================
    // Request Faults (not retryable)
    // ========================================================================
    /// The stream URL could not be parsed. Retrying cannot fix it.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// The stream URL points at a domain that will never resolve.
    #[error("Unrecognized domain: {0}")]
    UnrecognizedDomain(String),

    // ========================================================================
    // Stream/Adapter Faults
    // ========================================================================
    /// The stream failed in a way the backend does not consider transient.
    #[error("Stream failed: {0}")]
    StreamFailed(String),

    /// Fault reported by the platform adapter outside the closed set above.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the stream can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlaybackError::Timeout(_)
                | PlaybackError::DnsFailure(_)
                | PlaybackError::ConnectionReset(_)
                | PlaybackError::NotConnected
                | PlaybackError::HostUnreachable(_)
        )
    }

    /// Returns `true` if this error is due to network issues, transient or not.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Timeout(_)
                | PlaybackError::DnsFailure(_)
                | PlaybackError::ConnectionReset(_)
                | PlaybackError::NotConnected
                | PlaybackError::HostUnreachable(_)
                | PlaybackError::MalformedUrl(_)
                | PlaybackError::UnrecognizedDomain(_)
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(msg) => PlaybackError::Timeout(msg),
            BridgeError::DnsFailure(msg) => PlaybackError::DnsFailure(msg),
            BridgeError::ConnectionReset(msg) => PlaybackError::ConnectionReset(msg),
            BridgeError::NotConnected => PlaybackError::NotConnected,
            BridgeError::HostUnreachable(msg) => PlaybackError::HostUnreachable(msg),
            BridgeError::MalformedUrl(msg) => PlaybackError::MalformedUrl(msg),
            BridgeError::UnrecognizedDomain(msg) => PlaybackError::UnrecognizedDomain(msg),
            BridgeError::StreamFault(msg) => PlaybackError::StreamFailed(msg),
            other => PlaybackError::Backend(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
