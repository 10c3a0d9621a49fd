use thiserror::Error;

/// Errors reported by host bridge implementations.
///
/// Audio backends surface transport faults through this type; the core
/// translates them into its own closed error taxonomy at the boundary.
/// Network-fault variants carry enough identity for that translation to
/// classify retryability without inspecting backend-native codes.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The request took too long to complete.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Host resolution failed for the stream URL.
    #[error("DNS resolution failed: {0}")]
    DnsFailure(String),

    /// The remote peer reset the connection mid-stream.
    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    /// No network connection was available when the operation ran.
    #[error("Not connected to a network")]
    NotConnected,

    /// The remote host could not be reached.
    #[error("Cannot connect to host: {0}")]
    HostUnreachable(String),

    /// The stream URL could not be parsed.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// The stream URL points at a domain the backend refuses to resolve.
    #[error("Unrecognized domain: {0}")]
    UnrecognizedDomain(String),

    /// The backend's stream failed in a way it does not consider transient.
    #[error("Stream failed: {0}")]
    StreamFault(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
