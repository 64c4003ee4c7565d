use thiserror::Error;

/// Result type for WLED operations
pub type Result<T> = std::result::Result<T, WledError>;

/// Errors that can occur when talking to a WLED device
#[derive(Error, Debug)]
pub enum WledError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connect or disconnect called in the wrong connection state
    #[error("Invalid connection state: {0}")]
    ConnectionState(String),

    /// A command was sent without a live connection
    #[error("Client is not connected")]
    NotConnected,

    /// The connection dropped before the device reported info and state
    #[error("Connection closed")]
    ConnectionClosed,

    /// The device did not report info and state in time
    #[error("Timed out waiting for the device to report info and state")]
    Timeout,

    /// A builder limit was reached
    #[error("Capacity exceeded: cannot add more than {limit} segments")]
    CapacityExceeded {
        /// Maximum number of segments the device supports
        limit: u32,
    },

    /// A segment setter was called before any segment was added
    #[error("No segments have been added")]
    NoSegment,

    /// Input outside the accepted range that cannot be clamped
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation needs device info that has not been received yet
    #[error("Client is not connected or the info has not been received yet")]
    InfoUnavailable,

    /// The operation needs device state that has not been received yet
    #[error("Client is not connected or the state has not been received yet")]
    StateUnavailable,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error from the liveness probe
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid or unexpected response from a device
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Event channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}
