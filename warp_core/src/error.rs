use thiserror::Error;

use crate::jid::Jid;

/// Top-level error surfaced to a [`crate::client::Client`] caller. Wraps the
/// narrower errors from the codec/signal/appstate crates and the disjoint
/// connection-lifecycle failure kinds a caller needs to branch on.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection lost (keep-alive threshold exceeded)")]
    ConnectionLost,
    #[error("operation timed out")]
    TimedOut,
    #[error("logged out by the server")]
    LoggedOut,
    #[error("device is not paired")]
    Unpaired,
    #[error("multi-device mismatch")]
    MultideviceMismatch,
    #[error("server rejected the request as forbidden")]
    Forbidden,
    #[error("signal session could not be established: {0}")]
    BadSession(#[source] warp_core_libsignal::SignalError),
    #[error("pre-key operation failed: {0}")]
    PreKeyError(String),
    #[error("stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    AppState(#[from] warp_core_appstate::AppStateError),
    #[error("media operation failed: {0}")]
    MediaError(String),
    #[error(transparent)]
    BinaryNode(#[from] warp_core_binary::BinaryNodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no route to {0}")]
    NoRoute(Jid),
}

impl ClientError {
    /// Matches the wire `statusCode` attribute carried by `stream:error` and
    /// `failure` stanzas where one applies.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::LoggedOut => Some(401),
            Self::Forbidden => Some(403),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to connect transport: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("invalid websocket request: {0}")]
    InvalidRequest(#[from] http::Error),
    #[error("invalid framed payload: {0}")]
    InvalidFrame(&'static str),
    #[error("payload exceeds max 24-bit frame size")]
    FrameTooLarge,
    #[error("transport closed by peer")]
    Closed,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("handshake proto decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("handshake proto encode failed: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("missing handshake field: {0}")]
    MissingField(&'static str),
    #[error("static key signature verification failed")]
    InvalidCertificate,
}

pub type Result<T> = std::result::Result<T, ClientError>;
