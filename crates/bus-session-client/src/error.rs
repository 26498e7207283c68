//! Client error taxonomy.

use std::time::Duration;

use bus_session_core::{MethodError, SessionId, TransportError};
use thiserror::Error;

/// Local endpoint setup failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Client is already connected as {0}")]
    AlreadyConnected(String),
    #[error("Bus connect failed: {0}")]
    Transport(#[from] TransportError),
}

/// Name discovery registration failed.
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("Client is not connected to the bus")]
    NotConnected,
    #[error("Find advertised name failed: {0}")]
    Transport(#[from] TransportError),
}

/// No session was established in time.
#[derive(Debug, Error)]
pub enum TimeoutError {
    #[error("No session established within {0:?}")]
    Elapsed(Duration),
    #[error("Client shut down while waiting for a session")]
    Closed,
}

/// A remote invocation failed.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    #[error("Session {0} is not connected")]
    NotConnected(SessionId),
    #[error("Interface {interface} has no member {member}")]
    UnknownMember { interface: String, member: String },
    #[error("Invalid arguments for {member}: {reason}")]
    InvalidArguments { member: String, reason: String },
    #[error("Remote method failed: {0}")]
    Remote(MethodError),
    #[error("Transport error: {0}")]
    Transport(TransportError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TransportError> for RemoteCallError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Method(e) => Self::Remote(e),
            other => Self::Transport(other),
        }
    }
}
