//! Core traits for bus backends and remote objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{BusEvent, InterfaceContract, SessionId, SessionOpts, SessionPort};

/// Stream of bus notifications handed to a listener.
pub type EventStream = futures::stream::BoxStream<'static, BusEvent>;

/// Error raised by a remote object while handling a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    #[error("Unknown member: {0}")]
    UnknownMember(String),
    #[error("Invalid arguments for {member}: {reason}")]
    InvalidArguments { member: String, reason: String },
    #[error("{name}: {message}")]
    Failed { name: String, message: String },
}

/// Bus backend error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Bus unavailable: {0}")]
    Unavailable(String),
    #[error("Not connected to the bus")]
    NotConnected,
    #[error("Already connected as {0}")]
    AlreadyConnected(String),
    #[error("Find advertised name {prefix} failed: {reason}")]
    FindFailed { prefix: String, reason: String },
    #[error("Join session with {name} failed: {reason}")]
    JoinFailed { name: String, reason: String },
    #[error("No such session: {0}")]
    NoSuchSession(SessionId),
    #[error("No object at {path} on {destination}")]
    NoSuchObject { destination: String, path: String },
    #[error("Method error: {0}")]
    Method(#[from] MethodError),
    #[error("Bus error: {0}")]
    Internal(String),
}

/// A method call addressed to a remote object over a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub session: SessionId,
    /// Bus name of the remote service.
    pub destination: String,
    pub object_path: String,
    pub interface: String,
    pub member: String,
    /// Positional arguments as a JSON array.
    pub args: Value,
}

/// Trait for message bus backends.
///
/// This is the seam to the external bus library: everything behind it
/// (transport selection, marshaling, advertisement) is opaque to clients.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Create the local endpoint. Returns the unique connection name.
    async fn connect(&self, app_name: &str) -> Result<String, TransportError>;

    /// Tear down the local endpoint.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Ask to be notified about services advertising names with this prefix.
    async fn find_advertised_name(&self, name_prefix: &str) -> Result<(), TransportError>;

    /// Stop notifications for a prefix.
    async fn cancel_find_advertised_name(&self, name_prefix: &str) -> Result<(), TransportError>;

    /// Subscribe to bus notifications.
    fn subscribe(&self) -> EventStream;

    /// Join a session hosted by `name` on `port`.
    ///
    /// Returns the session id and the negotiated options.
    async fn join_session(
        &self,
        name: &str,
        port: SessionPort,
        opts: &SessionOpts,
    ) -> Result<(SessionId, SessionOpts), TransportError>;

    /// Leave a joined session.
    async fn leave_session(&self, id: SessionId) -> Result<(), TransportError>;

    /// Invoke a remote method and wait for its reply.
    async fn method_call(&self, call: MethodCall) -> Result<Value, TransportError>;
}

/// Trait for objects a service exposes on the bus.
///
/// Implement this to host an interface behind an object path.
#[async_trait]
pub trait BusObject: Send + Sync {
    /// Interface implemented by this object.
    fn interface(&self) -> &InterfaceContract;

    /// Handle a call to `member` with positional `args`.
    async fn call(&self, member: &str, args: Value) -> Result<Value, MethodError>;
}
