//! Session client for a message bus.
//!
//! Provides:
//! - `BusSessionClient` - Connect, discover, join and call sequencing
//! - `RemoteServiceHandle` - Proxy bound to a session and an interface
//! - `JoinGate` - Single-acquire gate guarding session joins
//! - Bus backends (memory)

pub mod bus;
pub mod client;
pub mod error;
pub mod gate;
pub mod handle;
pub mod session;

pub use client::{BusSessionClient, JoinOutcome};
pub use error::{ConnectError, DiscoverError, RemoteCallError, TimeoutError};
pub use gate::{JoinGate, JoinGateGuard};
pub use handle::RemoteServiceHandle;
pub use session::Session;

#[cfg(test)]
pub(crate) mod testing;
