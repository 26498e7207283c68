//! Core abstractions for bus session clients.
//!
//! This crate provides the fundamental building blocks:
//! - `BusTransport` - The seam to the external message bus
//! - `BusObject` - Server-side objects reachable through the bus
//! - `BusEvent` - Discovery and session notifications
//! - `EventStore` - Broadcast + history for late listeners
//! - `ClientConfig` - Client settings, optionally read from the environment

pub mod config;
pub mod event;
pub mod event_store;
pub mod traits;
pub mod types;

pub use config::{ClientConfig, ConfigError};
pub use event::BusEvent;
pub use event_store::EventStore;
pub use traits::{BusObject, BusTransport, EventStream, MethodCall, MethodError, TransportError};
pub use types::{
    InterfaceContract, MemberKind, MemberSpec, Proximity, SessionId, SessionOpts, SessionPort,
    TrafficType, TransportMask,
};
