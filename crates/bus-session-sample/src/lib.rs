//! Sample remote interface for bus session clients.
//!
//! Provides:
//! - `sample_interface` - The contract: Ping, Concatenate, Fibonacci, Pi
//! - `SampleService` - Server-side object implementing it
//! - `SampleProxy` - Typed client proxy over a session

pub mod contract;
pub mod proxy;
pub mod service;

pub use contract::sample_interface;
pub use proxy::SampleProxy;
pub use service::SampleService;
