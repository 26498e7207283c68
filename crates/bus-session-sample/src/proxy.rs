//! Typed client proxy for the sample interface.

use bus_session_client::{BusSessionClient, RemoteCallError, RemoteServiceHandle, Session};

use crate::contract::{CONCATENATE, FIBONACCI, PI, PING, sample_interface};

/// Sample interface proxy.
///
/// Clone it to call from several tasks at once; each call is independent.
#[derive(Debug, Clone)]
pub struct SampleProxy {
    handle: RemoteServiceHandle,
}

impl SampleProxy {
    /// Wrap an existing handle bound to the sample interface.
    #[must_use]
    pub const fn new(handle: RemoteServiceHandle) -> Self {
        Self { handle }
    }

    /// Bind the sample interface over `session`.
    #[must_use]
    pub fn bind(client: &BusSessionClient, session: &Session) -> Self {
        Self::new(client.bind_interface(session, sample_interface()))
    }

    #[must_use]
    pub const fn handle(&self) -> &RemoteServiceHandle {
        &self.handle
    }

    /// Echo `text` back.
    ///
    /// # Errors
    /// Returns error if the remote call fails.
    pub async fn ping(&self, text: &str) -> Result<String, RemoteCallError> {
        self.handle.call(PING, (text,)).await
    }

    /// Concatenate two strings remotely.
    ///
    /// # Errors
    /// Returns error if the remote call fails.
    pub async fn concatenate(&self, head: &str, tail: &str) -> Result<String, RemoteCallError> {
        self.handle.call(CONCATENATE, (head, tail)).await
    }

    /// `n`-th Fibonacci number, `F(0) = 0`.
    ///
    /// # Errors
    /// Returns error if the remote call fails or `n` is out of range.
    pub async fn fibonacci(&self, n: i32) -> Result<u64, RemoteCallError> {
        self.handle.call(FIBONACCI, (n,)).await
    }

    /// Approximate pi with `iterations` series terms.
    ///
    /// Long-running; there is no way to cancel it once sent.
    ///
    /// # Errors
    /// Returns error if the remote call fails.
    pub async fn pi(&self, iterations: u64) -> Result<f64, RemoteCallError> {
        self.handle.call(PI, (iterations,)).await
    }
}
