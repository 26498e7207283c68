//! Established sessions.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bus_session_core::{SessionId, SessionOpts, SessionPort};

/// Logical connection to a discovered remote service.
///
/// Clones share the connected flag: when the owning client disconnects, every
/// clone (and every handle built from one) observes it.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    remote_name: String,
    port: SessionPort,
    opts: SessionOpts,
    connected: Arc<AtomicBool>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        remote_name: impl Into<String>,
        port: SessionPort,
        opts: SessionOpts,
    ) -> Self {
        Self {
            id,
            remote_name: remote_name.into(),
            port,
            opts,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Bus name of the service this session is joined to.
    #[must_use]
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    #[must_use]
    pub const fn port(&self) -> SessionPort {
        self.port
    }

    /// Options negotiated by the bus.
    #[must_use]
    pub const fn opts(&self) -> &SessionOpts {
        &self.opts
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_connected_flag() {
        let session = Session::new(
            SessionId(7),
            "com.example",
            SessionPort::DEFAULT_CONTACT,
            SessionOpts::default(),
        );
        let clone = session.clone();
        assert!(clone.is_connected());

        session.mark_disconnected();
        assert!(!clone.is_connected());
        assert_eq!(clone.id(), SessionId(7));
        assert_eq!(clone.remote_name(), "com.example");
    }
}
