//! Bus session client for reaching a remote service.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use bus_session_core::{
    BusEvent, BusTransport, ClientConfig, EventStream, InterfaceContract, SessionId,
    TransportError,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    ConnectError, DiscoverError, JoinGate, RemoteCallError, RemoteServiceHandle, Session,
    TimeoutError,
};

/// Result of handling one advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Another join attempt holds the gate.
    GateBusy,
    /// A session is already established; nothing was done.
    AlreadyConnected,
    /// A new session was joined.
    Joined(SessionId),
    /// The join completed after the endpoint disconnected; the session was
    /// left again.
    Abandoned(SessionId),
    /// The bus refused the join.
    Failed,
}

/// Active name discovery.
struct Discovery {
    name: String,
    listener: JoinHandle<()>,
}

/// Bus session client.
///
/// Sequences connect, discover, join and call against a [`BusTransport`].
/// At most one session is joined at a time; concurrent advertisements race
/// on the client's [`JoinGate`] and only the winner joins.
pub struct BusSessionClient {
    transport: Arc<dyn BusTransport>,
    config: ClientConfig,
    gate: JoinGate,
    session_tx: watch::Sender<Option<Session>>,
    unique_name: Mutex<Option<String>>,
    discovery: Mutex<Option<Discovery>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BusSessionClient {
    /// Create a new client over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn BusTransport>, config: ClientConfig) -> Arc<Self> {
        let (session_tx, _) = watch::channel(None);
        Arc::new(Self {
            transport,
            config,
            gate: JoinGate::new(),
            session_tx,
            unique_name: Mutex::new(None),
            discovery: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Unique connection name, once connected.
    #[must_use]
    pub fn unique_name(&self) -> Option<String> {
        lock(&self.unique_name).clone()
    }

    /// The current session, if one is joined.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session_tx.borrow().clone()
    }

    /// Whether a connected session exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session_tx
            .borrow()
            .as_ref()
            .is_some_and(Session::is_connected)
    }

    /// Establish the local bus endpoint.
    ///
    /// # Errors
    /// Returns error if the transport is unavailable or the client is already
    /// connected.
    pub async fn connect(&self, app_name: &str) -> Result<(), ConnectError> {
        if let Some(existing) = self.unique_name() {
            return Err(ConnectError::AlreadyConnected(existing));
        }

        let unique_name = self.transport.connect(app_name).await.inspect_err(|e| {
            tracing::error!(app_name, "Bus connect failed: {e}");
        })?;
        tracing::info!(
            app_name,
            %unique_name,
            address = self.config.bus_address_display(),
            "Bus connect successful"
        );
        *lock(&self.unique_name) = Some(unique_name);
        Ok(())
    }

    /// Ask to be notified when a service advertising `service_name` appears.
    ///
    /// Registers a listener that joins a session on the first matching
    /// advertisement, unless one is already established. A second call
    /// replaces the previous listener.
    ///
    /// # Errors
    /// Returns error if the client is not connected or the bus refuses the
    /// discovery request.
    pub async fn discover(self: &Arc<Self>, service_name: &str) -> Result<(), DiscoverError> {
        if self.unique_name().is_none() {
            return Err(DiscoverError::NotConnected);
        }

        // Subscribed before the find so no advertisement it triggers is missed.
        let events = self.transport.subscribe();

        if let Err(e) = self.transport.find_advertised_name(service_name).await {
            tracing::error!(name = service_name, "Find advertised name failed: {e}");
            return Err(e.into());
        }
        tracing::info!(name = service_name, "Find advertised name successful");

        let listener = tokio::spawn(listen(
            Arc::downgrade(self),
            service_name.to_string(),
            events,
        ));
        let previous = lock(&self.discovery).replace(Discovery {
            name: service_name.to_string(),
            listener,
        });
        if let Some(previous) = previous {
            previous.listener.abort();
            if previous.name != service_name {
                if let Err(e) = self
                    .transport
                    .cancel_find_advertised_name(&previous.name)
                    .await
                {
                    tracing::debug!(
                        name = %previous.name,
                        "Cancel find advertised name failed: {e}"
                    );
                }
            }
        }
        Ok(())
    }

    /// Join callback for a found advertisement.
    ///
    /// Only one caller at a time gets past the gate; the others return
    /// [`JoinOutcome::GateBusy`]. The gate is released on every path.
    pub async fn on_found_advertised_name(&self, name: &str) -> JoinOutcome {
        let Some(_guard) = self.gate.try_acquire() else {
            tracing::debug!(name, "Join already in progress");
            return JoinOutcome::GateBusy;
        };

        if self.is_connected() {
            return JoinOutcome::AlreadyConnected;
        }
        let Some(endpoint) = self.unique_name() else {
            tracing::debug!(name, "Not connected, ignoring advertisement");
            return JoinOutcome::Failed;
        };

        match self
            .transport
            .join_session(name, self.config.contact_port, &self.config.session_opts)
            .await
        {
            Ok((id, opts)) => {
                let session = Session::new(id, name, self.config.contact_port, opts);
                // Publish only into the connection the join was made on.
                let published = {
                    let current = lock(&self.unique_name);
                    if current.as_deref() == Some(endpoint.as_str()) {
                        self.session_tx.send_replace(Some(session));
                        true
                    } else {
                        false
                    }
                };
                if published {
                    tracing::info!(session = %id, name, "Joined session");
                    return JoinOutcome::Joined(id);
                }

                tracing::warn!(session = %id, name, "Endpoint disconnected during join");
                if let Err(e) = self.transport.leave_session(id).await {
                    tracing::debug!(session = %id, "Leave session failed: {e}");
                }
                JoinOutcome::Abandoned(id)
            }
            Err(e) => {
                tracing::warn!(name, port = %self.config.contact_port, "Join session failed: {e}");
                JoinOutcome::Failed
            }
        }
    }

    fn on_session_lost(&self, session_id: SessionId, reason: &str) {
        let lost = self.session_tx.send_if_modified(|current| {
            if current.as_ref().is_some_and(|s| s.id() == session_id) {
                if let Some(session) = current.take() {
                    session.mark_disconnected();
                }
                true
            } else {
                false
            }
        });
        if lost {
            tracing::warn!(session = %session_id, reason, "Session lost");
        }
    }

    /// Wait until a session is joined, at most `timeout`.
    ///
    /// Returns at once if a session is already established.
    ///
    /// # Errors
    /// Returns error if no session was joined in time.
    pub async fn await_session(&self, timeout: Duration) -> Result<Session, TimeoutError> {
        let mut rx = self.session_tx.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| s.as_ref().is_some_and(Session::is_connected)),
        )
        .await;

        match waited {
            Ok(Ok(session)) => session.clone().ok_or(TimeoutError::Closed),
            Ok(Err(_)) => Err(TimeoutError::Closed),
            Err(_) => Err(TimeoutError::Elapsed(timeout)),
        }
    }

    /// Build a proxy for `contract` over an established session.
    #[must_use]
    pub fn bind_interface(
        &self,
        session: &Session,
        contract: InterfaceContract,
    ) -> RemoteServiceHandle {
        RemoteServiceHandle::new(
            Arc::clone(&self.transport),
            session.clone(),
            self.config.object_path.clone(),
            contract,
        )
    }

    /// Invoke `operation` on `handle`, logging failures.
    ///
    /// # Errors
    /// Returns the call's error; the session stays valid.
    pub async fn invoke(
        &self,
        handle: &RemoteServiceHandle,
        operation: &str,
        args: Value,
    ) -> Result<Value, RemoteCallError> {
        handle.invoke(operation, args).await.inspect_err(|e| {
            tracing::warn!(
                session = %handle.session().id(),
                operation,
                "Remote call failed: {e}"
            );
        })
    }

    /// Leave the session, stop discovery and close the endpoint.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    /// Returns error if the transport fails to disconnect.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        let discovery = lock(&self.discovery).take();
        if let Some(discovery) = discovery {
            discovery.listener.abort();
            if let Err(e) = self
                .transport
                .cancel_find_advertised_name(&discovery.name)
                .await
            {
                tracing::debug!(name = %discovery.name, "Cancel find advertised name failed: {e}");
            }
        }

        // Cleared before the session so an in-flight join cannot publish after.
        let unique_name = lock(&self.unique_name).take();

        if let Some(session) = self.session_tx.send_replace(None) {
            session.mark_disconnected();
            if let Err(e) = self.transport.leave_session(session.id()).await {
                tracing::debug!(session = %session.id(), "Leave session failed: {e}");
            }
        }

        if let Some(unique_name) = unique_name {
            self.transport.disconnect().await?;
            tracing::info!(%unique_name, "Bus disconnected");
        }
        Ok(())
    }
}

impl Drop for BusSessionClient {
    fn drop(&mut self) {
        let discovery = self
            .discovery
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(discovery) = discovery {
            discovery.listener.abort();
        }
    }
}

/// Listener task for one discovery request.
async fn listen(client: Weak<BusSessionClient>, service_name: String, mut events: EventStream) {
    while let Some(event) = events.next().await {
        let Some(client) = client.upgrade() else {
            break;
        };

        match event {
            BusEvent::FoundAdvertisedName {
                name,
                transport,
                name_prefix,
            } if name.starts_with(&service_name) => {
                tracing::info!(
                    %name,
                    transport = transport.0,
                    %name_prefix,
                    "Found advertised name"
                );
                // Each notification races on the gate independently.
                tokio::spawn(async move {
                    client.on_found_advertised_name(&name).await;
                });
            }
            BusEvent::LostAdvertisedName { name, .. } if name.starts_with(&service_name) => {
                tracing::info!(%name, "Lost advertised name");
            }
            BusEvent::NameOwnerChanged {
                bus_name,
                previous_owner,
                new_owner,
            } if bus_name == service_name => {
                tracing::info!(%bus_name, ?previous_owner, ?new_owner, "Name owner changed");
            }
            BusEvent::SessionLost { session_id, reason } => {
                client.on_session_lost(session_id, &reason);
            }
            _ => {}
        }
    }
}
