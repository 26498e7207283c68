//! In-process bus backend.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bus_session_core::{
    BusEvent, BusObject, BusTransport, EventStore, EventStream, MethodCall, MethodError, SessionId,
    SessionOpts, SessionPort, TransportError, TransportMask,
};
use serde_json::Value;
use uuid::Uuid;

struct AdvertisedService {
    owner: String,
    port: SessionPort,
    objects: HashMap<String, Arc<dyn BusObject>>,
}

#[derive(Default)]
struct State {
    unavailable: bool,
    fail_find: bool,
    join_delay: Option<Duration>,
    unique_name: Option<String>,
    find_prefixes: HashSet<String>,
    services: HashMap<String, AdvertisedService>,
    sessions: HashMap<SessionId, String>,
}

/// In-memory bus implementation.
///
/// Useful for development and tests. Services advertised here live in the
/// same process and method calls dispatch straight to their objects.
pub struct MemoryBus {
    guid: Uuid,
    state: RwLock<State>,
    events: EventStore,
    next_session: AtomicU32,
    next_connection: AtomicU32,
    joins: AtomicUsize,
}

impl MemoryBus {
    /// Create a new in-memory bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            guid: Uuid::new_v4(),
            state: RwLock::new(State::default()),
            events: EventStore::new(),
            next_session: AtomicU32::new(1),
            next_connection: AtomicU32::new(1),
            joins: AtomicUsize::new(0),
        }
    }

    /// Bus GUID. Unique connection names are derived from it.
    #[must_use]
    pub const fn guid(&self) -> Uuid {
        self.guid
    }

    /// Make `connect` fail as if no bus were reachable.
    pub fn set_available(&self, available: bool) {
        self.state_mut().unavailable = !available;
    }

    /// Make `find_advertised_name` fail.
    pub fn fail_find(&self, fail: bool) {
        self.state_mut().fail_find = fail;
    }

    /// Delay every join by `delay` before it is answered.
    pub fn set_join_delay(&self, delay: Option<Duration>) {
        self.state_mut().join_delay = delay;
    }

    /// Number of join attempts received so far.
    #[must_use]
    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    /// Number of sessions currently joined.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    /// Whether a find request for `name_prefix` is registered.
    #[must_use]
    pub fn is_finding(&self, name_prefix: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .find_prefixes
            .contains(name_prefix)
    }

    /// Advertise `name` with an object at `object_path`.
    ///
    /// Advertising an already known name adds the object to it.
    ///
    /// # Errors
    /// Returns error if the bus state is poisoned.
    pub fn advertise(
        &self,
        name: &str,
        port: SessionPort,
        object_path: &str,
        object: Arc<dyn BusObject>,
    ) -> Result<(), TransportError> {
        let mut events = Vec::new();
        {
            let mut state = self.write()?;
            if let Some(service) = state.services.get_mut(name) {
                service.objects.insert(object_path.to_string(), object);
            } else {
                let owner = self.next_unique_name();
                state.services.insert(
                    name.to_string(),
                    AdvertisedService {
                        owner: owner.clone(),
                        port,
                        objects: HashMap::from([(object_path.to_string(), object)]),
                    },
                );
                events.push(BusEvent::NameOwnerChanged {
                    bus_name: name.to_string(),
                    previous_owner: None,
                    new_owner: Some(owner),
                });
                events.extend(matching(&state.find_prefixes, name).map(|prefix| {
                    BusEvent::FoundAdvertisedName {
                        name: name.to_string(),
                        transport: TransportMask::LOCAL,
                        name_prefix: prefix,
                    }
                }));
            }
        }

        tracing::debug!(name, %port, object_path, "Advertised name");
        for event in events {
            self.events.push(event);
        }
        Ok(())
    }

    /// Stop advertising `name`. Sessions joined to it are lost.
    ///
    /// Returns whether the name was advertised.
    ///
    /// # Errors
    /// Returns error if the bus state is poisoned.
    pub fn withdraw(&self, name: &str) -> Result<bool, TransportError> {
        let mut events = Vec::new();
        {
            let mut state = self.write()?;
            let Some(service) = state.services.remove(name) else {
                return Ok(false);
            };

            events.extend(matching(&state.find_prefixes, name).map(|prefix| {
                BusEvent::LostAdvertisedName {
                    name: name.to_string(),
                    transport: TransportMask::LOCAL,
                    name_prefix: prefix,
                }
            }));

            let lost: Vec<SessionId> = state
                .sessions
                .iter()
                .filter(|(_, joined)| joined.as_str() == name)
                .map(|(id, _)| *id)
                .collect();
            for id in lost {
                state.sessions.remove(&id);
                events.push(BusEvent::SessionLost {
                    session_id: id,
                    reason: "remote end left".to_string(),
                });
            }

            events.push(BusEvent::NameOwnerChanged {
                bus_name: name.to_string(),
                previous_owner: Some(service.owner),
                new_owner: None,
            });
        }

        tracing::debug!(name, "Withdrew name");
        for event in events {
            self.events.push(event);
        }
        Ok(true)
    }

    fn next_unique_name(&self) -> String {
        let guid = self.guid.simple().to_string();
        let n = self.next_connection.fetch_add(1, Ordering::SeqCst);
        format!(":{}.{n}", &guid[..8])
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, TransportError> {
        self.state
            .read()
            .map_err(|e| TransportError::Internal(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, TransportError> {
        self.state
            .write()
            .map_err(|e| TransportError::Internal(e.to_string()))
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

fn matching<'a>(prefixes: &'a HashSet<String>, name: &'a str) -> impl Iterator<Item = String> + 'a {
    prefixes
        .iter()
        .filter(move |prefix| name.starts_with(prefix.as_str()))
        .cloned()
}

#[async_trait]
impl BusTransport for MemoryBus {
    async fn connect(&self, app_name: &str) -> Result<String, TransportError> {
        let mut state = self.write()?;
        if state.unavailable {
            return Err(TransportError::Unavailable(
                "no bus reachable from this process".to_string(),
            ));
        }
        if let Some(existing) = &state.unique_name {
            return Err(TransportError::AlreadyConnected(existing.clone()));
        }

        let unique_name = self.next_unique_name();
        tracing::debug!(app_name, %unique_name, "Endpoint connected");
        state.unique_name = Some(unique_name.clone());
        Ok(unique_name)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.write()?;
        if state.unique_name.take().is_none() {
            return Err(TransportError::NotConnected);
        }
        state.sessions.clear();
        state.find_prefixes.clear();
        Ok(())
    }

    async fn find_advertised_name(&self, name_prefix: &str) -> Result<(), TransportError> {
        let found: Vec<BusEvent> = {
            let mut state = self.write()?;
            if state.unique_name.is_none() {
                return Err(TransportError::NotConnected);
            }
            if state.fail_find {
                return Err(TransportError::FindFailed {
                    prefix: name_prefix.to_string(),
                    reason: "refused by bus".to_string(),
                });
            }
            state.find_prefixes.insert(name_prefix.to_string());
            state
                .services
                .keys()
                .filter(|name| name.starts_with(name_prefix))
                .map(|name| BusEvent::FoundAdvertisedName {
                    name: name.clone(),
                    transport: TransportMask::LOCAL,
                    name_prefix: name_prefix.to_string(),
                })
                .collect()
        };

        for event in found {
            self.events.push(event);
        }
        Ok(())
    }

    async fn cancel_find_advertised_name(&self, name_prefix: &str) -> Result<(), TransportError> {
        self.write()?.find_prefixes.remove(name_prefix);
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        self.events.history_plus_stream()
    }

    async fn join_session(
        &self,
        name: &str,
        port: SessionPort,
        opts: &SessionOpts,
    ) -> Result<(SessionId, SessionOpts), TransportError> {
        self.joins.fetch_add(1, Ordering::SeqCst);

        let (endpoint, delay) = {
            let state = self.read()?;
            let endpoint = state
                .unique_name
                .clone()
                .ok_or(TransportError::NotConnected)?;
            (endpoint, state.join_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.write()?;
        // The endpoint may have gone away, or been replaced, during the delay.
        if state.unique_name.as_ref() != Some(&endpoint) {
            return Err(TransportError::NotConnected);
        }
        let service_port = state
            .services
            .get(name)
            .map(|service| service.port)
            .ok_or_else(|| TransportError::JoinFailed {
                name: name.to_string(),
                reason: "no such advertised name".to_string(),
            })?;
        if service_port != port {
            return Err(TransportError::JoinFailed {
                name: name.to_string(),
                reason: format!("no session port {port}"),
            });
        }

        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        state.sessions.insert(id, name.to_string());
        Ok((id, opts.clone()))
    }

    async fn leave_session(&self, id: SessionId) -> Result<(), TransportError> {
        self.write()?
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(TransportError::NoSuchSession(id))
    }

    async fn method_call(&self, call: MethodCall) -> Result<Value, TransportError> {
        let object = {
            let state = self.read()?;
            if state.unique_name.is_none() {
                return Err(TransportError::NotConnected);
            }
            if state.sessions.get(&call.session) != Some(&call.destination) {
                return Err(TransportError::NoSuchSession(call.session));
            }
            state
                .services
                .get(&call.destination)
                .and_then(|service| service.objects.get(&call.object_path))
                .cloned()
                .ok_or_else(|| TransportError::NoSuchObject {
                    destination: call.destination.clone(),
                    path: call.object_path.clone(),
                })?
        };

        if object.interface().name != call.interface {
            let member = format!("{}.{}", call.interface, call.member);
            return Err(MethodError::UnknownMember(member).into());
        }

        Ok(object.call(&call.member, call.args).await?)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::testing::EchoObject;

    const NAME: &str = "com.example.echo";

    async fn connected_bus() -> MemoryBus {
        let bus = MemoryBus::new();
        assert_ok!(bus.connect("test").await);
        bus
    }

    #[tokio::test]
    async fn test_connect_unavailable() {
        let bus = MemoryBus::new();
        bus.set_available(false);
        assert!(matches!(
            bus.connect("test").await,
            Err(TransportError::Unavailable(_))
        ));

        bus.set_available(true);
        let unique = assert_ok!(bus.connect("test").await);
        assert!(unique.starts_with(':'));
        assert!(matches!(
            bus.connect("test").await,
            Err(TransportError::AlreadyConnected(name)) if name == unique
        ));
    }

    #[tokio::test]
    async fn test_find_replays_existing_advertisement() {
        let bus = connected_bus().await;
        assert_ok!(bus.advertise(NAME, SessionPort(42), "/echo", Arc::new(EchoObject::new())));
        assert_ok!(bus.find_advertised_name("com.example").await);

        let found: Vec<BusEvent> = bus
            .subscribe()
            .filter(|e| futures::future::ready(matches!(e, BusEvent::FoundAdvertisedName { .. })))
            .take(1)
            .collect()
            .await;
        assert_eq!(
            found,
            vec![BusEvent::FoundAdvertisedName {
                name: NAME.to_string(),
                transport: TransportMask::LOCAL,
                name_prefix: "com.example".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_join_checks_name_and_port() {
        let bus = connected_bus().await;
        assert_ok!(bus.advertise(NAME, SessionPort(42), "/echo", Arc::new(EchoObject::new())));

        let opts = SessionOpts::default();
        assert_err!(bus.join_session("com.example.other", SessionPort(42), &opts).await);
        assert_err!(bus.join_session(NAME, SessionPort(7), &opts).await);

        let (id, negotiated) = assert_ok!(bus.join_session(NAME, SessionPort(42), &opts).await);
        assert_eq!(negotiated, opts);
        assert_eq!(bus.join_count(), 3);
        assert_eq!(bus.session_count(), 1);

        assert_ok!(bus.leave_session(id).await);
        assert!(matches!(
            bus.leave_session(id).await,
            Err(TransportError::NoSuchSession(_))
        ));
    }

    #[tokio::test]
    async fn test_join_fails_if_endpoint_leaves_during_delay() {
        let bus = Arc::new(connected_bus().await);
        assert_ok!(bus.advertise(NAME, SessionPort(42), "/echo", Arc::new(EchoObject::new())));
        bus.set_join_delay(Some(Duration::from_millis(50)));

        let joining = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                bus.join_session(NAME, SessionPort(42), &SessionOpts::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_ok!(bus.disconnect().await);
        assert_ok!(bus.connect("test").await);

        assert!(matches!(
            assert_ok!(joining.await),
            Err(TransportError::NotConnected)
        ));
        assert_eq!(bus.session_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_find() {
        let bus = connected_bus().await;
        assert_ok!(bus.find_advertised_name("com.example").await);
        assert!(bus.is_finding("com.example"));

        assert_ok!(bus.cancel_find_advertised_name("com.example").await);
        assert!(!bus.is_finding("com.example"));
    }

    #[tokio::test]
    async fn test_method_call_dispatch() {
        let bus = connected_bus().await;
        let object = Arc::new(EchoObject::new());
        let interface = object.interface().name.clone();
        assert_ok!(bus.advertise(NAME, SessionPort(42), "/echo", object));
        let (id, _) = assert_ok!(
            bus.join_session(NAME, SessionPort(42), &SessionOpts::default())
                .await
        );

        let call = |path: &str, member: &str| MethodCall {
            session: id,
            destination: NAME.to_string(),
            object_path: path.to_string(),
            interface: interface.clone(),
            member: member.to_string(),
            args: json!(["hi"]),
        };

        assert_eq!(assert_ok!(bus.method_call(call("/echo", "Echo")).await), json!("hi"));
        assert!(matches!(
            bus.method_call(call("/missing", "Echo")).await,
            Err(TransportError::NoSuchObject { .. })
        ));
        assert!(matches!(
            bus.method_call(call("/echo", "Nope")).await,
            Err(TransportError::Method(MethodError::UnknownMember(_)))
        ));

        let mut stale = call("/echo", "Echo");
        stale.session = SessionId(999);
        assert!(matches!(
            bus.method_call(stale).await,
            Err(TransportError::NoSuchSession(SessionId(999)))
        ));
    }

    #[tokio::test]
    async fn test_withdraw_loses_sessions() {
        let bus = connected_bus().await;
        assert_ok!(bus.find_advertised_name("com.example").await);
        assert_ok!(bus.advertise(NAME, SessionPort(42), "/echo", Arc::new(EchoObject::new())));
        let (id, _) = assert_ok!(
            bus.join_session(NAME, SessionPort(42), &SessionOpts::default())
                .await
        );

        assert!(assert_ok!(bus.withdraw(NAME)));
        assert!(!assert_ok!(bus.withdraw(NAME)));
        assert_eq!(bus.session_count(), 0);

        let history = bus.events.get_history();
        assert!(history.contains(&BusEvent::SessionLost {
            session_id: id,
            reason: "remote end left".to_string(),
        }));
        assert!(history.iter().any(|e| matches!(
            e,
            BusEvent::LostAdvertisedName { name, .. } if name == NAME
        )));
    }
}
