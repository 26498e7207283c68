//! Broadcast + history event store for late subscribers.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::BusEvent;

/// Default number of events kept for replay.
const HISTORY_EVENTS: usize = 1024;

/// Event store with broadcast and history support.
///
/// A listener registered after an advertisement was seen still receives it:
/// subscribers get the history first, then live events.
pub struct EventStore {
    history: RwLock<VecDeque<BusEvent>>,
    capacity: usize,
    sender: broadcast::Sender<BusEvent>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    /// Create a new event store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_EVENTS)
    }

    /// Create a store keeping at most `capacity` events of history.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            history: RwLock::new(VecDeque::with_capacity(capacity.min(32))),
            capacity,
            sender,
        }
    }

    /// Push an event to both live listeners and history.
    pub fn push(&self, event: BusEvent) {
        tracing::trace!(kind = event.kind(), "bus event");

        // Send under the write lock so a concurrent subscriber sees each
        // event exactly once, either in history or live.
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        let _ = self.sender.send(event.clone());
        while history.len() >= self.capacity {
            if history.pop_front().is_none() {
                break;
            }
        }
        if self.capacity > 0 {
            history.push_back(event);
        }
    }

    /// Get a receiver for live events only.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<BusEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Stream that yields history first, then live events.
    ///
    /// Lagged receivers skip the events they missed.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, BusEvent> {
        let (history, rx) = {
            let guard = self.history.read().unwrap_or_else(PoisonError::into_inner);
            (guard.iter().cloned().collect::<Vec<_>>(), self.sender.subscribe())
        };

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move {
            match res {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Bus event listener lagged: {e}");
                    None
                }
            }
        });

        hist.chain(live).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionId, TransportMask};

    fn found(name: &str) -> BusEvent {
        BusEvent::FoundAdvertisedName {
            name: name.to_string(),
            transport: TransportMask::LOCAL,
            name_prefix: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_history_then_live() {
        let store = EventStore::new();
        store.push(found("a"));

        let mut stream = store.history_plus_stream();
        store.push(found("b"));

        assert_eq!(stream.next().await, Some(found("a")));
        assert_eq!(stream.next().await, Some(found("b")));
    }

    #[test]
    fn test_history_is_bounded() {
        let store = EventStore::with_capacity(2);
        for id in 0..5 {
            store.push(BusEvent::SessionLost {
                session_id: SessionId(id),
                reason: "closed".into(),
            });
        }

        let history = store.get_history();
        assert_eq!(history.len(), 2);
        assert!(matches!(
            history[0],
            BusEvent::SessionLost { session_id: SessionId(3), .. }
        ));
    }

    #[tokio::test]
    async fn test_live_receiver_skips_history() {
        let store = EventStore::new();
        store.push(found("old"));

        let mut rx = store.get_receiver();
        store.push(found("new"));

        assert_eq!(tokio_test::assert_ok!(rx.recv().await), found("new"));
    }
}
