//! Typed event hub for consumer notifications.
//!
//! Architecture:
//! - One subscriber list per event kind (enum-indexed slots), invoked in
//!   registration order when `emit()` is called.
//! - At most one registration per (listener, kind) pair; re-subscribing is
//!   a no-op.
//! - Every emitted event is also queued for deferred processing: hosts that
//!   prefer pumping over callbacks drain the queue with `poll()`.
//!
//! Events are fire-and-forget; a callback cannot reach back into the
//! pipeline (it only sees the event value).

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::events::Kinded;

/// Identity of a subscriber, issued by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Per-kind subscriber slots plus a deferred poll queue.
pub struct EventHub<E: Kinded> {
    slots: Vec<Vec<(ListenerId, Callback<E>)>>,
    tx: Sender<E>,
    rx: Receiver<E>,
    next_listener: u64,
}

impl<E: Kinded> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Kinded> EventHub<E> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            slots: (0..E::KINDS).map(|_| Vec::new()).collect(),
            tx,
            rx,
            next_listener: 0,
        }
    }

    /// Issue a new listener identity.
    pub fn listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    /// Register `callback` for one event kind. Returns false (and keeps the
    /// original registration) if this listener already subscribed to the
    /// kind.
    pub fn subscribe<F>(&mut self, listener: ListenerId, kind: impl Into<usize>, callback: F) -> bool
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let slot = &mut self.slots[kind.into()];
        if slot.iter().any(|(id, _)| *id == listener) {
            return false;
        }
        slot.push((listener, Arc::new(callback)));
        true
    }

    /// Drop the (listener, kind) registration. Returns false if absent.
    pub fn unsubscribe(&mut self, listener: ListenerId, kind: impl Into<usize>) -> bool {
        let slot = &mut self.slots[kind.into()];
        let before = slot.len();
        slot.retain(|(id, _)| *id != listener);
        before != slot.len()
    }

    /// Invoke subscribers of the event's kind in registration order, then
    /// queue the event for `poll()`.
    pub fn emit(&self, event: E) {
        for (_, callback) in &self.slots[event.kind_index()] {
            callback(&event);
        }
        let _ = self.tx.send(event);
    }

    /// Drain all events emitted since the last poll.
    pub fn poll(&self) -> Vec<E> {
        self.rx.try_iter().collect()
    }

    pub fn subscriber_count(&self, kind: impl Into<usize>) -> usize {
        self.slots[kind.into()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{ErrorCode, SourceEvent, SourceKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_subscribe_emit_immediate() {
        let mut hub = EventHub::<SourceEvent>::new();
        let listener = hub.listener();
        let counter = Arc::new(AtomicI32::new(0));

        let c = Arc::clone(&counter);
        hub.subscribe(listener, SourceKind::Start, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        hub.emit(SourceEvent::Start);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Different kind, same hub: callback untouched
        hub.emit(SourceEvent::End);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_at_most_once_per_listener_and_kind() {
        let mut hub = EventHub::<SourceEvent>::new();
        let listener = hub.listener();
        let counter = Arc::new(AtomicI32::new(0));

        let c = Arc::clone(&counter);
        assert!(hub.subscribe(listener, SourceKind::Error, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        let c = Arc::clone(&counter);
        assert!(!hub.subscribe(listener, SourceKind::Error, move |_| {
            c.fetch_add(100, Ordering::SeqCst);
        }));

        hub.emit(SourceEvent::Error(ErrorCode::Generic));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(SourceKind::Error), 1);
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut hub = EventHub::<SourceEvent>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let listener = hub.listener();
            let order = Arc::clone(&order);
            hub.subscribe(listener, SourceKind::Play, move |_| {
                order.lock().expect("lock").push(tag);
            });
        }

        hub.emit(SourceEvent::Play);
        assert_eq!(*order.lock().expect("lock"), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_poll_drains_queue() {
        let hub = EventHub::<SourceEvent>::new();
        hub.emit(SourceEvent::Ready);
        hub.emit(SourceEvent::Start);

        assert_eq!(hub.poll(), vec![SourceEvent::Ready, SourceEvent::Start]);
        assert!(hub.poll().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let mut hub = EventHub::<SourceEvent>::new();
        let listener = hub.listener();
        let counter = Arc::new(AtomicI32::new(0));

        let c = Arc::clone(&counter);
        hub.subscribe(listener, SourceKind::Pause, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(hub.unsubscribe(listener, SourceKind::Pause));
        assert!(!hub.unsubscribe(listener, SourceKind::Pause));

        hub.emit(SourceEvent::Pause);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
