//! Channel-scoped event bus
//!
//! One [`DecoderStateBus`] serves one decode channel. It is a
//! single-threaded cooperative dispatcher:
//! [`broadcast()`](DecoderStateBus::broadcast) enqueues the event
//! and, unless a dispatch is already underway, drains the queue
//! synchronously to every subscriber in registration order.
//!
//! A broadcast made *from inside* a listener is legal: it is
//! appended to the queue and delivered by the ongoing drain, after
//! the events already queued. Subscribers therefore observe events
//! in emission order, and re-entrant delivery cannot occur.
//! Subscribing from inside a listener is a programmer error and
//! panics.
//!
//! The bus makes no delivery guarantees across channels; peers on
//! other channels must be reached through their own bus.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::event::{DecoderEvent, SourceId};

type Listener = Box<dyn FnMut(&DecoderEvent)>;

/// Publish/subscribe event bus for one decode channel
///
/// Cloning yields another handle to the same bus, which is how
/// decoder modules and their host share it.
#[derive(Clone, Default)]
pub struct DecoderStateBus {
    core: Rc<BusCore>,
}

#[derive(Default)]
struct BusCore {
    queue: RefCell<VecDeque<DecoderEvent>>,
    listeners: RefCell<Vec<Listener>>,
    dispatching: Cell<bool>,
    next_source: Cell<u32>,
}

impl DecoderStateBus {
    /// New bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity token for an event source
    pub fn register_source(&self) -> SourceId {
        let id = self.core.next_source.get();
        self.core.next_source.set(id + 1);
        SourceId(id)
    }

    /// Subscribe a listener
    ///
    /// Listeners are invoked in registration order, once per event.
    /// Must not be called from inside a listener.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: FnMut(&DecoderEvent) + 'static,
    {
        self.core.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Number of subscribed listeners
    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }

    /// Broadcast an event to every subscriber
    ///
    /// Delivery is synchronous and in FIFO emission order. When
    /// called from inside a listener, the event is queued and
    /// delivered by the dispatch already in progress.
    pub fn broadcast(&self, event: DecoderEvent) {
        self.core.queue.borrow_mut().push_back(event);
        if !self.core.dispatching.get() {
            self.dispatch();
        }
    }

    fn dispatch(&self) {
        self.core.dispatching.set(true);
        loop {
            let event = self.core.queue.borrow_mut().pop_front();
            let Some(event) = event else {
                break;
            };
            let mut listeners = self.core.listeners.borrow_mut();
            for listener in listeners.iter_mut() {
                listener(&event);
            }
        }
        self.core.dispatching.set(false);
    }
}

impl std::fmt::Debug for DecoderStateBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderStateBus")
            .field("listeners", &self.listener_count())
            .field("dispatching", &self.core.dispatching.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{ChannelState, DecoderStateEvent, StateEventKind};

    fn state_event(bus: &DecoderStateBus, kind: StateEventKind) -> DecoderEvent {
        DecoderEvent::State(DecoderStateEvent::new(
            bus.register_source(),
            kind,
            ChannelState::Idle,
        ))
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = DecoderStateBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            bus.subscribe(move |_| order.borrow_mut().push(tag));
        }

        bus.broadcast(state_event(&bus, StateEventKind::Start));
        assert_eq!(vec!["first", "second", "third"], *order.borrow());
    }

    #[test]
    fn test_nested_broadcast_is_fifo() {
        let bus = DecoderStateBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        // the first listener re-broadcasts once in response to Start
        let rebroadcast = bus.clone();
        let relay_source = bus.register_source();
        bus.subscribe(move |event| {
            if let DecoderEvent::State(state) = event {
                if state.kind == StateEventKind::Start && state.source != relay_source {
                    rebroadcast.broadcast(DecoderEvent::State(DecoderStateEvent::new(
                        relay_source,
                        StateEventKind::Start,
                        ChannelState::Idle,
                    )));
                }
            }
        });

        let log = Rc::clone(&seen);
        bus.subscribe(move |event| {
            if let DecoderEvent::State(state) = event {
                log.borrow_mut().push(state.source);
            }
        });

        let origin = bus.register_source();
        bus.broadcast(DecoderEvent::State(DecoderStateEvent::new(
            origin,
            StateEventKind::Start,
            ChannelState::Idle,
        )));

        // the nested broadcast arrives after the original event
        assert_eq!(vec![origin, relay_source], *seen.borrow());
    }

    #[test]
    fn test_source_ids_are_unique() {
        let bus = DecoderStateBus::new();
        let a = bus.register_source();
        let b = bus.register_source();
        assert_ne!(a, b);
    }
}
