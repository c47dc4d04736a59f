//! # Synchronous Signals
//!
//! Minimal observer lists for same-thread notification. Entities expose a
//! signal for component additions and one for removals; the engine wires its
//! family refresh through them exactly like any other subscriber.
//!
//! Dispatch walks a snapshot of the subscriber list taken on entry, so a
//! subscriber connecting or disconnecting mid-dispatch only affects the next
//! dispatch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

type Subscriber<T> = Rc<RefCell<dyn FnMut(&T)>>;

/// Handle identifying one subscription on a [`Signal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalConnection(u64);

/// A synchronous multi-subscriber signal.
///
/// Subscribers run on the dispatching thread, in connection order.
pub struct Signal<T> {
    /// Connected subscribers with their connection tokens.
    subscribers: RefCell<SmallVec<[(u64, Subscriber<T>); 4]>>,
    /// Next connection token.
    next_token: Cell<u64>,
}

impl<T> Signal<T> {
    /// Creates a signal with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(SmallVec::new()),
            next_token: Cell::new(0),
        }
    }

    /// Connects a subscriber, returning its connection handle.
    pub fn connect(&self, subscriber: impl FnMut(&T) + 'static) -> SignalConnection {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.subscribers
            .borrow_mut()
            .push((token, Rc::new(RefCell::new(subscriber))));
        SignalConnection(token)
    }

    /// Disconnects the subscriber behind `connection`.
    ///
    /// Disconnecting twice is a no-op. A dispatch already in flight still
    /// completes over its snapshot.
    pub fn disconnect(&self, connection: SignalConnection) {
        self.subscribers
            .borrow_mut()
            .retain(|(token, _)| *token != connection.0);
    }

    /// Returns the number of connected subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Returns whether no subscriber is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Invokes every subscriber with `payload`.
    pub fn dispatch(&self, payload: &T) {
        let snapshot: SmallVec<[(u64, Subscriber<T>); 4]> = self.subscribers.borrow().clone();
        for (_, subscriber) in snapshot {
            (&mut *subscriber.borrow_mut())(payload);
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_in_connection_order() {
        let signal: Signal<u32> = Signal::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&seen);
        signal.connect(move |value| first.borrow_mut().push(("first", *value)));
        let second = Rc::clone(&seen);
        signal.connect(move |value| second.borrow_mut().push(("second", *value)));

        signal.dispatch(&7);
        assert_eq!(&*seen.borrow(), &[("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_disconnect() {
        let signal: Signal<u32> = Signal::new();
        let count = Rc::new(Cell::new(0));

        let hits = Rc::clone(&count);
        let connection = signal.connect(move |_| hits.set(hits.get() + 1));

        signal.dispatch(&0);
        signal.disconnect(connection);
        signal.dispatch(&0);
        // double disconnect is harmless
        signal.disconnect(connection);

        assert_eq!(count.get(), 1);
        assert!(signal.is_empty());
    }

    #[test]
    fn test_mid_dispatch_churn_lands_next_dispatch() {
        let signal: Rc<Signal<u32>> = Rc::new(Signal::new());
        let late_hits = Rc::new(Cell::new(0));

        let inner_signal = Rc::clone(&signal);
        let inner_hits = Rc::clone(&late_hits);
        signal.connect(move |_| {
            let hits = Rc::clone(&inner_hits);
            inner_signal.connect(move |_| hits.set(hits.get() + 1));
        });

        // the subscriber added during this dispatch must not run in it
        signal.dispatch(&0);
        assert_eq!(late_hits.get(), 0);

        signal.dispatch(&0);
        assert_eq!(late_hits.get(), 1);
    }
}
