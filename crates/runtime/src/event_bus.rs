use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Rc<dyn Fn(&E)>;

/// Single-threaded publish/subscribe channel for UI-loop events.
///
/// Delivery is totally ordered: an event emitted by a listener while another
/// event is being dispatched is queued and delivered after the current
/// dispatch finishes, never re-entrantly.
pub struct EventBus<E> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener<E>)>>,
    pending: RefCell<VecDeque<E>>,
    dispatching: Cell<bool>,
    delivered: Cell<u64>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            delivered: Cell::new(0),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get().wrapping_add(1));
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Number of events delivered so far (each event counts once).
    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn emit(&self, event: E) {
        self.pending.borrow_mut().push_back(event);
        if self.dispatching.get() {
            return;
        }

        let _dispatch = DispatchGuard::enter(&self.dispatching);
        loop {
            let Some(event) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            // Snapshot so listeners may (un)subscribe during delivery.
            let listeners: Vec<Listener<E>> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, l)| Rc::clone(l))
                .collect();
            for listener in listeners {
                listener(&event);
            }
            self.delivered.set(self.delivered.get() + 1);
        }
    }
}

struct DispatchGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn delivers_to_every_listener() {
        let bus = EventBus::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&seen);
        let b = Rc::clone(&seen);
        bus.subscribe(move |e| a.borrow_mut().push(("a", *e)));
        bus.subscribe(move |e| b.borrow_mut().push(("b", *e)));

        bus.emit(7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
        assert_eq!(bus.delivered(), 1);
    }

    #[test]
    fn nested_emits_are_queued_not_reentrant() {
        let bus = Rc::new(EventBus::<u32>::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&bus);
        let log = Rc::clone(&seen);
        bus.subscribe(move |e| {
            log.borrow_mut().push(format!("start {e}"));
            if *e == 1 {
                if let Some(bus) = weak.upgrade() {
                    bus.emit(2);
                }
            }
            log.borrow_mut().push(format!("end {e}"));
        });

        bus.emit(1);
        assert_eq!(
            *seen.borrow(),
            vec!["start 1", "end 1", "start 2", "end 2"]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::<u32>::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let id = bus.subscribe(move |_| *c.borrow_mut() += 1);

        bus.emit(1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(2);
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
