use std::cell::RefCell;
use std::rc::Rc;

use crate::readiness::ReadySignal;

/// Holder for a collaborator that may be registered after code that needs it
/// has already started running.
///
/// Readers treat an empty slot as "not yet", never as an error.
pub struct LateBound<T: ?Sized> {
    slot: RefCell<Option<Rc<T>>>,
    ready: ReadySignal,
}

impl<T: ?Sized> Default for LateBound<T> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
            ready: ReadySignal::new(),
        }
    }
}

impl<T: ?Sized> LateBound<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound(value: Rc<T>) -> Self {
        let slot = Self::default();
        slot.set(value);
        slot
    }

    /// Binds (or rebinds) the collaborator and fires the ready signal.
    pub fn set(&self, value: Rc<T>) {
        *self.slot.borrow_mut() = Some(value);
        self.ready.fire();
    }

    pub fn get(&self) -> Option<Rc<T>> {
        self.slot.borrow().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn ready_signal(&self) -> &ReadySignal {
        &self.ready
    }
}
