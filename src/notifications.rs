//! Publish/subscribe channel for viewport state changes.
//!
//! Every subscription returns a [`SubscriptionId`]; removing it removes exactly
//! that handler, never another one listening for the same element and kind.
//! Emission copies the matching handlers out before calling them, so handlers
//! may query the back end or (un)subscribe while a notification is delivered.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::enums::NotificationKind;

/// Back-end handle of the surface a viewport renders into. Only valid once the
/// viewport has been registered with a rendering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub element: ElementId,
    pub kind: NotificationKind,
}

type Handler = Rc<dyn Fn(&Notification)>;

struct Listener {
    id: SubscriptionId,
    element: ElementId,
    kind: NotificationKind,
    handler: Handler,
}

#[derive(Default)]
pub struct NotificationBus {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<Listener>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        element: ElementId,
        kind: NotificationKind,
        handler: impl Fn(&Notification) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(Listener {
            id,
            element,
            kind,
            handler: Rc::new(handler),
        });
        id
    }

    /// Returns `false` when the subscription was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Deliver a notification, returning the number of handlers called.
    pub fn emit(&self, element: ElementId, kind: NotificationKind) -> usize {
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.element == element && listener.kind == kind)
            .map(|listener| Rc::clone(&listener.handler))
            .collect();

        let notification = Notification { element, kind };
        for handler in &handlers {
            handler(&notification);
        }
        handlers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    #[cfg(test)]
    pub fn listener_count_for(&self, element: ElementId) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|listener| listener.element == element)
            .count()
    }
}
