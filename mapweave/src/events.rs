// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notifications emitted by layers.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

/// Why a model was replaced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MutationReason {
    /// An application-initiated update.
    Update,
    /// A translate interaction moved the model.
    Translate,
    /// A modify interaction edited the model's vertices.
    Modify,
    /// An application-defined reason.
    Custom(&'static str),
}

/// One model replacement.
pub struct ModelChange<M> {
    /// The model before the change.
    pub prev: Rc<M>,
    /// The model after the change.
    pub next: Rc<M>,
    /// Why it changed.
    pub reason: MutationReason,
}

impl<M> Clone for ModelChange<M> {
    fn clone(&self) -> Self {
        Self {
            prev: Rc::clone(&self.prev),
            next: Rc::clone(&self.next),
            reason: self.reason,
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for ModelChange<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelChange")
            .field("prev", &self.prev)
            .field("next", &self.next)
            .field("reason", &self.reason)
            .finish()
    }
}

/// Which operation changed a layer's collection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CollectionReason {
    /// `set_models`.
    Set,
    /// `add_model` or `add_models`.
    Add,
    /// `remove_models_by_id`.
    Remove,
    /// `clear`.
    Clear,
}

/// A change to the set of models a layer presents.
///
/// `prev` and `next` are independent snapshots; neither is touched by later changes.
pub struct ModelsCollectionEvent<M> {
    /// The collection before the change.
    pub prev: Rc<[Rc<M>]>,
    /// The collection after the change.
    pub next: Rc<[Rc<M>]>,
    /// The operation.
    pub reason: CollectionReason,
    /// Models whose id was not present before.
    pub added: Vec<Rc<M>>,
    /// Models whose id is no longer present.
    pub removed: Vec<Rc<M>>,
}

impl<M: fmt::Debug> fmt::Debug for ModelsCollectionEvent<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelsCollectionEvent")
            .field("reason", &self.reason)
            .field("prev", &self.prev.len())
            .field("next", &self.next.len())
            .field("added", &self.added)
            .field("removed", &self.removed)
            .finish()
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;

struct Slots<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A list of listeners for one kind of event.
///
/// Listeners may subscribe or unsubscribe while an event is being delivered; the change
/// takes effect from the next emit.
pub(crate) struct Emitter<T: ?Sized> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: ?Sized> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.slots.borrow().listeners.len())
            .finish()
    }
}

impl<T: ?Sized + 'static> Emitter<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub(crate) fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let mut slots = self.slots.borrow_mut();
        let id = slots.next_id;
        slots.next_id += 1;
        let listener: Listener<T> = Rc::new(listener);
        slots.listeners.push((id, listener));
        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().listeners.retain(|(i, _)| *i != id);
                }
            })),
        }
    }

    pub(crate) fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .slots
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

/// Handle returned when subscribing to layer events.
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Subscription {
    /// Remove the listener.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
