// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener storage and event posting.
//!
//! ## Ordering
//!
//! Listeners run in registration order. A post stops at the first listener that
//! returns [`ListenerResult::Stop`].
//!
//! ## Slots
//!
//! Each listener lives in a slot keyed by its [`ListenerId`]. During
//! [`post_in`] the listener is taken out of its slot while its callback runs and
//! put back afterwards. If the slot was removed in the meantime the listener is
//! dropped instead of restored.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};

use crate::filter::Listener;
use crate::types::{ListenerId, ListenerResult};

struct Slot<C> {
    id: ListenerId,
    event_type: TypeId,
    listener: Option<Box<dyn Listener<C>>>,
}

/// Ordered collection of listeners over a context `C`.
pub struct Dispatcher<C> {
    slots: Vec<Slot<C>>,
    next_id: u64,
}

impl<C> core::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.slots.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<C: 'static> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> Dispatcher<C> {
    /// Create an empty dispatcher.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a listener. It runs after every listener registered before it.
    pub fn add(&mut self, listener: impl Listener<C>) -> ListenerId {
        self.add_boxed(Box::new(listener))
    }

    /// Register an already boxed listener.
    pub fn add_boxed(&mut self, listener: Box<dyn Listener<C>>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot {
            id,
            event_type: listener.event_type(),
            listener: Some(listener),
        });
        id
    }

    /// Unregister a listener. Returns false if `id` is not registered.
    ///
    /// Removing a listener whose callback is currently running is allowed; the
    /// listener is dropped when the callback returns.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        match self.slot_index(id) {
            Some(ix) => {
                self.slots.remove(ix);
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.slot_index(id).is_some()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ids of registered listeners, in run order.
    pub fn ids(&self) -> impl Iterator<Item = ListenerId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    /// Ids of the listeners for events of type `event_type`, in run order.
    pub fn ids_for(&self, event_type: TypeId) -> Vec<ListenerId> {
        self.slots
            .iter()
            .filter(|s| s.event_type == event_type)
            .map(|s| s.id)
            .collect()
    }

    /// Take a listener out of its slot, leaving the slot registered but empty.
    ///
    /// Returns `None` if the id is unknown or the listener is already taken.
    pub fn take(&mut self, id: ListenerId) -> Option<Box<dyn Listener<C>>> {
        let ix = self.slot_index(id)?;
        self.slots[ix].listener.take()
    }

    /// Put a taken listener back. Drops it if its slot was removed meanwhile.
    pub fn restore(&mut self, id: ListenerId, listener: Box<dyn Listener<C>>) {
        if let Some(ix) = self.slot_index(id) {
            let slot = &mut self.slots[ix];
            if slot.listener.is_none() {
                slot.listener = Some(listener);
            }
        }
    }

    /// Post `event` to every listener for its type, in order.
    ///
    /// Use [`post_in`] instead when the dispatcher is stored inside `ctx`.
    pub fn post<E: Any>(&mut self, ctx: &mut C, event: &E) -> ListenerResult {
        let event_type = TypeId::of::<E>();
        for slot in &mut self.slots {
            if slot.event_type != event_type {
                continue;
            }
            let Some(listener) = slot.listener.as_mut() else {
                continue;
            };
            if listener.handle(ctx, event).is_stop() {
                return ListenerResult::Stop;
            }
        }
        ListenerResult::Propagate
    }

    fn slot_index(&self, id: ListenerId) -> Option<usize> {
        // Slots stay sorted by id since ids only grow and removal keeps order.
        self.slots.binary_search_by_key(&id, |s| s.id).ok()
    }
}

/// Post `event` through a dispatcher that lives inside `ctx`.
///
/// `dispatcher` projects the context onto its dispatcher. It is called once to
/// snapshot matching listeners and then around each callback, so callbacks are
/// free to add and remove listeners on the same dispatcher.
pub fn post_in<C: 'static, E: Any>(
    ctx: &mut C,
    dispatcher: impl Fn(&mut C) -> &mut Dispatcher<C>,
    event: &E,
) -> ListenerResult {
    let ids = dispatcher(ctx).ids_for(TypeId::of::<E>());
    for id in ids {
        let Some(mut listener) = dispatcher(ctx).take(id) else {
            continue;
        };
        let result = listener.handle(ctx, event);
        dispatcher(ctx).restore(id, listener);
        if result.is_stop() {
            return ListenerResult::Stop;
        }
    }
    ListenerResult::Propagate
}
