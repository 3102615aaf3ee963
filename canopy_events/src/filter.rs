// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filters and listeners.
//!
//! ## Overview
//!
//! An [`EventFilter`] names one event type and decides which events of that type
//! a listener wants. An [`EventListener`] binds a filter to a callback.
//! Listeners are stored type-erased behind the [`Listener`] trait so that a single
//! [`Dispatcher`](crate::dispatcher::Dispatcher) can hold listeners for many
//! event types.

use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::marker::PhantomData;

use crate::types::ListenerResult;

/// Decides which events of one type reach a listener.
///
/// Filters are usually bound to something when constructed: a node, a key, a
/// channel. The dispatcher never inspects them beyond [`matches`](Self::matches).
pub trait EventFilter: 'static {
    /// The event type this filter accepts.
    type Event: Any;

    /// Returns true if `event` should be delivered to the listener's callback.
    fn matches(&self, event: &Self::Event) -> bool;
}

/// A filter that accepts every event of type `E`.
pub struct EveryEvent<E>(PhantomData<fn() -> E>);

impl<E> EveryEvent<E> {
    /// Create the filter.
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for EveryEvent<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> core::fmt::Debug for EveryEvent<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EveryEvent")
            .field("event", &core::any::type_name::<E>())
            .finish()
    }
}

impl<E: Any> EventFilter for EveryEvent<E> {
    type Event = E;

    #[inline]
    fn matches(&self, _event: &E) -> bool {
        true
    }
}

/// Type-erased listener as stored by the dispatcher.
///
/// Implemented by [`EventListener`]; implement it yourself only when a listener
/// needs to inspect events of several types.
pub trait Listener<C>: 'static {
    /// The concrete event type this listener handles.
    fn event_type(&self) -> TypeId;

    /// Handle an event. Events of other types must be ignored with
    /// [`ListenerResult::Propagate`].
    fn handle(&mut self, ctx: &mut C, event: &dyn Any) -> ListenerResult;
}

/// A filter bound to a callback.
pub struct EventListener<C, F: EventFilter> {
    filter: F,
    callback: Box<dyn FnMut(&mut C, &F::Event) -> ListenerResult>,
}

impl<C, F: EventFilter> EventListener<C, F> {
    /// Bind `callback` to `filter`.
    pub fn new(
        filter: F,
        callback: impl FnMut(&mut C, &F::Event) -> ListenerResult + 'static,
    ) -> Self {
        Self {
            filter,
            callback: Box::new(callback),
        }
    }

    /// The filter this listener was built with.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Replace the filter, keeping the callback.
    pub fn set_filter(&mut self, filter: F) {
        self.filter = filter;
    }
}

impl<C, F: EventFilter + core::fmt::Debug> core::fmt::Debug for EventListener<C, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventListener")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl<C: 'static, F: EventFilter> Listener<C> for EventListener<C, F> {
    fn event_type(&self) -> TypeId {
        TypeId::of::<F::Event>()
    }

    fn handle(&mut self, ctx: &mut C, event: &dyn Any) -> ListenerResult {
        match event.downcast_ref::<F::Event>() {
            Some(event) if self.filter.matches(event) => (self.callback)(ctx, event),
            _ => ListenerResult::Propagate,
        }
    }
}
