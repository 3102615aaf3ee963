// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Events: a deterministic, `no_std` event dispatcher.
//!
//! ## Overview
//!
//! This crate delivers typed events to registered listeners in insertion order.
//! Each listener pairs an [`EventFilter`](crate::filter::EventFilter) with a
//! callback; the filter decides which events of its type reach the callback.
//! The callback returns a [`ListenerResult`](crate::types::ListenerResult) that
//! either lets the event propagate to later listeners or stops it.
//!
//! ## Context
//!
//! Every callback receives a mutable context `C` alongside the event.
//! The context is whatever owns the dispatcher in your application (for example a
//! scene tree), so a listener can react to an event by mutating that owner
//! synchronously, before the post that triggered it returns.
//!
//! ## Re-entrancy
//!
//! A [`Dispatcher`](crate::dispatcher::Dispatcher) stored *inside* its own context
//! cannot be borrowed while a callback holds `&mut C`.
//! [`post_in`](crate::dispatcher::post_in) solves this by snapshotting the matching
//! listener ids, then taking each listener out of its slot for the duration of its
//! callback and restoring it afterwards:
//!
//! - Listeners added during a post are not invoked by that post.
//! - Listeners removed during a post are not invoked afterwards; a listener that
//!   removes itself is dropped once its callback returns.
//!
//! ## Minimal example
//!
//! ```
//! use canopy_events::dispatcher::Dispatcher;
//! use canopy_events::filter::{EventListener, EveryEvent};
//! use canopy_events::types::ListenerResult;
//!
//! struct Ping(u32);
//!
//! let mut log: Vec<u32> = Vec::new();
//! let mut dispatcher: Dispatcher<Vec<u32>> = Dispatcher::new();
//! dispatcher.add(EventListener::new(EveryEvent::<Ping>::new(), |log: &mut Vec<u32>, e: &Ping| {
//!     log.push(e.0);
//!     ListenerResult::Propagate
//! }));
//!
//! dispatcher.post(&mut log, &Ping(7));
//! assert_eq!(log, vec![7]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod dispatcher;
pub mod filter;
pub mod types;

pub use dispatcher::{Dispatcher, post_in};
pub use filter::{EventFilter, EventListener, EveryEvent, Listener};
pub use types::{ListenerId, ListenerResult};
