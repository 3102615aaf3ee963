// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for the dispatcher: listener identity and propagation results.

/// Listener outcome controlling propagation.
///
/// Returned by every listener callback. A post walks listeners in insertion
/// order and stops at the first [`Stop`](Self::Stop).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ListenerResult {
    /// Let later listeners see the event.
    #[default]
    Propagate,
    /// Stop propagation; later listeners do not see the event.
    Stop,
}

impl ListenerResult {
    /// Returns true if this result stops propagation.
    #[inline]
    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Identifier for a registered listener.
///
/// Issued by [`Dispatcher::add`](crate::dispatcher::Dispatcher::add) and never reused
/// by the same dispatcher, so a stale id can never name a different listener.
/// Ids are ordered by registration: a larger id was registered later.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Raw numeric value, useful for logging.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}
