// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sibling order: z-order with a stable arrival tie-break.
//!
//! Children of a node are stored unsorted. Any structural change marks the
//! parent dirty and the sort runs once, at traversal time or on an explicit
//! [`Tree::sort_all_children`](crate::Tree::sort_all_children).
//! The resolved order is ascending [`SiblingKey`].

use crate::types::NodeId;

/// Sort key of a child among its siblings.
///
/// Ordered by `z` first, then by `arrival`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiblingKey {
    /// Explicit z-order. Lower draws first.
    pub z: i32,
    /// Arrival stamp from the tree's [`ArrivalCounter`].
    pub arrival: u64,
}

impl SiblingKey {
    /// Create a key.
    pub const fn new(z: i32, arrival: u64) -> Self {
        Self { z, arrival }
    }
}

/// Monotonic source of arrival stamps.
///
/// Owned by the [`Tree`](crate::Tree). It only goes back to its starting value
/// through [`reset`](Self::reset).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrivalCounter {
    start: u64,
    next: u64,
}

impl Default for ArrivalCounter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ArrivalCounter {
    /// Create a counter whose first stamp is `start`.
    pub const fn new(start: u64) -> Self {
        Self { start, next: start }
    }

    /// Issue the next stamp.
    pub fn next_stamp(&mut self) -> u64 {
        let v = self.next;
        self.next += 1;
        v
    }

    /// The stamp that will be issued next.
    pub const fn peek(&self) -> u64 {
        self.next
    }

    /// Go back to the starting value.
    pub fn reset(&mut self) {
        self.next = self.start;
    }

    /// Make sure `stamp` is never issued again.
    pub fn advance_past(&mut self, stamp: u64) {
        if self.next <= stamp {
            self.next = stamp + 1;
        }
    }
}

/// Where a new child goes relative to an existing sibling key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placement {
    Before(SiblingKey),
    After(SiblingKey),
}

/// Make room for a new sibling next to an existing one and return its key.
///
/// Equal-z siblings at or past the new key's arrival shift up by one, so the
/// new key is unique and sorts directly before or after the reference.
/// Siblings with a different z never compare between the two keys and stay put.
pub(crate) fn make_room(keys: &mut [SiblingKey], placement: Placement) -> SiblingKey {
    let new = match placement {
        Placement::Before(k) => k,
        Placement::After(k) => SiblingKey::new(k.z, k.arrival + 1),
    };
    for k in keys.iter_mut() {
        if k.z == new.z && k.arrival >= new.arrival {
            k.arrival += 1;
        }
    }
    new
}

/// Give equal-z siblings strictly increasing stamps, keeping their order.
///
/// `keys` must already be in sibling order.
pub(crate) fn separate_arrivals(keys: &mut [SiblingKey]) {
    for i in 1..keys.len() {
        let prev = keys[i - 1];
        let k = &mut keys[i];
        if k.z == prev.z && k.arrival <= prev.arrival {
            k.arrival = prev.arrival + 1;
        }
    }
}

/// Stable sort of `children` by the key each one maps to.
pub(crate) fn sort_siblings(children: &mut [NodeId], key: impl Fn(NodeId) -> SiblingKey) {
    children.sort_by_key(|&c| key(c));
}
