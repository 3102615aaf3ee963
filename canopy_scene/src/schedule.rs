// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node timers and frame updates.
//!
//! ## Overview
//!
//! [`Tree::tick`] drives everything: first the per-node updates in priority
//! order (lower first, then registration order), then timers in registration
//! order. A node that is paused, which every node is while it is not running,
//! neither updates nor advances its timers.
//!
//! Timer callbacks are taken out of their slot while they run, like
//! listeners and behaviors. A timer unscheduled from inside its own callback
//! is dropped when the callback returns.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::node::Node;
use crate::tree::Tree;
use crate::types::{NodeFlags, NodeId};

/// Identifier of a scheduled timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(u64);

/// How many times a timer fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Repeat {
    /// Until unscheduled.
    #[default]
    Forever,
    /// Exactly this many times, then the timer is removed.
    Times(u32),
}

/// Callback run by a timer with the time elapsed since it last fired.
pub type TimerCallback = Box<dyn FnMut(&mut Tree, NodeId, f64)>;

struct Timer {
    id: TimerId,
    target: NodeId,
    key: String,
    interval: f64,
    repeat: Repeat,
    until_fire: f64,
    accumulated: f64,
    fired: u32,
    callback: Option<TimerCallback>,
}

impl Timer {
    /// Advance by `dt`; returns the elapsed time to report if the timer fires.
    fn advance(&mut self, dt: f64) -> Option<f64> {
        if self.exhausted() {
            return None;
        }
        self.until_fire -= dt;
        self.accumulated += dt;
        if self.until_fire > 0.0 {
            return None;
        }
        let elapsed = self.accumulated;
        self.accumulated = 0.0;
        self.until_fire = self.interval;
        self.fired += 1;
        Some(elapsed)
    }

    fn exhausted(&self) -> bool {
        matches!(self.repeat, Repeat::Times(n) if self.fired >= n)
    }
}

#[derive(Clone, Copy, Debug)]
struct UpdateEntry {
    target: NodeId,
    priority: i32,
}

/// Timer and update registrations of a tree.
#[derive(Default)]
pub(crate) struct Scheduler {
    timers: Vec<Timer>,
    updates: Vec<UpdateEntry>,
    next_id: u64,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("timers", &self.timers.len())
            .field("updates", &self.updates)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl Scheduler {
    fn index_of(&self, id: TimerId) -> Option<usize> {
        // Timers stay sorted by id: ids only grow and removal keeps order.
        self.timers.binary_search_by_key(&id, |t| t.id).ok()
    }

    fn find(&self, target: NodeId, key: &str) -> Option<usize> {
        self.timers
            .iter()
            .position(|t| t.target == target && t.key == key)
    }

    fn has_update(&self, target: NodeId) -> bool {
        self.updates.iter().any(|u| u.target == target)
    }

    /// Drop every registration of `target`.
    pub(crate) fn purge(&mut self, target: NodeId) {
        self.timers.retain(|t| t.target != target);
        self.updates.retain(|u| u.target != target);
    }
}

impl Tree {
    /// Schedule `callback` on `node` under `key`.
    ///
    /// The first call happens after `delay` (or after `interval` when `delay`
    /// is zero), later calls every `interval`. An existing timer of the node
    /// with the same key is replaced. Returns `None` for stale nodes and for
    /// `Repeat::Times(0)`, which schedules nothing.
    pub fn schedule(
        &mut self,
        node: NodeId,
        key: &str,
        interval: f64,
        repeat: Repeat,
        delay: f64,
        callback: impl FnMut(&mut Self, NodeId, f64) + 'static,
    ) -> Option<TimerId> {
        if !self.is_alive(node) {
            log::warn!("schedule: stale node {node:?}");
            return None;
        }
        if repeat == Repeat::Times(0) {
            log::warn!("schedule: timer {key:?} of {node:?} would never fire");
            return None;
        }
        let interval = interval.max(0.0);
        if let Some(ix) = self.scheduler.find(node, key) {
            log::debug!("schedule: replacing timer {key:?} of {node:?}");
            self.scheduler.timers.remove(ix);
        }
        let id = TimerId(self.scheduler.next_id);
        self.scheduler.next_id += 1;
        self.scheduler.timers.push(Timer {
            id,
            target: node,
            key: key.into(),
            interval,
            repeat,
            until_fire: if delay > 0.0 { delay } else { interval },
            accumulated: 0.0,
            fired: 0,
            callback: Some(Box::new(callback)),
        });
        Some(id)
    }

    /// Schedule `callback` to run once after `delay`.
    pub fn schedule_once(
        &mut self,
        node: NodeId,
        key: &str,
        delay: f64,
        callback: impl FnMut(&mut Self, NodeId, f64) + 'static,
    ) -> Option<TimerId> {
        self.schedule(node, key, 0.0, Repeat::Times(1), delay, callback)
    }

    /// Cancel the timer of `node` under `key`.
    pub fn unschedule(&mut self, node: NodeId, key: &str) -> bool {
        match self.scheduler.find(node, key) {
            Some(ix) => {
                self.scheduler.timers.remove(ix);
                true
            }
            None => false,
        }
    }

    /// Cancel a timer by id.
    pub fn unschedule_timer(&mut self, id: TimerId) -> bool {
        match self.scheduler.index_of(id) {
            Some(ix) => {
                self.scheduler.timers.remove(ix);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer and the frame update of `node`.
    pub fn unschedule_all(&mut self, node: NodeId) {
        self.scheduler.purge(node);
    }

    /// Whether `node` has a timer under `key`.
    pub fn is_scheduled(&self, node: NodeId, key: &str) -> bool {
        self.scheduler.find(node, key).is_some()
    }

    /// Number of timers registered for `node`.
    pub fn timer_count(&self, node: NodeId) -> usize {
        self.scheduler
            .timers
            .iter()
            .filter(|t| t.target == node)
            .count()
    }

    /// Call the node's behavior and enabled components every tick.
    ///
    /// Lower priorities run first. Scheduling again changes the priority.
    pub fn schedule_update(&mut self, node: NodeId, priority: i32) {
        if !self.is_alive(node) {
            log::warn!("schedule_update: stale node {node:?}");
            return;
        }
        match self.scheduler.updates.iter_mut().find(|u| u.target == node) {
            Some(entry) => entry.priority = priority,
            None => self.scheduler.updates.push(UpdateEntry {
                target: node,
                priority,
            }),
        }
    }

    /// Stop the frame update of `node`.
    pub fn unschedule_update(&mut self, node: NodeId) {
        self.scheduler.updates.retain(|u| u.target != node);
    }

    /// Whether `node` receives frame updates.
    pub fn is_update_scheduled(&self, node: NodeId) -> bool {
        self.scheduler.has_update(node)
    }

    /// Suspend timers and updates of `node`.
    pub fn pause_scheduler(&mut self, node: NodeId) {
        self.set_flag(node, NodeFlags::PAUSED, true);
    }

    /// Resume timers and updates of `node`.
    pub fn resume_scheduler(&mut self, node: NodeId) {
        self.set_flag(node, NodeFlags::PAUSED, false);
    }

    fn is_paused(&self, node: NodeId) -> bool {
        self.get(node).is_none_or(Node::is_paused)
    }

    /// Advance time by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let mut updates: Vec<UpdateEntry> = self.scheduler.updates.clone();
        updates.sort_by_key(|u| u.priority);
        for UpdateEntry { target, .. } in updates {
            if self.is_paused(target) || !self.scheduler.has_update(target) {
                continue;
            }
            self.with_behavior(target, |b, tree| b.update(tree, target, dt));
            self.each_component(target, |c, tree| {
                if c.is_enabled() {
                    c.update(tree, target, dt);
                }
            });
        }

        let timers: Vec<TimerId> = self.scheduler.timers.iter().map(|t| t.id).collect();
        for id in timers {
            let Some(ix) = self.scheduler.index_of(id) else {
                continue;
            };
            let target = self.scheduler.timers[ix].target;
            if self.is_paused(target) {
                continue;
            }
            let timer = &mut self.scheduler.timers[ix];
            let Some(elapsed) = timer.advance(dt) else {
                continue;
            };
            let Some(mut callback) = timer.callback.take() else {
                continue;
            };
            log::trace!("timer {:?} of {target:?} fired", timer.key);
            callback(self, target, elapsed);
            if let Some(ix) = self.scheduler.index_of(id) {
                let timer = &mut self.scheduler.timers[ix];
                if timer.exhausted() {
                    self.scheduler.timers.remove(ix);
                } else if timer.callback.is_none() {
                    timer.callback = Some(callback);
                }
            }
        }

        let dead: Vec<NodeId> = self
            .scheduler
            .updates
            .iter()
            .map(|u| u.target)
            .chain(self.scheduler.timers.iter().map(|t| t.target))
            .filter(|&n| !self.is_alive(n))
            .collect();
        for n in dead {
            self.scheduler.purge(n);
        }
    }
}
