// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: node storage, ownership, and sibling structure.

use alloc::vec::Vec;

use canopy_events::Dispatcher;

use crate::error::TreeError;
use crate::node::{Node, NodeBuilder};
use crate::order::{self, ArrivalCounter, Placement, SiblingKey};
use crate::schedule::Scheduler;
use crate::types::{NodeFlags, NodeId};

/// Tree-wide settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Initial capacity of each node's child list.
    pub child_capacity_hint: usize,
    /// First arrival stamp, and the value [`Tree::reset_arrival_order`] returns to.
    pub first_arrival: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            child_capacity_hint: 4,
            first_arrival: 1,
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level scene tree.
///
/// Owns every node, the arrival counter, the event dispatcher, and the scheduler.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    config: TreeConfig,
    pub(crate) arrival: ArrivalCounter,
    pub(crate) running_scene: Option<NodeId>,
    pub(crate) events: Dispatcher<Self>,
    pub(crate) scheduler: Scheduler,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("arrival", &self.arrival)
            .field("running_scene", &self.running_scene)
            .field("events", &self.events)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a new empty tree with custom settings.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            config,
            arrival: ArrivalCounter::new(config.first_arrival),
            running_scene: None,
            events: Dispatcher::new(),
            scheduler: Scheduler::default(),
        }
    }

    /// Settings this tree was created with.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Create a detached node with default state.
    ///
    /// The node has no parent and no holds. It lives until it is added to a
    /// parent and later removed, or until [`destroy`](Self::destroy).
    pub fn create_node(&mut self) -> NodeId {
        self.create_node_with(NodeBuilder::default())
    }

    /// Create a detached node from a builder.
    pub fn create_node_with(&mut self, builder: NodeBuilder) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(None);
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let mut node = Node::new(generation, self.config.child_capacity_hint);
        node.geometry = builder.geometry;
        node.id = builder.id;
        node.tag = builder.tag;
        node.order.z = builder.z_order;
        node.vertex_z = builder.vertex_z;
        node.flags.set(NodeFlags::VISIBLE, builder.visible);
        node.color = builder.color;
        node.behavior = builder.behavior;
        let id = NodeId::new(idx, generation);
        self.nodes[id.idx()] = Some(node);
        log::trace!("created node {id:?}");
        id
    }

    /// Returns true if `id` refers to a live node.
    ///
    /// A `NodeId` is considered live if its slot exists and its generation matches
    /// the current generation stored in that slot.
    /// See [`NodeId`] docs for the generational semantics.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Read access to a live node.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.generation()).then_some(n)
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.generation() {
            return None;
        }
        Some(n)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns true if the tree holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parent of `id`, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// Children of `id` in storage order. Empty for stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    /// Number of children of `id`.
    pub fn children_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    // --- ownership ---

    /// Add an external hold on `id`. A held node survives removal from its parent.
    pub fn retain(&mut self, id: NodeId) -> bool {
        match self.node_opt_mut(id) {
            Some(n) => {
                n.holds += 1;
                true
            }
            None => false,
        }
    }

    /// Drop an external hold. A detached node with no holds left is destroyed.
    pub fn release(&mut self, id: NodeId) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        n.holds = n.holds.saturating_sub(1);
        if n.holds == 0 && n.parent.is_none() && self.running_scene != Some(id) {
            self.dispose(id);
        }
    }

    /// Destroy `id` and its subtree now, regardless of holds.
    ///
    /// The node is detached first, running its exit lifecycle and cleanup when
    /// it is running. Children with external holds survive as detached nodes.
    pub fn destroy(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if self.get(id).is_some_and(Node::is_running) {
            self.exit_transition_did_start(id);
            self.exit(id);
        }
        self.cleanup(id);
        if let Some(parent) = self.parent(id) {
            self.unlink_parent(id, parent);
        }
        if self.running_scene == Some(id) {
            self.running_scene = None;
        }
        self.dispose(id);
    }

    /// Free the slot of a detached node and release its children.
    pub(crate) fn dispose(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let Some(node) = self.nodes[id.idx()].take() else {
            return;
        };
        self.free_list.push(id.idx());
        log::debug!("destroyed node {id:?} ({:?})", node.id);
        if let Some(ext) = &node.extensions {
            for (_, listener) in &ext.listeners {
                self.events.remove(*listener);
            }
        }
        self.scheduler.purge(id);
        for &child in &node.children {
            let Some(c) = self.node_opt_mut(child) else {
                continue;
            };
            c.parent = None;
            if c.holds == 0 {
                self.dispose(child);
            }
        }
        // Dropping `node` releases behavior, components, layout and extensions.
        drop(node);
    }

    // --- structure ---

    fn reject<T>(&self, op: &str, err: TreeError) -> Result<T, TreeError> {
        log::error!("{op} rejected: {err}");
        Err(err)
    }

    pub(crate) fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if !self.is_alive(parent) {
            return Err(TreeError::StaleNode(parent));
        }
        let Some(c) = self.get(child) else {
            return Err(TreeError::StaleNode(child));
        };
        if child == parent {
            return Err(TreeError::SelfParent(child));
        }
        if c.parent.is_some() || self.running_scene == Some(child) {
            return Err(TreeError::AlreadyParented {
                child,
                parent: c.parent,
            });
        }
        if self.has_ancestor(parent, Some(child)) {
            return Err(TreeError::Cycle { child, parent });
        }
        Ok(())
    }

    /// Add `child` under `parent` with the child's current z-order.
    ///
    /// If `parent` is running, the child's enter lifecycle has completed when
    /// this returns.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let z = self.get(child).map_or(0, Node::z_order);
        self.add_child_with_z(parent, child, z)
    }

    /// Add `child` under `parent` with an explicit z-order.
    pub fn add_child_with_z(
        &mut self,
        parent: NodeId,
        child: NodeId,
        z: i32,
    ) -> Result<(), TreeError> {
        if let Err(err) = self.check_attach(parent, child) {
            return self.reject("add_child", err);
        }
        let arrival = self.arrival.next_stamp();
        self.attach(parent, child, SiblingKey::new(z, arrival), None);
        Ok(())
    }

    /// Add `child` under `parent` with an explicit z-order and string id.
    pub fn add_child_with_id(
        &mut self,
        parent: NodeId,
        child: NodeId,
        z: i32,
        id: &str,
    ) -> Result<(), TreeError> {
        if let Err(err) = self.check_attach(parent, child) {
            return self.reject("add_child", err);
        }
        self.set_id(child, id);
        let arrival = self.arrival.next_stamp();
        self.attach(parent, child, SiblingKey::new(z, arrival), None);
        Ok(())
    }

    /// Link a validated child, then run its enter lifecycle if needed.
    ///
    /// With `at`, the child is inserted at that storage index and the parent's
    /// order flag is left alone; otherwise it is appended and the order is dirtied.
    fn attach(&mut self, parent: NodeId, child: NodeId, key: SiblingKey, at: Option<usize>) {
        if let Some(c) = self.node_opt_mut(child) {
            c.order = key;
        }
        self.link_parent(child, parent, at);
        self.mark_world_dirty(child);
        log::debug!("attached {child:?} to {parent:?} with {key:?}");
        if self.get(parent).is_some_and(Node::is_running) {
            self.enter(child);
            self.enter_transition_did_finish(child);
        }
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId, at: Option<usize>) {
        let Some(p) = self.node_opt_mut(parent) else {
            return;
        };
        match at {
            Some(ix) => p.children.insert(ix.min(p.children.len()), id),
            None => {
                p.children.push(id);
                p.flags.insert(NodeFlags::ORDER_DIRTY);
            }
        }
        if let Some(c) = self.node_opt_mut(id) {
            c.parent = Some(parent);
        }
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(c) = self.node_opt_mut(id) {
            c.parent = None;
        }
    }

    /// Run the exit lifecycle and optional cleanup, then unlink from the parent.
    fn detach(&mut self, parent: NodeId, child: NodeId, cleanup: bool) {
        if self.get(parent).is_some_and(Node::is_running) {
            self.exit_transition_did_start(child);
            self.exit(child);
        }
        if cleanup {
            self.cleanup(child);
        }
        self.unlink_parent(child, parent);
        log::debug!("detached {child:?} from {parent:?}");
    }

    /// Destroy a detached node unless something still holds it.
    fn release_detached(&mut self, id: NodeId) {
        if self.get(id).is_some_and(|n| n.holds == 0 && n.parent.is_none()) {
            self.dispose(id);
        }
    }

    /// Remove `child` from `parent`.
    ///
    /// Returns false if `child` is not a child of `parent`. With `cleanup`, all
    /// scheduled callbacks of the child's subtree are cancelled. The child is
    /// destroyed afterwards unless it has external holds.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId, cleanup: bool) -> bool {
        if !self.is_alive(parent) || self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(parent, child, cleanup);
        self.release_detached(child);
        true
    }

    /// Remove `child` from whatever parent it has.
    pub fn remove_from_parent(&mut self, child: NodeId, cleanup: bool) -> bool {
        match self.parent(child) {
            Some(parent) => self.remove_child(parent, child, cleanup),
            None => false,
        }
    }

    /// Remove every child of `parent`.
    pub fn remove_all_children(&mut self, parent: NodeId, cleanup: bool) {
        let children = self.children(parent).to_vec();
        for child in children {
            self.remove_child(parent, child, cleanup);
        }
    }

    /// First direct child with the given tag, in storage order.
    pub fn child_by_tag(&self, parent: NodeId, tag: i32) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.tag == tag))
    }

    /// Remove the first direct child with the given tag.
    pub fn remove_child_by_tag(&mut self, parent: NodeId, tag: i32, cleanup: bool) -> bool {
        match self.child_by_tag(parent, tag) {
            Some(child) => self.remove_child(parent, child, cleanup),
            None => {
                log::debug!("remove_child_by_tag: no child with tag {tag} under {parent:?}");
                false
            }
        }
    }

    /// Change the z-order of a child. Its arrival stamp is kept.
    pub fn reorder_child(&mut self, parent: NodeId, child: NodeId, z: i32) -> Result<(), TreeError> {
        if !self.is_alive(parent) {
            return self.reject("reorder_child", TreeError::StaleNode(parent));
        }
        if !self.is_alive(child) {
            return self.reject("reorder_child", TreeError::StaleNode(child));
        }
        if self.parent(child) != Some(parent) {
            return self.reject("reorder_child", TreeError::NotAChild { child, parent });
        }
        if let Some(c) = self.node_opt_mut(child) {
            c.order.z = z;
        }
        if let Some(p) = self.node_opt_mut(parent) {
            p.flags.insert(NodeFlags::ORDER_DIRTY);
        }
        Ok(())
    }

    /// Set the z-order of a node, reordering it within its parent if attached.
    pub fn set_z_order(&mut self, id: NodeId, z: i32) -> Result<(), TreeError> {
        if let Some(parent) = self.parent(id) {
            return self.reorder_child(parent, id, z);
        }
        match self.node_opt_mut(id) {
            Some(n) => {
                n.order.z = z;
                Ok(())
            }
            None => self.reject("set_z_order", TreeError::StaleNode(id)),
        }
    }

    /// Whether the children of `parent` need sorting.
    pub fn is_children_order_dirty(&self, parent: NodeId) -> bool {
        self.get(parent).is_some_and(Node::is_children_order_dirty)
    }

    /// Sort children into sibling order.
    ///
    /// Returns false without doing any work when the order is already resolved.
    pub fn sort_all_children(&mut self, parent: NodeId) -> bool {
        let Some(p) = self.node_opt_mut(parent) else {
            return false;
        };
        if !p.flags.contains(NodeFlags::ORDER_DIRTY) {
            return false;
        }
        p.flags.remove(NodeFlags::ORDER_DIRTY);
        let mut children = core::mem::take(&mut p.children);
        order::sort_siblings(&mut children, |c| {
            self.get(c).map_or(SiblingKey::default(), Node::sibling_key)
        });
        if let Some(p) = self.node_opt_mut(parent) {
            p.children = children;
        }
        log::trace!("sorted children of {parent:?}");
        true
    }

    /// Swap two children's storage positions and sibling keys.
    pub fn swap_child_indices(&mut self, parent: NodeId, a: NodeId, b: NodeId) -> bool {
        let children = self.children(parent);
        let (Some(ia), Some(ib)) = (
            children.iter().position(|&c| c == a),
            children.iter().position(|&c| c == b),
        ) else {
            return false;
        };
        let (Some(ka), Some(kb)) = (
            self.get(a).map(Node::sibling_key),
            self.get(b).map(Node::sibling_key),
        ) else {
            return false;
        };
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.swap(ia, ib);
        }
        if let Some(n) = self.node_opt_mut(a) {
            n.order = kb;
        }
        if let Some(n) = self.node_opt_mut(b) {
            n.order = ka;
        }
        true
    }

    /// Insert `child` directly before `before` in sibling order.
    ///
    /// The child takes `before`'s z-order and arrival stamp; equal-z siblings
    /// from `before` on move one stamp later, so later sorts keep the adjacency.
    /// If `before` is `None` or not a child of `parent`, the child goes first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.insert_adjacent(parent, child, before, false)
    }

    /// Insert `child` directly after `after` in sibling order.
    ///
    /// If `after` is `None` or not a child of `parent`, the child goes last.
    pub fn insert_after(
        &mut self,
        parent: NodeId,
        child: NodeId,
        after: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.insert_adjacent(parent, child, after, true)
    }

    fn insert_adjacent(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
        after: bool,
    ) -> Result<(), TreeError> {
        let op = if after { "insert_after" } else { "insert_before" };
        if let Err(err) = self.check_attach(parent, child) {
            return self.reject(op, err);
        }
        self.sort_all_children(parent);
        let children = self.children(parent).to_vec();
        let reference = reference
            .filter(|r| children.contains(r))
            .or_else(|| (if after { children.last() } else { children.first() }).copied());
        let Some(reference) = reference.and_then(|r| {
            let ix = children.iter().position(|&c| c == r)?;
            Some((ix, r))
        }) else {
            // No siblings to be adjacent to.
            let z = self.get(child).map_or(0, Node::z_order);
            let arrival = self.arrival.next_stamp();
            self.attach(parent, child, SiblingKey::new(z, arrival), None);
            return Ok(());
        };
        let (ix, _) = reference;

        let mut keys: Vec<SiblingKey> = children
            .iter()
            .map(|&c| self.get(c).map_or(SiblingKey::default(), Node::sibling_key))
            .collect();
        order::separate_arrivals(&mut keys);
        let key = keys[ix];
        let placement = if after {
            Placement::After(key)
        } else {
            Placement::Before(key)
        };
        let new_key = order::make_room(&mut keys, placement);
        let mut highest = new_key.arrival;
        for (&c, k) in children.iter().zip(&keys) {
            highest = highest.max(k.arrival);
            if let Some(n) = self.node_opt_mut(c) {
                n.order = *k;
            }
        }
        self.arrival.advance_past(highest);
        self.attach(parent, child, new_key, Some(if after { ix + 1 } else { ix }));
        Ok(())
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    ///
    /// With `None`, returns whether `id` is the running scene or inside it.
    pub fn has_ancestor(&self, id: NodeId, ancestor: Option<NodeId>) -> bool {
        let ancestor = match ancestor {
            Some(a) => a,
            None => match self.running_scene {
                Some(scene) if scene == id => return self.is_alive(id),
                Some(scene) => scene,
                None => return false,
            },
        };
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// Path from the root of `id`'s tree down to `id`, inclusive.
    pub(crate) fn path_to_root(&self, mut id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(id) {
            return out;
        }
        loop {
            out.push(id);
            match self.parent(id) {
                Some(p) => id = p,
                None => break,
            }
        }
        out.reverse();
        out
    }

    /// Reset the arrival counter to its first value.
    ///
    /// Intended for scene boundaries; existing stamps are not rewritten, so
    /// children attached afterwards may share a stamp with older siblings.
    /// They then sort by storage order, and [`Tree::insert_before`] and
    /// [`Tree::insert_after`] renumber such ties before inserting.
    pub fn reset_arrival_order(&mut self) {
        self.arrival.reset();
        log::debug!("arrival order reset");
    }

    /// The stamp the next attached node will receive.
    pub fn next_arrival(&self) -> u64 {
        self.arrival.peek()
    }

    // --- identity ---

    /// Set the string identifier of a node.
    pub fn set_id(&mut self, id: NodeId, value: &str) {
        match self.node_opt_mut(id) {
            Some(n) => {
                n.id.clear();
                n.id.push_str(value);
            }
            None => log::warn!("set_id: stale node {id:?}"),
        }
    }

    /// Set the integer tag of a node.
    pub fn set_tag(&mut self, id: NodeId, tag: i32) {
        match self.node_opt_mut(id) {
            Some(n) => n.tag = tag,
            None => log::warn!("set_tag: stale node {id:?}"),
        }
    }

    pub(crate) fn set_flag(&mut self, id: NodeId, flag: NodeFlags, on: bool) {
        if let Some(n) = self.node_opt_mut(id) {
            n.flags.set(flag, on);
        }
    }
}
