// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Running state, lifecycle hooks, and scene roots.
//!
//! ## Order
//!
//! Enter runs pre-order: the node's behavior, then its components, then its
//! children in storage order. Exit runs in exact reverse: children last to
//! first, then components, then the node's behavior.
//!
//! ## Re-entrancy
//!
//! Hooks receive `&mut Tree`. The behavior is taken out of its node while its
//! hook runs; a behavior that is replaced or whose node is destroyed during its
//! own hook is dropped when the hook returns. Child lists are snapshotted
//! before recursing, and children that leave the node in the meantime are skipped.

use alloc::boxed::Box;
use core::any::Any;

use smallvec::SmallVec;

use crate::error::TreeError;
use crate::node::Node;
use crate::tree::Tree;
use crate::types::{NodeFlags, NodeId};

/// Lifecycle hooks attached to a node.
///
/// Every hook has an empty default. Hooks receive the tree and the node they
/// are attached to and may mutate the tree freely.
pub trait NodeBehavior: Any {
    /// The node became part of the running scene.
    fn on_enter(&mut self, _tree: &mut Tree, _node: NodeId) {}

    /// The whole subtree has entered.
    fn on_enter_transition_did_finish(&mut self, _tree: &mut Tree, _node: NodeId) {}

    /// The node is about to leave the running scene.
    fn on_exit_transition_did_start(&mut self, _tree: &mut Tree, _node: NodeId) {}

    /// The node left the running scene.
    fn on_exit(&mut self, _tree: &mut Tree, _node: NodeId) {}

    /// Scheduled work of the node is being cancelled.
    fn cleanup(&mut self, _tree: &mut Tree, _node: NodeId) {}

    /// Per-frame update, when scheduled with [`Tree::schedule_update`].
    fn update(&mut self, _tree: &mut Tree, _node: NodeId, _dt: f64) {}
}

type Snapshot = SmallVec<[NodeId; 8]>;

impl Tree {
    /// Attach a behavior, returning the previous one.
    pub fn set_behavior(
        &mut self,
        id: NodeId,
        behavior: Option<Box<dyn NodeBehavior>>,
    ) -> Option<Box<dyn NodeBehavior>> {
        match self.node_opt_mut(id) {
            Some(n) => core::mem::replace(&mut n.behavior, behavior),
            None => {
                log::warn!("set_behavior: stale node {id:?}");
                None
            }
        }
    }

    /// Attached behavior downcast to `T`.
    pub fn behavior_as<T: NodeBehavior>(&self, id: NodeId) -> Option<&T> {
        self.get(id)?.behavior_as::<T>()
    }

    /// Attached behavior downcast to `T`, mutably.
    pub fn behavior_as_mut<T: NodeBehavior>(&mut self, id: NodeId) -> Option<&mut T> {
        let b: &mut dyn Any = self.node_opt_mut(id)?.behavior.as_deref_mut()?;
        b.downcast_mut::<T>()
    }

    /// Run `f` with the behavior of `id` taken out of its slot.
    pub(crate) fn with_behavior(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn NodeBehavior, &mut Self),
    ) {
        let Some(mut behavior) = self.node_opt_mut(id).and_then(|n| n.behavior.take()) else {
            return;
        };
        f(behavior.as_mut(), self);
        if let Some(n) = self.node_opt_mut(id)
            && n.behavior.is_none()
        {
            n.behavior = Some(behavior);
        }
    }

    fn child_snapshot(&self, id: NodeId) -> Snapshot {
        self.children(id).iter().copied().collect()
    }

    fn still_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.parent(child) == Some(parent)
    }

    /// Enter the running state: behavior, components, then children.
    ///
    /// The node is flagged running once its own hooks have returned, before its
    /// children enter. Nodes that are already running are skipped, and so are
    /// nodes whose hooks moved them to another parent.
    pub fn enter(&mut self, id: NodeId) {
        if self.get(id).is_none_or(Node::is_running) {
            return;
        }
        log::trace!("enter {id:?}");
        let parent = self.parent(id);
        self.with_behavior(id, |b, tree| b.on_enter(tree, id));
        self.each_component(id, |c, tree| c.on_enter(tree, id));
        if !self.is_alive(id) {
            return;
        }
        if self.parent(id) != parent {
            log::debug!("enter: {id:?} left {parent:?} during its own enter");
            return;
        }
        self.set_flag(id, NodeFlags::RUNNING, true);
        self.resume_scheduler(id);
        // Taken after the hooks so children they added enter exactly once.
        for child in self.child_snapshot(id) {
            if self.still_child(id, child) {
                self.enter(child);
            }
        }
    }

    /// Tell the subtree that entering has finished.
    pub fn enter_transition_did_finish(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let children = self.child_snapshot(id);
        self.with_behavior(id, |b, tree| b.on_enter_transition_did_finish(tree, id));
        for child in children {
            if self.still_child(id, child) {
                self.enter_transition_did_finish(child);
            }
        }
    }

    /// Tell the subtree that exiting is about to start.
    pub fn exit_transition_did_start(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let children = self.child_snapshot(id);
        for &child in children.iter().rev() {
            if self.still_child(id, child) {
                self.exit_transition_did_start(child);
            }
        }
        self.with_behavior(id, |b, tree| b.on_exit_transition_did_start(tree, id));
    }

    /// Leave the running state: children last to first, components, then behavior.
    ///
    /// Nodes that are not running are skipped.
    pub fn exit(&mut self, id: NodeId) {
        if !self.get(id).is_some_and(Node::is_running) {
            return;
        }
        let children = self.child_snapshot(id);
        for &child in children.iter().rev() {
            if self.still_child(id, child) {
                self.exit(child);
            }
        }
        self.each_component(id, |c, tree| c.on_exit(tree, id));
        self.with_behavior(id, |b, tree| b.on_exit(tree, id));
        self.pause_scheduler(id);
        self.set_flag(id, NodeFlags::RUNNING, false);
        log::trace!("exit {id:?}");
    }

    /// Cancel scheduled work of the subtree.
    pub fn cleanup(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let children = self.child_snapshot(id);
        self.with_behavior(id, |b, tree| b.cleanup(tree, id));
        self.unschedule_all(id);
        for child in children {
            if self.still_child(id, child) {
                self.cleanup(child);
            }
        }
    }

    /// The root of the running scene.
    pub fn running_scene(&self) -> Option<NodeId> {
        self.running_scene
    }

    /// Whether `id` has entered the running scene.
    pub fn is_running(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_running)
    }

    fn check_scene_root(&self, root: NodeId) -> Result<(), TreeError> {
        let Some(n) = self.get(root) else {
            return Err(TreeError::StaleNode(root));
        };
        if n.parent.is_some() || self.running_scene == Some(root) {
            return Err(TreeError::AlreadyParented {
                child: root,
                parent: n.parent,
            });
        }
        Ok(())
    }

    /// Make `root` the running scene and enter it.
    ///
    /// Replaces the current scene if there is one. The tree holds the scene
    /// root until it is replaced or ended.
    pub fn run_scene(&mut self, root: NodeId) -> Result<(), TreeError> {
        if let Err(err) = self.check_scene_root(root) {
            log::error!("run_scene rejected: {err}");
            return Err(err);
        }
        self.end_scene();
        log::debug!("running scene {root:?}");
        self.retain(root);
        self.running_scene = Some(root);
        self.enter(root);
        self.enter_transition_did_finish(root);
        Ok(())
    }

    /// Exit the running scene, then run `root`.
    pub fn replace_scene(&mut self, root: NodeId) -> Result<(), TreeError> {
        self.run_scene(root)
    }

    /// Exit and release the running scene.
    ///
    /// The old root is destroyed unless something else holds it.
    pub fn end_scene(&mut self) {
        let Some(old) = self.running_scene else {
            return;
        };
        log::debug!("ending scene {old:?}");
        self.exit_transition_did_start(old);
        self.exit(old);
        self.cleanup(old);
        self.running_scene = None;
        self.release(old);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Recorder {
        fn push(&self, event: &str) {
            self.log.borrow_mut().push(format!("{}:{event}", self.name));
        }
    }

    impl NodeBehavior for Recorder {
        fn on_enter(&mut self, tree: &mut Tree, node: NodeId) {
            assert!(!tree.is_running(node), "running flag is set after the hook");
            self.push("enter");
        }
        fn on_enter_transition_did_finish(&mut self, _tree: &mut Tree, _node: NodeId) {
            self.push("finish");
        }
        fn on_exit_transition_did_start(&mut self, _tree: &mut Tree, _node: NodeId) {
            self.push("start_exit");
        }
        fn on_exit(&mut self, _tree: &mut Tree, _node: NodeId) {
            self.push("exit");
        }
        fn cleanup(&mut self, _tree: &mut Tree, _node: NodeId) {
            self.push("cleanup");
        }
    }

    fn recorded(tree: &mut Tree, name: &'static str, log: &Log) -> NodeId {
        let id = tree.create_node();
        tree.set_behavior(
            id,
            Some(Box::new(Recorder {
                name,
                log: log.clone(),
            })),
        );
        id
    }

    #[test]
    fn enter_is_pre_order_and_exit_reverses() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = recorded(&mut tree, "s", &log);
        let a = recorded(&mut tree, "a", &log);
        let b = recorded(&mut tree, "b", &log);
        let a1 = recorded(&mut tree, "a1", &log);
        tree.add_child(scene, a).unwrap();
        tree.add_child(scene, b).unwrap();
        tree.add_child(a, a1).unwrap();

        tree.run_scene(scene).unwrap();
        assert_eq!(
            *log.borrow(),
            [
                "s:enter", "a:enter", "a1:enter", "b:enter", "s:finish", "a:finish", "a1:finish",
                "b:finish"
            ]
        );
        log.borrow_mut().clear();

        tree.end_scene();
        assert_eq!(
            *log.borrow(),
            [
                "b:start_exit",
                "a1:start_exit",
                "a:start_exit",
                "s:start_exit",
                "b:exit",
                "a1:exit",
                "a:exit",
                "s:exit",
                "s:cleanup",
                "a:cleanup",
                "a1:cleanup",
                "b:cleanup"
            ]
        );
        assert!(!tree.is_alive(scene), "ended scene is released");
    }

    #[test]
    fn add_to_running_parent_enters_immediately() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.run_scene(scene).unwrap();
        let child = recorded(&mut tree, "c", &log);
        tree.add_child(scene, child).unwrap();
        assert_eq!(*log.borrow(), ["c:enter", "c:finish"], "hooks fired before add_child returned");
        assert!(tree.is_running(child));
        assert!(!tree.get(child).unwrap().is_paused());
        assert!(tree.has_ancestor(child, None));
        assert!(tree.has_ancestor(scene, None), "the scene root counts as running");
    }

    #[test]
    fn remove_from_running_parent_exits() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.run_scene(scene).unwrap();
        let child = recorded(&mut tree, "c", &log);
        tree.add_child(scene, child).unwrap();
        tree.retain(child);
        log.borrow_mut().clear();

        assert!(tree.remove_child(scene, child, false));
        assert_eq!(*log.borrow(), ["c:start_exit", "c:exit"]);
        assert!(!tree.is_running(child));
        assert!(tree.get(child).unwrap().is_paused());
        assert!(!tree.has_ancestor(child, None));
    }

    struct Adopter {
        kid: Option<NodeId>,
    }

    impl NodeBehavior for Adopter {
        fn on_enter(&mut self, tree: &mut Tree, node: NodeId) {
            if let Some(kid) = self.kid.take() {
                tree.add_child(node, kid).unwrap();
            }
        }
    }

    #[test]
    fn children_added_during_enter_enter_once() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = tree.create_node();
        let kid = recorded(&mut tree, "k", &log);
        tree.set_behavior(scene, Some(Box::new(Adopter { kid: Some(kid) })));
        tree.run_scene(scene).unwrap();
        assert_eq!(*log.borrow(), ["k:enter", "k:finish"]);
    }

    struct Runaway;

    impl NodeBehavior for Runaway {
        fn on_enter(&mut self, tree: &mut Tree, node: NodeId) {
            tree.remove_from_parent(node, false);
        }
    }

    #[test]
    fn node_leaving_during_enter_is_not_running() {
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.run_scene(scene).unwrap();
        let runaway = tree.create_node();
        let kid = tree.create_node();
        tree.add_child(runaway, kid).unwrap();
        tree.set_behavior(runaway, Some(Box::new(Runaway)));
        tree.retain(runaway);

        tree.add_child(scene, runaway).unwrap();
        assert!(tree.is_alive(runaway));
        assert_eq!(tree.parent(runaway), None);
        assert_eq!(tree.children_count(scene), 0);
        assert!(!tree.is_running(runaway));
        assert!(tree.get(runaway).unwrap().is_paused());
        assert!(!tree.is_running(kid), "children of a node that left do not enter");
    }

    struct SelfReplacing;

    impl NodeBehavior for SelfReplacing {
        fn on_enter(&mut self, tree: &mut Tree, node: NodeId) {
            tree.set_behavior(node, None);
        }
    }

    #[test]
    fn behavior_removed_during_hook_is_dropped() {
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.set_behavior(scene, Some(Box::new(SelfReplacing)));
        tree.run_scene(scene).unwrap();
        assert!(tree.get(scene).unwrap().behavior().is_none());
    }

    #[test]
    fn replace_scene_swaps_roots() {
        let mut tree = Tree::new();
        let first = tree.create_node();
        let second = tree.create_node();
        tree.run_scene(first).unwrap();
        tree.retain(first);
        tree.replace_scene(second).unwrap();
        assert_eq!(tree.running_scene(), Some(second));
        assert!(tree.is_alive(first), "held old scene survives");
        assert!(!tree.is_running(first));
        assert!(tree.is_running(second));

        let third = tree.create_node();
        tree.add_child(third, first).unwrap();
        assert_eq!(
            tree.run_scene(second),
            Err(TreeError::AlreadyParented {
                child: second,
                parent: None
            })
        );
    }

    #[test]
    fn behavior_downcast() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        tree.set_behavior(n, Some(Box::new(Adopter { kid: None })));
        assert!(tree.behavior_as::<Adopter>(n).is_some());
        assert!(tree.behavior_as::<SelfReplacing>(n).is_none());
        tree.behavior_as_mut::<Adopter>(n).unwrap().kid = Some(n);
        assert_eq!(tree.behavior_as::<Adopter>(n).unwrap().kid, Some(n));
    }
}
