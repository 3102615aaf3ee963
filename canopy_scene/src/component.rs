// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component container: named, optional units of behavior attached to a node.
//!
//! Names are not unique; lookup and removal by name use the first match in
//! insertion order. Components enter and exit with their owner and receive
//! frame updates while the owner's update is scheduled and they are enabled.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use smallvec::SmallVec;

use crate::tree::Tree;
use crate::types::NodeId;

/// A unit of behavior attached to a node.
pub trait Component: Any {
    /// Name used for lookup. Read once, when the component is added.
    fn name(&self) -> &str;

    /// Called when the component is added. Returning false rejects it.
    fn init(&mut self) -> bool {
        true
    }

    /// The owner entered the running scene, or the component was added to a running owner.
    fn on_enter(&mut self, _tree: &mut Tree, _owner: NodeId) {}

    /// The owner left the running scene, or the component was removed from a running owner.
    fn on_exit(&mut self, _tree: &mut Tree, _owner: NodeId) {}

    /// Frame update.
    fn update(&mut self, _tree: &mut Tree, _owner: NodeId, _dt: f64) {}

    /// Write a textual description of the component's state.
    fn serialize(&self, _out: &mut dyn fmt::Write) -> fmt::Result {
        Ok(())
    }

    /// Whether the component receives updates.
    fn is_enabled(&self) -> bool;

    /// Enable or disable updates.
    fn set_enabled(&mut self, enabled: bool);
}

/// Identifier of a component within its owner.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ComponentId(u64);

struct ComponentSlot {
    id: ComponentId,
    name: String,
    component: Option<Box<dyn Component>>,
}

/// Per-node component storage, allocated on first use.
#[derive(Default)]
pub(crate) struct ComponentContainer {
    slots: Vec<ComponentSlot>,
    next_id: u64,
}

impl fmt::Debug for ComponentContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| (&s.name, s.id)))
            .finish()
    }
}

impl ComponentContainer {
    fn index_of(&self, id: ComponentId) -> Option<usize> {
        self.slots.iter().position(|s| s.id == id)
    }

    fn first_named(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }
}

impl Tree {
    fn container(&self, node: NodeId) -> Option<&ComponentContainer> {
        self.get(node)?.components.as_deref()
    }

    fn container_mut(&mut self, node: NodeId) -> Option<&mut ComponentContainer> {
        self.node_opt_mut(node)?.components.as_deref_mut()
    }

    /// Attach a component.
    ///
    /// Calls [`Component::init`] first and rejects the component when it
    /// returns false. Calls [`Component::on_enter`] when the owner is running.
    pub fn add_component(
        &mut self,
        node: NodeId,
        mut component: Box<dyn Component>,
    ) -> Option<ComponentId> {
        if !self.is_alive(node) {
            log::warn!("add_component: stale node {node:?}");
            return None;
        }
        if !component.init() {
            log::debug!("add_component: {:?} rejected by init", component.name());
            return None;
        }
        let name = String::from(component.name());
        let n = self.node_opt_mut(node)?;
        let container = n.components.get_or_insert_with(Box::default);
        let id = ComponentId(container.next_id);
        container.next_id += 1;
        container.slots.push(ComponentSlot {
            id,
            name,
            component: Some(component),
        });
        if n.is_running() {
            self.with_component(node, id, |c, tree| c.on_enter(tree, node));
        }
        Some(id)
    }

    /// Remove the first component with the given name.
    pub fn remove_component(&mut self, node: NodeId, name: &str) -> bool {
        match self.container(node).and_then(|c| c.first_named(name)) {
            Some(ix) => {
                let id = self.container(node).map(|c| c.slots[ix].id);
                id.is_some_and(|id| self.remove_component_by_id(node, id))
            }
            None => false,
        }
    }

    /// Remove a component by id. Calls [`Component::on_exit`] when the owner is running.
    pub fn remove_component_by_id(&mut self, node: NodeId, id: ComponentId) -> bool {
        let running = self.is_running(node);
        let Some(container) = self.container_mut(node) else {
            return false;
        };
        let Some(ix) = container.index_of(id) else {
            return false;
        };
        let slot = container.slots.remove(ix);
        if container.slots.is_empty()
            && let Some(n) = self.node_opt_mut(node)
        {
            n.components = None;
        }
        if let Some(mut component) = slot.component
            && running
        {
            component.on_exit(self, node);
        }
        true
    }

    /// Remove every component of `node`.
    pub fn remove_all_components(&mut self, node: NodeId) {
        for id in self.component_ids(node) {
            self.remove_component_by_id(node, id);
        }
    }

    /// First component with the given name.
    ///
    /// `None` while that component's own callback is running.
    pub fn component(&self, node: NodeId, name: &str) -> Option<&dyn Component> {
        let c = self.container(node)?;
        c.slots[c.first_named(name)?].component.as_deref()
    }

    /// First component with the given name, downcast to `T`.
    pub fn component_as<T: Component>(&self, node: NodeId, name: &str) -> Option<&T> {
        let c: &dyn Any = self.component(node, name)?;
        c.downcast_ref::<T>()
    }

    /// First component with the given name, downcast to `T`, mutably.
    pub fn component_as_mut<T: Component>(&mut self, node: NodeId, name: &str) -> Option<&mut T> {
        let container = self.container_mut(node)?;
        let ix = container.first_named(name)?;
        let c: &mut dyn Any = container.slots[ix].component.as_deref_mut()?;
        c.downcast_mut::<T>()
    }

    /// Ids of the components of `node`, in insertion order.
    pub fn component_ids(&self, node: NodeId) -> Vec<ComponentId> {
        self.container(node)
            .map(|c| c.slots.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    /// Number of components attached to `node`.
    pub fn component_count(&self, node: NodeId) -> usize {
        self.container(node).map_or(0, |c| c.slots.len())
    }

    /// Serialize every component of `node`, one per line, as `name: state`.
    pub fn serialize_components(&self, node: NodeId, out: &mut dyn fmt::Write) -> fmt::Result {
        let Some(container) = self.container(node) else {
            return Ok(());
        };
        for slot in &container.slots {
            let Some(component) = slot.component.as_deref() else {
                continue;
            };
            write!(out, "{}: ", slot.name)?;
            component.serialize(out)?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Run `f` with one component taken out of its slot.
    fn with_component(
        &mut self,
        node: NodeId,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Component, &mut Self),
    ) {
        let Some(mut component) = self.container_mut(node).and_then(|c| {
            let ix = c.index_of(id)?;
            c.slots[ix].component.take()
        }) else {
            return;
        };
        f(component.as_mut(), self);
        if let Some(c) = self.container_mut(node)
            && let Some(ix) = c.index_of(id)
            && c.slots[ix].component.is_none()
        {
            c.slots[ix].component = Some(component);
        }
    }

    /// Run `f` for each component of `node`, in insertion order.
    ///
    /// Components added during the walk are not visited; removed ones are skipped.
    pub(crate) fn each_component(
        &mut self,
        node: NodeId,
        mut f: impl FnMut(&mut dyn Component, &mut Self),
    ) {
        let ids: SmallVec<[ComponentId; 4]> = match self.container(node) {
            Some(c) => c.slots.iter().map(|s| s.id).collect(),
            None => return,
        };
        for id in ids {
            self.with_component(node, id, &mut f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use core::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Gauge {
        name: &'static str,
        enabled: bool,
        accept: bool,
        log: Log,
        ticks: u32,
    }

    impl Gauge {
        fn boxed(name: &'static str, log: &Log) -> Box<Self> {
            Box::new(Self {
                name,
                enabled: true,
                accept: true,
                log: log.clone(),
                ticks: 0,
            })
        }
    }

    impl Component for Gauge {
        fn name(&self) -> &str {
            self.name
        }
        fn init(&mut self) -> bool {
            self.accept
        }
        fn on_enter(&mut self, _tree: &mut Tree, _owner: NodeId) {
            self.log.borrow_mut().push(format!("{}:enter", self.name));
        }
        fn on_exit(&mut self, _tree: &mut Tree, _owner: NodeId) {
            self.log.borrow_mut().push(format!("{}:exit", self.name));
        }
        fn update(&mut self, _tree: &mut Tree, _owner: NodeId, _dt: f64) {
            self.ticks += 1;
        }
        fn serialize(&self, out: &mut dyn fmt::Write) -> fmt::Result {
            write!(out, "ticks={}", self.ticks)
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }
    }

    #[test]
    fn lookup_and_removal_use_first_match() {
        let log = Log::default();
        let mut tree = Tree::new();
        let n = tree.create_node();
        let first = tree.add_component(n, Gauge::boxed("dup", &log)).unwrap();
        let second = tree.add_component(n, Gauge::boxed("dup", &log)).unwrap();
        assert_ne!(first, second);
        assert_eq!(tree.component_count(n), 2);
        assert_eq!(tree.component(n, "dup").unwrap().name(), "dup");

        assert!(tree.remove_component(n, "dup"));
        assert_eq!(tree.component_ids(n), vec![second], "first match was removed");
        assert!(tree.remove_component(n, "dup"));
        assert!(!tree.remove_component(n, "dup"));
        assert!(tree.get(n).unwrap().components.is_none(), "empty container is freed");
        assert!(log.borrow().is_empty(), "detached owner gets no enter/exit");
    }

    #[test]
    fn remove_all_exits_in_insertion_order() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.run_scene(scene).unwrap();
        tree.add_component(scene, Gauge::boxed("a", &log));
        tree.add_component(scene, Gauge::boxed("b", &log));
        log.borrow_mut().clear();

        tree.remove_all_components(scene);
        assert_eq!(*log.borrow(), ["a:exit", "b:exit"]);
        assert_eq!(tree.component_count(scene), 0);
        assert!(tree.get(scene).unwrap().components.is_none());

        tree.remove_all_components(scene);
        let stale = tree.create_node();
        tree.destroy(stale);
        tree.remove_all_components(stale);
        assert_eq!(log.borrow().len(), 2, "nothing left to remove");
    }

    #[test]
    fn init_can_reject() {
        let log = Log::default();
        let mut tree = Tree::new();
        let n = tree.create_node();
        let mut gauge = Gauge::boxed("no", &log);
        gauge.accept = false;
        assert!(tree.add_component(n, gauge).is_none());
        assert_eq!(tree.component_count(n), 0);
    }

    #[test]
    fn components_follow_owner_lifecycle() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.add_component(scene, Gauge::boxed("pre", &log));
        tree.run_scene(scene).unwrap();
        tree.add_component(scene, Gauge::boxed("live", &log));
        tree.remove_component(scene, "live");
        tree.end_scene();
        assert_eq!(
            *log.borrow(),
            ["pre:enter", "live:enter", "live:exit", "pre:exit"]
        );
    }

    #[test]
    fn enabled_components_update_with_owner() {
        let log = Log::default();
        let mut tree = Tree::new();
        let scene = tree.create_node();
        tree.run_scene(scene).unwrap();
        tree.add_component(scene, Gauge::boxed("on", &log));
        tree.add_component(scene, Gauge::boxed("off", &log));
        tree.component_as_mut::<Gauge>(scene, "off").unwrap().set_enabled(false);
        tree.schedule_update(scene, 0);
        tree.tick(0.1);
        tree.tick(0.1);
        assert_eq!(tree.component_as::<Gauge>(scene, "on").unwrap().ticks, 2);
        assert_eq!(tree.component_as::<Gauge>(scene, "off").unwrap().ticks, 0);

        let mut out = String::new();
        tree.serialize_components(scene, &mut out).unwrap();
        assert_eq!(out, "on: ticks=2\noff: ticks=0\n".to_string());
    }
}
