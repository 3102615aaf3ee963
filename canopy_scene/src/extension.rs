// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node extension storage: string-keyed auxiliary objects and event listeners.
//!
//! Both stores share one lazily allocated box per node. The box is freed once
//! it becomes empty, and listeners registered for a node are unregistered from
//! the tree's dispatcher when the node is destroyed.
//!
//! Ids are plain strings; callers are expected to namespace them.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use canopy_events::{Dispatcher, EventFilter, EventListener, ListenerId, ListenerResult, post_in};
use hashbrown::HashMap;

use crate::tree::Tree;
use crate::types::NodeId;

/// Auxiliary objects and listener ids of one node.
#[derive(Default)]
pub(crate) struct Extensions {
    user_objects: HashMap<String, Box<dyn Any>>,
    pub(crate) listeners: Vec<(String, ListenerId)>,
}

impl Extensions {
    fn is_empty(&self) -> bool {
        self.user_objects.is_empty() && self.listeners.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("user_objects", &self.user_objects.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Posted after every change of a node's auxiliary object.
///
/// The event carries only the types involved. The new value is already stored
/// when listeners run, so they read it back through [`Tree::user_object`] or
/// [`Tree::user_object_as`]. The replaced value has been dropped by then.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserObjectSetEvent {
    /// Node whose object changed.
    pub node: NodeId,
    /// Object id. Empty for the legacy slot.
    pub id: String,
    /// Type of the new value; `None` when the object was removed.
    pub value: Option<TypeId>,
    /// Type of the replaced value; `None` when there was none.
    pub previous: Option<TypeId>,
}

/// Selects [`UserObjectSetEvent`]s by node and id.
///
/// `None` fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserObjectSetFilter {
    /// Only events for this node.
    pub node: Option<NodeId>,
    /// Only events for this object id.
    pub id: Option<String>,
}

impl UserObjectSetFilter {
    /// Match changes of object `id` on `node`.
    pub fn new(node: NodeId, id: impl Into<String>) -> Self {
        Self {
            node: Some(node),
            id: Some(id.into()),
        }
    }
}

impl EventFilter for UserObjectSetFilter {
    type Event = UserObjectSetEvent;

    fn matches(&self, event: &UserObjectSetEvent) -> bool {
        self.node.is_none_or(|n| n == event.node)
            && self.id.as_deref().is_none_or(|id| id == event.id)
    }
}

fn events_of(tree: &mut Tree) -> &mut Dispatcher<Tree> {
    &mut tree.events
}

fn type_of(value: &dyn Any) -> TypeId {
    value.type_id()
}

impl Tree {
    fn extensions(&self, node: NodeId) -> Option<&Extensions> {
        self.get(node)?.extensions.as_deref()
    }

    fn extensions_mut(&mut self, node: NodeId) -> Option<&mut Extensions> {
        self.node_opt_mut(node)?.extensions.as_deref_mut()
    }

    fn prune_extensions(&mut self, node: NodeId) {
        if let Some(n) = self.node_opt_mut(node)
            && n.extensions.as_ref().is_some_and(|e| e.is_empty())
        {
            n.extensions = None;
        }
    }

    /// Returns true if `node` currently holds auxiliary objects or listeners.
    pub fn has_extension_storage(&self, node: NodeId) -> bool {
        self.extensions(node).is_some()
    }

    /// Set, replace or remove (`None`) the auxiliary object `id` of `node`.
    ///
    /// The previous value is dropped. A [`UserObjectSetEvent`] is posted after
    /// the change, with this tree available to listeners.
    pub fn set_user_object(&mut self, node: NodeId, id: &str, value: Option<Box<dyn Any>>) {
        let Some(n) = self.node_opt_mut(node) else {
            log::warn!("set_user_object: stale node {node:?}");
            return;
        };
        let new_type = value.as_deref().map(type_of);
        let previous = match value {
            Some(value) => n
                .extensions
                .get_or_insert_with(Box::default)
                .user_objects
                .insert(String::from(id), value),
            None => n
                .extensions
                .as_deref_mut()
                .and_then(|e| e.user_objects.remove(id)),
        };
        let previous_type = previous.as_deref().map(type_of);
        drop(previous);
        self.prune_extensions(node);
        log::trace!("user object {id:?} of {node:?} set");
        self.post_event(&UserObjectSetEvent {
            node,
            id: String::from(id),
            value: new_type,
            previous: previous_type,
        });
    }

    /// Auxiliary object `id` of `node`.
    pub fn user_object(&self, node: NodeId, id: &str) -> Option<&dyn Any> {
        self.extensions(node)?.user_objects.get(id).map(|v| &**v)
    }

    /// Auxiliary object `id` of `node`, downcast to `T`.
    pub fn user_object_as<T: Any>(&self, node: NodeId, id: &str) -> Option<&T> {
        self.user_object(node, id)?.downcast_ref::<T>()
    }

    /// Auxiliary object `id` of `node`, downcast to `T`, mutably.
    pub fn user_object_as_mut<T: Any>(&mut self, node: NodeId, id: &str) -> Option<&mut T> {
        self.extensions_mut(node)?
            .user_objects
            .get_mut(id)?
            .downcast_mut::<T>()
    }

    /// Set the auxiliary object stored under the empty id.
    pub fn set_legacy_user_object(&mut self, node: NodeId, value: Option<Box<dyn Any>>) {
        self.set_user_object(node, "", value);
    }

    /// The auxiliary object stored under the empty id.
    pub fn legacy_user_object(&self, node: NodeId) -> Option<&dyn Any> {
        self.user_object(node, "")
    }

    /// Set the untyped user-data slot. Posts no event.
    pub fn set_user_data(&mut self, node: NodeId, data: Option<Box<dyn Any>>) {
        match self.node_opt_mut(node) {
            Some(n) => n.user_data = data,
            None => log::warn!("set_user_data: stale node {node:?}"),
        }
    }

    /// The user-data slot, downcast to `T`.
    pub fn user_data_as<T: Any>(&self, node: NodeId) -> Option<&T> {
        self.get(node)?.user_data()?.downcast_ref::<T>()
    }

    /// Register a listener owned by `node` under `id`.
    ///
    /// The listener is unregistered when the node is destroyed.
    pub fn add_event_listener<F: EventFilter>(
        &mut self,
        node: NodeId,
        id: &str,
        filter: F,
        callback: impl FnMut(&mut Self, &F::Event) -> ListenerResult + 'static,
    ) -> Option<ListenerId> {
        if !self.is_alive(node) {
            log::warn!("add_event_listener: stale node {node:?}");
            return None;
        }
        let listener = self.events.add(EventListener::new(filter, callback));
        self.node_opt_mut(node)?
            .extensions
            .get_or_insert_with(Box::default)
            .listeners
            .push((String::from(id), listener));
        Some(listener)
    }

    /// Unregister one listener of `node`.
    pub fn remove_event_listener(&mut self, node: NodeId, listener: ListenerId) -> bool {
        let Some(ext) = self.extensions_mut(node) else {
            return false;
        };
        let Some(ix) = ext.listeners.iter().position(|(_, l)| *l == listener) else {
            return false;
        };
        ext.listeners.remove(ix);
        self.events.remove(listener);
        self.prune_extensions(node);
        true
    }

    /// Unregister every listener of `node` registered under `id`. Returns how many were removed.
    pub fn remove_event_listeners(&mut self, node: NodeId, id: &str) -> usize {
        let Some(ext) = self.extensions_mut(node) else {
            return 0;
        };
        let mut removed = Vec::new();
        ext.listeners.retain(|(key, l)| {
            let hit = key == id;
            if hit {
                removed.push(*l);
            }
            !hit
        });
        for listener in &removed {
            self.events.remove(*listener);
        }
        self.prune_extensions(node);
        removed.len()
    }

    /// First listener of `node` registered under `id`.
    pub fn event_listener(&self, node: NodeId, id: &str) -> Option<ListenerId> {
        self.extensions(node)?
            .listeners
            .iter()
            .find_map(|(key, l)| (key == id).then_some(*l))
    }

    /// Number of listeners owned by `node`.
    pub fn event_listener_count(&self, node: NodeId) -> usize {
        self.extensions(node).map_or(0, |e| e.listeners.len())
    }

    /// Register a listener that belongs to no node.
    pub fn add_global_listener<F: EventFilter>(
        &mut self,
        filter: F,
        callback: impl FnMut(&mut Self, &F::Event) -> ListenerResult + 'static,
    ) -> ListenerId {
        self.events.add(EventListener::new(filter, callback))
    }

    /// Unregister a global listener.
    pub fn remove_global_listener(&mut self, listener: ListenerId) -> bool {
        self.events.remove(listener)
    }

    /// Deliver `event` to every listener for its type, in registration order,
    /// until one returns [`ListenerResult::Stop`].
    pub fn post_event<E: Any>(&mut self, event: &E) -> ListenerResult {
        post_in(self, events_of, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use canopy_events::EveryEvent;
    use core::cell::RefCell;

    type Seen = Rc<RefCell<Vec<UserObjectSetEvent>>>;

    fn record(tree: &mut Tree, filter: UserObjectSetFilter) -> Seen {
        let seen = Seen::default();
        let sink = seen.clone();
        tree.add_global_listener(filter, move |_, e: &UserObjectSetEvent| {
            sink.borrow_mut().push(e.clone());
            ListenerResult::Propagate
        });
        seen
    }

    #[test]
    fn set_and_unset_post_two_events() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        let seen = record(&mut tree, UserObjectSetFilter::new(n, "hp"));

        tree.set_user_object(n, "hp", Some(Box::new(10_u32)));
        assert_eq!(tree.user_object_as::<u32>(n, "hp"), Some(&10));
        tree.set_user_object(n, "hp", None);
        assert!(tree.user_object(n, "hp").is_none());
        assert!(!tree.has_extension_storage(n), "empty storage is freed");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].node, n);
        assert_eq!(seen[0].value, Some(TypeId::of::<u32>()));
        assert_eq!(seen[0].previous, None);
        assert_eq!(seen[1].value, None);
        assert_eq!(seen[1].previous, Some(TypeId::of::<u32>()));
    }

    #[test]
    fn listeners_read_the_new_value_from_the_tree() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        let read = Rc::new(RefCell::new(Vec::new()));
        let sink = read.clone();
        tree.add_global_listener(UserObjectSetFilter::new(n, "hp"), move |tree, e: &UserObjectSetEvent| {
            sink.borrow_mut().push(tree.user_object_as::<u32>(e.node, &e.id).copied());
            ListenerResult::Propagate
        });
        tree.set_user_object(n, "hp", Some(Box::new(3_u32)));
        tree.set_user_object(n, "hp", Some(Box::new(4_u32)));
        tree.set_user_object(n, "hp", None);
        assert_eq!(*read.borrow(), [Some(3), Some(4), None]);
    }

    #[test]
    fn replacing_drops_previous_value() {
        let token = Rc::new(());
        let mut tree = Tree::new();
        let n = tree.create_node();
        tree.set_user_object(n, "k", Some(Box::new(token.clone())));
        assert_eq!(Rc::strong_count(&token), 2);
        tree.set_user_object(n, "k", Some(Box::new("text")));
        assert_eq!(Rc::strong_count(&token), 1);
        assert_eq!(tree.user_object_as::<&str>(n, "k"), Some(&"text"));

        tree.set_legacy_user_object(n, Some(Box::new(7_i64)));
        assert!(tree.legacy_user_object(n).is_some());
        *tree.user_object_as_mut::<i64>(n, "").unwrap() += 1;
        assert_eq!(tree.user_object_as::<i64>(n, ""), Some(&8));
    }

    #[test]
    fn filter_selects_node_and_id() {
        let mut tree = Tree::new();
        let a = tree.create_node();
        let b = tree.create_node();
        let only_a = record(&mut tree, UserObjectSetFilter::new(a, "x"));
        let everything = record(&mut tree, UserObjectSetFilter::default());
        tree.set_user_object(a, "x", Some(Box::new(1_u8)));
        tree.set_user_object(a, "y", Some(Box::new(1_u8)));
        tree.set_user_object(b, "x", Some(Box::new(1_u8)));
        assert_eq!(only_a.borrow().len(), 1);
        assert_eq!(everything.borrow().len(), 3);
    }

    #[test]
    fn listeners_can_mutate_tree_and_stop() {
        struct Poke(i32);
        let mut tree = Tree::new();
        let n = tree.create_node();
        let first = tree
            .add_event_listener(n, "poke", EveryEvent::<Poke>::new(), move |tree, e: &Poke| {
                tree.set_tag(n, e.0);
                ListenerResult::Stop
            })
            .unwrap();
        tree.add_event_listener(n, "poke", EveryEvent::<Poke>::new(), move |tree, _: &Poke| {
            tree.set_tag(n, -100);
            ListenerResult::Propagate
        });
        assert_eq!(tree.event_listener(n, "poke"), Some(first));
        assert_eq!(tree.event_listener_count(n), 2);

        assert_eq!(tree.post_event(&Poke(5)), ListenerResult::Stop);
        assert_eq!(tree.get(n).unwrap().tag(), 5, "second listener never ran");

        assert!(tree.remove_event_listener(n, first));
        assert_eq!(tree.post_event(&Poke(6)), ListenerResult::Propagate);
        assert_eq!(tree.get(n).unwrap().tag(), -100);
        assert_eq!(tree.remove_event_listeners(n, "poke"), 1);
        assert!(!tree.has_extension_storage(n));
    }

    #[test]
    fn destroying_node_unregisters_its_listeners() {
        struct Ping;
        let mut tree = Tree::new();
        let n = tree.create_node();
        tree.add_event_listener(n, "a", EveryEvent::<Ping>::new(), |_, _: &Ping| {
            ListenerResult::Propagate
        });
        let global =
            tree.add_global_listener(EveryEvent::<Ping>::new(), |_, _: &Ping| ListenerResult::Stop);
        assert_eq!(tree.events.len(), 2);
        tree.destroy(n);
        assert_eq!(tree.events.ids().collect::<Vec<_>>(), vec![global]);
        assert!(tree.remove_global_listener(global));
        assert!(tree.events.is_empty());
    }

    #[test]
    fn user_data_is_separate_and_silent() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        let seen = record(&mut tree, UserObjectSetFilter::default());
        tree.set_user_data(n, Some(Box::new(3.5_f64)));
        assert_eq!(tree.user_data_as::<f64>(n), Some(&3.5));
        assert!(tree.user_object(n, "").is_none());
        assert!(seen.borrow().is_empty());
    }
}
