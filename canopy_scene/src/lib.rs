// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Scene: a Kurbo-native, retained-mode 2D scene graph.
//!
//! Canopy Scene is the node layer of a game or UI engine: a tree of nodes with
//! local geometry, lazily cached transforms, a stable sibling order, lifecycle
//! hooks, and per-node extension points.
//!
//! - Nodes live in an arena owned by [`Tree`] and are addressed by generational [`NodeId`]s.
//! - Each node carries position, scale, rotation, skew, anchor point and content size;
//!   local and world matrices are derived from them on demand and cached.
//! - Children are ordered by explicit z-order, ties broken by arrival order.
//!   Sorting is deferred until a traversal or an explicit [`Tree::sort_all_children`].
//! - Nodes enter and exit a running scene, with hooks on a [`NodeBehavior`] and on
//!   attached [`Component`]s.
//!
//! ## Ownership
//!
//! A parent owns its children. A node created with [`Tree::create_node`] is
//! detached until it is added somewhere; once removed from its parent it is
//! destroyed, unless [`Tree::retain`] put an external hold on it. Destroying a
//! node destroys its subtree, except for held descendants, which become detached.
//!
//! ## Re-entrancy
//!
//! Hooks, component callbacks, layouts, event listeners and timers all receive
//! `&mut Tree` and may restructure the tree. The object whose callback is
//! running is taken out of the tree for the duration of the call; child lists
//! are snapshotted before recursion. Changes are visible as soon as the
//! callback returns.
//!
//! ## Extension points
//!
//! - Auxiliary objects: [`Tree::set_user_object`] stores typed values under string ids and
//!   posts a [`UserObjectSetEvent`] for every change.
//! - Event listeners: [`Tree::add_event_listener`] registers a [`canopy_events`] listener
//!   owned by a node.
//! - Layout: [`Tree::set_layout`] attaches a [`Layout`]; [`AnchorLayout`] is built in.
//! - Color: [`Tree::enable_color`] adds [`ColorState`] with cascading opacity and color.
//! - Scheduling: [`Tree::schedule`] and [`Tree::schedule_update`], driven by [`Tree::tick`].
//!
//! ## Minimal usage
//!
//! ```
//! use canopy_scene::{NodeBuilder, NodeId, Tree};
//! use kurbo::{Affine, Point};
//!
//! let mut tree = Tree::new();
//! let scene = tree.create_node();
//! tree.run_scene(scene).unwrap();
//!
//! let b = tree.create_node_with(NodeBuilder::new().id("b").position((10.0, 0.0)));
//! let c = tree.create_node_with(NodeBuilder::new().id("c"));
//! let d = tree.create_node_with(NodeBuilder::new().id("d").z_order(-1));
//! for n in [b, c, d] {
//!     tree.add_child(scene, n).unwrap();
//! }
//! // Entered as soon as it was added.
//! assert!(tree.is_running(b));
//!
//! let mut order = Vec::new();
//! tree.visit(scene, &mut |t: &Tree, id: NodeId, _: Affine| order.push(t.get(id).unwrap().id().to_owned()));
//! assert_eq!(order, ["d", "", "b", "c"]);
//!
//! let world = tree.convert_to_world_space(b, Point::new(1.0, 1.0));
//! assert_eq!(world, Point::new(11.0, 1.0));
//! assert_eq!(tree.query_selector(scene, "c"), Some(c));
//! ```
//!
//! ### Auxiliary objects and events
//!
//! ```
//! use canopy_scene::{Tree, UserObjectSetEvent, UserObjectSetFilter};
//! use canopy_events::ListenerResult;
//!
//! let mut tree = Tree::new();
//! let node = tree.create_node();
//! tree.add_global_listener(UserObjectSetFilter::new(node, "score"), |tree, e: &UserObjectSetEvent| {
//!     // Listeners get the tree back and can react right away.
//!     tree.set_tag(e.node, if e.value.is_some() { 1 } else { 0 });
//!     ListenerResult::Propagate
//! });
//!
//! tree.set_user_object(node, "score", Some(Box::new(42_u32)));
//! assert_eq!(tree.get(node).unwrap().tag(), 1);
//! assert_eq!(tree.user_object_as::<u32>(node, "score"), Some(&42));
//!
//! tree.set_user_object(node, "score", None);
//! assert_eq!(tree.get(node).unwrap().tag(), 0);
//! ```
//!
//! This crate requires `std` for trigonometry.

extern crate alloc;

mod color;
mod component;
mod error;
mod extension;
mod geometry;
mod layout;
mod lifecycle;
mod node;
mod order;
mod query;
mod schedule;
mod transform;
mod tree;
mod types;
mod visit;

pub use color::{Color3B, ColorState};
pub use component::{Component, ComponentId};
pub use error::TreeError;
pub use extension::{UserObjectSetEvent, UserObjectSetFilter};
pub use layout::{Anchor, AnchorLayout, AnchorLayoutOptions, Layout, LayoutOptions};
pub use lifecycle::NodeBehavior;
pub use node::{Node, NodeBuilder};
pub use order::{ArrivalCounter, SiblingKey};
pub use query::{Combinator, Step, parse_query};
pub use schedule::{Repeat, TimerCallback, TimerId};
pub use transform::{DirtyFlags, Geometry};
pub use tree::{Tree, TreeConfig};
pub use types::{NodeFlags, NodeId};
pub use visit::Renderer;

pub use canopy_events;
