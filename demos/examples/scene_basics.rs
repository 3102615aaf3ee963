// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene basics.
//!
//! Run a scene, add children with z-orders, react to lifecycle hooks, tick a
//! timer, and draw in sibling order.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p canopy_demos --example scene_basics`

use canopy_scene::{NodeBehavior, NodeBuilder, NodeId, Repeat, Tree};
use kurbo::{Affine, Point};

struct Announce;

impl NodeBehavior for Announce {
    fn on_enter(&mut self, tree: &mut Tree, node: NodeId) {
        log::info!("{:?} entered", tree.get(node).map(|n| n.id().to_owned()));
    }

    fn on_exit(&mut self, tree: &mut Tree, node: NodeId) {
        log::info!("{:?} exited", tree.get(node).map(|n| n.id().to_owned()));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut tree = Tree::new();
    let scene = tree.create_node_with(NodeBuilder::new().id("scene").behavior(Announce));
    tree.run_scene(scene).unwrap();

    // B and C share z = 0 and keep insertion order; D sorts before both.
    let b = tree.create_node_with(
        NodeBuilder::new()
            .id("b")
            .position((100.0, 50.0))
            .rotation(90.0)
            .behavior(Announce),
    );
    let c = tree.create_node_with(NodeBuilder::new().id("c").behavior(Announce));
    let d = tree.create_node_with(NodeBuilder::new().id("d").z_order(-1).behavior(Announce));
    for n in [b, c, d] {
        tree.add_child(scene, n).unwrap();
    }

    tree.schedule(b, "spin", 0.25, Repeat::Times(4), 0.0, |tree, node, dt| {
        let r = tree.get(node).and_then(|n| n.rotation()).unwrap_or(0.0);
        tree.set_rotation(node, r + 90.0 * dt);
    });
    for _ in 0..8 {
        tree.tick(1.0 / 8.0);
    }
    println!("b rotation after 1s: {:?}", tree.get(b).and_then(|n| n.rotation()));

    let corner = tree.convert_to_world_space(b, Point::new(10.0, 0.0));
    println!("b's (10, 0) in world space: {corner:?}");

    tree.visit(scene, &mut |t: &Tree, id: NodeId, world: Affine| {
        let name = t.get(id).map(|n| n.id()).unwrap_or_default();
        println!("draw {name:>5} at {:?}", world * Point::ZERO);
    });

    tree.remove_child(scene, c, true);
    println!("children after removing c: {}", tree.children_count(scene));
    tree.end_scene();
}
