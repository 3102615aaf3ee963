// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Anchored layout, queries and user objects.
//!
//! Pin buttons to the corners of a panel, resize it, find nodes by selector,
//! and watch auxiliary object changes through the event dispatcher.
//!
//! Run:
//! - `cargo run -p canopy_demos --example anchored_layout`

use canopy_events::ListenerResult;
use canopy_scene::{Anchor, NodeBuilder, Tree, UserObjectSetEvent, UserObjectSetFilter};
use kurbo::{Point, Size, Vec2};

fn main() {
    env_logger::init();

    let mut tree = Tree::new();
    let scene = tree.create_node();
    tree.run_scene(scene).unwrap();

    let panel = tree.create_node_with(
        NodeBuilder::new()
            .id("panel")
            .content_size((300.0, 200.0))
            .position((400.0, 300.0))
            .anchor_point((0.5, 0.5)),
    );
    tree.add_child(scene, panel).unwrap();

    for (id, anchor, offset) in [
        ("close", Anchor::TopRight, Vec2::new(-8.0, -8.0)),
        ("title", Anchor::Top, Vec2::new(0.0, -20.0)),
        ("ok", Anchor::Bottom, Vec2::new(0.0, 16.0)),
    ] {
        let button = tree.create_node_with(NodeBuilder::new().id(id).content_size((24.0, 24.0)));
        tree.add_child_at_position(panel, button, anchor, offset, Some(Point::new(0.5, 0.5)), true)
            .unwrap();
    }

    let report = |tree: &Tree, label: &str| {
        for id in ["close", "title", "ok"] {
            let Some(n) = tree.query_selector(scene, &format!("panel > {id}")) else {
                continue;
            };
            let world = tree.convert_to_world_space_ar(n, Point::ZERO);
            println!("{label}: {id:>5} at {world:?}");
        }
    };
    report(&tree, "initial");

    tree.set_content_size(panel, Size::new(500.0, 120.0));
    tree.update_layout(panel, true);
    report(&tree, "resized");

    tree.add_global_listener(UserObjectSetFilter::default(), |tree, e: &UserObjectSetEvent| {
        let who = tree.get(e.node).map(|n| n.id().to_owned()).unwrap_or_default();
        match e.value {
            Some(_) => log::info!("{who}: {:?} set", e.id),
            None => log::info!("{who}: {:?} cleared", e.id),
        }
        ListenerResult::Propagate
    });
    if let Some(ok) = tree.query_selector(scene, "panel ok") {
        tree.set_user_object(ok, "action", Some(Box::new("confirm")));
        println!("ok action: {:?}", tree.user_object_as::<&str>(ok, "action"));
        tree.set_user_object(ok, "action", None);
    }
}
