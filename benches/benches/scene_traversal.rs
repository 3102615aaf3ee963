// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_scene::{NodeBuilder, NodeId, Tree};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Affine, Point};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_z(&mut self, spread: u64) -> i32 {
        (self.next_u64() % spread) as i32 - (spread / 2) as i32
    }
}

/// A root with `width` children, each with `width` leaves, all at random z-orders.
fn build_grid(width: usize, seed: u64) -> (Tree, NodeId) {
    let mut rng = Rng::new(seed);
    let mut tree = Tree::new();
    let root = tree.create_node();
    for i in 0..width {
        let row = tree.create_node_with(
            NodeBuilder::new()
                .position((0.0, i as f64 * 10.0))
                .rotation(i as f64)
                .z_order(rng.next_z(8)),
        );
        tree.add_child(root, row).unwrap();
        for j in 0..width {
            let leaf = tree.create_node_with(
                NodeBuilder::new()
                    .position((j as f64 * 10.0, 0.0))
                    .anchor_point((0.5, 0.5))
                    .content_size((8.0, 8.0))
                    .z_order(rng.next_z(4)),
            );
            tree.add_child(row, leaf).unwrap();
        }
    }
    (tree, root)
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sibling_order");
    for &n in &[16_usize, 64, 256] {
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("sort_all_children_n{}", n), |b| {
            b.iter_batched(
                || build_grid(n, 0x9E37_79B9),
                |(mut tree, root)| {
                    tree.sort_all_children(root);
                    let rows = tree.children(root).to_vec();
                    for row in rows {
                        tree.sort_all_children(row);
                    }
                    black_box(tree);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_visit(c: &mut Criterion) {
    let mut group = c.benchmark_group("visit");
    for &n in &[16_usize, 64, 256] {
        group.throughput(Throughput::Elements((n * n) as u64));
        let (mut tree, root) = build_grid(n, 7);
        tree.visit(root, &mut |_: &Tree, _: NodeId, _: Affine| {});
        group.bench_function(format!("clean_n{}", n), |b| {
            b.iter(|| {
                let mut drawn = 0_usize;
                tree.visit(root, &mut |_: &Tree, _: NodeId, _: Affine| drawn += 1);
                black_box(drawn)
            });
        });
        group.bench_function(format!("root_moved_n{}", n), |b| {
            let mut x = 0.0;
            b.iter(|| {
                x += 1.0;
                tree.set_position(root, Point::new(x, 0.0));
                let mut drawn = 0_usize;
                tree.visit(root, &mut |_: &Tree, _: NodeId, _: Affine| drawn += 1);
                black_box(drawn)
            });
        });
    }
    group.finish();
}

fn bench_world_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_transform");
    let (tree, root) = build_grid(64, 11);
    let leaf = tree.children(tree.children(root)[0])[0];
    group.bench_function("convert_to_world_space", |b| {
        b.iter(|| black_box(tree.convert_to_world_space(leaf, Point::new(1.0, 2.0))));
    });
    group.bench_function("node_to_world_transform_fast", |b| {
        b.iter(|| black_box(tree.node_to_world_transform_fast(leaf)));
    });
    group.finish();
}

criterion_group!(benches, bench_sort, bench_visit, bench_world_transform);
criterion_main!(benches);
