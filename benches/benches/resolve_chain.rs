// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kinetree_frames::{FrameDef, FrameId, FrameTree};
use kinetree_pose::{DQuat, DVec3, RigidPose};

/// Builds a single chain of `depth` frames under one root, each with a small
/// rotation and translation.
fn build_chain(depth: usize) -> (FrameTree, Vec<FrameId>) {
    let (mut tree, root) = FrameTree::with_root("world").unwrap();
    let mut frames = vec![root];
    let mut parent = root;
    for i in 0..depth {
        let pose = RigidPose::new(
            DQuat::from_rotation_z(0.01 * i as f64),
            DVec3::new(1.0, 0.0, 0.1 * i as f64),
        );
        let id = tree
            .insert(Some(parent), FrameDef::with_pose(format!("link{i}"), pose))
            .unwrap();
        frames.push(id);
        parent = id;
    }
    (tree, frames)
}

fn bench_resolve_after_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_after_tick");
    for depth in [4_usize, 16, 64] {
        let (mut tree, frames) = build_chain(depth);
        let mid = frames[depth / 2];
        let leaf = *frames.last().unwrap();
        group.bench_function(format!("depth_{depth}"), |b| {
            b.iter(|| {
                // Move one mid-chain frame, then query the leaf: the repair
                // covers exactly the stale suffix.
                tree.tick(mid).unwrap();
                black_box(tree.transform_to_root(leaf).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_resolve_warm(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_warm");
    for depth in [4_usize, 16, 64] {
        let (tree, frames) = build_chain(depth);
        let leaf = *frames.last().unwrap();
        tree.transform_to_root(leaf).unwrap();
        group.bench_function(format!("depth_{depth}"), |b| {
            b.iter(|| black_box(tree.transform_to_root(leaf).unwrap()));
        });
    }
    group.finish();
}

fn bench_shortcut_vs_general(c: &mut Criterion) {
    let (mut tree, root) = FrameTree::with_root("world").unwrap();
    let parent = tree
        .insert(
            Some(root),
            FrameDef::with_pose(
                "parent",
                RigidPose::from_translation(DVec3::new(1.0, 2.0, 3.0)),
            ),
        )
        .unwrap();
    let left = tree
        .insert(
            Some(parent),
            FrameDef::with_pose(
                "left",
                RigidPose::new(DQuat::from_rotation_z(0.5), DVec3::new(0.5, 0.0, 0.0)),
            ),
        )
        .unwrap();
    let right = tree
        .insert(
            Some(parent),
            FrameDef::with_pose(
                "right",
                RigidPose::new(DQuat::from_rotation_z(-0.5), DVec3::new(-0.5, 0.0, 0.0)),
            ),
        )
        .unwrap();

    let mut group = c.benchmark_group("relative_pose");
    group.bench_function("sibling_shortcut", |b| {
        b.iter(|| black_box(tree.resolve_between(left, right).unwrap()));
    });
    group.bench_function("sibling_general", |b| {
        b.iter(|| {
            let to_root_left = tree.transform_to_root(left).unwrap();
            let to_root_right = tree.transform_to_root(right).unwrap();
            black_box(to_root_right.inverse() * to_root_left)
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_after_tick,
    bench_resolve_warm,
    bench_shortcut_vs_general
);
criterion_main!(benches);
