// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame tree basics.
//!
//! Build a small robot rig, tick a moving frame, and resolve poses between
//! frames.
//!
//! Run:
//! - `cargo run -p kinetree_demos --example frame_tree_basics`

use kinetree_frames::{FrameDef, FrameTree};
use kinetree_pose::{DQuat, DVec3, RigidPose};

fn main() {
    let (mut tree, world) = FrameTree::with_root("world").unwrap();

    // A walking robot: the pelvis moves through the world, the feet hang off
    // it, and a camera is bolted to the pelvis.
    let pelvis = tree
        .insert(
            Some(world),
            FrameDef::with_pose(
                "pelvis",
                RigidPose::from_translation(DVec3::new(0.0, 0.0, 0.9)),
            ),
        )
        .unwrap();
    let left_foot = tree
        .insert(
            Some(pelvis),
            FrameDef::with_pose(
                "left_foot",
                RigidPose::from_translation(DVec3::new(0.0, 0.1, -0.9)),
            ),
        )
        .unwrap();
    let camera = tree
        .insert(
            Some(pelvis),
            FrameDef::fixed_offset("camera", DVec3::new(0.1, 0.0, 0.5)),
        )
        .unwrap();

    // The pelvis drifts forward a little each tick and yaws slowly.
    tree.set_updater(pelvis, |_, pose| {
        pose.translation.x += 0.05;
        pose.rotation = DQuat::from_rotation_z(0.01) * pose.rotation;
    })
    .unwrap();

    for step in 0..10 {
        tree.tick(pelvis).unwrap();
        let camera_in_world = tree.resolve_between(camera, world).unwrap();
        println!(
            "step {step}: camera at {:?} in world",
            camera_in_world.translation
        );
    }

    // Where is the camera as seen from the left foot? Both share the pelvis
    // as parent, so this takes the sibling shortcut.
    let camera_in_foot = tree.resolve_between(camera, left_foot).unwrap();
    println!("camera in left_foot: {:?}", camera_in_foot.translation);

    // A point on the floor below the camera, carried into world coordinates.
    let mut point = DVec3::new(0.0, 0.0, -1.4);
    tree.transform_in_place(camera, world, &mut point).unwrap();
    println!("floor point in world: {point:?}");
}
