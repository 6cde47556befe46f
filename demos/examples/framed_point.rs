// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A geometric collaborator type.
//!
//! Shows the intended integration pattern for external geometric types: carry
//! a [`FrameId`], expose it through [`FrameBound`], and let the tree move the
//! payload between frames without ever inspecting it.
//!
//! Run:
//! - `cargo run -p kinetree_demos --example framed_point`

use kinetree_frames::{FrameBound, FrameDef, FrameId, FrameTree};
use kinetree_pose::{DVec3, RigidPose, Transformable};

/// A point tagged with the frame it is expressed in.
#[derive(Copy, Clone, Debug)]
struct FramedPoint {
    frame: FrameId,
    position: DVec3,
}

impl FramedPoint {
    fn new(frame: FrameId, position: DVec3) -> Self {
        Self { frame, position }
    }

    /// Re-expresses this point in another frame.
    fn change_frame(&mut self, tree: &FrameTree, target: FrameId) {
        tree.transform_in_place(self.frame, target, &mut self.position)
            .unwrap();
        self.frame = target;
    }

    /// Distance to another point, which must live in the same frame.
    fn distance_to(&self, tree: &FrameTree, other: &Self) -> f64 {
        tree.check_same_frame_of(self, other).unwrap();
        (self.position - other.position).length()
    }
}

impl FrameBound for FramedPoint {
    fn frame(&self) -> FrameId {
        self.frame
    }
}

impl Transformable for FramedPoint {
    fn apply_pose(&mut self, pose: &RigidPose) {
        self.position.apply_pose(pose);
    }

    fn apply_inverse_pose(&mut self, pose: &RigidPose) {
        self.position.apply_inverse_pose(pose);
    }
}

fn main() {
    let (mut tree, world) = FrameTree::with_root("world").unwrap();
    let table = tree
        .insert(
            Some(world),
            FrameDef::fixed_offset("table", DVec3::new(2.0, 0.0, 0.75)),
        )
        .unwrap();

    // A mug sits on the table; a door handle is known in world coordinates.
    let mut mug = FramedPoint::new(table, DVec3::new(0.1, -0.2, 0.0));
    let handle = FramedPoint::new(world, DVec3::new(4.0, 1.0, 1.0));

    // Mixing frames is a programming error the tree turns into a typed one.
    let err = tree.check_same_frame_of(&mug, &handle).unwrap_err();
    println!("as expected: {err}");

    // Re-express the mug in world coordinates, then measure.
    mug.change_frame(&tree, world);
    println!("mug in world:   {:?}", mug.position);
    println!(
        "mug-to-handle:  {:.3} m",
        mug.distance_to(&tree, &handle)
    );
}
