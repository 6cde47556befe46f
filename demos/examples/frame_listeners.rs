// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notification.
//!
//! Register a listener on the root and watch additions, removals, and the
//! garbage collection of forgotten frames.
//!
//! Run:
//! - `cargo run -p kinetree_demos --example frame_listeners`

use kinetree_frames::{FrameDef, FrameEvent, FrameTree};

fn main() {
    let (mut tree, world) = FrameTree::with_root("world").unwrap();

    tree.add_listener(world, |event| match event {
        FrameEvent::Added { target, parent } => {
            println!("added   {target:?} under {parent:?}");
        }
        FrameEvent::Removed { target, parent } => {
            println!("removed {target:?} from {parent:?}");
        }
        FrameEvent::Collected { parent } => {
            println!("collected a dead child entry of {parent:?}");
        }
    })
    .unwrap();

    let arm = tree.insert(Some(world), FrameDef::named("arm")).unwrap();
    let hand = tree.insert(Some(arm), FrameDef::named("hand")).unwrap();
    let tool = tree.insert(Some(world), FrameDef::named("tool")).unwrap();

    // Structured removal: one event for the subtree, delivered up the chain.
    tree.remove(hand);

    // Forgetting mimics the last external owner dropping its handle: the slot
    // is freed silently, and the dangling child entry surfaces as a
    // `Collected` event on the next traversal.
    tree.forget(tool);
    let children = tree.children(world).unwrap();
    println!("world now has {} live children", children.len());

    tree.remove(arm);
}
