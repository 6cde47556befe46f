// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=kinetree_frames --heading-base-level=0

//! Kinetree Frames: a coordinate-frame tree with lazy transform caching.
//!
//! Frames are organized as trees: each frame knows its pose relative to its
//! parent, and the tree answers "what is the pose between any two frames"
//! without redundant recomputation when frames move every simulation tick.
//!
//! - Frames live in an arena and are addressed by generational [`FrameId`]
//!   handles.
//! - Moving a frame ([`FrameTree::tick`] or
//!   [`FrameTree::set_transform_to_parent`]) is O(1): it stamps the frame
//!   stale and advances the tree's version counter. Composition work happens
//!   lazily, on query, and only for the stale suffix of the queried frame's
//!   root path.
//! - [`FrameTree::resolve_between`] special-cases directly and near-directly
//!   related frames (parent, sibling, grandparent) so the common lookups skip
//!   full root-path composition entirely.
//! - Name uniqueness is enforced per subtree at three strengths
//!   ([`NameRestriction`]), and structural changes are observable through
//!   listeners registered anywhere up the ancestor chain ([`FrameEvent`]).
//!
//! External geometric types are expected to carry a [`FrameId`] (see
//! [`FrameBound`]) and ask the tree for transforms; the tree never inspects
//! their payload.
//!
//! # Example
//!
//! ```rust
//! use kinetree_frames::{FrameDef, FrameTree};
//! use kinetree_pose::{DVec3, RigidPose};
//!
//! let (mut tree, world) = FrameTree::with_root("world").unwrap();
//!
//! // A moving body with a rigidly mounted sensor.
//! let body = tree
//!     .insert(
//!         Some(world),
//!         FrameDef::with_pose("body", RigidPose::from_translation(DVec3::new(1.0, 0.0, 0.0))),
//!     )
//!     .unwrap();
//! let sensor = tree
//!     .insert(Some(body), FrameDef::fixed_offset("sensor", DVec3::new(0.0, 2.0, 0.0)))
//!     .unwrap();
//!
//! // Where is the sensor in world coordinates?
//! let pose = tree.resolve_between(sensor, world).unwrap();
//! assert_eq!(pose.translation, DVec3::new(1.0, 2.0, 0.0));
//!
//! // The body moves; the sensor's own transform is untouched, and the next
//! // query repairs exactly the stale part of the chain.
//! tree.set_transform_to_parent(body, RigidPose::from_translation(DVec3::new(3.0, 0.0, 0.0)))
//!     .unwrap();
//! let pose = tree.resolve_between(sensor, world).unwrap();
//! assert_eq!(pose.translation, DVec3::new(3.0, 2.0, 0.0));
//!
//! // Values move between frames without intermediate allocations.
//! let mut point = DVec3::ZERO;
//! tree.transform_in_place(sensor, world, &mut point).unwrap();
//! assert_eq!(point, DVec3::new(3.0, 2.0, 0.0));
//! ```
//!
//! ## Concurrency model
//!
//! Structural mutation and ticking take `&mut FrameTree`; queries take
//! `&FrameTree` and repair caches through interior mutability. The borrow
//! checker therefore enforces the intended schedule: any number of readers
//! between ticks, one writer during them. For applications that share the
//! tree more loosely, an [update gate](FrameTree::set_update_gate) confines
//! cache recomputation to frames it approves, and a per-frame guard turns
//! reentrant queries (a malformed updater or gate querying mid-resolution)
//! into harmless stale reads instead of recursion.
//!
//! This crate is `no_std` and uses `alloc`; enable the `libm` feature for
//! builds without `std`.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod log;
mod resolve;

pub mod error;
pub mod notify;
pub mod restriction;
pub mod tree;
pub mod types;

pub use error::FrameTreeError;
pub use notify::{FrameEvent, ListenerId};
pub use restriction::NameRestriction;
pub use tree::{FrameDef, FrameTree, PoseUpdater, UpdateGate};
pub use types::{FrameBound, FrameFlags, FrameId, PATH_SEPARATOR};

pub use kinetree_pose::{RigidPose, Transformable};
