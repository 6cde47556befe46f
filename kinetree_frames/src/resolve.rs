// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy transform-to-root repair and relative-pose resolution.
//!
//! Ticking a frame only stamps it stale; the composition work happens here,
//! on query, and only for the stale suffix of the queried frame's root path.
//! Frames that are never queried after moving never pay a composition cost.

use core::cell::Cell;

use kinetree_pose::{RigidPose, Transformable};

use crate::error::FrameTreeError;
use crate::log;
use crate::tree::{FrameTree, Node, TreeRegistry};
use crate::types::FrameId;

/// Clears a frame's in-flight marker when its resolution ends, however it
/// ends.
struct InFlightGuard<'a>(&'a Cell<bool>);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.get() {
            None
        } else {
            flag.set(true);
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl FrameTree {
    /// The frame's pose expressed in its tree's root frame, repairing stale
    /// caches along the way.
    ///
    /// The repair walks the precomputed root path once. A frame is stale when
    /// its cache stamp is older than the stamp of the frame before it on the
    /// path; from the first stale frame on, every remaining frame is
    /// recomputed as its parent's root transform composed with its own
    /// transform-to-parent, rotation renormalized, under a single freshly
    /// drawn version.
    ///
    /// Two situations return the cached value without repairing: an installed
    /// [update gate](Self::set_update_gate) refusing this frame, and a
    /// reentrant query for a frame whose resolution is already on the call
    /// stack (the latter keeps a malformed updater or gate from deadlocking;
    /// the caller simply sees the previous value for this one call).
    pub fn transform_to_root(&self, id: FrameId) -> Result<RigidPose, FrameTreeError> {
        let node = self.node_ok(id)?;
        if node.parent.is_none() {
            return Ok(RigidPose::IDENTITY);
        }
        let root = node.path_from_root[0];
        let registry = self
            .node(root)
            .registry
            .as_ref()
            .expect("root frame carries the tree registry");
        let Some(_guard) = InFlightGuard::acquire(&node.repair_in_flight) else {
            return Ok(node.transform_to_root.get());
        };
        if let Some(gate) = registry.update_gate.as_ref() {
            if !gate(self, id) {
                return Ok(node.transform_to_root.get());
            }
        }
        self.repair_to_root(id, node, registry)
    }

    fn repair_to_root(
        &self,
        queried_id: FrameId,
        queried: &Node,
        registry: &TreeRegistry,
    ) -> Result<RigidPose, FrameTreeError> {
        let mut must_recompute = false;
        let mut fresh_version = 0_i64;
        let mut previous_stamp = 0_i64;
        for &frame_id in &queried.path_from_root {
            let frame = self.node(frame_id);
            if !must_recompute && frame.cache_stamp.get() < previous_stamp {
                must_recompute = true;
                // One fresh version covers the whole stale suffix.
                fresh_version = registry.draw_version();
                log::trace!(
                    frame = %queried.path_id,
                    version = fresh_version,
                    "recomputing stale transform suffix"
                );
            }
            if must_recompute {
                if frame_id != queried_id && frame.repair_in_flight.get() {
                    // Mid-write by an enclosing resolution; settle for the
                    // previous value rather than read a torn cache.
                    return Ok(queried.transform_to_root.get());
                }
                if let Some(parent_id) = frame.parent {
                    let parent = self.node(parent_id);
                    let parent_to_root = if parent.parent.is_none() {
                        RigidPose::IDENTITY
                    } else {
                        parent.transform_to_root.get()
                    };
                    let composed = (parent_to_root * frame.transform_to_parent)
                        .renormalized()
                        .map_err(|source| FrameTreeError::NotARotation {
                            a: frame.path_id.clone(),
                            b: queried.path_id.clone(),
                            source,
                        })?;
                    frame.transform_to_root.set(composed);
                    frame.cache_stamp.set(fresh_version);
                }
            }
            previous_stamp = frame.cache_stamp.get();
        }
        Ok(queried.transform_to_root.get())
    }

    /// The pose mapping quantities expressed in `from` into `to`.
    ///
    /// The trivial and near-trivial shapes are special-cased, in priority
    /// order: identical frames, either endpoint being the root, direct
    /// parent/child, shared parent, and grandparent at distance two. Only the
    /// general case composes both lazily repaired root transforms. The
    /// shortcuts are a pure optimization; each must agree with the general
    /// case within floating tolerance.
    pub fn resolve_between(
        &self,
        from: FrameId,
        to: FrameId,
    ) -> Result<RigidPose, FrameTreeError> {
        let a = self.node_ok(from)?;
        let b = self.node_ok(to)?;
        if from == to {
            return Ok(RigidPose::IDENTITY);
        }
        if a.path_from_root[0] != b.path_from_root[0] {
            return Err(FrameTreeError::DifferentTree {
                a: a.path_id.clone(),
                b: b.path_id.clone(),
            });
        }
        if a.parent.is_none() {
            // `from` is the root, so its root transform is the identity and
            // `to` cannot also be the root.
            return Ok(self
                .transform_to_root(to)
                .map_err(|e| remap_rotation_error(e, a, b))?
                .inverse());
        }
        if b.parent.is_none() {
            return self
                .transform_to_root(from)
                .map_err(|e| remap_rotation_error(e, a, b));
        }
        if let (Some(a_parent), Some(b_parent)) = (a.parent, b.parent) {
            if a_parent == to {
                return Ok(a.transform_to_parent);
            }
            if b_parent == from {
                return Ok(b.transform_to_parent.inverse());
            }
            if a_parent == b_parent {
                // Sibling transforms are usually much simpler than full root
                // transforms; one multiplication beats two resolutions.
                return Ok(b.transform_to_parent.inverse() * a.transform_to_parent);
            }
            if self.node(a_parent).parent == Some(to) {
                // `to` two hops up. The intermediate parent cannot be a root
                // here, so its transform contributes.
                return Ok(self.node(a_parent).transform_to_parent * a.transform_to_parent);
            }
            if self.node(b_parent).parent == Some(from) {
                return Ok(b.transform_to_parent.inverse()
                    * self.node(b_parent).transform_to_parent.inverse());
            }
        }
        // General case: compose both lazily repaired root transforms.
        let a_to_root = self
            .transform_to_root(from)
            .map_err(|e| remap_rotation_error(e, a, b))?;
        let b_to_root = self
            .transform_to_root(to)
            .map_err(|e| remap_rotation_error(e, a, b))?;
        Ok(b_to_root.inverse() * a_to_root)
    }

    /// Applies the transform from `from` to `to` directly to a transformable
    /// value.
    ///
    /// Shares the case analysis with [`resolve_between`](Self::resolve_between)
    /// by construction, so the effect on `value` is bit-identical to applying
    /// the pose that call returns.
    pub fn transform_in_place(
        &self,
        from: FrameId,
        to: FrameId,
        value: &mut impl Transformable,
    ) -> Result<(), FrameTreeError> {
        self.node_ok(from)?;
        self.node_ok(to)?;
        if from == to {
            return Ok(());
        }
        let pose = self.resolve_between(from, to)?;
        value.apply_pose(&pose);
        Ok(())
    }
}

fn remap_rotation_error(err: FrameTreeError, a: &Node, b: &Node) -> FrameTreeError {
    match err {
        FrameTreeError::NotARotation { source, .. } => FrameTreeError::NotARotation {
            a: a.path_id.clone(),
            b: b.path_id.clone(),
            source,
        },
        other => other,
    }
}
