// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for frame-tree operations.
//!
//! Messages always carry the full path identifier of every frame involved: the
//! common real-world failure this guards against is silently confusing two
//! same-named frames that live in different trees.

use alloc::string::String;

use kinetree_pose::PoseError;
use thiserror::Error;

use crate::restriction::NameRestriction;

/// Errors surfaced by [`FrameTree`](crate::FrameTree) operations.
///
/// None of these are retried internally; every variant is unrecoverable at the
/// point of detection and surfaced to the caller immediately. The one
/// silently-tolerated condition, a reentrant resolution hitting a frame whose
/// repair is already in flight, is not an error: the caller receives the
/// previous cached value instead.
#[derive(Error, Debug)]
pub enum FrameTreeError {
    /// Operation on a frame that was removed from its tree, or on a dangling
    /// handle whose slot has been freed.
    #[error("frame '{frame}' has been removed from its tree")]
    RemovedFrame {
        /// Path of the removed frame, or a handle description when the slot
        /// is already gone.
        frame: String,
    },

    /// Two frames do not share the same root; no transform exists between
    /// them.
    #[error("frames '{a}' and '{b}' do not share the same root frame")]
    DifferentTree {
        /// Path of the first frame.
        a: String,
        /// Path of the second frame.
        b: String,
    },

    /// A frame name contains the reserved separator or violates a uniqueness
    /// constraint.
    #[error("invalid frame name '{name}': {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name was rejected, including the paths involved.
        reason: String,
    },

    /// Illegal change of a subtree's name-restriction level.
    #[error("cannot change name restriction of '{frame}' from {from:?} to {to:?}: {reason}")]
    RestrictionLevel {
        /// Path of the frame whose level was being changed.
        frame: String,
        /// The current level.
        from: NameRestriction,
        /// The requested level.
        to: NameRestriction,
        /// Why the change was rejected.
        reason: String,
    },

    /// A composed rotation failed its orthonormality repair.
    #[error("transform between '{a}' and '{b}' does not have a valid rotation: {source}")]
    NotARotation {
        /// Path of the first frame involved.
        a: String,
        /// Path of the second frame involved.
        b: String,
        /// The underlying numerical failure.
        source: PoseError,
    },

    /// A structural invariant would be violated.
    #[error("invariant violated for frame '{frame}': {reason}")]
    InvariantViolation {
        /// Path of the frame the operation targeted.
        frame: String,
        /// The violated invariant.
        reason: String,
    },

    /// Two framed values were expected to be expressed in the same frame.
    #[error("frame mismatch: '{a}' does not match '{b}'")]
    FrameMismatch {
        /// Path of the first value's frame.
        a: String,
        /// Path of the second value's frame.
        b: String,
    },
}
