// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the frame tree: frame identifiers, classification flags,
//! and the frame-holder accessor trait.

use bitflags::bitflags;

/// Separator between frame names in a path identifier.
///
/// Frame names themselves must not contain this character; see
/// [`FrameTree::insert`](crate::FrameTree::insert).
pub const PATH_SEPARATOR: char = ':';

/// Cache stamp marking a frame's transform-to-root as stale.
///
/// Ticking (or directly repositioning) a frame writes this sentinel; the lazy
/// resolution walk treats any stamp older than its predecessor's as the start
/// of the suffix that must be recomputed.
pub(crate) const STALE_STAMP: i64 = i64::MIN;

/// Identifier for a frame in a [`FrameTree`](crate::FrameTree) (generational).
///
/// This is a small, copyable handle that stays stable across updates but
/// becomes invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On [`forget`](crate::FrameTree::forget), the slot is freed; any existing
///   `FrameId` that pointed to that slot is now dangling.
/// - On reuse of a freed slot, its generation is incremented, producing a new,
///   distinct `FrameId`. Dangling ids never alias a live frame because the
///   generation must match.
///
/// A `FrameId` is deliberately *not* the frame's name-based identity: two
/// frames with equal path identifiers compare equal under
/// [`frames_match`](crate::FrameTree::frames_match) even though their
/// `FrameId`s differ.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameId(pub(crate) u32, pub(crate) u32);

impl FrameId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Immutable classification flags assigned at frame construction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        /// The frame never moves with respect to its tree's root.
        ///
        /// Requires a stationary parent; root frames always carry this flag.
        const STATIONARY = 0b0000_0001;
        /// The frame's z-axis stays aligned with the root frame's z-axis.
        const Z_UP = 0b0000_0010;
        /// The transform to the parent is constant: ticking is a no-op and
        /// direct repositioning is rejected.
        const FIXED_TO_PARENT = 0b0000_0100;
    }
}

impl Default for FrameFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Accessor pattern for geometric values that carry a reference frame.
///
/// External geometric types (points, polygons, shapes) are expected to expose
/// which frame they are expressed in; the frame tree never inspects their
/// payload beyond this. See
/// [`check_same_frame`](crate::FrameTree::check_same_frame).
pub trait FrameBound {
    /// The frame this value is expressed in.
    fn frame(&self) -> FrameId;
}
