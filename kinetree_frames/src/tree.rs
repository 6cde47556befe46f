// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, insertion, removal, ticking.

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use kinetree_pose::{DVec3, RigidPose};

use crate::error::FrameTreeError;
use crate::log;
use crate::notify::{FrameEvent, Listener, ListenerId};
use crate::restriction::{NameRestriction, default_root_restriction};
use crate::types::{FrameBound, FrameFlags, FrameId, PATH_SEPARATOR, STALE_STAMP};

/// Rotations with off-z components below this are treated as z-axis-only when
/// classifying fixed children of z-up frames.
const Z_UP_ROTATION_TOL: f64 = 1.0e-7;

/// Callback computing a frame's new transform to its parent on each tick.
///
/// The callback receives a shared view of the tree so it can consult other
/// frames' poses. Querying the ticked frame's own transform-to-root from
/// inside the callback yields the value from before this tick.
pub type PoseUpdater = Box<dyn FnMut(&FrameTree, &mut RigidPose)>;

/// Tree-wide predicate deciding whether a frame's cached transform-to-root may
/// be recomputed.
///
/// When the gate returns `false` for a queried frame, resolution returns the
/// cache as-is, possibly stale. Applications use this to confine cache writes
/// to a designated updater thread while other threads read. The gate receives
/// a shared view of the tree; a gate that reentrantly queries the frame it is
/// gating gets the cached value back.
pub type UpdateGate = Box<dyn Fn(&FrameTree, FrameId) -> bool>;

/// Construction parameters for a new frame.
#[derive(Clone, Debug)]
pub struct FrameDef {
    /// Frame name; must not contain [`PATH_SEPARATOR`].
    pub name: String,
    /// Pose of the new frame expressed in its parent frame. Ignored for roots.
    pub transform_to_parent: RigidPose,
    /// Classification flags. Roots are always stationary and z-up.
    pub flags: FrameFlags,
}

impl FrameDef {
    /// A frame at the parent's origin with default flags.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform_to_parent: RigidPose::IDENTITY,
            flags: FrameFlags::empty(),
        }
    }

    /// A frame with the given pose in its parent and default flags.
    pub fn with_pose(name: impl Into<String>, transform_to_parent: RigidPose) -> Self {
        Self {
            name: name.into(),
            transform_to_parent,
            flags: FrameFlags::empty(),
        }
    }

    /// A frame whose pose in its parent never changes.
    ///
    /// If the parent is z-up and the pose rotates about z only, the new frame
    /// is classified z-up as well.
    pub fn fixed(name: impl Into<String>, transform_to_parent: RigidPose) -> Self {
        Self {
            name: name.into(),
            transform_to_parent,
            flags: FrameFlags::FIXED_TO_PARENT,
        }
    }

    /// A fixed frame offset from its parent by a pure translation.
    pub fn fixed_offset(name: impl Into<String>, offset: DVec3) -> Self {
        Self::fixed(name, RigidPose::from_translation(offset))
    }
}

/// Shared state of one tree, owned by its root frame.
///
/// Keeping this on the root (rather than process-global) means independent
/// trees in the same arena cannot interfere with each other's cache versions.
pub(crate) struct TreeRegistry {
    /// Monotonic cache-version counter. `i64` stamps outlive any realistic
    /// process lifetime.
    pub(crate) next_cache_version: Cell<i64>,
    /// Insertion-order counter for `tree_slot` assignment. Reset only when
    /// the root's subtree is cleared.
    pub(crate) insertion_counter: u64,
    /// Optional predicate suppressing cache recomputation.
    pub(crate) update_gate: Option<UpdateGate>,
}

impl TreeRegistry {
    fn new() -> Self {
        Self {
            next_cache_version: Cell::new(1),
            insertion_counter: 0,
            update_gate: None,
        }
    }

    /// Draws a fresh version for one stale-suffix recomputation.
    pub(crate) fn draw_version(&self) -> i64 {
        let version = self.next_cache_version.get() + 1;
        self.next_cache_version.set(version);
        version
    }
}

pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) name: String,
    pub(crate) path_id: String,
    pub(crate) tree_slot: u64,
    pub(crate) parent: Option<FrameId>,
    /// Child entries are not kept alive by the tree; ids may dangle after
    /// [`FrameTree::forget`] and are lazily pruned.
    pub(crate) children: Vec<FrameId>,
    /// Root..self, precomputed at insertion to drive cache resolution without
    /// re-walking parent links on every query.
    pub(crate) path_from_root: Vec<FrameId>,
    pub(crate) transform_to_parent: RigidPose,
    pub(crate) transform_to_root: Cell<RigidPose>,
    pub(crate) cache_stamp: Cell<i64>,
    pub(crate) repair_in_flight: Cell<bool>,
    pub(crate) flags: FrameFlags,
    pub(crate) removed: bool,
    pub(crate) updater: Option<PoseUpdater>,
    pub(crate) listeners: Vec<(ListenerId, Listener)>,
    pub(crate) restriction: NameRestriction,
    /// Topmost subtree-wide restricted ancestor; `Some` exactly when
    /// `restriction == NameUnique`.
    pub(crate) restriction_owner: Option<FrameId>,
    /// Sibling names, maintained while `restriction == PathUnique`.
    pub(crate) child_names: BTreeSet<String>,
    /// Subtree-wide name set; present only on the restriction owner.
    pub(crate) subtree_names: Option<BTreeSet<String>>,
    /// Present only on roots.
    pub(crate) registry: Option<TreeRegistry>,
}

impl Node {
    fn new(
        generation: u32,
        name: String,
        path_id: String,
        tree_slot: u64,
        parent: Option<FrameId>,
        transform_to_parent: RigidPose,
        flags: FrameFlags,
        restriction: NameRestriction,
    ) -> Self {
        Self {
            generation,
            name,
            path_id,
            tree_slot,
            parent,
            children: Vec::new(),
            path_from_root: Vec::new(),
            transform_to_parent,
            transform_to_root: Cell::new(RigidPose::IDENTITY),
            cache_stamp: Cell::new(STALE_STAMP),
            repair_in_flight: Cell::new(false),
            flags,
            removed: false,
            updater: None,
            listeners: Vec::new(),
            restriction,
            restriction_owner: None,
            child_names: BTreeSet::new(),
            subtree_names: None,
            registry: None,
        }
    }
}

/// Arena of coordinate frames organized as one or more trees.
///
/// Each root frame anchors an independent tree and owns that tree's shared
/// state (cache-version counter, insertion counter, update gate). Frames are
/// addressed by generational [`FrameId`] handles; the arena keeps removed
/// frames resident (so stale handles fail with informative errors) until they
/// are [`forget`](Self::forget)ten.
///
/// Structural mutation and ticking take `&mut self`; transform queries take
/// `&self` and repair stale caches through interior mutability, so any number
/// of readers may share the tree between ticks.
pub struct FrameTree {
    pub(crate) nodes: Vec<Option<Node>>,
    generations: Vec<u32>, // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    pub(crate) next_listener_id: u64,
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for FrameTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let resident = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("FrameTree")
            .field("slots_total", &total)
            .field("slots_resident", &resident)
            .field("free_list", &free)
            .finish_non_exhaustive()
    }
}

impl FrameTree {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            next_listener_id: 1,
        }
    }

    /// Creates an arena holding a single root frame.
    pub fn with_root(name: impl Into<String>) -> Result<(Self, FrameId), FrameTreeError> {
        let mut tree = Self::new();
        let root = tree.insert(None, FrameDef::named(name))?;
        Ok((tree, root))
    }

    /// Inserts a new frame as a child of `parent`, or as a root if `None`.
    ///
    /// Fails without mutating the tree when the name contains
    /// [`PATH_SEPARATOR`] or violates the governing uniqueness constraint,
    /// when the parent is removed, or when a stationary frame is requested
    /// under a non-stationary parent. Fires [`FrameEvent::Added`] at the
    /// parent and every ancestor.
    pub fn insert(
        &mut self,
        parent: Option<FrameId>,
        def: FrameDef,
    ) -> Result<FrameId, FrameTreeError> {
        let FrameDef {
            name,
            transform_to_parent,
            flags,
        } = def;
        if name.contains(PATH_SEPARATOR) {
            return Err(FrameTreeError::InvalidName {
                reason: format!("the name contains the reserved separator '{PATH_SEPARATOR}'"),
                name,
            });
        }
        match parent {
            None => self.insert_root(name, flags),
            Some(parent_id) => self.insert_child(parent_id, name, transform_to_parent, flags),
        }
    }

    fn insert_root(&mut self, name: String, flags: FrameFlags) -> Result<FrameId, FrameTreeError> {
        let flags = flags | FrameFlags::STATIONARY | FrameFlags::Z_UP;
        let restriction = default_root_restriction();
        let (idx, generation) = self.next_slot();
        let id = FrameId::new(idx, generation);
        let mut node = Node::new(
            generation,
            name.clone(),
            name.clone(),
            0,
            None,
            RigidPose::IDENTITY,
            flags,
            restriction,
        );
        // The root's transform-to-root is the identity, valid forever.
        node.cache_stamp = Cell::new(0);
        node.path_from_root = vec![id];
        node.registry = Some(TreeRegistry::new());
        if restriction == NameRestriction::NameUnique {
            node.restriction_owner = Some(id);
            let mut names = BTreeSet::new();
            names.insert(name);
            node.subtree_names = Some(names);
        }
        self.nodes[id.idx()] = Some(node);
        log::trace!(path = %self.node(id).path_id, "inserted root frame");
        Ok(id)
    }

    fn insert_child(
        &mut self,
        parent_id: FrameId,
        name: String,
        transform_to_parent: RigidPose,
        mut flags: FrameFlags,
    ) -> Result<FrameId, FrameTreeError> {
        let (parent_path, parent_flags, parent_restriction, parent_owner, root, mut path_from_root) = {
            let parent = self.node_ok(parent_id)?;
            (
                parent.path_id.clone(),
                parent.flags,
                parent.restriction,
                parent.restriction_owner,
                parent.path_from_root[0],
                parent.path_from_root.clone(),
            )
        };
        let path_id = format!("{parent_path}{PATH_SEPARATOR}{name}");
        if flags.contains(FrameFlags::STATIONARY) && !parent_flags.contains(FrameFlags::STATIONARY)
        {
            return Err(FrameTreeError::InvariantViolation {
                frame: path_id,
                reason: String::from("a stationary frame requires a stationary parent"),
            });
        }
        let pose = transform_to_parent
            .renormalized()
            .map_err(|source| FrameTreeError::NotARotation {
                a: path_id.clone(),
                b: parent_path,
                source,
            })?;
        if flags.contains(FrameFlags::FIXED_TO_PARENT)
            && parent_flags.contains(FrameFlags::Z_UP)
            && pose.is_rotation_about_z(Z_UP_ROTATION_TOL)
        {
            flags |= FrameFlags::Z_UP;
        }
        // Name reservation happens before any linking so a conflict aborts
        // construction with no partial mutation.
        self.check_and_reserve_name(parent_id, parent_restriction, parent_owner, &name)?;
        let tree_slot = {
            let registry = self
                .node_mut(root)
                .registry
                .as_mut()
                .expect("root frame carries the tree registry");
            registry.insertion_counter += 1;
            registry.insertion_counter
        };
        let (idx, generation) = self.next_slot();
        let id = FrameId::new(idx, generation);
        path_from_root.push(id);
        let mut node = Node::new(
            generation,
            name,
            path_id,
            tree_slot,
            Some(parent_id),
            pose,
            flags,
            parent_restriction,
        );
        node.path_from_root = path_from_root;
        node.restriction_owner = parent_owner;
        self.nodes[id.idx()] = Some(node);
        self.node_mut(parent_id).children.push(id);
        log::trace!(path = %self.node(id).path_id, slot = tree_slot, "inserted frame");
        self.notify_up(
            parent_id,
            &FrameEvent::Added {
                target: id,
                parent: parent_id,
            },
        );
        Ok(id)
    }

    /// Ticks a frame: runs its pose updater (if any), marks the cached
    /// transform-to-root stale, and advances the tree's version counter.
    ///
    /// A no-op for roots. Cache recomputation is deferred to the next query;
    /// ticking N frames costs O(N) regardless of tree shape. It is not
    /// necessary to tick frames whose transform to parent never changes, even
    /// when their parent moves.
    pub fn tick(&mut self, id: FrameId) -> Result<(), FrameTreeError> {
        let node = self.node_ok(id)?;
        if node.parent.is_none() {
            return Ok(());
        }
        let root = node.path_from_root[0];
        if let Some(mut updater) = self.node_mut(id).updater.take() {
            let mut pose = self.node(id).transform_to_parent;
            updater(&*self, &mut pose);
            let node = self.node_mut(id);
            node.transform_to_parent = pose;
            node.updater = Some(updater);
        }
        self.node(id).cache_stamp.set(STALE_STAMP);
        self.bump_version(root);
        Ok(())
    }

    /// Repositions a frame relative to its parent.
    ///
    /// Rejected for roots, for frames fixed to their parent, and for
    /// stationary frames. The rotation is renormalized on the way in.
    pub fn set_transform_to_parent(
        &mut self,
        id: FrameId,
        pose: RigidPose,
    ) -> Result<(), FrameTreeError> {
        let (path_id, parent_id, flags, root) = {
            let node = self.node_ok(id)?;
            let Some(parent_id) = node.parent else {
                return Err(FrameTreeError::InvariantViolation {
                    frame: node.path_id.clone(),
                    reason: String::from("a root frame has no transform to its parent"),
                });
            };
            (
                node.path_id.clone(),
                parent_id,
                node.flags,
                node.path_from_root[0],
            )
        };
        if flags.contains(FrameFlags::FIXED_TO_PARENT) {
            return Err(FrameTreeError::InvariantViolation {
                frame: path_id,
                reason: String::from("the frame is fixed to its parent"),
            });
        }
        if flags.contains(FrameFlags::STATIONARY) {
            return Err(FrameTreeError::InvariantViolation {
                frame: path_id,
                reason: String::from("a stationary frame cannot be repositioned"),
            });
        }
        let parent_path = self.node(parent_id).path_id.clone();
        let pose = pose
            .renormalized()
            .map_err(|source| FrameTreeError::NotARotation {
                a: path_id,
                b: parent_path,
                source,
            })?;
        let node = self.node_mut(id);
        node.transform_to_parent = pose;
        node.cache_stamp.set(STALE_STAMP);
        self.bump_version(root);
        Ok(())
    }

    /// Installs or replaces the per-tick pose updater of a frame.
    ///
    /// Stationary and fixed frames cannot move and therefore cannot take an
    /// updater.
    pub fn set_updater(
        &mut self,
        id: FrameId,
        updater: impl FnMut(&Self, &mut RigidPose) + 'static,
    ) -> Result<(), FrameTreeError> {
        let node = self.node_ok(id)?;
        if node
            .flags
            .intersects(FrameFlags::STATIONARY | FrameFlags::FIXED_TO_PARENT)
        {
            return Err(FrameTreeError::InvariantViolation {
                frame: node.path_id.clone(),
                reason: String::from("a stationary or fixed frame cannot take a pose updater"),
            });
        }
        self.node_mut(id).updater = Some(Box::new(updater));
        Ok(())
    }

    /// Installs the tree-wide update gate on a root frame.
    pub fn set_update_gate(
        &mut self,
        root: FrameId,
        gate: impl Fn(&Self, FrameId) -> bool + 'static,
    ) -> Result<(), FrameTreeError> {
        let node = self.node_ok(root)?;
        if node.parent.is_some() {
            return Err(FrameTreeError::InvariantViolation {
                frame: node.path_id.clone(),
                reason: String::from("an update gate can only be installed on a root frame"),
            });
        }
        self.node_mut(root)
            .registry
            .as_mut()
            .expect("root frame carries the tree registry")
            .update_gate = Some(Box::new(gate));
        Ok(())
    }

    /// Removes a previously installed update gate.
    pub fn clear_update_gate(&mut self, root: FrameId) -> Result<(), FrameTreeError> {
        let node = self.node_ok(root)?;
        if node.parent.is_some() {
            return Err(FrameTreeError::InvariantViolation {
                frame: node.path_id.clone(),
                reason: String::from("an update gate can only be installed on a root frame"),
            });
        }
        self.node_mut(root)
            .registry
            .as_mut()
            .expect("root frame carries the tree registry")
            .update_gate = None;
        Ok(())
    }

    /// Removes a frame and its whole subtree from the tree.
    ///
    /// Idempotent; a no-op for roots and for dead handles. The subtree is
    /// detached from the parent, permanently disabled (every further
    /// operation on it fails), and its name reservations are released. Fires
    /// [`FrameEvent::Removed`] at the parent and every ancestor. Storage is
    /// reclaimed separately by [`forget`](Self::forget).
    pub fn remove(&mut self, id: FrameId) {
        if !self.is_alive(id) {
            return;
        }
        let Some(parent_id) = self.node(id).parent else {
            return; // roots are cleared, never removed
        };
        self.release_boundary_names(id);
        self.node_mut(parent_id).children.retain(|c| *c != id);
        self.disable_recursively(id);
        log::trace!(path = %self.node(id).path_id, "removed frame subtree");
        self.notify_up(
            parent_id,
            &FrameEvent::Removed {
                target: id,
                parent: parent_id,
            },
        );
    }

    fn disable_recursively(&mut self, id: FrameId) {
        let node = self.node_mut(id);
        node.removed = true;
        node.updater = None;
        node.listeners.clear();
        let children = node.children.clone();
        for child in children {
            if self.node_raw(child).is_some_and(|n| !n.removed) {
                self.disable_recursively(child);
            }
        }
    }

    /// Releases a frame's storage, the arena analog of dropping the last
    /// external owner of the subtree.
    ///
    /// The subtree's slots are freed without structural detachment: the
    /// parent is left holding a dangling child entry, which the next child
    /// traversal prunes, firing [`FrameEvent::Collected`] (the frame itself
    /// is gone by then, so the event names only the parent). A no-op for dead
    /// handles.
    pub fn forget(&mut self, id: FrameId) {
        let Some(node) = self.node_raw(id) else {
            return;
        };
        if !node.removed && node.parent.is_some() {
            self.release_boundary_names(id);
        }
        log::trace!(slot = id.0, "forgetting frame subtree");
        self.free_recursively(id);
    }

    fn free_recursively(&mut self, id: FrameId) {
        if self.node_raw(id).is_none() {
            return;
        }
        let node = self.nodes[id.idx()]
            .take()
            .expect("slot presence checked above");
        self.free_list.push(id.idx());
        for child in node.children {
            self.free_recursively(child);
        }
    }

    /// Removes every live child subtree of `id`.
    ///
    /// On a root frame this also resets the insertion-order counter, so
    /// `tree_slot` assignment starts over for the rebuilt tree.
    pub fn clear_children(&mut self, id: FrameId) -> Result<(), FrameTreeError> {
        self.node_ok(id)?;
        self.prune_children_of(id);
        let children = self.node(id).children.clone();
        for child in children {
            self.remove(child);
        }
        let node = self.node_mut(id);
        if node.parent.is_none() {
            node.registry
                .as_mut()
                .expect("root frame carries the tree registry")
                .insertion_counter = 0;
        }
        Ok(())
    }

    // --- accessors ---

    /// True when `id` refers to a live (resident and not removed) frame.
    pub fn is_alive(&self, id: FrameId) -> bool {
        self.node_raw(id).is_some_and(|n| !n.removed)
    }

    /// The frame's local name.
    pub fn name(&self, id: FrameId) -> Result<&str, FrameTreeError> {
        Ok(&self.node_ok(id)?.name)
    }

    /// The frame's path identifier: ancestor names joined by
    /// [`PATH_SEPARATOR`].
    ///
    /// This is the frame's name-based identity; see
    /// [`frames_match`](Self::frames_match).
    pub fn path_id(&self, id: FrameId) -> Result<&str, FrameTreeError> {
        Ok(&self.node_ok(id)?.path_id)
    }

    /// Insertion-order identifier, unique within one tree and stable across
    /// renames of ancestors (unlike the path identifier).
    pub fn tree_slot(&self, id: FrameId) -> Result<u64, FrameTreeError> {
        Ok(self.node_ok(id)?.tree_slot)
    }

    /// The parent frame, or `None` for roots.
    pub fn parent(&self, id: FrameId) -> Result<Option<FrameId>, FrameTreeError> {
        Ok(self.node_ok(id)?.parent)
    }

    /// The root of the tree this frame belongs to.
    pub fn root_of(&self, id: FrameId) -> Result<FrameId, FrameTreeError> {
        Ok(self.node_ok(id)?.path_from_root[0])
    }

    /// True for root frames.
    pub fn is_root(&self, id: FrameId) -> Result<bool, FrameTreeError> {
        Ok(self.node_ok(id)?.parent.is_none())
    }

    /// True when `parent` is the parent frame of `child`.
    pub fn is_parent_of(&self, parent: FrameId, child: FrameId) -> Result<bool, FrameTreeError> {
        self.node_ok(parent)?;
        Ok(self.node_ok(child)?.parent == Some(parent))
    }

    /// The frame's classification flags.
    pub fn flags(&self, id: FrameId) -> Result<FrameFlags, FrameTreeError> {
        Ok(self.node_ok(id)?.flags)
    }

    /// True when the frame never moves with respect to its root.
    pub fn is_stationary(&self, id: FrameId) -> Result<bool, FrameTreeError> {
        Ok(self.node_ok(id)?.flags.contains(FrameFlags::STATIONARY))
    }

    /// True when the frame's z-axis stays aligned with the root's.
    pub fn is_z_up(&self, id: FrameId) -> Result<bool, FrameTreeError> {
        Ok(self.node_ok(id)?.flags.contains(FrameFlags::Z_UP))
    }

    /// True when the frame's transform to its parent is constant.
    pub fn is_fixed_to_parent(&self, id: FrameId) -> Result<bool, FrameTreeError> {
        Ok(self
            .node_ok(id)?
            .flags
            .contains(FrameFlags::FIXED_TO_PARENT))
    }

    /// The frame's pose in its parent frame (identity for roots).
    pub fn transform_to_parent(&self, id: FrameId) -> Result<RigidPose, FrameTreeError> {
        Ok(self.node_ok(id)?.transform_to_parent)
    }

    /// The chain of frames from the root down to `id`, inclusive.
    pub fn path_from_root(&self, id: FrameId) -> Result<&[FrameId], FrameTreeError> {
        Ok(&self.node_ok(id)?.path_from_root)
    }

    /// Name-based equality: true when both frames have the same path
    /// identifier, even across distinct handles or distinct arenas' trees.
    pub fn frames_match(&self, a: FrameId, b: FrameId) -> Result<bool, FrameTreeError> {
        Ok(self.node_ok(a)?.path_id == self.node_ok(b)?.path_id)
    }

    /// Fails unless `a` and `b` are the same frame.
    ///
    /// Geometric operations that require both operands in one frame call this
    /// before touching any payload.
    pub fn check_same_frame(&self, a: FrameId, b: FrameId) -> Result<(), FrameTreeError> {
        let node_a = self.node_ok(a)?;
        let node_b = self.node_ok(b)?;
        if a == b {
            Ok(())
        } else {
            Err(FrameTreeError::FrameMismatch {
                a: node_a.path_id.clone(),
                b: node_b.path_id.clone(),
            })
        }
    }

    /// [`check_same_frame`](Self::check_same_frame) for values carrying their
    /// frame.
    pub fn check_same_frame_of(
        &self,
        a: &impl FrameBound,
        b: &impl FrameBound,
    ) -> Result<(), FrameTreeError> {
        self.check_same_frame(a.frame(), b.frame())
    }

    /// Live children of `id`, after pruning dead entries.
    pub fn children(&mut self, id: FrameId) -> Result<Vec<FrameId>, FrameTreeError> {
        self.node_ok(id)?;
        self.prune_children_of(id);
        Ok(self.node(id).children.clone())
    }

    /// Number of live children of `id`, after pruning dead entries.
    pub fn child_count(&mut self, id: FrameId) -> Result<usize, FrameTreeError> {
        self.node_ok(id)?;
        self.prune_children_of(id);
        Ok(self.node(id).children.len())
    }

    /// Every live frame in the tree `id` belongs to, root first.
    pub fn all_frames_in_tree(&mut self, id: FrameId) -> Result<Vec<FrameId>, FrameTreeError> {
        let root = self.root_of(id)?;
        let mut frames = vec![root];
        let mut cursor = 0;
        while cursor < frames.len() {
            let current = frames[cursor];
            cursor += 1;
            self.prune_children_of(current);
            frames.extend(self.node(current).children.iter().copied());
        }
        Ok(frames)
    }

    // --- internals ---

    fn next_slot(&mut self) -> (u32, u32) {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "FrameId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            self.nodes.push(None);
            self.generations.push(1);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "FrameId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, 1)
        }
    }

    /// Drops dead child entries of `id`, firing one
    /// [`FrameEvent::Collected`] per pruned entry.
    pub(crate) fn prune_children_of(&mut self, id: FrameId) {
        let entries = self.node(id).children.clone();
        let mut live = Vec::with_capacity(entries.len());
        let mut dead = 0_usize;
        for child in entries {
            if self.node_raw(child).is_some() {
                live.push(child);
            } else {
                dead += 1;
            }
        }
        if dead == 0 {
            return;
        }
        self.node_mut(id).children = live;
        log::trace!(parent = %self.node(id).path_id, count = dead, "pruned dead child entries");
        for _ in 0..dead {
            self.notify_up(id, &FrameEvent::Collected { parent: id });
        }
    }

    /// Advances the tree's version counter (cheap; shared by all frames of
    /// one tree).
    pub(crate) fn bump_version(&self, root: FrameId) {
        let registry = self
            .node(root)
            .registry
            .as_ref()
            .expect("root frame carries the tree registry");
        registry
            .next_cache_version
            .set(registry.next_cache_version.get() + 1);
    }

    /// Resident node for a generation-valid handle, removed or not.
    pub(crate) fn node_raw(&self, id: FrameId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .filter(|n| n.generation == id.1)
    }

    /// Live node, or the appropriate removed/dangling error.
    pub(crate) fn node_ok(&self, id: FrameId) -> Result<&Node, FrameTreeError> {
        match self.node_raw(id) {
            Some(node) if !node.removed => Ok(node),
            Some(node) => Err(FrameTreeError::RemovedFrame {
                frame: node.path_id.clone(),
            }),
            None => Err(FrameTreeError::RemovedFrame {
                frame: format!("<dangling frame handle {}.{}>", id.0, id.1),
            }),
        }
    }

    /// Accesses a node the arena itself references; panics if `id` is stale.
    pub(crate) fn node(&self, id: FrameId) -> &Node {
        self.node_raw(id).expect("dangling FrameId")
    }

    /// Mutable access to a node the arena itself references; panics if `id`
    /// is stale.
    pub(crate) fn node_mut(&mut self, id: FrameId) -> &mut Node {
        let valid = self
            .nodes
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .is_some_and(|n| n.generation == id.1);
        if !valid {
            panic!("dangling FrameId");
        }
        self.nodes[id.idx()].as_mut().expect("checked above")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameTreeError;

    fn translation(x: f64, y: f64, z: f64) -> RigidPose {
        RigidPose::from_translation(DVec3::new(x, y, z))
    }

    #[test]
    fn insert_builds_paths_and_slots() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let torso = tree
            .insert(Some(world), FrameDef::with_pose("torso", translation(1.0, 0.0, 0.0)))
            .unwrap();
        let head = tree
            .insert(Some(torso), FrameDef::named("head"))
            .unwrap();

        assert_eq!(tree.path_id(world).unwrap(), "world");
        assert_eq!(tree.path_id(head).unwrap(), "world:torso:head");
        assert_eq!(tree.tree_slot(world).unwrap(), 0);
        assert_eq!(tree.tree_slot(torso).unwrap(), 1);
        assert_eq!(tree.tree_slot(head).unwrap(), 2);
        assert_eq!(
            tree.path_from_root(head).unwrap(),
            &[world, torso, head]
        );
        assert_eq!(tree.parent(head).unwrap(), Some(torso));
        assert!(tree.is_root(world).unwrap());
        assert!(tree.is_parent_of(torso, head).unwrap());
        assert!(!tree.is_parent_of(world, head).unwrap());
    }

    #[test]
    fn separator_in_name_is_rejected() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let err = tree
            .insert(Some(world), FrameDef::named("bad:name"))
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvalidName { .. }));
        assert_eq!(tree.child_count(world).unwrap(), 0);
    }

    #[test]
    fn roots_are_stationary_and_z_up() {
        let (tree, world) = FrameTree::with_root("world").unwrap();
        assert!(tree.is_stationary(world).unwrap());
        assert!(tree.is_z_up(world).unwrap());
    }

    #[test]
    fn stationary_child_requires_stationary_parent() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let moving = tree
            .insert(Some(world), FrameDef::named("moving"))
            .unwrap();
        let err = tree
            .insert(
                Some(moving),
                FrameDef {
                    flags: FrameFlags::STATIONARY,
                    ..FrameDef::named("anchor")
                },
            )
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvariantViolation { .. }));

        // Under a stationary parent the same request succeeds.
        let anchor = tree
            .insert(
                Some(world),
                FrameDef {
                    flags: FrameFlags::STATIONARY,
                    ..FrameDef::named("anchor")
                },
            )
            .unwrap();
        assert!(tree.is_stationary(anchor).unwrap());
    }

    #[test]
    fn fixed_translation_child_of_z_up_parent_is_z_up() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let sensor = tree
            .insert(
                Some(world),
                FrameDef::fixed_offset("sensor", DVec3::new(0.1, 0.0, 0.4)),
            )
            .unwrap();
        assert!(tree.is_z_up(sensor).unwrap());
        assert!(tree.is_fixed_to_parent(sensor).unwrap());

        let tilted = tree
            .insert(
                Some(world),
                FrameDef::fixed(
                    "tilted",
                    RigidPose::from_rotation(kinetree_pose::DQuat::from_rotation_x(0.5)),
                ),
            )
            .unwrap();
        assert!(!tree.is_z_up(tilted).unwrap());
    }

    #[test]
    fn removal_disables_whole_subtree() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        let b = tree.insert(Some(a), FrameDef::named("b")).unwrap();

        tree.remove(a);
        assert!(!tree.is_alive(a));
        assert!(!tree.is_alive(b));
        assert!(matches!(
            tree.name(a),
            Err(FrameTreeError::RemovedFrame { .. })
        ));
        assert!(matches!(
            tree.transform_to_parent(b),
            Err(FrameTreeError::RemovedFrame { .. })
        ));
        assert_eq!(tree.children(world).unwrap(), Vec::new());

        // Idempotent.
        tree.remove(a);
        assert!(tree.is_alive(world));
    }

    #[test]
    fn removed_frame_error_carries_path() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        tree.remove(a);
        let err = tree.name(a).unwrap_err();
        let message = alloc::format!("{err}");
        assert!(message.contains("world:a"), "got: {message}");
    }

    #[test]
    fn forget_leaves_dangling_entry_until_pruned() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        let b = tree.insert(Some(a), FrameDef::named("b")).unwrap();

        tree.forget(a);
        assert!(!tree.is_alive(a));
        assert!(!tree.is_alive(b));
        // The parent still holds the dangling entry until a traversal prunes.
        assert_eq!(tree.node(world).children.len(), 1);
        assert_eq!(tree.child_count(world).unwrap(), 0);
        assert_eq!(tree.node(world).children.len(), 0);
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        tree.forget(a);
        let b = tree.insert(Some(world), FrameDef::named("b")).unwrap();
        assert!(tree.is_alive(b));
        assert!(!tree.is_alive(a));
        if a.0 == b.0 {
            assert!(b.1 > a.1, "generation must increase on reuse");
        }
    }

    #[test]
    fn clear_children_resets_insertion_counter() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        let _b = tree.insert(Some(a), FrameDef::named("b")).unwrap();

        tree.clear_children(world).unwrap();
        assert!(!tree.is_alive(a));
        assert_eq!(tree.child_count(world).unwrap(), 0);

        let fresh = tree.insert(Some(world), FrameDef::named("fresh")).unwrap();
        assert_eq!(tree.tree_slot(fresh).unwrap(), 1);
    }

    #[test]
    fn tick_runs_updater_and_is_noop_for_roots() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree
            .insert(Some(world), FrameDef::with_pose("a", translation(1.0, 0.0, 0.0)))
            .unwrap();
        tree.set_updater(a, |_, pose| {
            pose.translation.x += 1.0;
        })
        .unwrap();

        tree.tick(world).unwrap();
        tree.tick(a).unwrap();
        assert_eq!(
            tree.transform_to_parent(a).unwrap().translation,
            DVec3::new(2.0, 0.0, 0.0)
        );
    }

    #[test]
    fn updater_can_query_other_frames() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let leader = tree
            .insert(Some(world), FrameDef::with_pose("leader", translation(0.0, 3.0, 0.0)))
            .unwrap();
        let follower = tree.insert(Some(world), FrameDef::named("follower")).unwrap();
        tree.set_updater(follower, move |view, pose| {
            let target = view.transform_to_root(leader).unwrap();
            pose.translation = target.translation;
        })
        .unwrap();
        tree.tick(follower).unwrap();
        assert_eq!(
            tree.transform_to_parent(follower).unwrap().translation,
            DVec3::new(0.0, 3.0, 0.0)
        );
    }

    #[test]
    fn fixed_and_stationary_frames_refuse_motion() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let fixed = tree
            .insert(Some(world), FrameDef::fixed_offset("fixed", DVec3::ZERO))
            .unwrap();
        let anchor = tree
            .insert(
                Some(world),
                FrameDef {
                    flags: FrameFlags::STATIONARY,
                    ..FrameDef::named("anchor")
                },
            )
            .unwrap();

        assert!(tree
            .set_transform_to_parent(fixed, translation(1.0, 0.0, 0.0))
            .is_err());
        assert!(tree
            .set_transform_to_parent(anchor, translation(1.0, 0.0, 0.0))
            .is_err());
        assert!(tree.set_updater(fixed, |_, _| {}).is_err());
        // Ticking a fixed frame is harmless: there is no updater to run.
        tree.tick(fixed).unwrap();
    }

    #[test]
    fn frames_match_is_name_based() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        // Without a name restriction, two distinct frames may share a path
        // identifier; they are equal by name even though their handles are
        // not.
        let foot_one = tree.insert(Some(world), FrameDef::named("foot")).unwrap();
        let foot_two = tree.insert(Some(world), FrameDef::named("foot")).unwrap();
        let other = tree.insert(Some(world), FrameDef::named("other")).unwrap();

        assert_ne!(foot_one, foot_two);
        assert!(tree.frames_match(foot_one, foot_two).unwrap());
        assert!(!tree.frames_match(foot_one, other).unwrap());
    }

    #[test]
    fn check_same_frame_reports_both_paths() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        let b = tree.insert(Some(world), FrameDef::named("b")).unwrap();
        tree.check_same_frame(a, a).unwrap();
        let err = tree.check_same_frame(a, b).unwrap_err();
        let message = alloc::format!("{err}");
        assert!(message.contains("world:a") && message.contains("world:b"), "got: {message}");
    }

    #[test]
    fn all_frames_in_tree_lists_root_first() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        let b = tree.insert(Some(a), FrameDef::named("b")).unwrap();
        let frames = tree.all_frames_in_tree(b).unwrap();
        assert_eq!(frames[0], world);
        assert!(frames.contains(&a) && frames.contains(&b));
        assert_eq!(frames.len(), 3);
    }
}
