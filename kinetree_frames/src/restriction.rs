// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-name uniqueness levels and their enforcement.
//!
//! Each subtree is governed by a [`NameRestriction`] inherited at insertion.
//! `PathUnique` keeps sibling names distinct through a per-parent set;
//! `NameUnique` keeps every name in the restricted subtree distinct through a
//! single set owned by the topmost restricted ancestor.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::FrameTreeError;
use crate::log;
use crate::tree::FrameTree;
use crate::types::FrameId;

/// Strength of the uniqueness constraint on frame names within a subtree.
///
/// Levels are strictly ordered. Tightening a frame's level recursively
/// re-validates and re-tags its whole subtree; loosening is only permitted on
/// a childless root, since an already-granted uniqueness guarantee cannot be
/// retracted while dependents exist.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum NameRestriction {
    /// No constraint.
    #[default]
    None,
    /// No two sibling frames may share a name, keeping path identifiers
    /// unique.
    PathUnique,
    /// No two frames anywhere in the restricted subtree may share a name.
    NameUnique,
}

/// Default restriction level for newly constructed root frames.
///
/// Read once from the `KINETREE_NAME_RESTRICTION` environment variable
/// (`none`, `path`, or `name`); later changes to the environment have no
/// effect on a running process.
#[cfg(feature = "std")]
pub(crate) fn default_root_restriction() -> NameRestriction {
    use std::sync::OnceLock;
    static DEFAULT: OnceLock<NameRestriction> = OnceLock::new();
    *DEFAULT.get_or_init(
        || match std::env::var("KINETREE_NAME_RESTRICTION").as_deref() {
            Ok("path") | Ok("path_unique") => NameRestriction::PathUnique,
            Ok("name") | Ok("name_unique") => NameRestriction::NameUnique,
            _ => NameRestriction::None,
        },
    )
}

#[cfg(not(feature = "std"))]
pub(crate) fn default_root_restriction() -> NameRestriction {
    NameRestriction::None
}

impl FrameTree {
    /// Current restriction level governing a frame.
    pub fn restriction(&self, id: FrameId) -> Result<NameRestriction, FrameTreeError> {
        Ok(self.node_ok(id)?.restriction)
    }

    /// Changes the restriction level of the subtree rooted at `id`.
    ///
    /// Tightening validates the entire subtree against the new level before
    /// applying anything, so a failed tightening leaves the tree untouched.
    /// Loosening is only permitted on a childless root.
    pub fn set_restriction(
        &mut self,
        id: FrameId,
        level: NameRestriction,
    ) -> Result<(), FrameTreeError> {
        let current = self.node_ok(id)?.restriction;
        if level == current {
            return Ok(());
        }
        if level < current {
            self.prune_children_of(id);
            let node = self.node(id);
            if node.parent.is_some() || !node.children.is_empty() {
                return Err(FrameTreeError::RestrictionLevel {
                    frame: node.path_id.clone(),
                    from: current,
                    to: level,
                    reason: String::from("loosening is only permitted on a childless root"),
                });
            }
            let node = self.node_mut(id);
            node.restriction = level;
            node.child_names.clear();
            node.subtree_names = None;
            node.restriction_owner = None;
            return Ok(());
        }
        match level {
            NameRestriction::PathUnique => self.tighten_path_unique(id),
            NameRestriction::NameUnique => self.tighten_name_unique(id),
            // `None` is never a tightening target.
            NameRestriction::None => Ok(()),
        }
    }

    fn tighten_path_unique(&mut self, id: FrameId) -> Result<(), FrameTreeError> {
        // Validation pass: every frame's live children must already have
        // distinct names.
        let mut computed: Vec<(FrameId, BTreeSet<String>)> = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.prune_children_of(current);
            let node = self.node(current);
            let mut names = BTreeSet::new();
            for &child in &node.children {
                let child_name = &self.node(child).name;
                if !names.insert(child_name.clone()) {
                    return Err(FrameTreeError::InvalidName {
                        name: child_name.clone(),
                        reason: format!("two children of '{}' share this name", node.path_id),
                    });
                }
            }
            stack.extend(node.children.iter().copied());
            computed.push((current, names));
        }
        // Apply pass: tag the subtree, keeping any stronger level already set
        // further down.
        for (frame, names) in computed {
            let node = self.node_mut(frame);
            if node.restriction < NameRestriction::PathUnique {
                node.restriction = NameRestriction::PathUnique;
                node.child_names = names;
            }
        }
        log::debug!(frame = %self.node(id).path_id, "name restriction raised to PathUnique");
        Ok(())
    }

    fn tighten_name_unique(&mut self, id: FrameId) -> Result<(), FrameTreeError> {
        // Validation pass: collect every name in the subtree, detecting
        // duplicates before anything is applied.
        let mut names = BTreeSet::new();
        let mut subtree = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.prune_children_of(current);
            let node = self.node(current);
            if !names.insert(node.name.clone()) {
                return Err(FrameTreeError::InvalidName {
                    name: node.name.clone(),
                    reason: format!(
                        "the subtree rooted at '{}' already contains a frame with this name",
                        self.node(id).path_id
                    ),
                });
            }
            subtree.push(current);
            stack.extend(node.children.iter().copied());
        }
        // Apply pass: `id` becomes the owner of the single subtree-wide set.
        for frame in subtree {
            let node = self.node_mut(frame);
            node.restriction = NameRestriction::NameUnique;
            node.restriction_owner = Some(id);
            node.child_names.clear();
            node.subtree_names = None;
        }
        self.node_mut(id).subtree_names = Some(names);
        log::debug!(frame = %self.node(id).path_id, "name restriction raised to NameUnique");
        Ok(())
    }

    /// Admission check for a new child of `parent_id`, reserving the name on
    /// success. Called before any linking so a conflict aborts construction
    /// with no partial mutation.
    pub(crate) fn check_and_reserve_name(
        &mut self,
        parent_id: FrameId,
        parent_restriction: NameRestriction,
        parent_owner: Option<FrameId>,
        name: &str,
    ) -> Result<(), FrameTreeError> {
        match parent_restriction {
            NameRestriction::None => Ok(()),
            NameRestriction::PathUnique => {
                let parent = self.node_mut(parent_id);
                if parent.child_names.contains(name) {
                    return Err(FrameTreeError::InvalidName {
                        name: String::from(name),
                        reason: format!(
                            "a sibling under '{}' already uses this name",
                            parent.path_id
                        ),
                    });
                }
                parent.child_names.insert(String::from(name));
                Ok(())
            }
            NameRestriction::NameUnique => {
                let owner_id = parent_owner.expect("frames under NameUnique record their owner");
                let owner = self.node_mut(owner_id);
                let owner_path = &owner.path_id;
                let set = owner
                    .subtree_names
                    .as_mut()
                    .expect("the restriction owner holds the subtree name set");
                if set.contains(name) {
                    return Err(FrameTreeError::InvalidName {
                        name: String::from(name),
                        reason: format!(
                            "the subtree rooted at '{owner_path}' already contains a frame with this name"
                        ),
                    });
                }
                set.insert(String::from(name));
                Ok(())
            }
        }
    }

    /// Releases the name reservations a subtree holds outside itself: the
    /// head's entry in its parent's sibling set, and the subtree's entries in
    /// an ancestor-owned subtree-wide set.
    pub(crate) fn release_boundary_names(&mut self, id: FrameId) {
        let (parent, name, restriction, owner) = {
            let node = self.node(id);
            (
                node.parent,
                node.name.clone(),
                node.restriction,
                node.restriction_owner,
            )
        };
        if let Some(parent_id) = parent {
            if self.node(parent_id).restriction == NameRestriction::PathUnique {
                self.node_mut(parent_id).child_names.remove(&name);
            }
        }
        if restriction == NameRestriction::NameUnique {
            let owner_id = owner.expect("frames under NameUnique record their owner");
            if owner_id != id {
                let names = self.collect_subtree_names(id);
                if let Some(set) = self.node_mut(owner_id).subtree_names.as_mut() {
                    for name in &names {
                        set.remove(name);
                    }
                }
            }
        }
    }

    fn collect_subtree_names(&self, id: FrameId) -> Vec<String> {
        let mut names = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node_raw(current) else {
                continue;
            };
            if node.removed {
                continue;
            }
            names.push(node.name.clone());
            stack.extend(node.children.iter().copied());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FrameDef;

    fn restricted_tree(level: NameRestriction) -> (FrameTree, FrameId) {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        tree.set_restriction(world, level).unwrap();
        (tree, world)
    }

    #[test]
    fn unrestricted_trees_allow_duplicates() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        tree.insert(Some(world), FrameDef::named("foot")).unwrap();
        tree.insert(Some(world), FrameDef::named("foot")).unwrap();
    }

    #[test]
    fn path_unique_rejects_duplicate_siblings() {
        let (mut tree, world) = restricted_tree(NameRestriction::PathUnique);
        tree.insert(Some(world), FrameDef::named("foot")).unwrap();
        let err = tree
            .insert(Some(world), FrameDef::named("foot"))
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvalidName { .. }));
        assert_eq!(tree.child_count(world).unwrap(), 1);
    }

    #[test]
    fn path_unique_allows_cousins_name_unique_does_not() {
        let (mut tree, world) = restricted_tree(NameRestriction::PathUnique);
        let left = tree.insert(Some(world), FrameDef::named("left")).unwrap();
        let right = tree.insert(Some(world), FrameDef::named("right")).unwrap();
        tree.insert(Some(left), FrameDef::named("foot")).unwrap();
        tree.insert(Some(right), FrameDef::named("foot")).unwrap();

        let (mut tree, world) = restricted_tree(NameRestriction::NameUnique);
        let left = tree.insert(Some(world), FrameDef::named("left")).unwrap();
        let right = tree.insert(Some(world), FrameDef::named("right")).unwrap();
        tree.insert(Some(left), FrameDef::named("foot")).unwrap();
        let err = tree
            .insert(Some(right), FrameDef::named("foot"))
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvalidName { .. }));
    }

    #[test]
    fn children_inherit_the_level() {
        let (mut tree, world) = restricted_tree(NameRestriction::NameUnique);
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();
        assert_eq!(tree.restriction(a).unwrap(), NameRestriction::NameUnique);
    }

    #[test]
    fn tightening_is_transactional() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let left = tree.insert(Some(world), FrameDef::named("left")).unwrap();
        let right = tree.insert(Some(world), FrameDef::named("right")).unwrap();
        tree.insert(Some(left), FrameDef::named("foot")).unwrap();
        tree.insert(Some(right), FrameDef::named("foot")).unwrap();

        // Cousins clash, so subtree-wide uniqueness cannot be granted...
        let err = tree
            .set_restriction(world, NameRestriction::NameUnique)
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvalidName { .. }));
        // ...and nothing was tagged.
        assert_eq!(tree.restriction(world).unwrap(), NameRestriction::None);
        assert_eq!(tree.restriction(left).unwrap(), NameRestriction::None);

        // Sibling uniqueness holds, so the weaker level can be granted.
        tree.set_restriction(world, NameRestriction::PathUnique)
            .unwrap();
        assert_eq!(
            tree.restriction(right).unwrap(),
            NameRestriction::PathUnique
        );
    }

    #[test]
    fn tightening_rejects_existing_sibling_duplicates() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        tree.insert(Some(world), FrameDef::named("foot")).unwrap();
        tree.insert(Some(world), FrameDef::named("foot")).unwrap();
        let err = tree
            .set_restriction(world, NameRestriction::PathUnique)
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvalidName { .. }));
        assert_eq!(tree.restriction(world).unwrap(), NameRestriction::None);
    }

    #[test]
    fn loosening_requires_a_childless_root() {
        let (mut tree, world) = restricted_tree(NameRestriction::NameUnique);
        let a = tree.insert(Some(world), FrameDef::named("a")).unwrap();

        let err = tree
            .set_restriction(world, NameRestriction::None)
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::RestrictionLevel { .. }));
        let err = tree.set_restriction(a, NameRestriction::None).unwrap_err();
        assert!(matches!(err, FrameTreeError::RestrictionLevel { .. }));

        tree.remove(a);
        tree.set_restriction(world, NameRestriction::None).unwrap();
        assert_eq!(tree.restriction(world).unwrap(), NameRestriction::None);
    }

    #[test]
    fn removal_releases_reserved_names() {
        let (mut tree, world) = restricted_tree(NameRestriction::NameUnique);
        let a = tree.insert(Some(world), FrameDef::named("arm")).unwrap();
        let _hand = tree.insert(Some(a), FrameDef::named("hand")).unwrap();

        tree.remove(a);
        // Both names are free again.
        let a2 = tree.insert(Some(world), FrameDef::named("arm")).unwrap();
        tree.insert(Some(a2), FrameDef::named("hand")).unwrap();
    }

    #[test]
    fn forgetting_releases_reserved_names() {
        let (mut tree, world) = restricted_tree(NameRestriction::PathUnique);
        let a = tree.insert(Some(world), FrameDef::named("arm")).unwrap();
        tree.forget(a);
        tree.insert(Some(world), FrameDef::named("arm")).unwrap();
    }

    #[test]
    fn nested_owner_is_absorbed_by_a_wider_one() {
        let (mut tree, world) = FrameTree::with_root("world").unwrap();
        let torso = tree.insert(Some(world), FrameDef::named("torso")).unwrap();
        let arm = tree.insert(Some(torso), FrameDef::named("arm")).unwrap();
        tree.set_restriction(torso, NameRestriction::NameUnique)
            .unwrap();
        assert_eq!(tree.restriction(arm).unwrap(), NameRestriction::NameUnique);

        tree.set_restriction(world, NameRestriction::NameUnique)
            .unwrap();
        // The wider subtree now owns a single shared set.
        let err = tree
            .insert(Some(arm), FrameDef::named("torso"))
            .unwrap_err();
        assert!(matches!(err, FrameTreeError::InvalidName { .. }));
    }
}
