// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change listeners and upward event propagation.

use alloc::boxed::Box;
use core::mem;

use crate::error::FrameTreeError;
use crate::tree::FrameTree;
use crate::types::FrameId;

/// Handle identifying a registered change listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// A structural change in a frame tree.
///
/// Events are delivered at the frame where the change occurred (the parent
/// of the affected frame) and then at every ancestor up to the root, so a
/// listener registered anywhere up the chain observes all structural changes
/// in its subtree.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameEvent {
    /// A frame was inserted.
    Added {
        /// The new frame.
        target: FrameId,
        /// Its parent.
        parent: FrameId,
    },
    /// A frame subtree was removed. The target is inert from now on.
    Removed {
        /// The frame whose subtree was removed.
        target: FrameId,
        /// Its former parent.
        parent: FrameId,
    },
    /// A dangling child entry was pruned. The frame itself is already gone,
    /// so only the parent is known.
    Collected {
        /// The frame that held the dangling entry.
        parent: FrameId,
    },
}

pub(crate) type Listener = Box<dyn FnMut(&FrameEvent)>;

impl FrameTree {
    /// Registers a change listener on a frame.
    ///
    /// The listener observes every structural change in the subtree below the
    /// frame (and the frame's own child list), for as long as the frame is
    /// live.
    pub fn add_listener(
        &mut self,
        id: FrameId,
        listener: impl FnMut(&FrameEvent) + 'static,
    ) -> Result<ListenerId, FrameTreeError> {
        self.node_ok(id)?;
        let listener_id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.node_mut(id)
            .listeners
            .push((listener_id, Box::new(listener)));
        Ok(listener_id)
    }

    /// Unregisters a single listener. Returns whether it was present.
    pub fn remove_listener(
        &mut self,
        id: FrameId,
        listener: ListenerId,
    ) -> Result<bool, FrameTreeError> {
        self.node_ok(id)?;
        let listeners = &mut self.node_mut(id).listeners;
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != listener);
        Ok(listeners.len() != before)
    }

    /// Drops every listener registered on `id`.
    pub fn remove_all_listeners(&mut self, id: FrameId) -> Result<(), FrameTreeError> {
        self.node_ok(id)?;
        self.node_mut(id).listeners.clear();
        Ok(())
    }

    /// Delivers `event` to the listeners of `start` and of every ancestor,
    /// nearest first. Every listener in the chain is called; no listener can
    /// suppress delivery to the rest.
    pub(crate) fn notify_up(&mut self, start: FrameId, event: &FrameEvent) {
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            // Listeners are taken out for the call so they cannot observe a
            // half-mutated node.
            let mut listeners = mem::take(&mut self.node_mut(current).listeners);
            for (_, listener) in &mut listeners {
                listener(event);
            }
            let node = self.node_mut(current);
            listeners.extend(node.listeners.drain(..));
            node.listeners = listeners;
            cursor = node.parent;
        }
    }
}
