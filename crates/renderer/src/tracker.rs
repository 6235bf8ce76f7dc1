//! Resource state tracking and barrier batching.
//!
//! [`ResourceStateTracker`] is the single table from resource identity to
//! its last-known [`ResourceState`]. Every transition goes through
//! [`ResourceStateTracker::transition`], which either does nothing (the
//! resource is already in the requested state) or queues one barrier for
//! exactly that resource. Queued barriers are handed out together by
//! [`ResourceStateTracker::flush`] right before the pass that needs them.
//!
//! # Example
//!
//! ```
//! use ash::vk::{self, Handle};
//! use inflight_renderer::{ResourceState, ResourceStateTracker, TrackedResource};
//!
//! let mut tracker = ResourceStateTracker::new();
//! let image = TrackedResource::color_image(vk::Image::from_raw(1));
//!
//! assert!(tracker.transition(image, ResourceState::TRANSFER_DST));
//! assert!(!tracker.transition(image, ResourceState::TRANSFER_DST));
//!
//! let barriers = tracker.flush();
//! assert_eq!(barriers.len(), 1);
//! assert_eq!(barriers[0].src, ResourceState::UNDEFINED);
//! ```

use std::collections::HashMap;

use ash::vk;
use tracing::trace;

use crate::state::ResourceState;

/// Identity of a GPU-visible resource whose state is tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackedResource {
    Image {
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
    },
    Buffer {
        buffer: vk::Buffer,
    },
}

impl TrackedResource {
    pub fn color_image(image: vk::Image) -> Self {
        TrackedResource::Image {
            image,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    pub fn buffer(buffer: vk::Buffer) -> Self {
        TrackedResource::Buffer { buffer }
    }
}

/// One queued transition of one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barrier {
    pub resource: TrackedResource,
    pub src: ResourceState,
    pub dst: ResourceState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Barriers handed out by `flush`.
    pub barriers_flushed: u64,
    /// Transitions that found the resource already in the requested state.
    pub transitions_skipped: u64,
    /// Pending barriers folded into an earlier one for the same resource.
    pub transitions_merged: u64,
    pub flushes: u64,
}

#[derive(Debug, Default)]
pub struct ResourceStateTracker {
    states: HashMap<TrackedResource, ResourceState>,
    pending: Vec<Barrier>,
    stats: TrackerStats,
}

impl ResourceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `resource` into `requested`.
    ///
    /// Returns `true` if a barrier was queued or an already queued barrier
    /// for the same resource was extended, `false` if the resource was
    /// already in `requested`. A resource never seen before starts from
    /// [`ResourceState::UNDEFINED`].
    pub fn transition(&mut self, resource: TrackedResource, requested: ResourceState) -> bool {
        let current = self.state(resource);
        if current == requested {
            self.stats.transitions_skipped += 1;
            return false;
        }

        self.states.insert(resource, requested);

        // Nothing is recorded between two transitions of the same batch, so
        // a second request for the same resource retargets the first barrier.
        if let Some(position) = self.pending.iter().position(|b| b.resource == resource) {
            self.stats.transitions_merged += 1;
            if self.pending[position].src == requested {
                self.pending.remove(position);
            } else {
                self.pending[position].dst = requested;
            }
        } else {
            self.pending.push(Barrier {
                resource,
                src: current,
                dst: requested,
            });
        }

        trace!(?resource, ?current, ?requested, "transition queued");
        true
    }

    /// Last-known state of `resource`, `UNDEFINED` if never seen.
    pub fn state(&self, resource: TrackedResource) -> ResourceState {
        self.states
            .get(&resource)
            .copied()
            .unwrap_or(ResourceState::UNDEFINED)
    }

    /// Seed the state of a resource whose contents were produced outside the
    /// tracker, e.g. a freshly acquired surface image. Drops any barrier
    /// still queued for it.
    pub fn register(&mut self, resource: TrackedResource, state: ResourceState) {
        self.pending.retain(|b| b.resource != resource);
        self.states.insert(resource, state);
    }

    /// Mark the contents of `resource` as disposable. The last stage and
    /// access are kept so the next writer still waits for earlier work, but
    /// the next barrier starts from an undefined layout.
    pub fn discard(&mut self, resource: TrackedResource) {
        if let Some(state) = self.states.get_mut(&resource) {
            state.layout = vk::ImageLayout::UNDEFINED;
        }
    }

    /// Stop tracking a destroyed resource.
    pub fn forget(&mut self, resource: TrackedResource) {
        self.pending.retain(|b| b.resource != resource);
        self.states.remove(&resource);
    }

    /// Hand out every queued barrier, in request order.
    pub fn flush(&mut self) -> Vec<Barrier> {
        self.stats.flushes += 1;
        self.stats.barriers_flushed += self.pending.len() as u64;
        std::mem::take(&mut self.pending)
    }

    #[inline]
    pub fn pending(&self) -> &[Barrier] {
        &self.pending
    }

    #[inline]
    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn stats(&self) -> TrackerStats {
        self.stats
    }
}
