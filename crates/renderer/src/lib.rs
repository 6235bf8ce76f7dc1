//! The per-frame execution core.
//!
//! This crate decides how many frames may be outstanding on the GPU, which
//! per-frame resources each frame uses, which barriers each pass needs, and
//! when the presentation surface has to be rebuilt:
//! - [`FrameScheduler`]: the begin/record/end frame loop
//! - [`PerFrameResourcePool`]: one resource set per frame slot
//! - [`ResourceStateTracker`]: last-known state per resource, batched barriers
//! - [`SwapchainManager`]: the surface image set and its staleness
//!
//! The GPU is reached only through the [`Accelerator`] and
//! [`PresentSurface`] traits. [`vulkan`] implements them for real hardware.

mod backend;
mod error;
mod pass;
mod pool;
mod scheduler;
mod slot;
mod state;
mod swapchain;
mod tracker;

pub mod vulkan;

pub use backend::{
    AcquireOutcome, Accelerator, FrameResources, PresentOutcome, PresentSurface, SurfaceBuild,
};
pub use error::{RenderError, RenderResult};
pub use pass::{FrameContext, RenderPass};
pub use pool::PerFrameResourcePool;
pub use scheduler::{FrameInfo, FrameOutcome, FrameScheduler, SchedulerStats};
pub use slot::FrameSlot;
pub use state::ResourceState;
pub use swapchain::{SurfaceImage, SurfaceState, SwapchainManager};
pub use tracker::{Barrier, ResourceStateTracker, TrackedResource, TrackerStats};
