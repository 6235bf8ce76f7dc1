//! The seams between the frame loop and the GPU.
//!
//! The scheduler only talks to the accelerator and the presentation surface
//! through these traits. [`crate::vulkan`] implements them over
//! `inflight-rhi`; tests implement them with a logical clock.

use std::time::Duration;

use ash::vk;

use crate::error::RenderResult;
use crate::slot::FrameSlot;
use crate::tracker::Barrier;

/// The resources one frame slot owns exclusively.
pub trait FrameResources {
    fn slot(&self) -> FrameSlot;

    fn command_buffer(&self) -> vk::CommandBuffer;

    /// The slot's CPU-writable parameter buffer.
    fn params_buffer(&self) -> vk::Buffer;

    /// Capacity of the parameter buffer in bytes.
    fn params_size(&self) -> usize;

    /// Copy `bytes` to the start of the parameter buffer.
    ///
    /// Only valid once the slot's previous submission has completed.
    fn write_params(&mut self, bytes: &[u8]) -> RenderResult<()>;

    /// Release every transient descriptor set allocated during the slot's
    /// previous use.
    fn reset_transient(&mut self) -> RenderResult<()>;

    /// Allocate a descriptor set that lives until the slot is reused.
    fn allocate_transient(
        &mut self,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet>;
}

/// The device that consumes recorded work.
pub trait Accelerator {
    type Frame: FrameResources;

    fn allocate_frame(&mut self, slot: FrameSlot) -> RenderResult<Self::Frame>;

    /// Block until the frame's last submission has completed.
    ///
    /// Returns `Ok(false)` if `timeout` expired first.
    fn wait_for_frame(&mut self, frame: &Self::Frame, timeout: Duration) -> RenderResult<bool>;

    fn begin_recording(&mut self, frame: &Self::Frame) -> RenderResult<()>;

    /// Record one batch of barriers into the frame's command buffer.
    fn record_barriers(&mut self, frame: &Self::Frame, barriers: &[Barrier]);

    fn end_recording(&mut self, frame: &Self::Frame) -> RenderResult<()>;

    /// Submit the frame's command buffer. Execution starts after `wait` is
    /// signalled and `signal` is signalled on completion. Completion also
    /// releases the frame for [`Accelerator::wait_for_frame`].
    fn submit(
        &mut self,
        frame: &Self::Frame,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    ) -> RenderResult<()>;

    /// Block until all submitted work has completed.
    fn wait_idle(&mut self) -> RenderResult<()>;
}

/// The image set a surface was (re)built with.
#[derive(Debug, Clone)]
pub struct SurfaceBuild {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub images: Vec<(vk::Image, vk::ImageView)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    /// No image became available within the timeout.
    NotReady,
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// A presentable surface and its image set.
pub trait PresentSurface {
    /// Tear down the current image set and build a new one.
    ///
    /// Returns `Ok(None)` if the surface currently has no drawable area.
    fn build(&mut self, desired: vk::Extent2D, vsync: bool) -> RenderResult<Option<SurfaceBuild>>;

    fn acquire(&mut self, signal: vk::Semaphore, timeout: Duration) -> RenderResult<AcquireOutcome>;

    fn present(&mut self, index: u32, wait: vk::Semaphore) -> RenderResult<PresentOutcome>;

    fn create_signal(&mut self) -> RenderResult<vk::Semaphore>;

    fn destroy_signal(&mut self, signal: vk::Semaphore);
}
