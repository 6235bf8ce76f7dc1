//! Pass interface driven by the scheduler.

use ash::vk;

use crate::backend::FrameResources;
use crate::error::RenderResult;
use crate::slot::FrameSlot;
use crate::swapchain::SurfaceImage;
use crate::tracker::ResourceStateTracker;

/// What a pass sees of the frame being recorded.
pub struct FrameContext<'a, F> {
    pub slot: FrameSlot,
    pub frame: &'a mut F,
    /// The surface image this frame presents.
    pub target: SurfaceImage,
    pub extent: vk::Extent2D,
    pub frame_number: u64,
}

impl<F: FrameResources> FrameContext<'_, F> {
    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.frame.command_buffer()
    }
}

/// One step of a frame.
///
/// `prepare` declares the state every resource must be in before `record`
/// runs; the scheduler flushes the resulting barriers in between. A pass
/// never records barriers for tracked resources itself.
pub trait RenderPass<F: FrameResources> {
    fn name(&self) -> &str;

    fn prepare(&mut self, ctx: &FrameContext<'_, F>, tracker: &mut ResourceStateTracker);

    fn record(&mut self, ctx: &mut FrameContext<'_, F>) -> RenderResult<()>;
}
