use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::{debug, info};

use inflight_rhi::buffer::{Buffer, BufferUsage};
use inflight_rhi::command::{CommandBuffer, CommandPool};
use inflight_rhi::descriptor::DescriptorPool;
use inflight_rhi::device::Device;
use inflight_rhi::sync::Fence;

use crate::backend::{Accelerator, FrameResources};
use crate::error::RenderResult;
use crate::slot::FrameSlot;
use crate::tracker::{Barrier, TrackedResource};

/// Per-slot Vulkan resources.
pub struct VulkanFrame {
    slot: FrameSlot,
    cmd: CommandBuffer,
    // Created signaled so the first wait on each slot returns at once.
    fence: Fence,
    params: Buffer,
    transient: DescriptorPool,
}

impl VulkanFrame {
    #[inline]
    pub fn cmd(&self) -> &CommandBuffer {
        &self.cmd
    }

    #[inline]
    pub fn params(&self) -> &Buffer {
        &self.params
    }

    #[inline]
    pub fn fence(&self) -> &Fence {
        &self.fence
    }
}

impl FrameResources for VulkanFrame {
    fn slot(&self) -> FrameSlot {
        self.slot
    }

    fn command_buffer(&self) -> vk::CommandBuffer {
        self.cmd.handle()
    }

    fn params_buffer(&self) -> vk::Buffer {
        self.params.handle()
    }

    fn params_size(&self) -> usize {
        self.params.size() as usize
    }

    fn write_params(&mut self, bytes: &[u8]) -> RenderResult<()> {
        self.params.write_data(0, bytes)?;
        Ok(())
    }

    fn reset_transient(&mut self) -> RenderResult<()> {
        self.transient.reset()?;
        Ok(())
    }

    fn allocate_transient(
        &mut self,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        Ok(self.transient.allocate(layout)?)
    }
}

/// Records and submits frames on the device's single graphics queue.
pub struct VulkanAccelerator {
    device: Arc<Device>,
    command_pool: CommandPool,
    params_size: vk::DeviceSize,
    transient_sets: u32,
}

impl VulkanAccelerator {
    /// # Arguments
    ///
    /// * `params_size` - Bytes reserved per slot for frame parameters
    /// * `transient_sets` - Descriptor sets a slot may allocate per frame
    pub fn new(
        device: Arc<Device>,
        params_size: vk::DeviceSize,
        transient_sets: u32,
    ) -> RenderResult<Self> {
        let command_pool = CommandPool::new(device.clone(), device.queue_family())?;
        info!(
            "Vulkan accelerator ready: {} param byte(s), {} transient set(s) per slot",
            params_size, transient_sets
        );
        Ok(Self {
            device,
            command_pool,
            params_size,
            transient_sets,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Accelerator for VulkanAccelerator {
    type Frame = VulkanFrame;

    fn allocate_frame(&mut self, slot: FrameSlot) -> RenderResult<VulkanFrame> {
        let cmd = CommandBuffer::new(self.device.clone(), &self.command_pool)?;
        let fence = Fence::new(self.device.clone(), true)?;
        let params = Buffer::new(self.device.clone(), BufferUsage::Params, self.params_size)?;
        let transient = DescriptorPool::transient(self.device.clone(), self.transient_sets)?;

        Ok(VulkanFrame {
            slot,
            cmd,
            fence,
            params,
            transient,
        })
    }

    fn wait_for_frame(&mut self, frame: &VulkanFrame, timeout: Duration) -> RenderResult<bool> {
        Ok(frame.fence.wait(timeout)?)
    }

    fn begin_recording(&mut self, frame: &VulkanFrame) -> RenderResult<()> {
        frame.cmd.begin()?;
        Ok(())
    }

    fn record_barriers(&mut self, frame: &VulkanFrame, barriers: &[Barrier]) {
        let mut images = Vec::new();
        let mut buffers = Vec::new();

        for barrier in barriers {
            match barrier.resource {
                TrackedResource::Image { image, aspect } => {
                    images.push(image_barrier(image, aspect, barrier));
                }
                TrackedResource::Buffer { buffer } => {
                    buffers.push(buffer_barrier(buffer, barrier));
                }
            }
        }

        frame.cmd.pipeline_barrier2(&images, &buffers);
    }

    fn end_recording(&mut self, frame: &VulkanFrame) -> RenderResult<()> {
        frame.cmd.end()?;
        Ok(())
    }

    fn submit(
        &mut self,
        frame: &VulkanFrame,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    ) -> RenderResult<()> {
        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(wait)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(signal)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(frame.cmd.handle())];

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_infos)
            .signal_semaphore_infos(&signal_infos);

        // Reset only now, so a frame that never reaches submit leaves the
        // fence signaled for the next wait.
        frame.fence.reset()?;
        unsafe { self.device.submit(&[submit], frame.fence.handle())? };

        debug!("Submitted slot {}", frame.slot);
        Ok(())
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }
}

fn image_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    barrier: &Barrier,
) -> vk::ImageMemoryBarrier2<'static> {
    let range = vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .layer_count(vk::REMAINING_ARRAY_LAYERS);

    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(barrier.src.stage)
        .src_access_mask(barrier.src.src_access())
        .dst_stage_mask(barrier.dst.stage)
        .dst_access_mask(barrier.dst.access)
        .old_layout(barrier.src.layout)
        .new_layout(barrier.dst.layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
}

fn buffer_barrier(buffer: vk::Buffer, barrier: &Barrier) -> vk::BufferMemoryBarrier2<'static> {
    vk::BufferMemoryBarrier2::default()
        .src_stage_mask(barrier.src.stage)
        .src_access_mask(barrier.src.src_access())
        .dst_stage_mask(barrier.dst.stage)
        .dst_access_mask(barrier.dst.access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(vk::WHOLE_SIZE)
}
