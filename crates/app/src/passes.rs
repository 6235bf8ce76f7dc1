//! Transfer-only passes for the demo.

use std::sync::Arc;

use ash::vk;

use inflight_renderer::vulkan::VulkanFrame;
use inflight_renderer::{
    FrameContext, FrameResources, RenderPass, RenderResult, ResourceState, ResourceStateTracker,
    TrackedResource,
};
use inflight_rhi::buffer::{Buffer, BufferUsage};
use inflight_rhi::descriptor::{self, DescriptorSetLayout};
use inflight_rhi::device::Device;
use inflight_rhi::image::{DEFAULT_USAGE, Image};

use crate::assets::{Params, Texture};

pub const SKIN_SIZE: u32 = 128;
const IMAGE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
const PARAMS_SIZE: vk::DeviceSize = std::mem::size_of::<Params>() as vk::DeviceSize;

/// Copies the decoded file texture into its GPU image, once.
pub struct UploadPass {
    staging: Buffer,
    texture: Arc<Image>,
    uploaded: bool,
}

impl UploadPass {
    pub fn new(device: Arc<Device>, texture: &Texture) -> RenderResult<Self> {
        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, &texture.pixels)?;
        let image = Image::new(
            device,
            "texture",
            vk::Extent2D {
                width: texture.width,
                height: texture.height,
            },
            IMAGE_FORMAT,
            DEFAULT_USAGE,
        )?;

        Ok(Self {
            staging,
            texture: Arc::new(image),
            uploaded: false,
        })
    }

    pub fn texture(&self) -> Arc<Image> {
        self.texture.clone()
    }
}

impl RenderPass<VulkanFrame> for UploadPass {
    fn name(&self) -> &str {
        "upload"
    }

    fn prepare(&mut self, _ctx: &FrameContext<'_, VulkanFrame>, tracker: &mut ResourceStateTracker) {
        if !self.uploaded {
            tracker.transition(
                TrackedResource::color_image(self.texture.handle()),
                ResourceState::TRANSFER_DST,
            );
        }
    }

    fn record(&mut self, ctx: &mut FrameContext<'_, VulkanFrame>) -> RenderResult<()> {
        if self.uploaded {
            return Ok(());
        }

        let extent = self.texture.extent();
        let region = vk::BufferImageCopy::default()
            .image_subresource(color_layers())
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });
        ctx.frame
            .cmd()
            .copy_buffer_to_image(self.staging.handle(), self.texture.handle(), &[region]);

        tracing::debug!("Texture upload recorded in frame {}", ctx.frame_number);
        self.uploaded = true;
        Ok(())
    }
}

/// Clears the off-screen skin image to a color that follows the pointer.
pub struct SkinPass {
    skin: Arc<Image>,
    color: [f32; 4],
}

impl SkinPass {
    pub fn new(device: Arc<Device>) -> RenderResult<Self> {
        let skin = Image::new(
            device,
            "skin",
            vk::Extent2D {
                width: SKIN_SIZE,
                height: SKIN_SIZE,
            },
            IMAGE_FORMAT,
            DEFAULT_USAGE,
        )?;

        Ok(Self {
            skin: Arc::new(skin),
            color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    pub fn skin(&self) -> Arc<Image> {
        self.skin.clone()
    }

    /// Derive the clear color from the frame parameters.
    pub fn update(&mut self, params: &Params) {
        self.color = pointer_color(params);
    }
}

impl RenderPass<VulkanFrame> for SkinPass {
    fn name(&self) -> &str {
        "skin"
    }

    fn prepare(&mut self, _ctx: &FrameContext<'_, VulkanFrame>, tracker: &mut ResourceStateTracker) {
        // Cleared every frame.
        let skin = TrackedResource::color_image(self.skin.handle());
        tracker.discard(skin);
        tracker.transition(skin, ResourceState::TRANSFER_DST);
    }

    fn record(&mut self, ctx: &mut FrameContext<'_, VulkanFrame>) -> RenderResult<()> {
        ctx.frame.cmd().clear_color_image(self.skin.handle(), self.color);
        Ok(())
    }
}

/// Moves the slot's host-written parameters into device memory.
pub struct ParamsPass {
    device_params: Arc<Buffer>,
}

impl ParamsPass {
    pub fn new(device: Arc<Device>) -> RenderResult<Self> {
        let device_params = Buffer::new(device, BufferUsage::DeviceParams, PARAMS_SIZE)?;
        Ok(Self {
            device_params: Arc::new(device_params),
        })
    }

    pub fn device_params(&self) -> Arc<Buffer> {
        self.device_params.clone()
    }
}

impl RenderPass<VulkanFrame> for ParamsPass {
    fn name(&self) -> &str {
        "params"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_, VulkanFrame>, tracker: &mut ResourceStateTracker) {
        // The host rewrote the slot's parameters before this frame started.
        let params = TrackedResource::buffer(ctx.frame.params_buffer());
        tracker.register(params, ResourceState::HOST_WRITE);
        tracker.transition(params, ResourceState::BUFFER_TRANSFER_SRC);
        tracker.transition(
            TrackedResource::buffer(self.device_params.handle()),
            ResourceState::BUFFER_TRANSFER_DST,
        );
    }

    fn record(&mut self, ctx: &mut FrameContext<'_, VulkanFrame>) -> RenderResult<()> {
        ctx.frame.cmd().copy_buffer(
            ctx.frame.params_buffer(),
            self.device_params.handle(),
            &[vk::BufferCopy::default().size(PARAMS_SIZE)],
        );
        Ok(())
    }
}

/// Blits the skin and the texture side by side into the surface image and
/// binds the device parameters for the frame.
pub struct CompositePass {
    device: Arc<Device>,
    skin: Arc<Image>,
    texture: Arc<Image>,
    device_params: Arc<Buffer>,
    params_layout: DescriptorSetLayout,
}

impl CompositePass {
    pub fn new(
        device: Arc<Device>,
        skin: Arc<Image>,
        texture: Arc<Image>,
        device_params: Arc<Buffer>,
    ) -> RenderResult<Self> {
        let params_layout = DescriptorSetLayout::new(
            device.clone(),
            &[descriptor::uniform_buffer_binding(0, vk::ShaderStageFlags::ALL)],
        )?;

        Ok(Self {
            device,
            skin,
            texture,
            device_params,
            params_layout,
        })
    }
}

impl RenderPass<VulkanFrame> for CompositePass {
    fn name(&self) -> &str {
        "composite"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_, VulkanFrame>, tracker: &mut ResourceStateTracker) {
        tracker.transition(
            TrackedResource::color_image(self.skin.handle()),
            ResourceState::TRANSFER_SRC,
        );
        tracker.transition(
            TrackedResource::color_image(self.texture.handle()),
            ResourceState::TRANSFER_SRC,
        );
        tracker.transition(
            TrackedResource::color_image(ctx.target.image),
            ResourceState::TRANSFER_DST,
        );
        tracker.transition(
            TrackedResource::buffer(self.device_params.handle()),
            ResourceState::UNIFORM_READ,
        );
    }

    fn record(&mut self, ctx: &mut FrameContext<'_, VulkanFrame>) -> RenderResult<()> {
        let cmd = ctx.frame.cmd().clone();
        let half = ctx.extent.width / 2;

        cmd.blit_image(
            self.skin.handle(),
            ctx.target.image,
            &[blit_region(self.skin.extent(), (0, half), ctx.extent.height)],
            vk::Filter::NEAREST,
        );
        cmd.blit_image(
            self.texture.handle(),
            ctx.target.image,
            &[blit_region(
                self.texture.extent(),
                (half, ctx.extent.width),
                ctx.extent.height,
            )],
            vk::Filter::LINEAR,
        );

        let set = ctx.frame.allocate_transient(self.params_layout.handle())?;
        descriptor::write_uniform_buffer(
            &self.device,
            set,
            0,
            self.device_params.handle(),
            PARAMS_SIZE,
        );
        Ok(())
    }
}

fn color_layers() -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(0)
        .base_array_layer(0)
        .layer_count(1)
}

/// Whole `src` stretched into columns `x.0..x.1` of the destination.
fn blit_region(src: vk::Extent2D, x: (u32, u32), height: u32) -> vk::ImageBlit {
    vk::ImageBlit::default()
        .src_subresource(color_layers())
        .src_offsets([
            vk::Offset3D::default(),
            vk::Offset3D {
                x: src.width as i32,
                y: src.height as i32,
                z: 1,
            },
        ])
        .dst_subresource(color_layers())
        .dst_offsets([
            vk::Offset3D {
                x: x.0 as i32,
                y: 0,
                z: 0,
            },
            vk::Offset3D {
                x: x.1 as i32,
                y: height as i32,
                z: 1,
            },
        ])
}

fn pointer_color(params: &Params) -> [f32; 4] {
    let axis = |pos: i32, len: u32| {
        if len == 0 {
            0.0
        } else {
            (pos as f32 / len as f32).clamp(0.0, 1.0)
        }
    };
    [
        axis(params.mouse.x, params.resolution.x),
        axis(params.mouse.y, params.resolution.y),
        0.5,
        1.0,
    ]
}
