//! Access states a tracked resource can be in.
//!
//! A [`ResourceState`] is the {stage, access, layout} triple describing how
//! a resource was last made available. Buffers always carry
//! `ImageLayout::UNDEFINED`.

use ash::vk;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

const fn access(flags: &[vk::AccessFlags2]) -> vk::AccessFlags2 {
    let mut raw = 0;
    let mut i = 0;
    while i < flags.len() {
        raw |= flags[i].as_raw();
        i += 1;
    }
    vk::AccessFlags2::from_raw(raw)
}

const fn stages(flags: &[vk::PipelineStageFlags2]) -> vk::PipelineStageFlags2 {
    let mut raw = 0;
    let mut i = 0;
    while i < flags.len() {
        raw |= flags[i].as_raw();
        i += 1;
    }
    vk::PipelineStageFlags2::from_raw(raw)
}

impl ResourceState {
    pub const fn new(
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        layout: vk::ImageLayout,
    ) -> Self {
        Self {
            stage,
            access,
            layout,
        }
    }

    /// Never used. Contents are not preserved when leaving this state.
    pub const UNDEFINED: Self = Self::new(
        vk::PipelineStageFlags2::TOP_OF_PIPE,
        vk::AccessFlags2::NONE,
        vk::ImageLayout::UNDEFINED,
    );

    /// A surface image that was just acquired. The acquire semaphore is
    /// waited on at `ALL_COMMANDS`, so the first barrier must start there.
    pub const ACQUIRED: Self = Self::new(
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::NONE,
        vk::ImageLayout::UNDEFINED,
    );

    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    pub const COLOR_ATTACHMENT: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        access(&[
            vk::AccessFlags2::COLOR_ATTACHMENT_READ,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ]),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    pub const SHADER_READ: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    pub const PRESENT: Self = Self::new(
        vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        vk::AccessFlags2::NONE,
        vk::ImageLayout::PRESENT_SRC_KHR,
    );

    /// Written by the host through a mapping.
    pub const HOST_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::HOST,
        vk::AccessFlags2::HOST_WRITE,
        vk::ImageLayout::UNDEFINED,
    );

    pub const BUFFER_TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::UNDEFINED,
    );

    pub const BUFFER_TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::UNDEFINED,
    );

    pub const UNIFORM_READ: Self = Self::new(
        stages(&[
            vk::PipelineStageFlags2::VERTEX_SHADER,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
        ]),
        vk::AccessFlags2::UNIFORM_READ,
        vk::ImageLayout::UNDEFINED,
    );

    const WRITE_ACCESS: vk::AccessFlags2 = access(&[
        vk::AccessFlags2::SHADER_WRITE,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::AccessFlags2::HOST_WRITE,
        vk::AccessFlags2::MEMORY_WRITE,
    ]);

    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// Access mask for the source half of a barrier. Only writes need to be
    /// made available; reads are dropped.
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}
