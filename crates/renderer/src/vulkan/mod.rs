//! The frame loop's backend traits implemented over `inflight-rhi`.

mod accelerator;
mod surface;

pub use accelerator::{VulkanAccelerator, VulkanFrame};
pub use surface::VulkanSurface;
