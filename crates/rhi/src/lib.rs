//! Thin, owned wrappers over Vulkan (Render Hardware Interface).
//!
//! Every type here owns its Vulkan object and destroys it on drop. The
//! frame-loop logic lives in `inflight-renderer`; this crate only provides:
//! - Instance, GPU and logical device setup
//! - Command pools and recording
//! - Fences and semaphores
//! - Buffers, images and descriptor pools
//! - The swapchain

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
