//! RHI-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    #[error("Allocator lock poisoned")]
    AllocatorPoisoned,

    #[error("No suitable GPU found")]
    NoSuitableGpu,

    #[error("Surface error: {0}")]
    SurfaceError(String),

    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    #[error("Write of {len} byte(s) at offset {offset} exceeds buffer of {size} byte(s)")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
