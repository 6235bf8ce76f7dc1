//! GPU buffers backed by gpu-allocator.
//!
//! - [`BufferUsage`] picks the Vulkan usage flags and memory location
//! - [`Buffer`] owns a VkBuffer and its allocation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inflight_rhi::buffer::{Buffer, BufferUsage};
//! use inflight_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), inflight_rhi::RhiError> {
//! let params = Buffer::new(device, BufferUsage::Params, 16)?;
//! params.write_data(0, &[0u8; 16])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Host-written per-frame parameters, readable as a uniform or copy source.
    Params,
    /// Device-local copy target for parameters.
    DeviceParams,
    /// Host-written upload source.
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Params => {
                vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::DeviceParams => {
                vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Params | BufferUsage::Staging => MemoryLocation::CpuToGpu,
            BufferUsage::DeviceParams => MemoryLocation::GpuOnly,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Params => "params",
            BufferUsage::DeviceParams => "device-params",
            BufferUsage::Staging => "staging",
        }
    }
}

pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Create a buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Fails on a zero size, or if creation, allocation or binding fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut guard| {
            let allocator = guard
                .as_mut()
                .ok_or_else(|| RhiError::InvalidHandle("allocator shut down".into()))?;
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copy `data` into the mapped buffer at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::OutOfBounds`] if the write does not fit, or
    /// [`RhiError::InvalidHandle`] if the buffer is not host-visible.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let len = data.len() as vk::DeviceSize;
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(RhiError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }

        let mapped = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("{} buffer is not mapped", self.usage.name()))
            })?;

        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut guard) => {
                    if let Some(allocator) = guard.as_mut()
                        && let Err(e) = allocator.free(allocation)
                    {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}
