use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::debug;

use inflight_rhi::device::Device;
use inflight_rhi::instance::Instance;
use inflight_rhi::swapchain::Swapchain;
use inflight_rhi::sync::Semaphore;

use crate::backend::{AcquireOutcome, PresentOutcome, PresentSurface, SurfaceBuild};
use crate::error::RenderResult;

/// A window surface presented through a Vulkan swapchain.
///
/// Does not own the `VkSurfaceKHR`; the platform layer destroys it after
/// this is dropped.
pub struct VulkanSurface {
    device: Arc<Device>,
    swapchain: Swapchain,
    signals: HashMap<vk::Semaphore, Semaphore>,
}

impl VulkanSurface {
    pub fn new(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR) -> Self {
        let swapchain = Swapchain::new(instance, device.clone(), surface);
        Self {
            device,
            swapchain,
            signals: HashMap::new(),
        }
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }
}

impl PresentSurface for VulkanSurface {
    fn build(&mut self, desired: vk::Extent2D, vsync: bool) -> RenderResult<Option<SurfaceBuild>> {
        let available = self.swapchain.surface_extent(desired)?;
        if available.width == 0 || available.height == 0 {
            debug!("Surface reports zero extent, not building");
            return Ok(None);
        }

        self.swapchain.rebuild(desired, vsync)?;

        let images = self
            .swapchain
            .images()
            .iter()
            .copied()
            .zip(self.swapchain.image_views().iter().copied())
            .collect();

        Ok(Some(SurfaceBuild {
            extent: self.swapchain.extent(),
            format: self.swapchain.format(),
            images,
        }))
    }

    fn acquire(&mut self, signal: vk::Semaphore, timeout: Duration) -> RenderResult<AcquireOutcome> {
        match self.swapchain.acquire_next_image(signal, timeout) {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Ok(AcquireOutcome::NotReady),
            Err(e) => Err(e.into()),
        }
    }

    fn present(&mut self, index: u32, wait: vk::Semaphore) -> RenderResult<PresentOutcome> {
        match self.swapchain.present(self.device.queue(), index, wait) {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn create_signal(&mut self) -> RenderResult<vk::Semaphore> {
        let semaphore = Semaphore::new(self.device.clone())?;
        let handle = semaphore.handle();
        self.signals.insert(handle, semaphore);
        Ok(handle)
    }

    fn destroy_signal(&mut self, signal: vk::Semaphore) {
        self.signals.remove(&signal);
    }
}
