//! Vulkan logical device, its single queue and the memory allocator.
//!
//! All recording, submission and presentation go through one queue from the
//! family picked in [`crate::physical_device::select_physical_device`].
//! Synchronization2 is required: every barrier and submit in the frame loop
//! uses the `*2` entry points.
//!
//! # Example
//!
//! ```no_run
//! use inflight_rhi::device::Device;
//! use inflight_rhi::instance::Instance;
//! use inflight_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(c"inflight", &[], false).expect("instance");
//! let surface = vk::SurfaceKHR::null(); // from the window in practice
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//! let gpu = select_physical_device(instance.handle(), surface, &surface_loader).expect("gpu");
//! let device = Device::new(&instance, &gpu).expect("device");
//! device.wait_idle().expect("idle");
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: Mutex<Option<Allocator>>,
    queue: vk::Queue,
    queue_family: u32,
}

impl Device {
    /// Create the logical device with synchronization2 enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator setup fails.
    pub fn new(instance: &Instance, gpu: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(gpu.queue_family)
            .queue_priorities(&priorities)];

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);

        let extension_names: Vec<_> = DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(gpu.device, &create_info, None)?
        };
        let queue = unsafe { device.get_device_queue(gpu.queue_family, 0) };
        info!(
            "Logical device created, queue family {}",
            gpu.queue_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: gpu.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };
        debug!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: gpu.device,
            allocator: Mutex::new(Some(allocator)),
            queue,
            queue_family: gpu.queue_family,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The single graphics + present queue.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Lock the allocator for an allocate or free call.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Option<Allocator>>> {
        self.allocator.lock().map_err(|_| RhiError::AllocatorPoisoned)
    }

    /// Block until every queue on the device is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submit work to the queue, signalling `fence` when it completes.
    ///
    /// # Safety
    ///
    /// Every handle referenced by `submits` must stay alive until `fence`
    /// signals.
    pub unsafe fn submit(&self, submits: &[vk::SubmitInfo2<'_>], fence: vk::Fence) -> RhiResult<()> {
        unsafe { self.device.queue_submit2(self.queue, submits, fence)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
        }
        // The allocator holds a device clone and must go before the device.
        match self.allocator.get_mut() {
            Ok(allocator) => drop(allocator.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }
        unsafe { self.device.destroy_device(None) };
        info!("Logical device destroyed");
    }
}

// Safety: handles are plain values, the allocator is behind a Mutex and
// ash::Device is Send + Sync.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
