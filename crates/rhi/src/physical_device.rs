//! Physical device (GPU) selection.
//!
//! The frame loop runs on a single queue, so a GPU qualifies only if one
//! queue family can both record graphics/transfer work and present to the
//! window surface. Among qualifying GPUs, discrete ones win.

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Capabilities of one queue family relevant to selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyCaps {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    pub can_present: bool,
}

#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// The one family used for recording, submission and presentation.
    pub queue_family: u32,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field(
                "api_version",
                &format!(
                    "{}.{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version),
                    vk::api_version_patch(version)
                ),
            )
            .field("queue_family", &self.queue_family)
            .finish()
    }
}

/// Pick the GPU with the highest score that can run the frame loop.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no GPU supports Vulkan 1.3 with
/// a combined graphics and present queue family.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| inspect_device(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device(&info);
            debug!(
                "GPU '{}' ({}) - score {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    match best {
        Some((info, score)) => {
            info!(
                "Selected GPU: '{}' ({}), queue family {}, score {}",
                info.device_name(),
                info.device_type_name(),
                info.queue_family,
                score
            );
            Ok(info)
        }
        None => {
            warn!("No GPU offers Vulkan 1.3 with a graphics+present queue family");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn inspect_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let version = properties.api_version;
    if (vk::api_version_major(version), vk::api_version_minor(version)) < (1, 3) {
        debug!(
            "GPU skipped: Vulkan 1.3 not supported ({}.{})",
            vk::api_version_major(version),
            vk::api_version_minor(version)
        );
        return None;
    }

    let families: Vec<QueueFamilyCaps> =
        unsafe { instance.get_physical_device_queue_family_properties(device) }
            .iter()
            .enumerate()
            .map(|(i, family)| QueueFamilyCaps {
                flags: family.queue_flags,
                queue_count: family.queue_count,
                can_present: unsafe {
                    surface_loader
                        .get_physical_device_surface_support(device, i as u32, surface)
                        .unwrap_or(false)
                },
            })
            .collect();

    let queue_family = pick_queue_family(&families)?;

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_family,
    })
}

/// First family that supports graphics and presentation on the same queue.
pub fn pick_queue_family(families: &[QueueFamilyCaps]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0
                && family.can_present
                && family.flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|i| i as u32)
}

fn rate_device(info: &PhysicalDeviceInfo) -> u64 {
    let type_score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };
    let vram_mb = (info.device_local_memory() / (1024 * 1024)).min(16_000);
    type_score + vram_mb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, can_present: bool) -> QueueFamilyCaps {
        QueueFamilyCaps {
            flags,
            queue_count: 1,
            can_present,
        }
    }

    #[test]
    fn test_pick_combined_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER, true),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, true),
        ];
        assert_eq!(pick_queue_family(&families), Some(1));
    }

    #[test]
    fn test_split_graphics_and_present_rejected() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, false),
            family(vk::QueueFlags::COMPUTE, true),
        ];
        assert_eq!(pick_queue_family(&families), None);
    }

    #[test]
    fn test_empty_family_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS, true);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS, true)];
        assert_eq!(pick_queue_family(&families), Some(1));
    }
}
