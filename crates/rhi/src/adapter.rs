//! Physical device (adapter) selection.
//!
//! # Overview
//!
//! The selection rule mirrors what the host needs and nothing more:
//!
//! 1. Enumerate all physical devices.
//! 2. A device qualifies if it reaches the minimum supported API version and
//!    has a queue family that supports both graphics and presentation to the
//!    target surface (the host drives a single direct queue).
//! 3. Among qualifying hardware devices, the one with the largest
//!    device-local memory wins.
//! 4. A software (CPU) implementation is considered only when explicitly
//!    requested via the surface provider's adapter-preference hint.
//!
//! Failure to find a qualifying device is a fatal initialization error.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Minimum Vulkan API version the host supports.
const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Information about a selected physical device.
#[derive(Clone)]
pub struct AdapterInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family used for both graphics and presentation.
    pub queue_family: u32,
}

impl AdapterInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device-local memory in bytes.
    ///
    /// This is the dedicated-video-memory analog used for adapter ranking.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }

    /// Whether this is a software (CPU) implementation.
    pub fn is_software(&self) -> bool {
        self.properties.device_type == vk::PhysicalDeviceType::CPU
    }
}

impl std::fmt::Debug for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("AdapterInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_family", &self.queue_family)
            .finish()
    }
}

/// Selects the physical device to create the logical device on.
///
/// # Arguments
///
/// * `instance` - The Vulkan instance
/// * `surface` - The window surface for present support checking
/// * `surface_loader` - The surface extension loader
/// * `prefer_software` - Select a CPU implementation instead of hardware
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device qualifies: this is fatal
/// to startup and is not retried.
pub fn select_adapter(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    prefer_software: bool,
) -> Result<AdapterInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable devices found");
        return Err(RhiError::NoSuitableGpu);
    }

    let candidates: Vec<AdapterInfo> = devices
        .into_iter()
        .filter_map(|device| probe_adapter(instance, device, surface, surface_loader))
        .collect();

    let selected = pick_adapter(candidates, prefer_software).ok_or_else(|| {
        warn!(
            "No suitable {} adapter found",
            if prefer_software { "software" } else { "hardware" }
        );
        RhiError::NoSuitableGpu
    })?;

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected adapter: '{}' ({}) - Vulkan {}.{}.{}, {} MiB device-local",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        selected.device_local_memory() / (1024 * 1024)
    );

    Ok(selected)
}

/// Picks the winning adapter from the qualifying candidates.
///
/// Hardware adapters are ranked by device-local memory; a software adapter is
/// chosen only when `prefer_software` is set.
fn pick_adapter(candidates: Vec<AdapterInfo>, prefer_software: bool) -> Option<AdapterInfo> {
    candidates
        .into_iter()
        .filter(|info| info.is_software() == prefer_software)
        .max_by_key(|info| info.device_local_memory())
}

/// Checks whether a physical device qualifies, returning its info if so.
fn probe_adapter(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<AdapterInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    if properties.api_version < MIN_API_VERSION {
        debug!(
            "Adapter '{}' skipped: Vulkan {}.{} below minimum",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    let Some(queue_family) = find_direct_queue_family(instance, device, surface, surface_loader)
    else {
        debug!(
            "Adapter '{}' skipped: no queue family supports graphics + present",
            device_name
        );
        return None;
    };

    let info = AdapterInfo {
        device,
        properties,
        memory_properties,
        queue_family,
    };

    debug!(
        "Adapter '{}' qualifies (queue family {}, {} MiB device-local)",
        info.device_name(),
        info.queue_family,
        info.device_local_memory() / (1024 * 1024)
    );

    Some(info)
}

/// Finds a queue family supporting both graphics and presentation.
fn find_direct_queue_family(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<u32> {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    queue_families
        .iter()
        .enumerate()
        .find_map(|(index, family)| {
            let index = index as u32;

            if family.queue_count == 0
                || !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                return None;
            }

            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .unwrap_or(false)
            };

            present_support.then_some(index)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(device_type: vk::PhysicalDeviceType, local_memory: u64) -> AdapterInfo {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties::default();
        memory_properties.memory_heap_count = 2;
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: local_memory,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        // Host-visible heap that must not count towards the ranking
        memory_properties.memory_heaps[1] = vk::MemoryHeap {
            size: 1 << 40,
            flags: vk::MemoryHeapFlags::empty(),
        };

        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = device_type;

        AdapterInfo {
            device: vk::PhysicalDevice::null(),
            properties,
            memory_properties,
            queue_family: 0,
        }
    }

    #[test]
    fn device_local_memory_ignores_host_heaps() {
        let info = synthetic(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        assert_eq!(info.device_local_memory(), 4096);
    }

    #[test]
    fn picks_largest_device_local_memory() {
        let small = synthetic(vk::PhysicalDeviceType::DISCRETE_GPU, 2 << 30);
        let large = synthetic(vk::PhysicalDeviceType::INTEGRATED_GPU, 8 << 30);

        let picked = pick_adapter(vec![small, large], false).unwrap();
        assert_eq!(picked.device_local_memory(), 8 << 30);
    }

    #[test]
    fn software_adapter_needs_explicit_request() {
        let hardware = synthetic(vk::PhysicalDeviceType::DISCRETE_GPU, 1 << 30);
        let software = synthetic(vk::PhysicalDeviceType::CPU, 16 << 30);

        let picked = pick_adapter(vec![hardware.clone(), software.clone()], false).unwrap();
        assert!(!picked.is_software());

        let picked = pick_adapter(vec![hardware, software], true).unwrap();
        assert!(picked.is_software());
    }

    #[test]
    fn no_candidates_yields_none() {
        assert!(pick_adapter(vec![], false).is_none());

        // Only software available but hardware requested
        let software = synthetic(vk::PhysicalDeviceType::CPU, 1 << 30);
        assert!(pick_adapter(vec![software], false).is_none());
    }
}
