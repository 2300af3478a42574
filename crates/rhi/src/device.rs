//! Vulkan logical device and queue management.
//!
//! # Overview
//!
//! The [`Device`] struct wraps the logical device and the single direct
//! queue the host submits and presents on. It is created once at startup and
//! lives for the lifetime of the process; swapchain recreation never touches
//! it.
//!
//! Enabled features beyond the 1.0 baseline:
//! - Vulkan 1.2 `timeline_semaphore` (the fence synchronizer's counter)
//! - Vulkan 1.3 `dynamic_rendering` (clear/draw recording without render
//!   passes) and `synchronization2`

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::adapter::AdapterInfo;
use crate::error::RhiError;
use crate::instance::Instance;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Owns the device handle and the single graphics/present queue. Shared
/// across the host behind an `Arc`; all mutation happens from the one
/// orchestrating thread.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// The direct queue used for graphics and presentation.
    queue: vk::Queue,
    /// Queue family index of the direct queue.
    queue_family: u32,
}

impl Device {
    /// Creates a new logical device on the selected adapter.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `adapter` - The selected physical device
    ///
    /// # Errors
    ///
    /// Returns an error if device creation fails. Device creation failure is
    /// a fatal initialization error.
    pub fn new(instance: &Instance, adapter: &AdapterInfo) -> Result<Arc<Self>, RhiError> {
        let queue_priorities = [1.0f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(adapter.queue_family)
            .queue_priorities(&queue_priorities)];

        let mut features_1_2 =
            vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let extension_names: Vec<*const i8> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(adapter.device, &create_info, None)?
        };

        let queue = unsafe { device.get_device_queue(adapter.queue_family, 0) };
        debug!(
            "Direct queue retrieved from family {}",
            adapter.queue_family
        );

        info!(
            "Logical device created on '{}' with {} extension(s)",
            adapter.device_name(),
            DEVICE_EXTENSIONS.len()
        );

        Ok(Arc::new(Self {
            device,
            physical_device: adapter.device,
            queue,
            queue_family: adapter.queue_family,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the direct graphics/present queue.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Returns the queue family index of the direct queue.
    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Waits for the device to become idle.
    ///
    /// Blocks until all outstanding operations on all queues have completed.
    /// Used before destroying resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the direct queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - Synchronization is properly handled
    /// - The fence (if provided) is not in use
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails; submission failures are
    /// fatal runtime errors and are not retried.
    pub unsafe fn submit(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device.queue_submit(self.queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            // Wait for all operations to complete before cleanup
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: Device is Send+Sync because:
// - ash::Device is Send+Sync
// - vk::PhysicalDevice and vk::Queue are Copy handle types
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        // Compile-time check that Device is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
