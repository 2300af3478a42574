//! Swapchain management.
//!
//! # Overview
//!
//! The [`Swapchain`] struct owns the presentable image chain and the
//! per-image views the host renders into:
//! - Fixed image count chosen at construction and preserved across resizes
//! - Format and present-mode selection driven by the presentation policy
//! - In-place resize (with zero-dimension clamping) that re-derives the views
//! - A cached one-time tearing capability query
//!
//! # Presentation policy
//!
//! The application threads two booleans into every present decision: `vsync`
//! and the cached tearing capability. [`PresentRequest`] turns them into a
//! sync interval and a tearing-allowed flag; the chain maps that request onto
//! the closest Vulkan present mode. A changed request requires chain
//! recreation, which the orchestrator funnels through the same flush-first
//! path as a resize.
//!
//! # Invariants
//!
//! The image index returned by [`acquire`](Swapchain::acquire) identifies the
//! image the surface expects to be rendered into next. It is not guaranteed
//! to advance monotonically and must be re-queried every frame.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// Presentation parameters derived from the application's policy inputs.
///
/// With tearing supported and vsync off, presentation runs with a zero sync
/// interval and tearing allowed; otherwise it synchronizes to the display at
/// an interval of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentRequest {
    /// Number of vertical blanks to synchronize to (0 or 1).
    pub sync_interval: u32,
    /// Whether tearing is permitted for this presentation.
    pub allow_tearing: bool,
}

impl PresentRequest {
    /// Derives the request from the two policy inputs.
    pub fn new(vsync: bool, tearing_supported: bool) -> Self {
        if vsync {
            Self {
                sync_interval: 1,
                allow_tearing: false,
            }
        } else {
            Self {
                sync_interval: 0,
                allow_tearing: tearing_supported,
            }
        }
    }

    /// The present mode this request asks for, before availability checks.
    fn desired_mode(&self) -> vk::PresentModeKHR {
        if self.sync_interval >= 1 {
            vk::PresentModeKHR::FIFO
        } else if self.allow_tearing {
            vk::PresentModeKHR::IMMEDIATE
        } else {
            vk::PresentModeKHR::MAILBOX
        }
    }
}

/// Vulkan swapchain wrapper.
///
/// Owns the swapchain handle and the image views; the images themselves are
/// swapchain-owned and only borrowed by index.
///
/// # Thread Safety
///
/// Not thread-safe; only the orchestrating thread touches it.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
    /// Swapchain handle
    swapchain: vk::SwapchainKHR,
    /// Swapchain images (owned by the swapchain)
    images: Vec<vk::Image>,
    /// Image views for the swapchain images
    image_views: Vec<vk::ImageView>,
    /// Swapchain image format
    format: vk::Format,
    /// Swapchain extent (resolution)
    extent: vk::Extent2D,
    /// Present mode currently in effect
    present_mode: vk::PresentModeKHR,
    /// Present modes the surface offered at creation
    available_present_modes: Vec<vk::PresentModeKHR>,
    /// Image count requested at construction, preserved across resizes
    frame_count: u32,
    /// Cached capability: surface offers IMMEDIATE presentation
    tearing_supported: bool,
}

impl Swapchain {
    /// Creates a new swapchain.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `device` - The logical device
    /// * `surface` - The window surface
    /// * `width` / `height` - Desired dimensions in pixels
    /// * `frame_count` - Number of presentable images (clamped into the
    ///   surface's supported range)
    /// * `request` - Presentation policy for mode selection
    ///
    /// # Errors
    ///
    /// Returns an error if surface queries, swapchain creation, or image view
    /// creation fail. All of these are fatal initialization errors.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        frame_count: u32,
        request: PresentRequest,
    ) -> Result<Self, RhiError> {
        Self::create_internal(
            instance,
            device,
            surface,
            width,
            height,
            frame_count,
            request,
            vk::SwapchainKHR::null(),
        )
    }

    /// Creates a swapchain, optionally chaining from an old one.
    #[allow(clippy::too_many_arguments)]
    fn create_internal(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        frame_count: u32,
        request: PresentRequest,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, RhiError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(device.physical_device(), surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device(), surface)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device.physical_device(), surface)?
        };

        if formats.is_empty() || present_modes.is_empty() {
            return Err(RhiError::SwapchainError(
                "Inadequate surface support (no formats or present modes)".to_string(),
            ));
        }

        // One-time tearing capability check, cached on the chain
        let tearing_supported = present_modes.contains(&vk::PresentModeKHR::IMMEDIATE);

        let surface_format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(request, &present_modes);
        let (width, height) = clamp_dimensions(width, height);
        let extent = choose_extent(&capabilities, width, height);
        let image_count = choose_image_count(frame_count, &capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
        debug!("Swapchain created with {} images", images.len());

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
            present_mode,
            available_present_modes: present_modes,
            frame_count,
            tearing_supported,
        })
    }

    /// Resizes the swapchain in place, preserving image count and format.
    ///
    /// Zero dimensions are clamped to 1 to avoid an invalid presentable
    /// image. The old chain is passed as `old_swapchain` so the driver can
    /// recycle resources; its views are destroyed here and new ones derived.
    ///
    /// # Safety contract
    ///
    /// The caller MUST have flushed the queue first (see
    /// [`RenderFence::flush`](crate::sync::RenderFence::flush)) so no GPU
    /// work still references the old images; otherwise recreation fails with
    /// resource-in-use errors.
    ///
    /// # Errors
    ///
    /// Returns an error if recreation fails. Out-of-memory during resize is a
    /// fatal runtime error.
    pub fn resize(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        request: PresentRequest,
    ) -> Result<(), RhiError> {
        info!(
            "Resizing swapchain: {}x{} -> {}x{}",
            self.extent.width, self.extent.height, width, height
        );

        // Release all view references into the old images before recreation
        self.destroy_image_views();

        let old_swapchain = self.swapchain;
        let mut new_swapchain = Self::create_internal(
            instance,
            self.device.clone(),
            surface,
            width,
            height,
            self.frame_count,
            request,
            old_swapchain,
        )?;

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }

        // Move the new chain's resources into self
        self.swapchain = new_swapchain.swapchain;
        self.images = std::mem::take(&mut new_swapchain.images);
        self.image_views = std::mem::take(&mut new_swapchain.image_views);
        self.format = new_swapchain.format;
        self.extent = new_swapchain.extent;
        self.present_mode = new_swapchain.present_mode;
        self.available_present_modes = std::mem::take(&mut new_swapchain.available_present_modes);
        self.tearing_supported = new_swapchain.tearing_supported;

        // Null the handle so new_swapchain's Drop does not double-free
        new_swapchain.swapchain = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Acquires the index of the image the surface expects next.
    ///
    /// # Arguments
    ///
    /// * `semaphore` - Signaled when the image is ready to be rendered into
    ///
    /// # Returns
    ///
    /// `(image_index, suboptimal)`; a suboptimal chain still presents
    /// correctly but should be recreated.
    ///
    /// # Errors
    ///
    /// `vk::Result::ERROR_OUT_OF_DATE_KHR` means the chain must be recreated
    /// before rendering can continue; other errors are fatal.
    pub fn acquire(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Presents the image at `image_index`.
    ///
    /// # Arguments
    ///
    /// * `queue` - The direct queue
    /// * `image_index` - Index returned by [`acquire`](Self::acquire)
    /// * `wait_semaphore` - Rendering-finished semaphore to wait on
    ///
    /// # Returns
    ///
    /// `true` if the chain is suboptimal and should be recreated.
    ///
    /// # Errors
    ///
    /// `vk::Result::ERROR_OUT_OF_DATE_KHR` if the chain must be recreated;
    /// other errors are fatal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the swapchain width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    /// Returns the swapchain height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Returns the present mode currently in effect.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Whether the chain's present mode satisfies the given request.
    ///
    /// Recomputed against what the surface actually offers, so an
    /// unsatisfiable desire (tearing on a FIFO-only surface) does not demand
    /// recreation. A `false` return means the policy changed and the chain
    /// must be recreated.
    pub fn satisfies(&self, request: PresentRequest) -> bool {
        self.present_mode == choose_present_mode(request, &self.available_present_modes)
    }

    /// Returns the cached tearing capability.
    #[inline]
    pub fn supports_tearing(&self) -> bool {
        self.tearing_supported
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns the swapchain image at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// Returns the image view at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    /// Destroys all image views.
    fn destroy_image_views(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();

        // Skip if the handle was moved out by resize
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }

            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// Clamps dimensions so neither is zero.
///
/// A minimized window reports a zero-area surface; a zero-area presentable
/// image is invalid, so both dimensions are floored at 1.
pub fn clamp_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width.max(1), height.max(1))
}

/// Chooses the best surface format from the available formats.
///
/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR color space.
/// Falls back to the first available format otherwise.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        return format;
    }

    warn!(
        "Using first available surface format: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Maps a presentation request onto an available present mode.
///
/// FIFO is the only mode Vulkan guarantees, so every path bottoms out there.
fn choose_present_mode(
    request: PresentRequest,
    available: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    let desired = request.desired_mode();
    if available.contains(&desired) {
        return desired;
    }

    // No tearing mode on this surface: MAILBOX still gives unthrottled
    // presentation without tearing.
    if request.sync_interval == 0 && available.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }

    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent (resolution).
///
/// If the surface pins the extent, that wins; otherwise the requested size is
/// clamped into the surface's limits.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Clamps the requested image count into the surface's supported range.
///
/// The count is fixed at construction; resizes preserve it.
fn choose_image_count(frame_count: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = frame_count.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

/// Creates image views for swapchain images.
///
/// These are the render-target views of the chain: one view per image,
/// re-derived after every resize.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    let mut image_views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe { device.handle().create_image_view(&create_info, None)? };
        image_views.push(image_view);
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_request_tearing_no_vsync() {
        let request = PresentRequest::new(false, true);
        assert_eq!(request.sync_interval, 0);
        assert!(request.allow_tearing);
    }

    #[test]
    fn test_present_request_vsync_clears_tearing() {
        for tearing_supported in [false, true] {
            let request = PresentRequest::new(true, tearing_supported);
            assert_eq!(request.sync_interval, 1);
            assert!(!request.allow_tearing);
        }
    }

    #[test]
    fn test_present_request_no_tearing_capability() {
        let request = PresentRequest::new(false, false);
        assert_eq!(request.sync_interval, 0);
        assert!(!request.allow_tearing);
    }

    #[test]
    fn test_choose_present_mode_vsync_is_fifo() {
        let available = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];
        let mode = choose_present_mode(PresentRequest::new(true, true), &available);
        assert_eq!(mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_present_mode_tearing_is_immediate() {
        let available = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];
        let mode = choose_present_mode(PresentRequest::new(false, true), &available);
        assert_eq!(mode, vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn test_choose_present_mode_falls_back_without_immediate() {
        let available = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        let mode = choose_present_mode(PresentRequest::new(false, true), &available);
        assert_eq!(mode, vk::PresentModeKHR::MAILBOX);

        let fifo_only = [vk::PresentModeKHR::FIFO];
        let mode = choose_present_mode(PresentRequest::new(false, true), &fifo_only);
        assert_eq!(mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_clamp_dimensions_floors_at_one() {
        assert_eq!(clamp_dimensions(0, 0), (1, 1));
        assert_eq!(clamp_dimensions(0, 720), (1, 720));
        assert_eq!(clamp_dimensions(1280, 0), (1280, 1));
        assert_eq!(clamp_dimensions(1280, 720), (1280, 720));
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_fallback() {
        let formats = vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!(extent.width, 2000);

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!(extent.width, 100);

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn test_choose_image_count_preserves_request() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(choose_image_count(3, &capabilities), 3);
    }

    #[test]
    fn test_choose_image_count_respects_surface_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(choose_image_count(3, &capabilities), 2);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 0, // 0 means no limit
            ..Default::default()
        };
        assert_eq!(choose_image_count(3, &capabilities), 4);
    }
}
