//! Frame orchestration.
//!
//! This module provides the [`Renderer`] struct that owns the device,
//! swapchain, and synchronization machinery and sequences them into render
//! and resize steps.
//!
//! # Render step
//!
//! ```text
//! 1. Wait for the current slot's last fence value   (backpressure)
//! 2. Acquire the next image index                   (re-queried every frame)
//! 3. Reset the slot's allocator, record the pass    (Idle -> Recording)
//! 4. Submit, then signal the fence                  (Recording -> Submitted)
//! 5. Present with the vsync/tearing policy
//! 6. Advance to the next slot                       (Submitted -> Retired)
//! ```
//!
//! The wait in step 1 is the sole blocking point of the host: it bounds CPU
//! run-ahead by the slot count without stalling slots that are already
//! retired.
//!
//! # Resize step
//!
//! Flush all in-flight frames, conservatively restamp every slot with the
//! flush value, then recreate the chain and its views at the new dimensions.
//! An out-of-date or suboptimal chain reported by acquire/present funnels
//! into the same path on the next frame.
//!
//! # Failure policy
//!
//! Any device-level failure during steady-state rendering (device loss,
//! out-of-memory during recreation) propagates as an unrecoverable error;
//! the orchestrator does not attempt in-place recovery.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use renderhost_core::FrameClock;
use renderhost_platform::{Surface, SurfaceEvent, Window};
use renderhost_rhi::adapter::select_adapter;
use renderhost_rhi::command::{CommandBuffer, CommandPool};
use renderhost_rhi::device::Device;
use renderhost_rhi::instance::Instance;
use renderhost_rhi::swapchain::{PresentRequest, Swapchain};
use renderhost_rhi::sync::{create_semaphores, RenderFence, Semaphore, WAIT_INDEFINITE};
use renderhost_rhi::{RhiError, RhiResult};

use crate::frame::FrameSlots;
use crate::stats::FrameStats;
use crate::FRAME_COUNT;

/// Clear color for the presentable images (RGBA).
const CLEAR_COLOR: [f32; 4] = [0.4, 0.6, 0.9, 1.0];

/// Per-slot frame state: the slot's command allocator, the command buffer
/// recorded against it, and the semaphore its acquire waits signal.
struct FrameSlot {
    command_pool: CommandPool,
    command_buffer: CommandBuffer,
    acquire_semaphore: Semaphore,
}

impl FrameSlot {
    fn new(device: &Arc<Device>) -> RhiResult<Self> {
        let command_pool = CommandPool::new(device.clone(), device.queue_family())?;
        let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;
        let acquire_semaphore = Semaphore::new(device.clone())?;

        Ok(Self {
            command_pool,
            command_buffer,
            acquire_semaphore,
        })
    }
}

/// The frame orchestrator.
///
/// Owns every GPU resource of the host. All methods are called from a single
/// thread; the only concurrency is the CPU/GPU overlap mediated by the
/// fence.
pub struct Renderer {
    // Field order is drop order: everything holding a device Arc precedes
    // the device, the surface precedes the instance, and the instance drops
    // last.
    fence: RenderFence,
    frame_slots: Vec<FrameSlot>,
    /// Render-finished semaphores, one per swapchain image (present waits
    /// cannot share a semaphore across images still in flight).
    render_finished: Vec<Semaphore>,
    swapchain: Swapchain,
    surface: Surface,
    slots: FrameSlots,
    clock: FrameClock,
    stats: FrameStats,
    vsync: bool,
    width: u32,
    height: u32,
    pending_recreate: bool,
    device: Arc<Device>,
    instance: Instance,
}

impl Renderer {
    /// Creates the renderer for the given window.
    ///
    /// Runs the one-time bootstrap: instance, surface, adapter selection,
    /// device, swapchain with [`FRAME_COUNT`] buffers, and per-slot frame
    /// state.
    ///
    /// # Arguments
    ///
    /// * `window` - The surface provider
    /// * `vsync` - Initial presentation policy
    ///
    /// # Errors
    ///
    /// Any failure here is a fatal initialization error: no suitable
    /// adapter, device creation failure, or swapchain creation failure abort
    /// startup.
    pub fn new(window: &Window, vsync: bool) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing renderer ({}x{})", width, height);

        let instance = Instance::new(cfg!(debug_assertions))?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let adapter = select_adapter(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            window.prefer_software_adapter(),
        )?;

        let device = Device::new(&instance, &adapter)?;

        // The chain performs the one-time tearing capability query itself;
        // the optimistic request here degrades cleanly if IMMEDIATE is not
        // offered, and every later frame uses the cached result.
        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            FRAME_COUNT as u32,
            PresentRequest::new(vsync, true),
        )?;

        let frame_slots = (0..FRAME_COUNT)
            .map(|_| FrameSlot::new(&device))
            .collect::<RhiResult<Vec<_>>>()?;

        let render_finished = create_semaphores(&device, swapchain.image_count() as usize)?;

        let fence = RenderFence::new(device.clone())?;

        info!(
            "Renderer initialized: {} buffer slots, {} swapchain images, tearing {}",
            FRAME_COUNT,
            swapchain.image_count(),
            if swapchain.supports_tearing() {
                "supported"
            } else {
                "unsupported"
            }
        );

        Ok(Self {
            fence,
            frame_slots,
            render_finished,
            swapchain,
            surface,
            slots: FrameSlots::new(),
            clock: FrameClock::new(),
            stats: FrameStats::new(),
            vsync,
            width,
            height,
            pending_recreate: false,
            device,
            instance,
        })
    }

    /// Handles a surface event.
    ///
    /// # Errors
    ///
    /// Propagates fatal render or resize failures.
    pub fn handle_event(&mut self, event: SurfaceEvent) -> RhiResult<()> {
        match event {
            SurfaceEvent::Resized { width, height } => self.resize(width, height),
            SurfaceEvent::Redraw => self.render_frame(),
            // Teardown happens on drop; nothing to sequence here.
            SurfaceEvent::CloseRequested => Ok(()),
        }
    }

    /// Current vsync policy.
    #[inline]
    pub fn vsync(&self) -> bool {
        self.vsync
    }

    /// Changes the vsync policy.
    ///
    /// The chain is recreated on the next frame if the policy maps to a
    /// different present mode.
    pub fn set_vsync(&mut self, vsync: bool) {
        if self.vsync != vsync {
            self.vsync = vsync;
            info!("VSync {}", if vsync { "on" } else { "off" });
        }
    }

    /// The presentation request for the current policy inputs.
    fn present_request(&self) -> PresentRequest {
        PresentRequest::new(self.vsync, self.swapchain.supports_tearing())
    }

    /// Performs one render step.
    ///
    /// # Errors
    ///
    /// Fatal on any device-level failure. An out-of-date swapchain is not an
    /// error: the frame is skipped and the chain recreated on the next call.
    pub fn render_frame(&mut self) -> RhiResult<()> {
        let delta = self.clock.tick();
        if let Some(fps) = self.stats.update(delta) {
            info!("FPS: {:.1}", fps);
        }

        let request = self.present_request();
        if self.pending_recreate || !self.swapchain.satisfies(request) {
            self.recreate_swapchain(self.width, self.height)?;
        }

        let slot = self.slots.current();

        // Backpressure: this slot's previous submission must retire before
        // its allocator is reset. Bounded by the slot count, so the CPU can
        // run at most FRAME_COUNT - 1 frames ahead.
        self.fence.wait_for(self.slots.last_value(), WAIT_INDEFINITE)?;

        let frame = &self.frame_slots[slot];

        // The image index is re-derived every frame; it does not advance
        // monotonically.
        let (image_index, suboptimal) =
            match self.swapchain.acquire(frame.acquire_semaphore.handle()) {
                Ok(result) => result,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("Swapchain out of date during acquire");
                    self.pending_recreate = true;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
        if suboptimal {
            self.pending_recreate = true;
        }

        // Idle -> Recording
        frame.command_pool.reset()?;
        self.record_clear_pass(frame, image_index)?;

        // Recording -> Submitted
        let wait_semaphores = [frame.acquire_semaphore.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[image_index as usize].handle()];
        let command_buffers = [frame.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer is recorded and the slot's prior work
        // has retired.
        unsafe {
            self.device.submit(&[submit_info], vk::Fence::null())?;
        }

        // The slot's last-use marker: completes once the submission above
        // retires (queue submission order).
        let value = self.fence.signal(self.device.queue())?;
        self.slots.record(value);

        // Submitted -> Retired
        match self.swapchain.present(
            self.device.queue(),
            image_index,
            self.render_finished[image_index as usize].handle(),
        ) {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("Swapchain suboptimal during present");
                    self.pending_recreate = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during present");
                self.pending_recreate = true;
            }
            Err(e) => return Err(e.into()),
        }

        self.slots.advance();

        Ok(())
    }

    /// Performs one resize step.
    ///
    /// Flushes all in-flight frames, then recreates the chain and views at
    /// the new dimensions. Zero dimensions are clamped to 1 by the chain.
    ///
    /// # Errors
    ///
    /// Fatal on flush or recreation failure.
    pub fn resize(&mut self, width: u32, height: u32) -> RhiResult<()> {
        self.width = width;
        self.height = height;
        self.recreate_swapchain(width, height)
    }

    /// Flush-then-recreate, shared by resize and policy changes.
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> RhiResult<()> {
        // Every buffer reference must have retired before the chain resizes.
        let flushed = self.fence.flush(self.device.queue())?;

        // Conservative restamp: the flush value bounds every slot's true
        // last use and is already complete, so later waits cost nothing.
        self.slots.reset_all(flushed);

        let request = self.present_request();
        self.swapchain
            .resize(&self.instance, self.surface.handle(), width, height, request)?;

        self.width = self.swapchain.width();
        self.height = self.swapchain.height();

        info!(
            "Swapchain recreated: {}x{}, present mode {:?}",
            self.width,
            self.height,
            self.swapchain.present_mode()
        );

        // The old images' presentation state is gone with them; re-derive
        // the per-image semaphores.
        self.render_finished =
            create_semaphores(&self.device, self.swapchain.image_count() as usize)?;

        self.pending_recreate = false;
        Ok(())
    }

    /// Records the clear pass for the acquired image.
    ///
    /// Transitions the image from presentable to render target, clears it
    /// through dynamic rendering, and transitions it back.
    fn record_clear_pass(&self, frame: &FrameSlot, image_index: u32) -> RhiResult<()> {
        let cmd = &frame.command_buffer;
        let image = self.swapchain.image(image_index as usize);

        cmd.begin()?;

        // Presentable -> render target. The image is fully cleared below, so
        // its previous contents are discardable.
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            &[layout_barrier(
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )],
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index as usize))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        cmd.begin_rendering(&rendering_info);
        cmd.end_rendering();

        // Render target -> presentable
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            &[layout_barrier(
                image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags::empty(),
            )],
        );

        cmd.end()?;

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Drain all in-flight work before any resource is released; the
        // fence itself is still alive for the wait.
        if let Err(e) = self.fence.flush(self.device.queue()) {
            error!("Failed to flush during renderer drop: {:?}", e);
        }
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }
        info!("Renderer shut down");
        // Fields drop in declaration order: slot resources and the chain
        // before the device, the surface before the instance.
    }
}

/// Builds an image memory barrier for a full-image layout transition.
fn layout_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        )
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_color_is_opaque() {
        assert_eq!(CLEAR_COLOR[3], 1.0);
    }

    #[test]
    fn test_renderer_is_send() {
        // Compile-time check that Renderer is Send
        fn assert_send<T: Send>() {}
        assert_send::<Renderer>();
    }
}
