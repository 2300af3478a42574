//! GPU/CPU synchronization primitives.
//!
//! This module provides the two synchronization objects the host needs:
//!
//! - [`RenderFence`] - a monotonically increasing counter backed by a
//!   timeline semaphore, used to keep the CPU from racing ahead of the GPU
//! - [`Semaphore`] - a binary semaphore for swapchain acquire/present
//!   ordering (the presentation engine cannot wait on timeline semaphores)
//!
//! # Fence protocol
//!
//! ```text
//! value = fence.signal(queue)     // GPU will set the counter to `value`
//!                                 // once all prior work on `queue` retires
//! ...
//! fence.wait_for(value, timeout)  // blocks until counter >= value
//! fence.flush(queue)              // signal + wait: drains the queue
//! ```
//!
//! Values returned by `signal` are unique and strictly increasing. Per-slot
//! bookkeeping of these values lets a frame slot be reused as soon as that
//! slot's own prior work has provably retired, instead of stalling the whole
//! pipeline every frame.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Wait forever. The default for steady-state rendering; bounded timeouts
/// are for callers that can surface [`RhiError::FenceTimeout`].
pub const WAIT_INDEFINITE: u64 = u64::MAX;

/// A monotonic GPU fence backed by a timeline semaphore.
///
/// The CPU-side counter only moves through [`signal`](Self::signal), so the
/// last signaled value and the semaphore's GPU-reported completed value
/// bracket the work currently in flight.
///
/// # Thread Safety
///
/// `signal` takes `&mut self`: the host mutates the fence from the single
/// orchestrating thread only, so no interior locking is needed.
pub struct RenderFence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Timeline semaphore handle.
    semaphore: vk::Semaphore,
    /// Last value handed out by `signal`.
    value: u64,
}

impl RenderFence {
    /// Creates a new fence with its counter at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);

        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created render fence (timeline semaphore)");

        Ok(Self {
            device,
            semaphore,
            value: 0,
        })
    }

    /// Returns the timeline semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Returns the last value handed out by [`signal`](Self::signal).
    #[inline]
    pub fn last_signaled(&self) -> u64 {
        self.value
    }

    /// Increments the counter and queues a GPU-side signal of the new value.
    ///
    /// The returned value completes only after all work submitted to `queue`
    /// before this call has retired; it is the caller's "last use" marker for
    /// whatever that work referenced.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    pub fn signal(&mut self, queue: vk::Queue) -> RhiResult<u64> {
        self.value += 1;
        let signal_value = self.value;

        let signal_values = [signal_value];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);

        let semaphores = [self.semaphore];
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .handle()
                .queue_submit(queue, &[submit_info], vk::Fence::null())?;
        }

        Ok(signal_value)
    }

    /// Returns the GPU-reported completed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails (device loss).
    pub fn completed_value(&self) -> RhiResult<u64> {
        let value = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        };
        Ok(value)
    }

    /// Blocks until the GPU-reported value reaches `value`.
    ///
    /// Returns immediately if the value has already completed.
    ///
    /// # Arguments
    ///
    /// * `value` - The counter value to wait for
    /// * `timeout` - Timeout in nanoseconds; [`WAIT_INDEFINITE`] to wait
    ///   forever
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::FenceTimeout`] if a bounded timeout elapses, or a
    /// Vulkan error on device loss.
    pub fn wait_for(&self, value: u64, timeout: u64) -> RhiResult<()> {
        if self.completed_value()? >= value {
            return Ok(());
        }

        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        let result = unsafe { self.device.handle().wait_semaphores(&wait_info, timeout) };

        match result {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(RhiError::FenceTimeout { value }),
            Err(e) => Err(e.into()),
        }
    }

    /// Signals and then waits for that exact value.
    ///
    /// Guarantees that all work previously submitted on `queue` has retired
    /// before returning. Used before swapchain resizes and at shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal submission or the wait fails.
    pub fn flush(&mut self, queue: vk::Queue) -> RhiResult<u64> {
        let value = self.signal(queue)?;
        self.wait_for(value, WAIT_INDEFINITE)?;
        debug!("Fence flushed at value {}", value);
        Ok(value)
    }
}

impl Drop for RenderFence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed render fence");
    }
}

/// Vulkan binary semaphore wrapper.
///
/// Used for GPU-to-GPU ordering around the presentation engine:
/// - acquire semaphore: signaled when a swapchain image is ready
/// - render-finished semaphore: signaled when rendering completes, waited on
///   by the present call
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Creates one semaphore per entry, logging the batch.
///
/// # Errors
///
/// Returns an error if any creation fails; already-created semaphores are
/// dropped.
pub fn create_semaphores(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Semaphore>> {
    let semaphores = (0..count)
        .map(|_| Semaphore::new(device.clone()))
        .collect::<RhiResult<Vec<_>>>()?;

    info!("Created {} binary semaphore(s)", count);
    Ok(semaphores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_indefinite_is_max() {
        // The unbounded timeout must be the Vulkan "no timeout" sentinel
        assert_eq!(WAIT_INDEFINITE, u64::MAX);
    }

    #[test]
    fn test_render_fence_is_send_sync() {
        // Compile-time check that RenderFence is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderFence>();
    }

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }
}
