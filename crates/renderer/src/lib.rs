//! Frame orchestration for the rendering host.
//!
//! This crate sequences the RHI primitives into a render loop:
//! - Per-slot frame state and fence-value bookkeeping
//! - The render step (record, submit, present, backpressure)
//! - The resize step (flush, recreate, re-derive views)
//! - FPS accounting

pub mod frame;
pub mod renderer;
pub mod stats;

pub use frame::FrameSlots;
pub use renderer::Renderer;
pub use stats::FrameStats;

/// Number of presentable buffer slots.
///
/// Fixed at compile time; every per-slot array in the host is sized by this.
/// Three slots let the CPU record up to two frames ahead of the one the GPU
/// is presenting.
pub const FRAME_COUNT: usize = 3;
