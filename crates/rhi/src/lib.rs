//! Vulkan abstraction layer for the rendering host.
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance creation and the validation-layer message filter
//! - Adapter selection and device/queue creation
//! - Swapchain management and presentation policy
//! - Per-slot command recording primitives
//! - Fence-based GPU/CPU synchronization

mod error;

pub mod adapter;
pub mod command;
pub mod device;
pub mod instance;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
