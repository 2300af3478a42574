//! Platform abstraction layer for the rendering host.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Raw window handles and Vulkan surface creation
//! - Explicit surface events decoupling the host from the native message loop

mod event;
mod window;

pub use event::SurfaceEvent;
pub use window::{Surface, Window};
