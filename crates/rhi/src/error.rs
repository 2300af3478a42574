//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Every GPU API failure is checked eagerly at the call site and converted
/// into this type; there is no recovery layer underneath the frame
/// orchestrator.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A bounded fence wait elapsed before the GPU reached the value.
    /// Distinct from device loss; cannot occur with an unbounded timeout.
    #[error("Timed out waiting for fence value {value}")]
    FenceTimeout { value: u64 },

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
