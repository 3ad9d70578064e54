//! RHI error types
//!
//! Contract violations (unknown handles, capacity overflow, id 0) panic at the call site.
//! Everything here is a runtime condition the caller may want to log and recover from.

use crate::config::ConfigError;
use crate::rhi::commands::QueueType;
use crate::rhi::types::ImageLayout;
use thiserror::Error;

/// RHI errors
#[derive(Error, Debug)]
pub enum RhiError {
    /// Requested layout transition has no barrier recipe
    #[error("Unsupported layout transition: {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is in
        from: ImageLayout,
        /// Layout that was requested
        to: ImageLayout,
    },

    /// Native API call failed
    #[cfg(feature = "vulkan")]
    #[error("Vulkan API error: {0:?}")]
    Vulkan(ash::vk::Result),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// No adapter satisfies the device requirements
    #[error("No suitable adapter found")]
    NoSuitableAdapter,

    /// Adapter lacks a queue family the device needs
    #[error("No {0} queue family available")]
    MissingQueueFamily(QueueType),

    /// No memory type matches the allocation requirements
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: u64,
    },

    /// Device configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(feature = "vulkan")]
impl From<ash::vk::Result> for RhiError {
    fn from(result: ash::vk::Result) -> Self {
        Self::Vulkan(result)
    }
}

/// Result type for RHI operations
pub type RhiResult<T> = Result<T, RhiError>;
