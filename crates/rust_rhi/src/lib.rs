//! # Rust RHI
//!
//! A render hardware interface: resources are described by plain handle values, realized by
//! a [`Device`](rhi::Device) and recorded into command lists that are multiplexed across
//! frames in flight.
//!
//! ## Features
//!
//! - **Handle-based resources**: buffers, textures, render targets, swapchains, descriptor
//!   sets, pipelines and explicit render passes, keyed by random 32-bit ids
//! - **Frame pacing**: acquire / submit / present with per-slot semaphores and fences,
//!   throttled to `backbuffer_count` frames in flight
//! - **Render pass cache**: structural render pass and framebuffer deduplication
//! - **Deferred destruction**: unloaded objects live until the GPU is done with them
//! - **Backends**: an instrumented in-process [`MockBackend`](backend::mock::MockBackend) and
//!   a Vulkan backend behind the `vulkan` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_rhi::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut device = Device::new(MockBackend::new(), DeviceConfig::default())?;
//!     let swapchain = SwapchainHandle::new(WindowHandle::headless(256, 256));
//!     device.load_swapchain(&swapchain)?;
//!
//!     device.begin_frame_exp(&swapchain)?;
//!     let cmd = device.begin_command_list_exp()?;
//!     device.begin_render_target_pass(&cmd, &swapchain.backbuffer)?;
//!     device.end_render_pass(&cmd);
//!     device.end_frame_exp(&swapchain)?;
//!
//!     device.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod foundation;
pub mod rhi;

/// Common imports for RHI users
pub mod prelude {
    pub use crate::{
        backend::{mock::MockBackend, Backend},
        config::{Config, ConfigError, DeviceConfig},
        rhi::{
            commands::{CommandList, QueueType, Rect, Viewport},
            handles::{
                BufferHandle, ComputePipelineHandle, Descriptor, DescriptorSetHandle, DescriptorType,
                GraphicsPipelineHandle, Handle, LoadOp, RenderPassAttachment, RenderPassHandle, RenderTargetHandle,
                StoreOp, SwapchainHandle, TextureHandle, WindowHandle,
            },
            types::{BufferUsage, Format, ImageLayout, IndexFormat, ShaderStage, TextureUsage},
            BufferMapping, Device, RhiError, RhiResult,
        },
    };

    #[cfg(feature = "vulkan")]
    pub use crate::backend::vulkan::VulkanBackend;
}
