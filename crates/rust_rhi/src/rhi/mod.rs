//! Render hardware interface
//!
//! Handle descriptors, the device facade and the machinery behind it: resource tables,
//! the render pass / framebuffer cache, command list multiplexing, descriptor replicas and
//! per-swapchain frame synchronization.

pub mod adapter;
pub mod barrier;
pub mod command_lists;
pub mod commands;
pub mod descriptor_set;
pub mod device;
pub mod error;
pub mod fbo_cache;
pub mod handles;
pub mod resources;
pub mod swapchain;
pub mod types;

pub use device::{BufferMapping, Device, Named};
pub use error::{RhiError, RhiResult};
