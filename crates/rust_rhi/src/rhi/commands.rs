//! Recording-side value types

use crate::foundation::id::HandleId;

/// Viewport rectangle with a depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Near depth
    pub min_depth: f32,
    /// Far depth
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `width` x `height`
    pub const fn new(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    /// Rectangle anchored at the origin
    pub const fn new(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// A command list handed out by the device.
///
/// Frame lists are identified by a slot index inside the swapchain they were begun on;
/// the same index names one pool/buffer pair in every frame-in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandList {
    /// Slot index within the owning swapchain
    pub id: u8,
    /// Backbuffer render target identifying the owning swapchain
    pub backbuffer_id: HandleId,
    /// One-shot transfer list
    pub transfer: bool,
}

/// Hardware queue a list is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    /// Graphics (also supports compute and transfer)
    Graphics,
    /// Async compute
    Compute,
    /// Dedicated copy
    Transfer,
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        };
        f.write_str(name)
    }
}
