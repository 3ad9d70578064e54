//! Handle & resource descriptors
//!
//! A handle is a plain value describing a resource plus a random identifier. It becomes
//! "live" once passed to the matching `Device::load_*` call and stops being live after
//! `unload_*`. Handles are cheap to copy or clone and can be built anywhere; the device only
//! ever reads them, except where an operation documents a write-back of the texture layout.

use crate::foundation::id::{new_id, HandleId, INVALID_ID};
use crate::rhi::types::{
    Blend, BlendOp, BufferUsage, CompareOp, CullMode, Format, ImageLayout, PrimitiveTopology,
    ShaderStage, TextureUsage, VertexType,
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Anything with a handle identifier
pub trait Handle {
    /// The random identifier of this descriptor
    fn id(&self) -> HandleId;

    /// Whether the identifier is the reserved invalid value
    fn is_invalid(&self) -> bool {
        self.id() == INVALID_ID
    }
}

macro_rules! impl_handle {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Handle for $ty {
                fn id(&self) -> HandleId {
                    self.id
                }
            }
        )*
    };
}

/// GPU buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle {
    /// Identifier
    pub id: HandleId,
    /// Intended usages
    pub usage: BufferUsage,
    /// Size in bytes
    pub size: u64,
    /// CPU-visible (mappable) memory
    pub cpu_access: bool,
}

impl BufferHandle {
    /// Describe a buffer
    pub fn new(usage: BufferUsage, size: u64, cpu_access: bool) -> Self {
        Self { id: new_id(), usage, size, cpu_access }
    }
}

impl Default for BufferHandle {
    fn default() -> Self {
        Self::new(BufferUsage::empty(), 0, false)
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// 1D
    Texture1D,
    /// 2D
    #[default]
    Texture2D,
    /// 3D
    Texture3D,
    /// Six-layer cube map
    Cube,
}

/// Texture descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle {
    /// Identifier
    pub id: HandleId,
    /// Dimensionality
    pub texture_type: TextureType,
    /// Texel format
    pub format: Format,
    /// Current layout as known by the caller
    pub layout: ImageLayout,
    /// Views to create
    pub usage: TextureUsage,
    /// Size in bytes of the initial data (informational)
    pub size: u64,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth in texels
    pub depth: u8,
    /// Array layers (forced to 6 for cube maps)
    pub layers: u8,
    /// Mip levels
    pub mip_levels: u8,
    /// Samples per texel
    pub sample_count: u8,
}

impl TextureHandle {
    /// Describe a single-mip 2D texture
    pub fn new_2d(width: u32, height: u32, format: Format, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            size: u64::from(width) * u64::from(height) * u64::from(format.bytes_per_block()),
            ..Self::default()
        }
    }

    /// Describe a cube map with square faces
    pub fn new_cube(extent: u32, format: Format, usage: TextureUsage) -> Self {
        Self {
            texture_type: TextureType::Cube,
            layers: 6,
            ..Self::new_2d(extent, extent, format, usage)
        }
    }

    /// Array layers the backend must allocate
    pub fn layer_count(&self) -> u32 {
        match self.texture_type {
            TextureType::Cube => 6,
            _ => u32::from(self.layers.max(1)),
        }
    }
}

impl Default for TextureHandle {
    fn default() -> Self {
        Self {
            id: new_id(),
            texture_type: TextureType::Texture2D,
            format: Format::Unknown,
            layout: ImageLayout::Undefined,
            usage: TextureUsage::empty(),
            size: 0,
            width: 0,
            height: 0,
            depth: 1,
            layers: 1,
            mip_levels: 1,
            sample_count: 1,
        }
    }
}

/// Attachment role inside a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentType {
    /// Color target
    #[default]
    Color,
    /// Depth-stencil target
    DepthStencil,
}

/// What happens to attachment contents when the pass begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Keep previous contents
    #[default]
    Load,
    /// Clear to the pass clear value
    Clear,
    /// Contents undefined
    DontCare,
}

/// What happens to attachment contents when the pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write results to memory
    #[default]
    Store,
    /// Results may be discarded
    DontCare,
}

/// One attachment of an explicit render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassAttachment {
    /// Color or depth-stencil
    pub attachment_type: AttachmentType,
    /// Load behavior
    pub load_op: LoadOp,
    /// Store behavior
    pub store_op: StoreOp,
    /// Texture rendered into
    pub texture: Option<TextureHandle>,
    /// Layout at pass begin
    pub initial_layout: ImageLayout,
    /// Layout at pass end
    pub final_layout: ImageLayout,
}

impl RenderPassAttachment {
    /// Color attachment over `texture`
    pub fn color(texture: TextureHandle, load_op: LoadOp) -> Self {
        Self {
            texture: Some(texture),
            load_op,
            ..Self::default()
        }
    }

    /// Depth-stencil attachment over `texture`
    pub fn depth_stencil(texture: TextureHandle, load_op: LoadOp) -> Self {
        Self {
            attachment_type: AttachmentType::DepthStencil,
            texture: Some(texture),
            load_op,
            ..Self::default()
        }
    }
}

impl Default for RenderPassAttachment {
    fn default() -> Self {
        Self {
            attachment_type: AttachmentType::Color,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            texture: None,
            initial_layout: ImageLayout::General,
            final_layout: ImageLayout::General,
        }
    }
}

/// Explicit render pass: up to 8 color attachments plus an optional depth-stencil
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassHandle {
    /// Identifier
    pub id: HandleId,
    /// Color attachments, in attachment order
    pub color: Vec<RenderPassAttachment>,
    /// Depth-stencil attachment
    pub depth_stencil: Option<RenderPassAttachment>,
}

impl RenderPassHandle {
    /// Maximum number of color attachments
    pub const MAX_COLOR_ATTACHMENTS: usize = 8;

    /// Render pass with no attachments yet
    pub fn new() -> Self {
        Self {
            id: new_id(),
            color: Vec::new(),
            depth_stencil: None,
        }
    }

    /// Append a color attachment
    pub fn with_color(mut self, attachment: RenderPassAttachment) -> Self {
        self.color.push(attachment);
        self
    }

    /// Set the depth-stencil attachment
    pub fn with_depth_stencil(mut self, attachment: RenderPassAttachment) -> Self {
        self.depth_stencil = Some(attachment);
        self
    }
}

impl Default for RenderPassHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind of resource a descriptor binding holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DescriptorType {
    /// Storage buffer
    Storage = 1,
    /// Uniform buffer
    Uniform = 2,
    /// Combined image sampler
    Sampler = 3,
}

/// One binding inside a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Binding kind
    pub descriptor_type: DescriptorType,
    /// Stages that see the binding
    pub shader_stage: ShaderStage,
    /// Array size
    pub count: u16,
    /// Binding slot
    pub binding: u16,
}

impl Descriptor {
    /// Single-element descriptor
    pub const fn new(descriptor_type: DescriptorType, shader_stage: ShaderStage, binding: u16) -> Self {
        Self { descriptor_type, shader_stage, count: 1, binding }
    }
}

/// Descriptor set layout plus its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetHandle {
    /// Identifier
    pub id: HandleId,
    /// Bindings
    pub descriptors: Vec<Descriptor>,
}

impl DescriptorSetHandle {
    /// Describe a set from its bindings
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self { id: new_id(), descriptors }
    }
}

impl Default for DescriptorSetHandle {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Compute pipeline descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineHandle {
    /// Identifier
    pub id: HandleId,
    /// Set layouts, in set order
    pub descriptor_sets: Vec<DescriptorSetHandle>,
    /// Compute shader bytecode
    pub compute_shader: Vec<u8>,
}

impl ComputePipelineHandle {
    /// Describe a compute pipeline
    pub fn new(compute_shader: Vec<u8>, descriptor_sets: Vec<DescriptorSetHandle>) -> Self {
        Self { id: new_id(), descriptor_sets, compute_shader }
    }
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexInput {
    /// Element type
    pub input_type: VertexType,
    /// Vertex buffer binding
    pub binding: u8,
    /// Byte offset within the vertex
    pub offset: u16,
}

/// Vertex buffer layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    /// Attributes (at most [`VertexLayout::MAX_INPUTS`])
    pub inputs: Vec<VertexInput>,
    /// Bytes per vertex
    pub stride: u32,
}

impl VertexLayout {
    /// Attribute limit
    pub const MAX_INPUTS: usize = 32;

    /// Build a tightly packed layout on binding 0
    pub fn packed(types: &[VertexType]) -> Self {
        let mut offset = 0u32;
        let inputs = types
            .iter()
            .map(|&input_type| {
                #[allow(clippy::cast_possible_truncation)]
                let input = VertexInput { input_type, binding: 0, offset: offset as u16 };
                offset += input_type.size();
                input
            })
            .collect();
        Self { inputs, stride: offset }
    }
}

/// Per render target blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlend {
    /// Source color factor
    pub src_blend: Blend,
    /// Destination color factor
    pub dst_blend: Blend,
    /// Color equation
    pub blend_op: BlendOp,
    /// Source alpha factor
    pub src_blend_alpha: Blend,
    /// Destination alpha factor
    pub dst_blend_alpha: Blend,
    /// Alpha equation
    pub blend_op_alpha: BlendOp,
    /// Channel write mask (RGBA in the low four bits)
    pub write_mask: u8,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            src_blend: Blend::One,
            dst_blend: Blend::Zero,
            blend_op: BlendOp::Add,
            src_blend_alpha: Blend::One,
            dst_blend_alpha: Blend::Zero,
            blend_op_alpha: BlendOp::Add,
            write_mask: 0,
        }
    }
}

/// Output merger blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Blending enabled
    pub enabled: bool,
    /// Alpha to coverage
    pub alpha_to_coverage: bool,
    /// One entry per color target
    pub rt_blends: [RenderTargetBlend; 8],
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: true,
            alpha_to_coverage: false,
            rt_blends: [RenderTargetBlend::default(); 8],
        }
    }
}

/// Graphics pipeline descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPipelineHandle {
    /// Identifier
    pub id: HandleId,
    /// Vertex input
    pub vertex_layout: VertexLayout,
    /// Primitive assembly
    pub topology: PrimitiveTopology,
    /// Culling
    pub cull_mode: CullMode,
    /// Depth comparison
    pub compare_op: CompareOp,
    /// Primitive restart
    pub primitive_restart: bool,
    /// Stencil test
    pub stencil_test: bool,
    /// Depth test
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Blending
    pub blend_state: BlendState,
    /// Pixel shader bytecode (entry point `mainPS`)
    pub pixel_shader: Vec<u8>,
    /// Vertex shader bytecode (entry point `mainVS`)
    pub vertex_shader: Vec<u8>,
    /// Set layouts, in set order
    pub descriptor_sets: Vec<DescriptorSetHandle>,
    /// Render pass the pipeline is compatible with; the backbuffer pass when `None`
    pub render_pass: Option<RenderPassHandle>,
}

impl GraphicsPipelineHandle {
    /// Vertex shader entry point
    pub const VERTEX_ENTRY: &'static str = "mainVS";
    /// Pixel shader entry point
    pub const PIXEL_ENTRY: &'static str = "mainPS";

    /// Pipeline with default fixed-function state
    pub fn new(vertex_shader: Vec<u8>, pixel_shader: Vec<u8>) -> Self {
        Self {
            vertex_shader,
            pixel_shader,
            ..Self::default()
        }
    }
}

impl Default for GraphicsPipelineHandle {
    fn default() -> Self {
        Self {
            id: new_id(),
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            compare_op: CompareOp::Always,
            primitive_restart: false,
            stencil_test: true,
            depth_test: true,
            depth_write: true,
            blend_state: BlendState::default(),
            pixel_shader: Vec::new(),
            vertex_shader: Vec::new(),
            descriptor_sets: Vec::new(),
            render_pass: None,
        }
    }
}

/// Render target descriptor (a swapchain backbuffer or an offscreen target)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetHandle {
    /// Identifier
    pub id: HandleId,
    /// Not backed by a swapchain
    pub offscreen: bool,
}

impl Default for RenderTargetHandle {
    fn default() -> Self {
        Self { id: new_id(), offscreen: true }
    }
}

/// Native window a swapchain presents to
///
/// Headless windows (no raw handles) are accepted by backends that do not present to a
/// real surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowHandle {
    /// Platform window
    pub raw_window_handle: Option<RawWindowHandle>,
    /// Platform display connection
    pub raw_display_handle: Option<RawDisplayHandle>,
    /// Drawable width in pixels
    pub width: u32,
    /// Drawable height in pixels
    pub height: u32,
}

impl WindowHandle {
    /// Window without a native surface
    pub const fn headless(width: u32, height: u32) -> Self {
        Self { raw_window_handle: None, raw_display_handle: None, width, height }
    }
}

/// Swapchain descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainHandle {
    /// Identifier
    pub id: HandleId,
    /// Target window and its drawable size
    pub window: WindowHandle,
    /// Render target standing for the presented images
    pub backbuffer: RenderTargetHandle,
}

impl SwapchainHandle {
    /// Swapchain for `window`
    pub fn new(window: WindowHandle) -> Self {
        Self {
            id: new_id(),
            window,
            backbuffer: RenderTargetHandle { offscreen: false, ..RenderTargetHandle::default() },
        }
    }
}

impl_handle!(
    BufferHandle,
    TextureHandle,
    RenderPassHandle,
    DescriptorSetHandle,
    ComputePipelineHandle,
    GraphicsPipelineHandle,
    RenderTargetHandle,
    SwapchainHandle,
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Fresh descriptors never reuse an identifier (collisions are flagged, not ignored).
    #[test]
    fn test_handle_uniqueness() {
        let ids: Vec<HandleId> = (0..1000).map(|_| BufferHandle::default().id).collect();
        assert!(ids.iter().all(|&id| id != INVALID_ID));
        let unique: HashSet<_> = ids.iter().collect();
        let collisions = ids.len() - unique.len();
        if collisions > 0 {
            eprintln!("flagged {collisions} handle id collision(s) in 1000 draws");
        }
        assert!(collisions <= 1);
    }

    #[test]
    fn test_copies_share_identity() {
        let texture = TextureHandle::new_2d(4, 4, Format::R8G8B8A8Unorm, TextureUsage::SRV);
        let copy = texture;
        assert_eq!(copy.id(), texture.id());
        assert_ne!(TextureHandle::default().id(), texture.id());
    }

    #[test]
    fn test_texture_defaults() {
        let texture = TextureHandle::new_2d(256, 256, Format::R8G8B8A8Unorm, TextureUsage::RTV);
        assert_eq!(texture.size, 256 * 256 * 4);
        assert_eq!(texture.layout, ImageLayout::Undefined);
        assert_eq!(texture.layer_count(), 1);
        assert_eq!(TextureHandle::new_cube(64, Format::R8G8B8A8Unorm, TextureUsage::SRV).layer_count(), 6);
    }

    #[test]
    fn test_attachment_and_pipeline_defaults() {
        let attachment = RenderPassAttachment::default();
        assert_eq!(attachment.initial_layout, ImageLayout::General);
        assert_eq!(attachment.final_layout, ImageLayout::General);

        let pipeline = GraphicsPipelineHandle::default();
        assert_eq!(pipeline.cull_mode, CullMode::Back);
        assert_eq!(pipeline.compare_op, CompareOp::Always);
        assert!(pipeline.blend_state.enabled);
        assert!(pipeline.render_pass.is_none());
    }

    #[test]
    fn test_packed_vertex_layout() {
        let layout = VertexLayout::packed(&[VertexType::Float3, VertexType::Float3, VertexType::Float2]);
        assert_eq!(layout.stride, 32);
        assert_eq!(layout.inputs[2].offset, 24);
    }
}
