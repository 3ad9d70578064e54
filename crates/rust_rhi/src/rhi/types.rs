//! Enumerations shared by every descriptor
//!
//! Flag values are part of the public contract: usage and stage masks are power-of-two bits
//! that callers combine with `|`, and their numeric values must not change.

use bitflags::bitflags;

/// View of a texture selected by usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceView {
    /// Shader resource view
    Srv,
    /// Unordered access view
    Uav,
    /// Render target view
    Rtv,
    /// Depth-stencil view
    Dsv,
}

/// Image layout a texture is in (or will transition to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ImageLayout {
    /// Contents are discarded
    #[default]
    Undefined,
    /// Supports every access
    General,
    /// Color attachment, write enabled
    RenderTarget,
    /// Depth-stencil attachment, write enabled
    DepthStencil,
    /// Depth-stencil, read only
    DepthStencilReadOnly,
    /// Sampled by shaders
    ShaderResource,
    /// Sampled by shaders, never written
    ShaderResourceReadOnly,
    /// Shader read/write
    UnorderedAccess,
    /// Copy source
    TransferSrc,
    /// Copy destination
    TransferDst,
    /// Ready for presentation
    Present,
}

/// Texel formats
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum Format {
    #[default]
    Unknown,

    R32G32B32A32Float,
    R32G32B32A32Uint,
    R32G32B32A32Sint,

    R32G32B32Float,
    R32G32B32Uint,
    R32G32B32Sint,

    R16G16B16A16Float,
    R16G16B16A16Unorm,
    R16G16B16A16Uint,
    R16G16B16A16Snorm,
    R16G16B16A16Sint,

    R16G16B16Float,

    R32G32Float,
    R32G32Uint,
    R32G32Sint,

    /// Depth + stencil alias
    R32G8X24Typeless,
    D32FloatS8X24Uint,

    R10G10B10A2Unorm,
    R10G10B10A2Uint,
    R11G11B10Float,

    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    R8G8B8A8Uint,
    R8G8B8A8Snorm,
    R8G8B8A8Sint,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,

    R16G16Float,
    R16G16Unorm,
    R16G16Uint,
    R16G16Snorm,
    R16G16Sint,
    R32Float,
    R32Uint,
    R32Sint,

    /// Depth alias
    R32Typeless,
    D32Float,
    /// Depth + stencil alias
    R24G8Typeless,
    D24UnormS8Uint,
    D16Unorm,
    /// Depth alias
    R16Typeless,

    R8G8Unorm,
    R8G8Uint,
    R8G8Snorm,
    R8G8Sint,

    R16Float,
    R16Unorm,
    R16Uint,
    R16Snorm,
    R16Sint,

    R8Unorm,
    R8Uint,
    R8Snorm,
    R8Sint,

    Bc1Unorm,
    Bc1UnormSrgb,
    Bc2Unorm,
    Bc2UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc4Unorm,
    Bc4Snorm,
    Bc5Unorm,
    Bc5Snorm,
    Bc6hUf16,
    Bc6hSf16,
    Bc7Unorm,
    Bc7UnormSrgb,
}

impl Format {
    /// Whether the format carries depth (including typeless depth aliases)
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            Self::D32Float
                | Self::D24UnormS8Uint
                | Self::D16Unorm
                | Self::D32FloatS8X24Uint
                | Self::R32Typeless
                | Self::R24G8Typeless
                | Self::R16Typeless
                | Self::R32G8X24Typeless
        )
    }

    /// Whether the format carries a stencil aspect
    pub const fn has_stencil(self) -> bool {
        matches!(
            self,
            Self::D24UnormS8Uint
                | Self::D32FloatS8X24Uint
                | Self::R24G8Typeless
                | Self::R32G8X24Typeless
        )
    }

    /// Format used for a depth-stencil view of a texture stored in `self`
    pub const fn dsv_format(self) -> Self {
        match self {
            Self::R16Typeless => Self::D16Unorm,
            Self::R32Typeless => Self::D32Float,
            Self::R24G8Typeless => Self::D24UnormS8Uint,
            Self::R32G8X24Typeless => Self::D32FloatS8X24Uint,
            other => other,
        }
    }

    /// Format used for a shader resource view of a texture stored in `self`
    pub const fn srv_format(self) -> Self {
        match self {
            Self::R16Typeless => Self::R16Unorm,
            Self::R32Typeless | Self::R32G8X24Typeless => Self::R32Float,
            Self::R24G8Typeless => Self::R32Uint,
            other => other,
        }
    }

    /// Size of one texel (or one 4x4 block for BC formats) in bytes
    pub const fn bytes_per_block(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::R32G32B32A32Float | Self::R32G32B32A32Uint | Self::R32G32B32A32Sint => 16,
            Self::R32G32B32Float | Self::R32G32B32Uint | Self::R32G32B32Sint => 12,
            Self::R16G16B16A16Float
            | Self::R16G16B16A16Unorm
            | Self::R16G16B16A16Uint
            | Self::R16G16B16A16Snorm
            | Self::R16G16B16A16Sint
            | Self::R32G32Float
            | Self::R32G32Uint
            | Self::R32G32Sint
            | Self::R32G8X24Typeless
            | Self::D32FloatS8X24Uint => 8,
            Self::R16G16B16Float => 6,
            Self::R8G8Unorm
            | Self::R8G8Uint
            | Self::R8G8Snorm
            | Self::R8G8Sint
            | Self::R16Float
            | Self::R16Unorm
            | Self::R16Uint
            | Self::R16Snorm
            | Self::R16Sint
            | Self::D16Unorm
            | Self::R16Typeless => 2,
            Self::R8Unorm | Self::R8Uint | Self::R8Snorm | Self::R8Sint => 1,
            Self::Bc1Unorm
            | Self::Bc1UnormSrgb
            | Self::Bc4Unorm
            | Self::Bc4Snorm => 8,
            Self::Bc2Unorm
            | Self::Bc2UnormSrgb
            | Self::Bc3Unorm
            | Self::Bc3UnormSrgb
            | Self::Bc5Unorm
            | Self::Bc5Snorm
            | Self::Bc6hUf16
            | Self::Bc6hSf16
            | Self::Bc7Unorm
            | Self::Bc7UnormSrgb => 16,
            _ => 4,
        }
    }
}

/// Index element size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// `u16` indices
    #[default]
    Index16,
    /// `u32` indices
    Index32,
}

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStage: u8 {
        /// Compute
        const COMPUTE = 1 << 1;
        /// Vertex
        const VERTEX = 1 << 2;
        /// Pixel / fragment
        const PIXEL = 1 << 3;
        /// Tessellation control
        const HULL = 1 << 4;
        /// Tessellation evaluation
        const DOMAIN = 1 << 5;
    }
}

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u8 {
        /// Vertex buffer
        const VERTEX = 1 << 1;
        /// Storage buffer
        const STORAGE = 1 << 2;
        /// Index buffer
        const INDEX = 1 << 3;
        /// Uniform buffer
        const UNIFORM = 1 << 4;
        /// Copy source
        const TRANSFER_SRC = 1 << 5;
        /// Copy destination
        const TRANSFER_DST = 1 << 6;
        /// Every usage
        const ALL = Self::VERTEX.bits()
            | Self::INDEX.bits()
            | Self::STORAGE.bits()
            | Self::UNIFORM.bits()
            | Self::TRANSFER_DST.bits()
            | Self::TRANSFER_SRC.bits();
    }
}

bitflags! {
    /// Views a texture must support
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        /// Render target view
        const RTV = 1 << 1;
        /// Unordered access view
        const UAV = 1 << 2;
        /// Shader resource view
        const SRV = 1 << 3;
        /// Depth-stencil view
        const DSV = 1 << 4;
    }
}

impl TextureUsage {
    /// Usage bit that provides `view`
    pub const fn for_view(view: ResourceView) -> Self {
        match view {
            ResourceView::Srv => Self::SRV,
            ResourceView::Uav => Self::UAV,
            ResourceView::Rtv => Self::RTV,
            ResourceView::Dsv => Self::DSV,
        }
    }
}

/// Blend factors
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSat,
    BlendFactor,
    InvBlendFactor,
    Src1Color,
    InvSrc1Color,
    Src1Alpha,
    InvSrc1Alpha,
}

/// Blend equation
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Face culling
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Depth/stencil comparison
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

/// Primitive assembly
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList = 1,
    TriangleStrip = 2,
    TriangleFan = 3,
}

/// Vertex attribute element type
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexType {
    #[default]
    Float,
    Float2,
    Float3,
    Float4,
}

impl VertexType {
    /// Size of the attribute in bytes
    pub const fn size(self) -> u32 {
        match self {
            Self::Float => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values_are_stable() {
        assert_eq!(BufferUsage::VERTEX.bits(), 2);
        assert_eq!(BufferUsage::UNIFORM.bits(), 16);
        assert_eq!(BufferUsage::ALL.bits(), 0b111_1110);
        assert_eq!(TextureUsage::DSV.bits(), 16);
        assert_eq!(ShaderStage::PIXEL.bits(), 8);
        assert_eq!(PrimitiveTopology::TriangleFan as u8, 3);
    }

    #[test]
    fn test_typeless_depth_aliases() {
        assert_eq!(Format::R32Typeless.dsv_format(), Format::D32Float);
        assert_eq!(Format::R32Typeless.srv_format(), Format::R32Float);
        assert_eq!(Format::R24G8Typeless.dsv_format(), Format::D24UnormS8Uint);
        assert_eq!(Format::R8G8B8A8Unorm.dsv_format(), Format::R8G8B8A8Unorm);
        assert!(Format::D24UnormS8Uint.has_stencil());
        assert!(!Format::D32Float.has_stencil());
        assert!(Format::R16Typeless.is_depth());
        assert!(!Format::B8G8R8A8Unorm.is_depth());
    }

    #[test]
    fn test_texel_sizes() {
        assert_eq!(Format::R8G8B8A8Unorm.bytes_per_block(), 4);
        assert_eq!(Format::R32G32B32A32Float.bytes_per_block(), 16);
        assert_eq!(Format::Bc1Unorm.bytes_per_block(), 8);
        assert_eq!(Format::Unknown.bytes_per_block(), 0);
    }
}
