//! RHI enum and flag conversions to Vulkan

use crate::rhi::barrier::{Access, PipelineStage};
use crate::rhi::handles::{DescriptorType, LoadOp, StoreOp, TextureType};
use crate::rhi::types::{
    Blend, BlendOp, BufferUsage, CompareOp, CullMode, Format, ImageLayout, IndexFormat, PrimitiveTopology, ShaderStage,
    TextureUsage, VertexType,
};
use ash::vk;

pub fn format(format: Format) -> vk::Format {
    match format {
        Format::Unknown => vk::Format::UNDEFINED,
        Format::R32G32B32A32Float => vk::Format::R32G32B32A32_SFLOAT,
        Format::R32G32B32A32Uint => vk::Format::R32G32B32A32_UINT,
        Format::R32G32B32A32Sint => vk::Format::R32G32B32A32_SINT,
        Format::R32G32B32Float => vk::Format::R32G32B32_SFLOAT,
        Format::R32G32B32Uint => vk::Format::R32G32B32_UINT,
        Format::R32G32B32Sint => vk::Format::R32G32B32_SINT,
        Format::R16G16B16A16Float => vk::Format::R16G16B16A16_SFLOAT,
        Format::R16G16B16A16Unorm => vk::Format::R16G16B16A16_UNORM,
        Format::R16G16B16A16Uint => vk::Format::R16G16B16A16_UINT,
        Format::R16G16B16A16Snorm => vk::Format::R16G16B16A16_SNORM,
        Format::R16G16B16A16Sint => vk::Format::R16G16B16A16_SINT,
        Format::R16G16B16Float => vk::Format::R16G16B16_SFLOAT,
        Format::R32G32Float => vk::Format::R32G32_SFLOAT,
        Format::R32G32Uint => vk::Format::R32G32_UINT,
        Format::R32G32Sint => vk::Format::R32G32_SINT,
        Format::R32G8X24Typeless | Format::D32FloatS8X24Uint => vk::Format::D32_SFLOAT_S8_UINT,
        Format::R10G10B10A2Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        Format::R10G10B10A2Uint => vk::Format::A2B10G10R10_UINT_PACK32,
        Format::R11G11B10Float => vk::Format::B10G11R11_UFLOAT_PACK32,
        Format::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        Format::R8G8B8A8Uint => vk::Format::R8G8B8A8_UINT,
        Format::R8G8B8A8Snorm => vk::Format::R8G8B8A8_SNORM,
        Format::R8G8B8A8Sint => vk::Format::R8G8B8A8_SINT,
        Format::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        Format::R16G16Float => vk::Format::R16G16_SFLOAT,
        Format::R16G16Unorm => vk::Format::R16G16_UNORM,
        Format::R16G16Uint => vk::Format::R16G16_UINT,
        Format::R16G16Snorm => vk::Format::R16G16_SNORM,
        Format::R16G16Sint => vk::Format::R16G16_SINT,
        Format::R32Float => vk::Format::R32_SFLOAT,
        Format::R32Uint => vk::Format::R32_UINT,
        Format::R32Sint => vk::Format::R32_SINT,
        Format::R32Typeless | Format::D32Float => vk::Format::D32_SFLOAT,
        Format::R24G8Typeless | Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        Format::R16Typeless | Format::D16Unorm => vk::Format::D16_UNORM,
        Format::R8G8Unorm => vk::Format::R8G8_UNORM,
        Format::R8G8Uint => vk::Format::R8G8_UINT,
        Format::R8G8Snorm => vk::Format::R8G8_SNORM,
        Format::R8G8Sint => vk::Format::R8G8_SINT,
        Format::R16Float => vk::Format::R16_SFLOAT,
        Format::R16Unorm => vk::Format::R16_UNORM,
        Format::R16Uint => vk::Format::R16_UINT,
        Format::R16Snorm => vk::Format::R16_SNORM,
        Format::R16Sint => vk::Format::R16_SINT,
        Format::R8Unorm => vk::Format::R8_UNORM,
        Format::R8Uint => vk::Format::R8_UINT,
        Format::R8Snorm => vk::Format::R8_SNORM,
        Format::R8Sint => vk::Format::R8_SINT,
        Format::Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Format::Bc1UnormSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Format::Bc2Unorm => vk::Format::BC2_UNORM_BLOCK,
        Format::Bc2UnormSrgb => vk::Format::BC2_SRGB_BLOCK,
        Format::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        Format::Bc3UnormSrgb => vk::Format::BC3_SRGB_BLOCK,
        Format::Bc4Unorm => vk::Format::BC4_UNORM_BLOCK,
        Format::Bc4Snorm => vk::Format::BC4_SNORM_BLOCK,
        Format::Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
        Format::Bc5Snorm => vk::Format::BC5_SNORM_BLOCK,
        Format::Bc6hUf16 => vk::Format::BC6H_UFLOAT_BLOCK,
        Format::Bc6hSf16 => vk::Format::BC6H_SFLOAT_BLOCK,
        Format::Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
        Format::Bc7UnormSrgb => vk::Format::BC7_SRGB_BLOCK,
    }
}

/// RHI format of a swapchain surface format, if it has one
pub fn format_from_vk(format: vk::Format) -> Option<Format> {
    match format {
        vk::Format::B8G8R8A8_UNORM => Some(Format::B8G8R8A8Unorm),
        vk::Format::B8G8R8A8_SRGB => Some(Format::B8G8R8A8UnormSrgb),
        vk::Format::R8G8B8A8_UNORM => Some(Format::R8G8B8A8Unorm),
        vk::Format::R8G8B8A8_SRGB => Some(Format::R8G8B8A8UnormSrgb),
        vk::Format::A2B10G10R10_UNORM_PACK32 => Some(Format::R10G10B10A2Unorm),
        vk::Format::R16G16B16A16_SFLOAT => Some(Format::R16G16B16A16Float),
        _ => None,
    }
}

pub const fn image_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General | ImageLayout::UnorderedAccess => vk::ImageLayout::GENERAL,
        ImageLayout::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderResource | ImageLayout::ShaderResourceReadOnly => {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        }
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn pipeline_stage(stage: PipelineStage) -> vk::PipelineStageFlags {
    let mut flags = vk::PipelineStageFlags::empty();
    for (rhi, native) in [
        (PipelineStage::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (PipelineStage::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
        (PipelineStage::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
        (PipelineStage::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS),
        (PipelineStage::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags::LATE_FRAGMENT_TESTS),
        (PipelineStage::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStage::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
        (PipelineStage::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (PipelineStage::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    ] {
        if stage.contains(rhi) {
            flags |= native;
        }
    }
    flags
}

pub fn access(access: Access) -> vk::AccessFlags {
    let mut flags = vk::AccessFlags::empty();
    for (rhi, native) in [
        (Access::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (Access::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
        (Access::COLOR_ATTACHMENT_READ, vk::AccessFlags::COLOR_ATTACHMENT_READ),
        (Access::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
        (Access::DEPTH_STENCIL_READ, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ),
        (Access::DEPTH_STENCIL_WRITE, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (Access::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
        (Access::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
        (Access::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
        (Access::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
    ] {
        if access.contains(rhi) {
            flags |= native;
        }
    }
    flags
}

pub fn shader_stages(stage: ShaderStage) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    for (rhi, native) in [
        (ShaderStage::COMPUTE, vk::ShaderStageFlags::COMPUTE),
        (ShaderStage::VERTEX, vk::ShaderStageFlags::VERTEX),
        (ShaderStage::PIXEL, vk::ShaderStageFlags::FRAGMENT),
        (ShaderStage::HULL, vk::ShaderStageFlags::TESSELLATION_CONTROL),
        (ShaderStage::DOMAIN, vk::ShaderStageFlags::TESSELLATION_EVALUATION),
    ] {
        if stage.contains(rhi) {
            flags |= native;
        }
    }
    flags
}

pub fn buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    for (rhi, native) in [
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
    ] {
        if usage.contains(rhi) {
            flags |= native;
        }
    }
    flags
}

/// Image usage. Every texture can be a copy source and destination.
pub fn image_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    for (rhi, native) in [
        (TextureUsage::RTV, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (TextureUsage::UAV, vk::ImageUsageFlags::STORAGE),
        (TextureUsage::SRV, vk::ImageUsageFlags::SAMPLED),
        (TextureUsage::DSV, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
    ] {
        if usage.contains(rhi) {
            flags |= native;
        }
    }
    flags
}

pub const fn image_type(texture_type: TextureType) -> vk::ImageType {
    match texture_type {
        TextureType::Texture1D => vk::ImageType::TYPE_1D,
        TextureType::Texture2D | TextureType::Cube => vk::ImageType::TYPE_2D,
        TextureType::Texture3D => vk::ImageType::TYPE_3D,
    }
}

pub const fn view_type(texture_type: TextureType) -> vk::ImageViewType {
    match texture_type {
        TextureType::Texture1D => vk::ImageViewType::TYPE_1D,
        TextureType::Texture2D => vk::ImageViewType::TYPE_2D,
        TextureType::Texture3D => vk::ImageViewType::TYPE_3D,
        TextureType::Cube => vk::ImageViewType::CUBE,
    }
}

pub const fn sample_count(samples: u8) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

/// Aspect of a depth or color format
pub const fn aspect(format: Format) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::from_raw(vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw())
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub const fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub const fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub const fn index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::Index16 => vk::IndexType::UINT16,
        IndexFormat::Index32 => vk::IndexType::UINT32,
    }
}

pub const fn descriptor_type(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Storage => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::Uniform => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::Sampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub const fn blend_factor(blend: Blend) -> vk::BlendFactor {
    match blend {
        Blend::Zero => vk::BlendFactor::ZERO,
        Blend::One => vk::BlendFactor::ONE,
        Blend::SrcColor => vk::BlendFactor::SRC_COLOR,
        Blend::InvSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        Blend::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        Blend::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        Blend::DestAlpha => vk::BlendFactor::DST_ALPHA,
        Blend::InvDestAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        Blend::DestColor => vk::BlendFactor::DST_COLOR,
        Blend::InvDestColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        Blend::SrcAlphaSat => vk::BlendFactor::SRC_ALPHA_SATURATE,
        Blend::BlendFactor => vk::BlendFactor::CONSTANT_COLOR,
        Blend::InvBlendFactor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        Blend::Src1Color => vk::BlendFactor::SRC1_COLOR,
        Blend::InvSrc1Color => vk::BlendFactor::ONE_MINUS_SRC1_COLOR,
        Blend::Src1Alpha => vk::BlendFactor::SRC1_ALPHA,
        Blend::InvSrc1Alpha => vk::BlendFactor::ONE_MINUS_SRC1_ALPHA,
    }
}

pub const fn blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::RevSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub const fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub const fn compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub const fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

pub const fn vertex_format(input_type: VertexType) -> vk::Format {
    match input_type {
        VertexType::Float => vk::Format::R32_SFLOAT,
        VertexType::Float2 => vk::Format::R32G32_SFLOAT,
        VertexType::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexType::Float4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typeless_depth_maps_to_depth_format() {
        assert_eq!(format(Format::R32Typeless), vk::Format::D32_SFLOAT);
        assert_eq!(format(Format::R24G8Typeless), vk::Format::D24_UNORM_S8_UINT);
        assert_eq!(aspect(Format::D24UnormS8Uint), vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);
        assert_eq!(aspect(Format::R8G8B8A8Unorm), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_flag_sets_translate_bit_by_bit() {
        assert_eq!(
            pipeline_stage(PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS),
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        );
        assert_eq!(access(Access::empty()), vk::AccessFlags::empty());
        assert_eq!(
            image_usage(TextureUsage::SRV),
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST
        );
        assert_eq!(
            shader_stages(ShaderStage::VERTEX | ShaderStage::PIXEL),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_swapchain_formats_round_trip() {
        assert_eq!(format_from_vk(vk::Format::B8G8R8A8_SRGB), Some(Format::B8G8R8A8UnormSrgb));
        assert_eq!(format_from_vk(vk::Format::R32_SFLOAT), None);
    }
}
