//! Image layout transitions
//!
//! Backend-neutral barrier recipes. A recipe names the pipeline stages and memory accesses
//! on both sides of a layout change; backends translate them into their native barrier.
//!
//! Two tables exist. [`layout_barrier`] covers arbitrary `Device::barrier` requests: every
//! layout has a stage/access mapping, and only transitions *into* `Undefined` are refused.
//! [`upload_transition`] is the strict table used by buffer-to-texture copies and only knows
//! `Undefined -> TransferDst` and `TransferDst -> ShaderResource`.

use crate::rhi::error::{RhiError, RhiResult};
use crate::rhi::types::ImageLayout;
use bitflags::bitflags;

bitflags! {
    /// Pipeline stages a barrier waits on or blocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStage: u32 {
        /// Start of the pipeline
        const TOP_OF_PIPE = 1 << 0;
        /// Vertex shading
        const VERTEX_SHADER = 1 << 1;
        /// Fragment shading
        const FRAGMENT_SHADER = 1 << 2;
        /// Depth/stencil tests before shading
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        /// Depth/stencil tests after shading
        const LATE_FRAGMENT_TESTS = 1 << 4;
        /// Color attachment writes
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        /// Compute shading
        const COMPUTE_SHADER = 1 << 6;
        /// Copies
        const TRANSFER = 1 << 7;
        /// End of the pipeline
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

bitflags! {
    /// Memory accesses a barrier makes available or visible
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Access: u32 {
        /// Shader reads
        const SHADER_READ = 1 << 0;
        /// Shader writes
        const SHADER_WRITE = 1 << 1;
        /// Color attachment reads
        const COLOR_ATTACHMENT_READ = 1 << 2;
        /// Color attachment writes
        const COLOR_ATTACHMENT_WRITE = 1 << 3;
        /// Depth/stencil reads
        const DEPTH_STENCIL_READ = 1 << 4;
        /// Depth/stencil writes
        const DEPTH_STENCIL_WRITE = 1 << 5;
        /// Copy reads
        const TRANSFER_READ = 1 << 6;
        /// Copy writes
        const TRANSFER_WRITE = 1 << 7;
        /// Any read
        const MEMORY_READ = 1 << 8;
        /// Any write
        const MEMORY_WRITE = 1 << 9;
    }
}

/// Stage and access masks for one layout change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBarrier {
    /// Layout before the barrier
    pub old_layout: ImageLayout,
    /// Layout after the barrier
    pub new_layout: ImageLayout,
    /// Stages that must finish first
    pub src_stage: PipelineStage,
    /// Stages that wait
    pub dst_stage: PipelineStage,
    /// Writes made available
    pub src_access: Access,
    /// Accesses made visible
    pub dst_access: Access,
}

fn stage_for(layout: ImageLayout) -> PipelineStage {
    match layout {
        ImageLayout::Undefined | ImageLayout::General | ImageLayout::UnorderedAccess => {
            PipelineStage::TOP_OF_PIPE
        }
        ImageLayout::RenderTarget => PipelineStage::COLOR_ATTACHMENT_OUTPUT,
        ImageLayout::ShaderResource | ImageLayout::ShaderResourceReadOnly => {
            PipelineStage::FRAGMENT_SHADER
        }
        ImageLayout::DepthStencil | ImageLayout::DepthStencilReadOnly => {
            PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS
        }
        ImageLayout::TransferSrc | ImageLayout::TransferDst => PipelineStage::TRANSFER,
        ImageLayout::Present => PipelineStage::BOTTOM_OF_PIPE,
    }
}

fn access_for(layout: ImageLayout) -> Access {
    match layout {
        ImageLayout::Undefined | ImageLayout::Present => Access::empty(),
        ImageLayout::General => {
            Access::SHADER_READ
                | Access::SHADER_WRITE
                | Access::TRANSFER_READ
                | Access::TRANSFER_WRITE
                | Access::MEMORY_READ
                | Access::MEMORY_WRITE
        }
        ImageLayout::RenderTarget => Access::COLOR_ATTACHMENT_READ | Access::COLOR_ATTACHMENT_WRITE,
        ImageLayout::DepthStencil => Access::DEPTH_STENCIL_READ | Access::DEPTH_STENCIL_WRITE,
        ImageLayout::DepthStencilReadOnly => Access::DEPTH_STENCIL_READ,
        ImageLayout::ShaderResource | ImageLayout::ShaderResourceReadOnly => Access::SHADER_READ,
        ImageLayout::UnorderedAccess => Access::SHADER_READ | Access::SHADER_WRITE,
        ImageLayout::TransferSrc => Access::TRANSFER_READ,
        ImageLayout::TransferDst => Access::TRANSFER_WRITE,
    }
}

impl LayoutBarrier {
    /// The same transition restricted to what a copy-only queue family supports. Shader,
    /// attachment and compute stages become the pipeline ends and only copy and memory
    /// accesses remain.
    pub fn for_transfer_family(self) -> Self {
        let copy_stages = PipelineStage::TOP_OF_PIPE | PipelineStage::TRANSFER | PipelineStage::BOTTOM_OF_PIPE;
        let copy_access = Access::TRANSFER_READ | Access::TRANSFER_WRITE | Access::MEMORY_READ | Access::MEMORY_WRITE;
        let clamp = |stage: PipelineStage, end: PipelineStage| {
            let kept = stage & copy_stages;
            if kept.is_empty() {
                end
            } else {
                kept
            }
        };
        Self {
            src_stage: clamp(self.src_stage, PipelineStage::TOP_OF_PIPE),
            dst_stage: clamp(self.dst_stage, PipelineStage::BOTTOM_OF_PIPE),
            src_access: self.src_access & copy_access,
            dst_access: self.dst_access & copy_access,
            ..self
        }
    }
}

/// Barrier recipe for a general `from -> to` layout change.
pub fn layout_barrier(from: ImageLayout, to: ImageLayout) -> RhiResult<LayoutBarrier> {
    if to == ImageLayout::Undefined {
        return Err(RhiError::UnsupportedLayoutTransition { from, to });
    }
    Ok(LayoutBarrier {
        old_layout: from,
        new_layout: to,
        src_stage: stage_for(from),
        dst_stage: stage_for(to),
        src_access: access_for(from),
        dst_access: access_for(to),
    })
}

/// Barrier recipe for the two transitions surrounding a buffer-to-texture upload.
pub fn upload_transition(from: ImageLayout, to: ImageLayout) -> RhiResult<LayoutBarrier> {
    let (src_stage, dst_stage, src_access, dst_access) = match (from, to) {
        (ImageLayout::Undefined, ImageLayout::TransferDst) => (
            PipelineStage::TOP_OF_PIPE,
            PipelineStage::TRANSFER,
            Access::empty(),
            Access::TRANSFER_WRITE,
        ),
        (ImageLayout::TransferDst, ImageLayout::ShaderResource) => (
            PipelineStage::TRANSFER,
            PipelineStage::FRAGMENT_SHADER,
            Access::TRANSFER_WRITE,
            Access::SHADER_READ,
        ),
        _ => return Err(RhiError::UnsupportedLayoutTransition { from, to }),
    };
    Ok(LayoutBarrier { old_layout: from, new_layout: to, src_stage, dst_stage, src_access, dst_access })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_pairs_are_supported() {
        let to_dst = upload_transition(ImageLayout::Undefined, ImageLayout::TransferDst).unwrap();
        assert_eq!(to_dst.dst_access, Access::TRANSFER_WRITE);
        assert_eq!(to_dst.src_stage, PipelineStage::TOP_OF_PIPE);

        let to_read = upload_transition(ImageLayout::TransferDst, ImageLayout::ShaderResource).unwrap();
        assert_eq!(to_read.dst_stage, PipelineStage::FRAGMENT_SHADER);
    }

    #[test]
    fn test_upload_table_rejects_other_pairs() {
        let err = upload_transition(ImageLayout::General, ImageLayout::RenderTarget).unwrap_err();
        assert!(matches!(
            err,
            RhiError::UnsupportedLayoutTransition { from: ImageLayout::General, to: ImageLayout::RenderTarget }
        ));
    }

    #[test]
    fn test_general_barrier_masks() {
        let barrier = layout_barrier(ImageLayout::RenderTarget, ImageLayout::ShaderResource).unwrap();
        assert_eq!(barrier.src_stage, PipelineStage::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barrier.dst_access, Access::SHADER_READ);

        let depth = layout_barrier(ImageLayout::Undefined, ImageLayout::DepthStencil).unwrap();
        assert!(depth.dst_stage.contains(PipelineStage::EARLY_FRAGMENT_TESTS));
    }

    #[test]
    fn test_transfer_family_drops_graphics_stages() {
        let upload = upload_transition(ImageLayout::TransferDst, ImageLayout::ShaderResource)
            .unwrap()
            .for_transfer_family();
        assert_eq!(upload.src_stage, PipelineStage::TRANSFER);
        assert_eq!(upload.dst_stage, PipelineStage::BOTTOM_OF_PIPE);
        assert_eq!(upload.src_access, Access::TRANSFER_WRITE);
        assert_eq!(upload.dst_access, Access::empty());
        assert_eq!(upload.new_layout, ImageLayout::ShaderResource);

        let from_target = layout_barrier(ImageLayout::RenderTarget, ImageLayout::TransferSrc)
            .unwrap()
            .for_transfer_family();
        assert_eq!(from_target.src_stage, PipelineStage::TOP_OF_PIPE);
        assert_eq!(from_target.dst_stage, PipelineStage::TRANSFER);
        assert_eq!(from_target.src_access, Access::empty());
    }

    #[test]
    fn test_transition_into_undefined_is_rejected() {
        assert!(layout_barrier(ImageLayout::ShaderResource, ImageLayout::Undefined).is_err());
    }
}
