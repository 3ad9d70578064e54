//! Render pass / framebuffer cache
//!
//! Deduplicates native render passes and framebuffers by structural key. Keys are fixed-size
//! plain data fed word by word to an [`FxHashMap`]; equality is field-wise, so two
//! semantically identical configurations always land on one native object.
//!
//! Every framebuffer holds a reference on its render pass. Teardown destroys framebuffers
//! before render passes. Besides whole-cache [`FboCache::reset`], entries can be evicted
//! when a view or render pass they depend on goes away, and render passes the cache created
//! can be evicted once nothing references them.

use crate::backend::{
    AttachmentDesc, AttachmentRef, Backend, ExternalDependency, FramebufferDesc, RawFramebuffer,
    RawImageView, RawRenderPass, RenderPassDesc,
};
use crate::rhi::barrier::{Access, PipelineStage};
use crate::rhi::error::RhiResult;
use crate::rhi::handles::{LoadOp, StoreOp};
use crate::rhi::types::{Format, ImageLayout};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};

bitflags! {
    /// Attachments a cached render pass clears on load
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        /// Clear the color attachment
        const COLOR = 1;
        /// Clear the depth attachment
        const DEPTH = 2;
    }
}

/// Structural key of a cached render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassKey {
    /// Color attachment layout after the pass
    pub final_color_layout: ImageLayout,
    /// Depth attachment layout after the pass
    pub final_depth_layout: ImageLayout,
    /// Color format, `Unknown` for no color attachment
    pub color_format: Format,
    /// Depth format, `Unknown` for no depth attachment
    pub depth_format: Format,
    /// Load-time clears
    pub clear: ClearFlags,
}

impl RenderPassKey {
    /// Key of the pass used for swapchain backbuffers and default pipelines
    pub const fn backbuffer() -> Self {
        Self {
            final_color_layout: ImageLayout::Present,
            final_depth_layout: ImageLayout::Undefined,
            color_format: Format::B8G8R8A8Unorm,
            depth_format: Format::Unknown,
            clear: ClearFlags::COLOR,
        }
    }

    /// Six-word encoding (the last word is padding) used for hashing
    pub fn to_words(&self) -> [u32; 6] {
        [
            self.final_color_layout as u32,
            self.final_depth_layout as u32,
            self.color_format as u32,
            self.depth_format as u32,
            self.clear.bits(),
            0,
        ]
    }

    fn has_color(&self) -> bool {
        self.color_format != Format::Unknown
    }

    fn has_depth(&self) -> bool {
        self.depth_format != Format::Unknown
    }

    /// Native description of the pass this key stands for
    pub fn describe(&self) -> RenderPassDesc {
        let mut desc = RenderPassDesc::default();
        let load = |flag| if self.clear.contains(flag) { LoadOp::Clear } else { LoadOp::DontCare };

        if self.has_color() {
            desc.color_refs.push(AttachmentRef {
                attachment: 0,
                layout: ImageLayout::RenderTarget,
            });
            desc.attachments.push(AttachmentDesc {
                format: self.color_format,
                samples: 1,
                load_op: load(ClearFlags::COLOR),
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: self.final_color_layout,
            });
        }

        if self.has_depth() {
            #[allow(clippy::cast_possible_truncation)]
            let attachment = desc.attachments.len() as u32;
            desc.depth_ref = Some(AttachmentRef { attachment, layout: ImageLayout::General });
            desc.attachments.push(AttachmentDesc {
                format: self.depth_format,
                samples: 1,
                load_op: load(ClearFlags::DEPTH),
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: self.final_depth_layout,
            });
        }

        desc.dependencies.push(ExternalDependency {
            src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            src_access: Access::empty(),
            dst_access: Access::COLOR_ATTACHMENT_READ | Access::COLOR_ATTACHMENT_WRITE,
        });
        desc
    }
}

impl Hash for RenderPassKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for word in self.to_words() {
            state.write_u32(word);
        }
    }
}

/// Maximum attachments of a framebuffer (8 color + 1 depth)
pub const MAX_FBO_ATTACHMENTS: usize = 9;

/// Structural key of a cached framebuffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FboKey {
    /// Render pass the framebuffer is compatible with
    pub render_pass: u64,
    /// Attachment views; unused slots are 0
    pub attachments: [u64; MAX_FBO_ATTACHMENTS],
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FboKey {
    /// Key for `render_pass` with no attachments yet
    pub fn new(render_pass: RawRenderPass, width: u32, height: u32) -> Self {
        Self {
            render_pass: render_pass.as_raw(),
            attachments: [0; MAX_FBO_ATTACHMENTS],
            width,
            height,
        }
    }

    /// Set attachment slot `index`
    pub fn with_attachment(mut self, index: usize, view: RawImageView) -> Self {
        self.attachments[index] = view.as_raw();
        self
    }

    fn views(&self) -> impl Iterator<Item = RawImageView> + '_ {
        self.attachments.iter().filter(|&&raw| raw != 0).map(|&raw| RawImageView(raw))
    }

    fn uses_view(&self, view: RawImageView) -> bool {
        self.attachments.contains(&view.as_raw())
    }
}

impl Hash for FboKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(bytemuck::bytes_of(self));
    }
}

/// Render pass / framebuffer cache
#[derive(Debug, Default)]
pub struct FboCache {
    render_passes: FxHashMap<RenderPassKey, RawRenderPass>,
    framebuffers: FxHashMap<FboKey, RawFramebuffer>,
    /// Framebuffers referencing each render pass (cached or explicit)
    ref_counts: FxHashMap<RawRenderPass, u32>,
}

impl FboCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached render pass for `key`, created on first use
    pub fn get_render_pass<B: Backend>(&mut self, backend: &B, key: &RenderPassKey) -> RhiResult<RawRenderPass> {
        if let Some(&render_pass) = self.render_passes.get(key) {
            return Ok(render_pass);
        }

        let render_pass = backend.create_render_pass(&key.describe())?;
        log::debug!(
            "Created cached render pass {:#x} (color {:?} -> {:?}, depth {:?} -> {:?}, clear {:?})",
            render_pass.as_raw(),
            key.color_format,
            key.final_color_layout,
            key.depth_format,
            key.final_depth_layout,
            key.clear
        );
        self.render_passes.insert(*key, render_pass);
        Ok(render_pass)
    }

    /// Cached framebuffer for `key`, created on first use
    pub fn get_framebuffer<B: Backend>(&mut self, backend: &B, key: &FboKey) -> RhiResult<RawFramebuffer> {
        if let Some(&framebuffer) = self.framebuffers.get(key) {
            return Ok(framebuffer);
        }

        let render_pass = RawRenderPass(key.render_pass);
        let desc = FramebufferDesc {
            render_pass,
            attachments: key.views().collect(),
            width: key.width,
            height: key.height,
            layers: 1,
        };
        let framebuffer = backend.create_framebuffer(&desc)?;
        log::debug!(
            "Created cached framebuffer {:#x} ({} attachment(s), {}x{})",
            framebuffer.as_raw(),
            desc.attachments.len(),
            key.width,
            key.height
        );

        self.framebuffers.insert(*key, framebuffer);
        *self.ref_counts.entry(render_pass).or_insert(0) += 1;
        Ok(framebuffer)
    }

    /// Framebuffers currently referencing `render_pass`
    pub fn ref_count(&self, render_pass: RawRenderPass) -> u32 {
        self.ref_counts.get(&render_pass).copied().unwrap_or(0)
    }

    /// Number of cached render passes
    pub fn render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    /// Number of cached framebuffers
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn evict_framebuffers_where(&mut self, mut predicate: impl FnMut(&FboKey) -> bool) -> Vec<RawFramebuffer> {
        let keys: Vec<FboKey> = self.framebuffers.keys().filter(|key| predicate(key)).copied().collect();
        let mut evicted = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(framebuffer) = self.framebuffers.remove(&key) {
                self.release_ref(RawRenderPass(key.render_pass));
                evicted.push(framebuffer);
            }
        }
        evicted
    }

    fn release_ref(&mut self, render_pass: RawRenderPass) {
        if let Some(count) = self.ref_counts.get_mut(&render_pass) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.ref_counts.remove(&render_pass);
            }
        }
    }

    /// Drop every framebuffer that uses `view`. The caller destroys the returned objects
    /// once the GPU no longer uses them.
    pub fn evict_view(&mut self, view: RawImageView) -> Vec<RawFramebuffer> {
        self.evict_framebuffers_where(|key| key.uses_view(view))
    }

    /// Drop every framebuffer built for `render_pass`.
    pub fn evict_render_pass_framebuffers(&mut self, render_pass: RawRenderPass) -> Vec<RawFramebuffer> {
        self.evict_framebuffers_where(|key| key.render_pass == render_pass.as_raw())
    }

    /// Remove cached render passes no framebuffer references. The caller destroys the
    /// returned objects once the GPU no longer uses them.
    pub fn evict_unreferenced_render_passes(&mut self) -> Vec<RawRenderPass> {
        let unreferenced: Vec<RenderPassKey> = self
            .render_passes
            .iter()
            .filter(|(_, render_pass)| !self.ref_counts.contains_key(render_pass))
            .map(|(key, _)| *key)
            .collect();

        unreferenced
            .into_iter()
            .filter_map(|key| self.render_passes.remove(&key))
            .collect()
    }

    /// Destroy everything: framebuffers first, then render passes. The device must be idle.
    pub fn reset<B: Backend>(&mut self, backend: &B) {
        let framebuffers = self.framebuffers.len();
        let render_passes = self.render_passes.len();

        for (key, framebuffer) in self.framebuffers.drain() {
            backend.destroy_framebuffer(framebuffer);
            if let Some(count) = self.ref_counts.get_mut(&RawRenderPass(key.render_pass)) {
                *count = count.saturating_sub(1);
            }
        }
        self.ref_counts.clear();

        for (_, render_pass) in self.render_passes.drain() {
            backend.destroy_render_pass(render_pass);
        }

        log::debug!("FBO cache reset: destroyed {framebuffers} framebuffer(s), {render_passes} render pass(es)");
    }
}
