//! Resource lifecycle: `load_*`, `unload_*`, `has_*`

use super::{expect_valid, not_loaded, Device, LoadedSwapchain};
use crate::backend::{AttachmentDesc, AttachmentRef, Backend, RenderPassDesc};
use crate::foundation::collections::IdArena;
use crate::foundation::id::HandleId;
use crate::rhi::descriptor_set::DescriptorSet;
use crate::rhi::error::RhiResult;
use crate::rhi::fbo_cache::RenderPassKey;
use crate::rhi::handles::{
    BufferHandle, ComputePipelineHandle, DescriptorSetHandle, GraphicsPipelineHandle, LoadOp, RenderPassAttachment,
    RenderPassHandle, RenderTargetHandle, StoreOp, SwapchainHandle, TextureHandle,
};
use crate::rhi::resources::{LoadedRenderPass, Retired};
use crate::rhi::swapchain::SwapchainContext;
use crate::rhi::types::{ImageLayout, ResourceView};

fn insert_unique<T>(table: &mut IdArena<T>, id: HandleId, value: T, kind: &str) {
    expect_valid(id, kind);
    if table.insert(id, value).is_err() {
        panic!("{kind} {id} is already loaded");
    }
}

fn take_loaded<T>(table: &mut IdArena<T>, id: HandleId, kind: &str) -> T {
    expect_valid(id, kind);
    table.remove(id).unwrap_or_else(|| not_loaded(kind, id))
}

impl<B: Backend> Device<B> {
    // Swapchains

    /// Create the swapchain, its backbuffer render target and its frame state
    pub fn load_swapchain(&mut self, handle: &SwapchainHandle) -> RhiResult<()> {
        expect_valid(handle.id, "swapchain");
        expect_valid(handle.backbuffer.id, "backbuffer render target");
        assert!(!self.swapchains.contains(handle.id), "swapchain {} is already loaded", handle.id);

        let native = self.backend.create_swapchain(&handle.window, self.image_count)?;
        let backbuffer = self.backend.create_backbuffer(&native)?;
        let context = SwapchainContext::new(
            &self.backend,
            &native,
            self.config.backbuffer_count,
            self.config.max_command_lists,
        )?;

        insert_unique(&mut self.tables.render_targets, handle.backbuffer.id, backbuffer, "render target");
        self.backbuffers.insert(handle.backbuffer.id, handle.id);
        insert_unique(
            &mut self.swapchains,
            handle.id,
            LoadedSwapchain { native, context, handle: *handle },
            "swapchain",
        );

        log::info!(
            "Loaded swapchain {} ({}x{}, {} image(s))",
            handle.id,
            handle.window.width,
            handle.window.height,
            self.image_count
        );
        Ok(())
    }

    /// Destroy the swapchain and its backbuffer render target. Waits for the device to go idle.
    pub fn unload_swapchain(&mut self, handle: &SwapchainHandle) -> RhiResult<()> {
        assert!(self.has_swapchain(handle), "swapchain {} is not loaded", handle.id);
        self.backend.device_wait_idle()?;

        let swapchain = take_loaded(&mut self.swapchains, handle.id, "swapchain");
        swapchain.context.destroy(&self.backend);

        let backbuffer_id = swapchain.handle.backbuffer.id;
        self.backbuffers.remove(&backbuffer_id);
        if let Some(target) = self.tables.render_targets.remove(backbuffer_id) {
            let views = self.backend.render_target_views(&target);
            for framebuffer in self.evict_views(&views) {
                self.backend.destroy_framebuffer(framebuffer);
            }
            drop(target);
        }
        if self.current_swapchain == Some(handle.id) {
            self.current_swapchain = None;
        }
        drop(swapchain.native);

        log::info!("Unloaded swapchain {}", handle.id);
        Ok(())
    }

    /// Whether the swapchain is loaded
    pub fn has_swapchain(&self, handle: &SwapchainHandle) -> bool {
        expect_valid(handle.id, "swapchain");
        self.swapchains.contains(handle.id)
    }

    // Render targets

    /// Create an offscreen render target. Backbuffers are loaded with their swapchain.
    pub fn load_render_target(&mut self, handle: &RenderTargetHandle) -> RhiResult<()> {
        expect_valid(handle.id, "render target");
        assert!(handle.offscreen, "backbuffer render target {} is loaded with its swapchain", handle.id);
        assert!(!self.tables.render_targets.contains(handle.id), "render target {} is already loaded", handle.id);

        let target = self.backend.create_offscreen_render_target()?;
        insert_unique(&mut self.tables.render_targets, handle.id, target, "render target");
        log::debug!("Loaded render target {}", handle.id);
        Ok(())
    }

    /// Unload an offscreen render target
    pub fn unload_render_target(&mut self, handle: &RenderTargetHandle) {
        assert!(
            !self.backbuffers.contains_key(&handle.id),
            "render target {} is a swapchain backbuffer; unload the swapchain instead",
            handle.id
        );
        let target = take_loaded(&mut self.tables.render_targets, handle.id, "render target");
        let views = self.backend.render_target_views(&target);
        let framebuffers = self.evict_views(&views);
        self.retire_framebuffers(framebuffers);
        self.retire(Retired::RenderTarget(target));
    }

    /// Whether the render target is loaded
    pub fn has_render_target(&self, handle: &RenderTargetHandle) -> bool {
        expect_valid(handle.id, "render target");
        self.tables.render_targets.contains(handle.id)
    }

    // Buffers

    /// Create a buffer
    pub fn load_buffer(&mut self, handle: &BufferHandle) -> RhiResult<()> {
        expect_valid(handle.id, "buffer");
        assert!(!self.tables.buffers.contains(handle.id), "buffer {} is already loaded", handle.id);

        let buffer = self.backend.create_buffer(handle)?;
        insert_unique(&mut self.tables.buffers, handle.id, buffer, "buffer");
        log::debug!("Loaded buffer {} ({} bytes, {:?})", handle.id, handle.size, handle.usage);
        Ok(())
    }

    /// Unload a buffer
    pub fn unload_buffer(&mut self, handle: &BufferHandle) {
        let buffer = take_loaded(&mut self.tables.buffers, handle.id, "buffer");
        self.retire(Retired::Buffer(buffer));
    }

    /// Whether the buffer is loaded
    pub fn has_buffer(&self, handle: &BufferHandle) -> bool {
        expect_valid(handle.id, "buffer");
        self.tables.buffers.contains(handle.id)
    }

    // Textures

    /// Create a texture with one view per usage flag
    pub fn load_texture(&mut self, handle: &TextureHandle) -> RhiResult<()> {
        expect_valid(handle.id, "texture");
        assert!(!self.tables.textures.contains(handle.id), "texture {} is already loaded", handle.id);

        let texture = self.backend.create_texture(handle)?;
        insert_unique(&mut self.tables.textures, handle.id, texture, "texture");
        log::debug!(
            "Loaded texture {} ({}x{} {:?}, usage {:?})",
            handle.id,
            handle.width,
            handle.height,
            handle.format,
            handle.usage
        );
        Ok(())
    }

    /// Unload a texture, evicting cached framebuffers built on its views
    pub fn unload_texture(&mut self, handle: &TextureHandle) {
        let texture = take_loaded(&mut self.tables.textures, handle.id, "texture");
        let views = self.texture_views(&texture);
        let framebuffers = self.evict_views(&views);
        self.retire_framebuffers(framebuffers);
        self.retire(Retired::Texture(texture));
    }

    /// Whether the texture is loaded
    pub fn has_texture(&self, handle: &TextureHandle) -> bool {
        expect_valid(handle.id, "texture");
        self.tables.textures.contains(handle.id)
    }

    /// Recreate a loaded texture at a new size.
    ///
    /// The new dimensions and the `Undefined` layout of the fresh image are written back into
    /// `handle`. Framebuffers built on the old views are evicted and descriptor sets sampling
    /// the texture are rewritten on next use.
    pub fn resize_texture(&mut self, handle: &mut TextureHandle, width: u32, height: u32) -> RhiResult<()> {
        expect_valid(handle.id, "texture");
        assert!(self.tables.textures.contains(handle.id), "texture {} is not loaded", handle.id);

        let mut resized = *handle;
        resized.width = width;
        resized.height = height;
        resized.size = u64::from(width) * u64::from(height) * u64::from(resized.format.bytes_per_block());
        resized.layout = ImageLayout::Undefined;

        let texture = self.backend.create_texture(&resized)?;
        let old = match self.tables.textures.get_mut(handle.id) {
            Some(slot) => std::mem::replace(slot, texture),
            None => not_loaded("texture", handle.id),
        };

        let views = self.texture_views(&old);
        let framebuffers = self.evict_views(&views);
        self.retire_framebuffers(framebuffers);
        self.retire(Retired::Texture(old));

        for set in self.tables.descriptor_sets.values_mut() {
            if set.bindings.references_texture(handle.id) {
                set.bindings.invalidate();
            }
        }

        log::debug!(
            "Resized texture {} from {}x{} to {width}x{height}",
            handle.id,
            handle.width,
            handle.height
        );
        *handle = resized;
        Ok(())
    }

    // Pipelines

    /// Create a compute pipeline
    pub fn load_compute_pipeline(&mut self, handle: &ComputePipelineHandle) -> RhiResult<()> {
        expect_valid(handle.id, "compute pipeline");
        assert!(
            !self.tables.compute_pipelines.contains(handle.id),
            "compute pipeline {} is already loaded",
            handle.id
        );

        let pipeline = self.backend.create_compute_pipeline(handle)?;
        insert_unique(&mut self.tables.compute_pipelines, handle.id, pipeline, "compute pipeline");
        log::debug!("Loaded compute pipeline {}", handle.id);
        Ok(())
    }

    /// Unload a compute pipeline
    pub fn unload_compute_pipeline(&mut self, handle: &ComputePipelineHandle) {
        let pipeline = take_loaded(&mut self.tables.compute_pipelines, handle.id, "compute pipeline");
        self.retire(Retired::ComputePipeline(pipeline));
    }

    /// Whether the compute pipeline is loaded
    pub fn has_compute_pipeline(&self, handle: &ComputePipelineHandle) -> bool {
        expect_valid(handle.id, "compute pipeline");
        self.tables.compute_pipelines.contains(handle.id)
    }

    /// Create a graphics pipeline against the handle's render pass, or the cached backbuffer
    /// pass when it has none
    pub fn load_graphics_pipeline(&mut self, handle: &GraphicsPipelineHandle) -> RhiResult<()> {
        expect_valid(handle.id, "graphics pipeline");
        assert!(
            !self.tables.graphics_pipelines.contains(handle.id),
            "graphics pipeline {} is already loaded",
            handle.id
        );

        let render_pass = match &handle.render_pass {
            Some(render_pass) => {
                self.tables
                    .render_passes
                    .get(render_pass.id)
                    .unwrap_or_else(|| not_loaded("render pass", render_pass.id))
                    .native
            }
            None => self.fbo_cache.get_render_pass(&self.backend, &RenderPassKey::backbuffer())?,
        };

        let pipeline = self.backend.create_graphics_pipeline(handle, render_pass)?;
        insert_unique(&mut self.tables.graphics_pipelines, handle.id, pipeline, "graphics pipeline");
        log::debug!("Loaded graphics pipeline {} ({:?})", handle.id, handle.topology);
        Ok(())
    }

    /// Unload a graphics pipeline
    pub fn unload_graphics_pipeline(&mut self, handle: &GraphicsPipelineHandle) {
        let pipeline = take_loaded(&mut self.tables.graphics_pipelines, handle.id, "graphics pipeline");
        self.retire(Retired::GraphicsPipeline(pipeline));
    }

    /// Whether the graphics pipeline is loaded
    pub fn has_graphics_pipeline(&self, handle: &GraphicsPipelineHandle) -> bool {
        expect_valid(handle.id, "graphics pipeline");
        self.tables.graphics_pipelines.contains(handle.id)
    }

    // Descriptor sets

    /// Create a descriptor set with one replica per frame slot
    pub fn load_descriptor_set(&mut self, handle: &DescriptorSetHandle) -> RhiResult<()> {
        expect_valid(handle.id, "descriptor set");
        assert!(
            !self.tables.descriptor_sets.contains(handle.id),
            "descriptor set {} is already loaded",
            handle.id
        );

        let set = DescriptorSet::new(&self.backend, handle, self.config.backbuffer_count)?;
        insert_unique(&mut self.tables.descriptor_sets, handle.id, set, "descriptor set");
        log::debug!("Loaded descriptor set {} ({} descriptor(s))", handle.id, handle.descriptors.len());
        Ok(())
    }

    /// Unload a descriptor set
    pub fn unload_descriptor_set(&mut self, handle: &DescriptorSetHandle) {
        let set = take_loaded(&mut self.tables.descriptor_sets, handle.id, "descriptor set");
        self.retire(Retired::DescriptorSet(set));
    }

    /// Whether the descriptor set is loaded
    pub fn has_descriptor_set(&self, handle: &DescriptorSetHandle) -> bool {
        expect_valid(handle.id, "descriptor set");
        self.tables.descriptor_sets.contains(handle.id)
    }

    // Render passes

    fn attachment_desc(attachment: &RenderPassAttachment, texture: &TextureHandle, stencil: bool) -> AttachmentDesc {
        let (stencil_load_op, stencil_store_op) =
            if stencil { (attachment.load_op, attachment.store_op) } else { (LoadOp::DontCare, StoreOp::DontCare) };
        AttachmentDesc {
            format: texture.format,
            samples: texture.sample_count,
            load_op: attachment.load_op,
            store_op: attachment.store_op,
            stencil_load_op,
            stencil_store_op,
            initial_layout: attachment.initial_layout,
            final_layout: attachment.final_layout,
        }
    }

    fn attachment_texture<'a>(&self, attachment: &'a RenderPassAttachment, view: ResourceView) -> &'a TextureHandle {
        let texture = attachment.texture.as_ref().unwrap_or_else(|| panic!("render pass attachment has no texture"));
        let loaded = self.tables.textures.get(texture.id).unwrap_or_else(|| not_loaded("texture", texture.id));
        assert!(
            self.backend.texture_view(loaded, view).is_some(),
            "texture {} has no {view:?} view",
            texture.id
        );
        texture
    }

    /// Build an explicit single-subpass render pass: color attachments in order, then the
    /// optional depth-stencil attachment
    pub fn load_render_pass(&mut self, handle: &RenderPassHandle) -> RhiResult<()> {
        expect_valid(handle.id, "render pass");
        assert!(!self.tables.render_passes.contains(handle.id), "render pass {} is already loaded", handle.id);
        assert!(
            handle.color.len() <= RenderPassHandle::MAX_COLOR_ATTACHMENTS,
            "render pass {} has more than {} color attachments",
            handle.id,
            RenderPassHandle::MAX_COLOR_ATTACHMENTS
        );

        let mut desc = RenderPassDesc::default();
        for attachment in &handle.color {
            let texture = self.attachment_texture(attachment, ResourceView::Rtv);
            #[allow(clippy::cast_possible_truncation)]
            let index = desc.attachments.len() as u32;
            desc.color_refs.push(AttachmentRef { attachment: index, layout: ImageLayout::RenderTarget });
            desc.attachments.push(Self::attachment_desc(attachment, texture, false));
        }

        if let Some(attachment) = &handle.depth_stencil {
            let texture = self.attachment_texture(attachment, ResourceView::Dsv);
            let layout = if attachment.initial_layout == ImageLayout::DepthStencilReadOnly {
                ImageLayout::DepthStencilReadOnly
            } else {
                ImageLayout::DepthStencil
            };
            #[allow(clippy::cast_possible_truncation)]
            let index = desc.attachments.len() as u32;
            desc.depth_ref = Some(AttachmentRef { attachment: index, layout });
            desc.attachments.push(Self::attachment_desc(attachment, texture, texture.format.has_stencil()));
        }

        let native = self.backend.create_render_pass(&desc)?;
        insert_unique(&mut self.tables.render_passes, handle.id, LoadedRenderPass { native }, "render pass");
        log::debug!(
            "Loaded render pass {} ({} color, depth: {})",
            handle.id,
            handle.color.len(),
            handle.depth_stencil.is_some()
        );
        Ok(())
    }

    /// Unload an explicit render pass and the cached framebuffers built for it
    pub fn unload_render_pass(&mut self, handle: &RenderPassHandle) {
        let render_pass = take_loaded(&mut self.tables.render_passes, handle.id, "render pass");
        let framebuffers = self.fbo_cache.evict_render_pass_framebuffers(render_pass.native);
        self.retire_framebuffers(framebuffers);
        self.retire(Retired::RenderPass(render_pass.native));
    }

    /// Whether the render pass is loaded
    pub fn has_render_pass(&self, handle: &RenderPassHandle) -> bool {
        expect_valid(handle.id, "render pass");
        self.tables.render_passes.contains(handle.id)
    }
}
