//! Command recording and descriptor bindings

use super::{expect_valid, not_loaded, Device};
use crate::backend::{Backend, BufferTextureCopy, ClearValue, RenderPassBegin};
use crate::rhi::barrier::{layout_barrier, upload_transition, LayoutBarrier};
use crate::rhi::commands::{CommandList, Rect, Viewport};
use crate::rhi::error::RhiResult;
use crate::rhi::fbo_cache::{FboKey, RenderPassKey};
use crate::rhi::handles::{
    BufferHandle, DescriptorSetHandle, GraphicsPipelineHandle, RenderPassAttachment, RenderPassHandle,
    RenderTargetHandle, TextureHandle,
};
use crate::rhi::types::{ImageLayout, IndexFormat, ResourceView};

const CLEAR_COLOR: ClearValue = ClearValue::Color([0.0, 0.0, 0.0, 1.0]);
const CLEAR_DEPTH: ClearValue = ClearValue::DepthStencil { depth: 1.0, stencil: 0 };

impl<B: Backend> Device<B> {
    fn loaded_buffer(&self, handle: &BufferHandle) -> &B::Buffer {
        expect_valid(handle.id, "buffer");
        self.tables.buffers.get(handle.id).unwrap_or_else(|| not_loaded("buffer", handle.id))
    }

    fn loaded_texture(&self, handle: &TextureHandle) -> &B::Texture {
        expect_valid(handle.id, "texture");
        self.tables.textures.get(handle.id).unwrap_or_else(|| not_loaded("texture", handle.id))
    }

    fn loaded_graphics_pipeline(&self, handle: &GraphicsPipelineHandle) -> &B::GraphicsPipeline {
        expect_valid(handle.id, "graphics pipeline");
        self.tables
            .graphics_pipelines
            .get(handle.id)
            .unwrap_or_else(|| not_loaded("graphics pipeline", handle.id))
    }

    /// Descriptor replica a list reads: the owning swapchain's frame slot, 0 for transfer lists.
    /// Sets carry one replica per frame slot so no two in-flight frames share one.
    fn descriptor_instance(&self, cmd: &CommandList) -> usize {
        if cmd.transfer {
            return 0;
        }
        self.backbuffers
            .get(&cmd.backbuffer_id)
            .and_then(|id| self.swapchains.get(*id))
            .map_or(0, |swapchain| swapchain.context.current_frame())
    }

    /// Adapt a recipe to the queue family `cmd` records on
    fn barrier_for(&self, cmd: &CommandList, recipe: LayoutBarrier) -> LayoutBarrier {
        if cmd.transfer && self.families.transfer != self.families.graphics {
            recipe.for_transfer_family()
        } else {
            recipe
        }
    }

    // Descriptor bindings

    /// Bind a uniform buffer at `binding`. Every replica of the set is rewritten on next use.
    pub fn bind_buffer(&mut self, set: &DescriptorSetHandle, binding: usize, buffer: &BufferHandle) {
        expect_valid(set.id, "descriptor set");
        expect_valid(buffer.id, "buffer");
        let loaded = self
            .tables
            .descriptor_sets
            .get_mut(set.id)
            .unwrap_or_else(|| not_loaded("descriptor set", set.id));
        loaded.bindings.set_buffer(binding, buffer.id);
    }

    /// Bind a sampled texture at `binding`. Every replica of the set is rewritten on next use.
    pub fn bind_texture(&mut self, set: &DescriptorSetHandle, binding: usize, texture: &TextureHandle) {
        expect_valid(set.id, "descriptor set");
        expect_valid(texture.id, "texture");
        let loaded = self
            .tables
            .descriptor_sets
            .get_mut(set.id)
            .unwrap_or_else(|| not_loaded("descriptor set", set.id));
        loaded.bindings.set_texture(binding, texture.id);
    }

    // Render passes

    /// Begin the default backbuffer pass on the image acquired for the current frame
    pub fn begin_render_target_pass(&mut self, cmd: &CommandList, target: &RenderTargetHandle) -> RhiResult<()> {
        expect_valid(target.id, "render target");
        let raw = self.raw_command_buffer(cmd);
        let swapchain = self
            .backbuffers
            .get(&target.id)
            .and_then(|id| self.swapchains.get(*id))
            .unwrap_or_else(|| panic!("render target {} is not a loaded swapchain backbuffer", target.id));
        let image = swapchain.context.current_image();

        let loaded = self
            .tables
            .render_targets
            .get(target.id)
            .unwrap_or_else(|| not_loaded("render target", target.id));
        let view = self
            .backend
            .render_target_view(loaded, image)
            .unwrap_or_else(|| panic!("render target {} has no view for image {image}", target.id));
        let (width, height) = self.backend.render_target_extent(loaded);

        let render_pass = self.fbo_cache.get_render_pass(&self.backend, &RenderPassKey::backbuffer())?;
        let key = FboKey::new(render_pass, width, height).with_attachment(0, view);
        let framebuffer = self.fbo_cache.get_framebuffer(&self.backend, &key)?;

        self.backend.cmd_begin_render_pass(
            raw,
            &RenderPassBegin { render_pass, framebuffer, width, height, clear_values: &[CLEAR_COLOR] },
        );
        Ok(())
    }

    /// Begin an explicit render pass. The render area is the size of the first color
    /// attachment, or of the depth attachment when there is no color.
    pub fn begin_render_pass(&mut self, cmd: &CommandList, handle: &RenderPassHandle) -> RhiResult<()> {
        expect_valid(handle.id, "render pass");
        let raw = self.raw_command_buffer(cmd);
        let render_pass = self
            .tables
            .render_passes
            .get(handle.id)
            .unwrap_or_else(|| not_loaded("render pass", handle.id))
            .native;

        let attachment_texture = |attachment: &RenderPassAttachment| {
            attachment.texture.unwrap_or_else(|| panic!("render pass {} has an attachment without a texture", handle.id))
        };
        let extent_source = handle
            .color
            .first()
            .or(handle.depth_stencil.as_ref())
            .map(attachment_texture)
            .unwrap_or_else(|| panic!("render pass {} has no attachments", handle.id));
        let (width, height) = (extent_source.width, extent_source.height);

        let mut key = FboKey::new(render_pass, width, height);
        let mut clear_values = Vec::with_capacity(handle.color.len() + 1);
        for (index, attachment) in handle.color.iter().enumerate() {
            let texture = attachment_texture(attachment);
            let view = self
                .backend
                .texture_view(self.loaded_texture(&texture), ResourceView::Rtv)
                .unwrap_or_else(|| panic!("texture {} has no render target view", texture.id));
            key = key.with_attachment(index, view);
            clear_values.push(CLEAR_COLOR);
        }
        if let Some(attachment) = &handle.depth_stencil {
            let texture = attachment_texture(attachment);
            let view = self
                .backend
                .texture_view(self.loaded_texture(&texture), ResourceView::Dsv)
                .unwrap_or_else(|| panic!("texture {} has no depth-stencil view", texture.id));
            key = key.with_attachment(handle.color.len(), view);
            clear_values.push(CLEAR_DEPTH);
        }

        let framebuffer = self.fbo_cache.get_framebuffer(&self.backend, &key)?;
        self.backend.cmd_begin_render_pass(
            raw,
            &RenderPassBegin { render_pass, framebuffer, width, height, clear_values: &clear_values },
        );
        Ok(())
    }

    /// End the current render pass
    pub fn end_render_pass(&self, cmd: &CommandList) {
        self.backend.cmd_end_render_pass(self.raw_command_buffer(cmd));
    }

    // State

    /// Set viewports starting at index 0
    pub fn bind_viewports(&self, cmd: &CommandList, viewports: &[Viewport]) {
        self.backend.cmd_set_viewports(self.raw_command_buffer(cmd), viewports);
    }

    /// Set scissor rectangles starting at index 0
    pub fn bind_scissor_rects(&self, cmd: &CommandList, rects: &[Rect]) {
        self.backend.cmd_set_scissors(self.raw_command_buffer(cmd), rects);
    }

    /// Bind a vertex buffer at `slot`
    pub fn bind_vertex_buffer(&self, cmd: &CommandList, buffer: &BufferHandle, slot: u32) {
        let raw = self.raw_command_buffer(cmd);
        self.backend.cmd_bind_vertex_buffer(raw, slot, self.loaded_buffer(buffer));
    }

    /// Bind an index buffer
    pub fn bind_index_buffer(&self, cmd: &CommandList, buffer: &BufferHandle, offset: u64, format: IndexFormat) {
        let raw = self.raw_command_buffer(cmd);
        self.backend.cmd_bind_index_buffer(raw, self.loaded_buffer(buffer), offset, format);
    }

    /// Bind the frame's replica of `set` at set index `index`, rewriting it first if its
    /// bindings changed
    pub fn bind_descriptor_set(
        &mut self,
        cmd: &CommandList,
        pipeline: &GraphicsPipelineHandle,
        set: &DescriptorSetHandle,
        index: u32,
    ) {
        expect_valid(set.id, "descriptor set");
        expect_valid(pipeline.id, "graphics pipeline");
        let raw = self.raw_command_buffer(cmd);
        let instance = self.descriptor_instance(cmd);

        let tables = &mut self.tables;
        let native_pipeline = tables
            .graphics_pipelines
            .get(pipeline.id)
            .unwrap_or_else(|| not_loaded("graphics pipeline", pipeline.id));
        let loaded = tables
            .descriptor_sets
            .get_mut(set.id)
            .unwrap_or_else(|| not_loaded("descriptor set", set.id));
        let native_set = loaded.get_descriptor_set(&self.backend, instance, &tables.buffers, &tables.textures);

        self.backend.cmd_bind_descriptor_set(raw, native_pipeline, index, native_set, instance);
    }

    /// Bind a graphics pipeline
    pub fn bind_pipeline_state(&self, cmd: &CommandList, pipeline: &GraphicsPipelineHandle) {
        let raw = self.raw_command_buffer(cmd);
        self.backend.cmd_bind_graphics_pipeline(raw, self.loaded_graphics_pipeline(pipeline));
    }

    /// Indexed draw of one instance
    pub fn draw_indexed(&self, cmd: &CommandList, index_count: u32, first_index: u32, vertex_offset: i32) {
        self.backend.cmd_draw_indexed(self.raw_command_buffer(cmd), index_count, first_index, vertex_offset);
    }

    // Transfers

    /// Copy the whole of `src` into the start of `dst`
    pub fn copy_buffer(&self, cmd: &CommandList, src: &BufferHandle, dst: &BufferHandle) {
        assert!(
            src.size <= dst.size,
            "copy of {} bytes overflows buffer {} ({} bytes)",
            src.size,
            dst.id,
            dst.size
        );
        let raw = self.raw_command_buffer(cmd);
        self.backend.cmd_copy_buffer(raw, self.loaded_buffer(src), self.loaded_buffer(dst), src.size);
    }

    /// Upload `buffer` into every layer of `texture`, layer `i` starting at byte
    /// `i * layer_offset`.
    ///
    /// The texture moves `Undefined -> TransferDst -> ShaderResource` and the final layout is
    /// written back into `texture`. Any other starting layout is an unsupported transition.
    pub fn copy_buffer_to_texture(
        &self,
        cmd: &CommandList,
        buffer: &BufferHandle,
        texture: &mut TextureHandle,
        layer_offset: u64,
    ) -> RhiResult<()> {
        let to_transfer = self.barrier_for(cmd, upload_transition(texture.layout, ImageLayout::TransferDst)?);
        let to_shader = self.barrier_for(cmd, upload_transition(ImageLayout::TransferDst, ImageLayout::ShaderResource)?);

        let raw = self.raw_command_buffer(cmd);
        let src = self.loaded_buffer(buffer);
        let dst = self.loaded_texture(texture);

        let regions: Vec<BufferTextureCopy> = (0..texture.layer_count())
            .map(|layer| BufferTextureCopy {
                buffer_offset: u64::from(layer) * layer_offset,
                layer,
                width: texture.width,
                height: texture.height,
            })
            .collect();

        self.backend.cmd_texture_barrier(raw, dst, &to_transfer);
        self.backend.cmd_copy_buffer_to_texture(raw, src, dst, &regions);
        self.backend.cmd_texture_barrier(raw, dst, &to_shader);

        log::trace!("Recorded upload of {} layer(s) into texture {}", regions.len(), texture.id);
        texture.layout = ImageLayout::ShaderResource;
        Ok(())
    }

    /// Transition `texture` to `layout`, writing the new layout back into the handle
    pub fn barrier(&self, cmd: &CommandList, texture: &mut TextureHandle, layout: ImageLayout) -> RhiResult<()> {
        let recipe = self.barrier_for(cmd, layout_barrier(texture.layout, layout)?);
        let raw = self.raw_command_buffer(cmd);
        self.backend.cmd_texture_barrier(raw, self.loaded_texture(texture), &recipe);
        texture.layout = layout;
        Ok(())
    }
}
