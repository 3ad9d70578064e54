//! Vulkan backend
//!
//! Built on `ash`. Long-lived resources are RAII objects holding an `Arc` to the shared
//! [`VulkanContext`]; raw objects (render passes, framebuffers, pools, command buffers,
//! semaphores, fences) travel through the RHI as their 64-bit Vulkan handle values.

mod context;
mod convert;
mod pipeline;
mod resources;
mod swapchain;

pub use context::VulkanContext;
pub use resources::{VulkanBuffer, VulkanDescriptorSet, VulkanPipeline, VulkanRenderTarget, VulkanTexture};
pub use swapchain::VulkanSwapchain;

use crate::backend::{
    Backend, BoundResource, BufferTextureCopy, ClearValue, DebugObject, DescriptorWrite, FramebufferDesc,
    RawCommandBuffer, RawCommandPool, RawFence, RawFramebuffer, RawImageView, RawRenderPass, RawSemaphore,
    RenderPassBegin, RenderPassDesc, SubmitInfo,
};
use crate::config::DeviceConfig;
use crate::rhi::adapter::{AdapterInfo, QueueFamilies};
use crate::rhi::barrier::{LayoutBarrier, PipelineStage};
use crate::rhi::commands::{QueueType, Rect, Viewport};
use crate::rhi::error::{RhiError, RhiResult};
use crate::rhi::handles::{
    BufferHandle, ComputePipelineHandle, DescriptorSetHandle, GraphicsPipelineHandle, TextureHandle, WindowHandle,
};
use crate::rhi::types::{ImageLayout, IndexFormat, ResourceView};
use ash::vk;
use ash::vk::Handle;
use raw_window_handle::RawDisplayHandle;
use std::sync::Arc;

fn raw<T: Handle>(handle: T) -> u64 {
    handle.as_raw()
}

fn native<T: Handle>(raw: u64) -> T {
    T::from_raw(raw)
}

/// Parallel semaphore and stage arrays for `vkQueueSubmit`
fn wait_lists(wait: Option<(RawSemaphore, PipelineStage)>) -> (Vec<vk::Semaphore>, Vec<vk::PipelineStageFlags>) {
    wait.iter()
        .map(|&(semaphore, stage)| (native::<vk::Semaphore>(semaphore.as_raw()), convert::pipeline_stage(stage)))
        .unzip()
}

#[allow(clippy::cast_precision_loss)]
fn viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x as f32,
        y: viewport.y as f32,
        width: viewport.width as f32,
        height: viewport.height as f32,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

#[allow(clippy::cast_possible_wrap)]
fn rect(rect: &Rect) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x as i32, y: rect.y as i32 },
        extent: vk::Extent2D { width: rect.width, height: rect.height },
    }
}

fn clear_value(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(color) => vk::ClearValue { color: vk::ClearColorValue { float32: color } },
        ClearValue::DepthStencil { depth, stencil } => {
            vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth, stencil } }
        }
    }
}

/// Vulkan implementation of [`Backend`]
pub struct VulkanBackend {
    context: Arc<VulkanContext>,
}

impl VulkanBackend {
    /// Create the instance and logical device.
    ///
    /// Pass the display handle of the windows that will be presented to; `None` creates a
    /// device that can render offscreen only.
    pub fn new(config: &DeviceConfig, display: Option<RawDisplayHandle>) -> RhiResult<Self> {
        Ok(Self { context: Arc::new(VulkanContext::new(config, display)?) })
    }

    /// Shared instance and device state
    pub fn context(&self) -> &Arc<VulkanContext> {
        &self.context
    }

    fn device(&self) -> &ash::Device {
        &self.context.device
    }
}

impl Backend for VulkanBackend {
    type Buffer = VulkanBuffer;
    type Texture = VulkanTexture;
    type RenderTarget = VulkanRenderTarget;
    type Swapchain = VulkanSwapchain;
    type DescriptorSet = VulkanDescriptorSet;
    type ComputePipeline = VulkanPipeline;
    type GraphicsPipeline = VulkanPipeline;

    fn adapter_info(&self) -> AdapterInfo {
        self.context.adapter.clone()
    }

    fn queue_families(&self) -> QueueFamilies {
        self.context.families
    }

    fn create_buffer(&self, desc: &BufferHandle) -> RhiResult<VulkanBuffer> {
        VulkanBuffer::new(&self.context, desc)
    }

    fn map_buffer(&self, buffer: &mut VulkanBuffer) -> RhiResult<()> {
        buffer.map()
    }

    fn unmap_buffer(&self, buffer: &mut VulkanBuffer) {
        buffer.unmap();
    }

    fn create_texture(&self, desc: &TextureHandle) -> RhiResult<VulkanTexture> {
        VulkanTexture::new(&self.context, desc)
    }

    fn texture_view(&self, texture: &VulkanTexture, view: ResourceView) -> Option<RawImageView> {
        texture.view(view).map(|view| RawImageView(raw(view)))
    }

    fn create_offscreen_render_target(&self) -> RhiResult<VulkanRenderTarget> {
        Ok(VulkanRenderTarget::offscreen(&self.context))
    }

    fn create_backbuffer(&self, swapchain: &VulkanSwapchain) -> RhiResult<VulkanRenderTarget> {
        VulkanRenderTarget::over_images(&self.context, &swapchain.images, swapchain.format, swapchain.extent)
    }

    fn render_target_view(&self, target: &VulkanRenderTarget, image_index: u32) -> Option<RawImageView> {
        target.views.get(image_index as usize).map(|&view| RawImageView(raw(view)))
    }

    fn render_target_views(&self, target: &VulkanRenderTarget) -> Vec<RawImageView> {
        target.raw_views()
    }

    fn render_target_extent(&self, target: &VulkanRenderTarget) -> (u32, u32) {
        (target.extent.width, target.extent.height)
    }

    fn create_swapchain(&self, window: &WindowHandle, image_count: u32) -> RhiResult<VulkanSwapchain> {
        VulkanSwapchain::new(&self.context, window, image_count)
    }

    fn recreate_swapchain(&self, swapchain: &mut VulkanSwapchain, window: &WindowHandle) -> RhiResult<()> {
        swapchain.build(window)
    }

    fn present_family(&self, swapchain: &VulkanSwapchain) -> u32 {
        swapchain.present_family
    }

    fn create_descriptor_set(&self, desc: &DescriptorSetHandle, instances: usize) -> RhiResult<VulkanDescriptorSet> {
        VulkanDescriptorSet::new(&self.context, desc, instances)
    }

    fn update_descriptor_set(
        &self,
        set: &mut VulkanDescriptorSet,
        instance: usize,
        writes: &[DescriptorWrite<'_, Self>],
    ) {
        enum Info {
            Buffer(vk::DescriptorBufferInfo, vk::DescriptorType),
            Image(vk::DescriptorImageInfo),
        }

        let Some(&dst_set) = set.sets.get(instance) else {
            return;
        };

        let infos: Vec<(u32, Info)> = writes
            .iter()
            .map(|write| {
                let info = match write.resource {
                    BoundResource::UniformBuffer(buffer) => {
                        let ty = match set.binding_type(write.binding) {
                            Some(vk::DescriptorType::STORAGE_BUFFER) => vk::DescriptorType::STORAGE_BUFFER,
                            _ => vk::DescriptorType::UNIFORM_BUFFER,
                        };
                        Info::Buffer(
                            vk::DescriptorBufferInfo { buffer: buffer.buffer, offset: 0, range: vk::WHOLE_SIZE },
                            ty,
                        )
                    }
                    BoundResource::CombinedImageSampler(texture) => Info::Image(vk::DescriptorImageInfo {
                        sampler: texture.sampler,
                        image_view: texture.view(ResourceView::Srv).unwrap_or_default(),
                        image_layout: convert::image_layout(ImageLayout::ShaderResource),
                    }),
                };
                (write.binding, info)
            })
            .collect();

        let native_writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .map(|(binding, info)| {
                let write = vk::WriteDescriptorSet::builder().dst_set(dst_set).dst_binding(*binding).dst_array_element(0);
                match info {
                    Info::Buffer(buffer, ty) => {
                        write.descriptor_type(*ty).buffer_info(std::slice::from_ref(buffer)).build()
                    }
                    Info::Image(image) => write
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(image))
                        .build(),
                }
            })
            .collect();

        unsafe { self.device().update_descriptor_sets(&native_writes, &[]) };
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineHandle) -> RhiResult<VulkanPipeline> {
        pipeline::create_compute(&self.context, desc)
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineHandle,
        render_pass: RawRenderPass,
    ) -> RhiResult<VulkanPipeline> {
        pipeline::create_graphics(&self.context, desc, native(render_pass.as_raw()))
    }

    fn set_debug_name(&self, object: DebugObject<'_, Self>, name: &str) {
        let (object_type, handle) = match object {
            DebugObject::Buffer(buffer) => (vk::ObjectType::BUFFER, raw(buffer.buffer)),
            DebugObject::Image(texture) => (vk::ObjectType::IMAGE, raw(texture.image)),
            DebugObject::Sampler(texture) => (vk::ObjectType::SAMPLER, raw(texture.sampler)),
            DebugObject::View(view) => (vk::ObjectType::IMAGE_VIEW, view.as_raw()),
            DebugObject::RenderPass(render_pass) => (vk::ObjectType::RENDER_PASS, render_pass.as_raw()),
        };
        self.context.set_object_name(object_type, handle, name);
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RhiResult<RawRenderPass> {
        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments
            .iter()
            .map(|attachment| {
                vk::AttachmentDescription::builder()
                    .format(convert::format(attachment.format))
                    .samples(convert::sample_count(attachment.samples))
                    .load_op(convert::load_op(attachment.load_op))
                    .store_op(convert::store_op(attachment.store_op))
                    .stencil_load_op(convert::load_op(attachment.stencil_load_op))
                    .stencil_store_op(convert::store_op(attachment.stencil_store_op))
                    .initial_layout(convert::image_layout(attachment.initial_layout))
                    .final_layout(convert::image_layout(attachment.final_layout))
                    .build()
            })
            .collect();

        let color_refs: Vec<vk::AttachmentReference> = desc
            .color_refs
            .iter()
            .map(|reference| vk::AttachmentReference {
                attachment: reference.attachment,
                layout: convert::image_layout(reference.layout),
            })
            .collect();
        let depth_ref = desc.depth_ref.map(|reference| vk::AttachmentReference {
            attachment: reference.attachment,
            layout: convert::image_layout(reference.layout),
        });

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass.build()];

        let dependencies: Vec<vk::SubpassDependency> = desc
            .dependencies
            .iter()
            .map(|dependency| vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: convert::pipeline_stage(dependency.src_stage),
                dst_stage_mask: convert::pipeline_stage(dependency.dst_stage),
                src_access_mask: convert::access(dependency.src_access),
                dst_access_mask: convert::access(dependency.dst_access),
                dependency_flags: vk::DependencyFlags::empty(),
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let render_pass = unsafe { self.device().create_render_pass(&create_info, None)? };
        Ok(RawRenderPass(raw(render_pass)))
    }

    fn destroy_render_pass(&self, render_pass: RawRenderPass) {
        unsafe { self.device().destroy_render_pass(native(render_pass.as_raw()), None) };
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> RhiResult<RawFramebuffer> {
        let attachments: Vec<vk::ImageView> = desc.attachments.iter().map(|view| native(view.as_raw())).collect();
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(native(desc.render_pass.as_raw()))
            .attachments(&attachments)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers);
        let framebuffer = unsafe { self.device().create_framebuffer(&create_info, None)? };
        Ok(RawFramebuffer(raw(framebuffer)))
    }

    fn destroy_framebuffer(&self, framebuffer: RawFramebuffer) {
        unsafe { self.device().destroy_framebuffer(native(framebuffer.as_raw()), None) };
    }

    fn create_command_pool(&self, family: u32, resettable_buffers: bool) -> RhiResult<RawCommandPool> {
        let flags = if resettable_buffers {
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
        } else {
            vk::CommandPoolCreateFlags::empty()
        };
        let create_info = vk::CommandPoolCreateInfo::builder().queue_family_index(family).flags(flags);
        let pool = unsafe { self.device().create_command_pool(&create_info, None)? };
        Ok(RawCommandPool(raw(pool)))
    }

    fn destroy_command_pool(&self, pool: RawCommandPool) {
        unsafe { self.device().destroy_command_pool(native(pool.as_raw()), None) };
    }

    fn reset_command_pool(&self, pool: RawCommandPool) -> RhiResult<()> {
        unsafe {
            self.device()
                .reset_command_pool(native(pool.as_raw()), vk::CommandPoolResetFlags::empty())?;
        }
        Ok(())
    }

    fn allocate_command_buffer(&self, pool: RawCommandPool) -> RhiResult<RawCommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(native(pool.as_raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device().allocate_command_buffers(&allocate_info)? };
        buffers
            .first()
            .map(|&buffer| RawCommandBuffer(raw(buffer)))
            .ok_or_else(|| RhiError::Backend("command buffer allocation returned nothing".to_string()))
    }

    fn begin_command_buffer(&self, cmd: RawCommandBuffer, one_time_submit: bool) -> RhiResult<()> {
        let flags = if one_time_submit {
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
        } else {
            vk::CommandBufferUsageFlags::empty()
        };
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device().begin_command_buffer(native(cmd.as_raw()), &begin_info)? };
        Ok(())
    }

    fn end_command_buffer(&self, cmd: RawCommandBuffer) -> RhiResult<()> {
        unsafe { self.device().end_command_buffer(native(cmd.as_raw()))? };
        Ok(())
    }

    fn cmd_begin_render_pass(&self, cmd: RawCommandBuffer, begin: &RenderPassBegin<'_>) {
        let clear_values: Vec<vk::ClearValue> = begin.clear_values.iter().map(clear_value).collect();
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(native(begin.render_pass.as_raw()))
            .framebuffer(native(begin.framebuffer.as_raw()))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D { width: begin.width, height: begin.height },
            })
            .clear_values(&clear_values);
        unsafe {
            self.device()
                .cmd_begin_render_pass(native(cmd.as_raw()), &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, cmd: RawCommandBuffer) {
        unsafe { self.device().cmd_end_render_pass(native(cmd.as_raw())) };
    }

    fn cmd_set_viewports(&self, cmd: RawCommandBuffer, viewports: &[Viewport]) {
        let viewports: Vec<vk::Viewport> = viewports.iter().map(viewport).collect();
        unsafe { self.device().cmd_set_viewport(native(cmd.as_raw()), 0, &viewports) };
    }

    fn cmd_set_scissors(&self, cmd: RawCommandBuffer, scissors: &[Rect]) {
        let scissors: Vec<vk::Rect2D> = scissors.iter().map(rect).collect();
        unsafe { self.device().cmd_set_scissor(native(cmd.as_raw()), 0, &scissors) };
    }

    fn cmd_bind_vertex_buffer(&self, cmd: RawCommandBuffer, slot: u32, buffer: &VulkanBuffer) {
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(native(cmd.as_raw()), slot, &[buffer.buffer], &[0]);
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: RawCommandBuffer, buffer: &VulkanBuffer, offset: u64, format: IndexFormat) {
        unsafe {
            self.device().cmd_bind_index_buffer(
                native(cmd.as_raw()),
                buffer.buffer,
                offset,
                convert::index_type(format),
            );
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: RawCommandBuffer,
        pipeline: &VulkanPipeline,
        index: u32,
        set: &VulkanDescriptorSet,
        instance: usize,
    ) {
        let Some(&native_set) = set.sets.get(instance) else {
            return;
        };
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                native(cmd.as_raw()),
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout,
                index,
                &[native_set],
                &[],
            );
        }
    }

    fn cmd_bind_graphics_pipeline(&self, cmd: RawCommandBuffer, pipeline: &VulkanPipeline) {
        unsafe {
            self.device()
                .cmd_bind_pipeline(native(cmd.as_raw()), vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        }
    }

    fn cmd_draw_indexed(&self, cmd: RawCommandBuffer, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.device()
                .cmd_draw_indexed(native(cmd.as_raw()), index_count, 1, first_index, vertex_offset, 0);
        }
    }

    fn cmd_copy_buffer(&self, cmd: RawCommandBuffer, src: &VulkanBuffer, dst: &VulkanBuffer, size: u64) {
        let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
        unsafe { self.device().cmd_copy_buffer(native(cmd.as_raw()), src.buffer, dst.buffer, &[region]) };
    }

    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: RawCommandBuffer,
        src: &VulkanBuffer,
        dst: &VulkanTexture,
        regions: &[BufferTextureCopy],
    ) {
        let aspect_mask = convert::aspect(dst.format);
        let regions: Vec<vk::BufferImageCopy> = regions
            .iter()
            .map(|region| vk::BufferImageCopy {
                buffer_offset: region.buffer_offset,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask,
                    mip_level: 0,
                    base_array_layer: region.layer,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D { width: region.width, height: region.height, depth: 1 },
            })
            .collect();
        unsafe {
            self.device().cmd_copy_buffer_to_image(
                native(cmd.as_raw()),
                src.buffer,
                dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }
    }

    fn cmd_texture_barrier(&self, cmd: RawCommandBuffer, texture: &VulkanTexture, barrier: &LayoutBarrier) {
        let image_barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(convert::image_layout(barrier.old_layout))
            .new_layout(convert::image_layout(barrier.new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(texture.subresource_range())
            .src_access_mask(convert::access(barrier.src_access))
            .dst_access_mask(convert::access(barrier.dst_access))
            .build();
        unsafe {
            self.device().cmd_pipeline_barrier(
                native(cmd.as_raw()),
                convert::pipeline_stage(barrier.src_stage),
                convert::pipeline_stage(barrier.dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
    }

    fn create_semaphore(&self) -> RhiResult<RawSemaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { self.device().create_semaphore(&create_info, None)? };
        Ok(RawSemaphore(raw(semaphore)))
    }

    fn destroy_semaphore(&self, semaphore: RawSemaphore) {
        unsafe { self.device().destroy_semaphore(native(semaphore.as_raw()), None) };
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<RawFence> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { self.device().create_fence(&create_info, None)? };
        Ok(RawFence(raw(fence)))
    }

    fn destroy_fence(&self, fence: RawFence) {
        unsafe { self.device().destroy_fence(native(fence.as_raw()), None) };
    }

    fn wait_for_fence(&self, fence: RawFence, timeout: u64) -> RhiResult<()> {
        unsafe { self.device().wait_for_fences(&[native(fence.as_raw())], true, timeout)? };
        Ok(())
    }

    fn reset_fence(&self, fence: RawFence) -> RhiResult<()> {
        unsafe { self.device().reset_fences(&[native(fence.as_raw())])? };
        Ok(())
    }

    fn acquire_next_image(&self, swapchain: &VulkanSwapchain, signal: RawSemaphore, timeout: u64) -> RhiResult<u32> {
        let (index, suboptimal) = unsafe {
            self.context.swapchain_loader.acquire_next_image(
                swapchain.swapchain,
                timeout,
                native(signal.as_raw()),
                vk::Fence::null(),
            )?
        };
        if suboptimal {
            log::debug!("Swapchain is suboptimal for its surface; rebuild it to match");
        }
        Ok(index)
    }

    fn queue_submit(&self, queue: QueueType, submit: &SubmitInfo<'_>) -> RhiResult<()> {
        let command_buffers: Vec<vk::CommandBuffer> =
            submit.command_buffers.iter().map(|cmd| native(cmd.as_raw())).collect();
        let (wait_semaphores, wait_stages) = wait_lists(submit.wait);
        let signal_semaphores: Vec<vk::Semaphore> =
            submit.signal.iter().map(|semaphore| native(semaphore.as_raw())).collect();

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        let fence = submit.fence.map_or_else(vk::Fence::null, |fence| native(fence.as_raw()));

        unsafe { self.device().queue_submit(self.context.queue(queue), &[submit_info], fence)? };
        Ok(())
    }

    fn queue_present(&self, swapchain: &VulkanSwapchain, image_index: u32, wait: RawSemaphore) -> RhiResult<()> {
        let wait_semaphores = [native(wait.as_raw())];
        let swapchains = [swapchain.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let queue = self.context.queue_for_family(swapchain.present_family);
        let suboptimal = unsafe { self.context.swapchain_loader.queue_present(queue, &present_info)? };
        if suboptimal {
            log::debug!("Present reported a suboptimal swapchain");
        }
        Ok(())
    }

    fn queue_wait_idle(&self, queue: QueueType) -> RhiResult<()> {
        unsafe { self.device().queue_wait_idle(self.context.queue(queue))? };
        Ok(())
    }

    fn device_wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device().device_wait_idle()? };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_lists_pair_semaphores_with_stages() {
        let (semaphores, stages) = wait_lists(Some((RawSemaphore(0x2a), PipelineStage::COLOR_ATTACHMENT_OUTPUT)));
        assert_eq!(semaphores, vec![vk::Semaphore::from_raw(0x2a)]);
        assert_eq!(stages, vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT]);

        let (semaphores, stages) = wait_lists(None);
        assert!(semaphores.is_empty() && stages.is_empty());
    }
}
