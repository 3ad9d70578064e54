//! Vulkan resource objects
//!
//! Each object owns its native handles and memory and keeps the [`VulkanContext`] alive
//! until it is dropped.

use super::context::VulkanContext;
use super::convert;
use crate::backend::{BackendBuffer, RawImageView};
use crate::rhi::error::RhiResult;
use crate::rhi::handles::{BufferHandle, DescriptorSetHandle, TextureHandle, TextureType};
use crate::rhi::types::{Format, ResourceView, TextureUsage};
use ash::vk;
use ash::vk::Handle;
use std::sync::Arc;

/// Buffer plus its dedicated memory
pub struct VulkanBuffer {
    context: Arc<VulkanContext>,
    pub(crate) buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: u64,
    mapped: Option<*mut u8>,
}

impl VulkanBuffer {
    pub(crate) fn new(context: &Arc<VulkanContext>, desc: &BufferHandle) -> RhiResult<Self> {
        let families = context.sharing_families();
        let mut create_info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(convert::buffer_usage(desc.usage));
        create_info = if families.len() > 1 {
            create_info.sharing_mode(vk::SharingMode::CONCURRENT).queue_family_indices(&families)
        } else {
            create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let device = &context.device;
        let buffer = unsafe { device.create_buffer(&create_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let properties = if desc.cpu_access {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        } else {
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        };

        let memory = match context.allocate(requirements, properties) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };
        unsafe { device.bind_buffer_memory(buffer, memory, 0)? };

        Ok(Self { context: Arc::clone(context), buffer, memory, size: desc.size, mapped: None })
    }

    pub(crate) fn map(&mut self) -> RhiResult<()> {
        if self.mapped.is_none() {
            let ptr = unsafe {
                self.context.device.map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?
            };
            self.mapped = Some(ptr.cast::<u8>());
        }
        Ok(())
    }

    pub(crate) fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe { self.context.device.unmap_memory(self.memory) };
        }
    }
}

impl BackendBuffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn mapped_bytes(&self) -> Option<&[u8]> {
        self.mapped.map(|ptr| unsafe { std::slice::from_raw_parts(ptr.cast_const(), self.size as usize) })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]> {
        self.mapped.map(|ptr| unsafe { std::slice::from_raw_parts_mut(ptr, self.size as usize) })
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.context.device.destroy_buffer(self.buffer, None);
            self.context.device.free_memory(self.memory, None);
        }
    }
}

/// Image, its memory, one view per usage and a sampler
pub struct VulkanTexture {
    context: Arc<VulkanContext>,
    pub(crate) image: vk::Image,
    memory: vk::DeviceMemory,
    views: Vec<(ResourceView, vk::ImageView)>,
    pub(crate) sampler: vk::Sampler,
    pub(crate) format: Format,
    pub(crate) layers: u32,
    pub(crate) mip_levels: u32,
}

impl VulkanTexture {
    pub(crate) fn new(context: &Arc<VulkanContext>, desc: &TextureHandle) -> RhiResult<Self> {
        let device = &context.device;
        let layers = desc.layer_count();
        let mip_levels = u32::from(desc.mip_levels.max(1));
        let depth = if desc.texture_type == TextureType::Texture3D { u32::from(desc.depth.max(1)) } else { 1 };
        let flags = if desc.texture_type == TextureType::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        // Uploads record on the transfer family, so images are shared like buffers.
        let families = context.sharing_families();
        let mut create_info = vk::ImageCreateInfo::builder()
            .flags(flags)
            .image_type(convert::image_type(desc.texture_type))
            .format(convert::format(desc.format))
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth })
            .mip_levels(mip_levels)
            .array_layers(layers)
            .samples(convert::sample_count(desc.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert::image_usage(desc.usage))
            .initial_layout(vk::ImageLayout::UNDEFINED);
        create_info = if families.len() > 1 {
            create_info.sharing_mode(vk::SharingMode::CONCURRENT).queue_family_indices(&families)
        } else {
            create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };
        let image = unsafe { device.create_image(&create_info, None)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match context.allocate(requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(image, None) };
                return Err(err);
            }
        };

        // From here on `Drop` cleans up partially created textures.
        let mut texture = Self {
            context: Arc::clone(context),
            image,
            memory,
            views: Vec::new(),
            sampler: vk::Sampler::null(),
            format: desc.format,
            layers,
            mip_levels,
        };
        unsafe { device.bind_image_memory(image, memory, 0)? };

        for view in [ResourceView::Srv, ResourceView::Uav, ResourceView::Rtv, ResourceView::Dsv] {
            if desc.usage.contains(TextureUsage::for_view(view)) {
                let image_view = texture.create_view(desc, view)?;
                texture.views.push((view, image_view));
            }
        }

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(16.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        texture.sampler = unsafe { device.create_sampler(&sampler_info, None)? };

        Ok(texture)
    }

    fn create_view(&self, desc: &TextureHandle, view: ResourceView) -> RhiResult<vk::ImageView> {
        // Vulkan views of depth images keep the depth format, typeless or not.
        let format = match view {
            ResourceView::Dsv => desc.format.dsv_format(),
            ResourceView::Srv if desc.format.is_depth() => desc.format.dsv_format(),
            ResourceView::Srv => desc.format.srv_format(),
            ResourceView::Uav | ResourceView::Rtv => desc.format,
        };
        // Sampled depth reads the depth aspect only.
        let aspect_mask = match view {
            ResourceView::Srv if desc.format.is_depth() => vk::ImageAspectFlags::DEPTH,
            _ => convert::aspect(format),
        };

        let create_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(convert::view_type(desc.texture_type))
            .format(convert::format(format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: self.mip_levels,
                base_array_layer: 0,
                layer_count: self.layers,
            });
        Ok(unsafe { self.context.device.create_image_view(&create_info, None)? })
    }

    pub(crate) fn view(&self, view: ResourceView) -> Option<vk::ImageView> {
        self.views.iter().find(|(kind, _)| *kind == view).map(|&(_, image_view)| image_view)
    }

    pub(crate) fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: convert::aspect(self.format),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.layers,
        }
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe {
            if self.sampler != vk::Sampler::null() {
                device.destroy_sampler(self.sampler, None);
            }
            for &(_, view) in &self.views {
                device.destroy_image_view(view, None);
            }
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// Views over swapchain images, or nothing for offscreen targets
pub struct VulkanRenderTarget {
    context: Arc<VulkanContext>,
    pub(crate) views: Vec<vk::ImageView>,
    pub(crate) extent: vk::Extent2D,
}

impl VulkanRenderTarget {
    pub(crate) fn offscreen(context: &Arc<VulkanContext>) -> Self {
        Self { context: Arc::clone(context), views: Vec::new(), extent: vk::Extent2D::default() }
    }

    pub(crate) fn over_images(
        context: &Arc<VulkanContext>,
        images: &[vk::Image],
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let mut target = Self { context: Arc::clone(context), views: Vec::with_capacity(images.len()), extent };
        for &image in images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { context.device.create_image_view(&create_info, None)? };
            target.views.push(view);
        }
        Ok(target)
    }

    pub(crate) fn raw_views(&self) -> Vec<RawImageView> {
        self.views.iter().map(|view| RawImageView(view.as_raw())).collect()
    }
}

impl Drop for VulkanRenderTarget {
    fn drop(&mut self) {
        for &view in &self.views {
            unsafe { self.context.device.destroy_image_view(view, None) };
        }
    }
}

/// Descriptor set layout, its pool and the replicated sets
pub struct VulkanDescriptorSet {
    context: Arc<VulkanContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    pub(crate) sets: Vec<vk::DescriptorSet>,
    pub(crate) bindings: Vec<(u32, vk::DescriptorType)>,
}

impl VulkanDescriptorSet {
    pub(crate) fn new(context: &Arc<VulkanContext>, desc: &DescriptorSetHandle, instances: usize) -> RhiResult<Self> {
        let device = &context.device;
        let layout = create_set_layout(context, desc)?;
        #[allow(clippy::cast_possible_truncation)]
        let instance_count = instances as u32;

        let pool_sizes: Vec<vk::DescriptorPoolSize> = desc
            .descriptors
            .iter()
            .map(|descriptor| vk::DescriptorPoolSize {
                ty: convert::descriptor_type(descriptor.descriptor_type),
                descriptor_count: u32::from(descriptor.count.max(1)) * instance_count,
            })
            .collect();

        let mut set = Self {
            context: Arc::clone(context),
            layout,
            pool: vk::DescriptorPool::null(),
            sets: Vec::new(),
            bindings: desc
                .descriptors
                .iter()
                .map(|descriptor| (u32::from(descriptor.binding), convert::descriptor_type(descriptor.descriptor_type)))
                .collect(),
        };
        if pool_sizes.is_empty() {
            return Ok(set);
        }

        let pool_info = vk::DescriptorPoolCreateInfo::builder().max_sets(instance_count).pool_sizes(&pool_sizes);
        set.pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };

        let layouts = vec![layout; instances];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(set.pool)
            .set_layouts(&layouts);
        set.sets = unsafe { device.allocate_descriptor_sets(&allocate_info)? };
        Ok(set)
    }

    pub(crate) fn binding_type(&self, binding: u32) -> Option<vk::DescriptorType> {
        self.bindings.iter().find(|(index, _)| *index == binding).map(|&(_, ty)| ty)
    }
}

impl Drop for VulkanDescriptorSet {
    fn drop(&mut self) {
        unsafe {
            if self.pool != vk::DescriptorPool::null() {
                self.context.device.destroy_descriptor_pool(self.pool, None);
            }
            self.context.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Layout matching `desc`. Pipelines build their own copies, which are compatible with the
/// layouts of the sets bound to them.
pub(crate) fn create_set_layout(
    context: &VulkanContext,
    desc: &DescriptorSetHandle,
) -> RhiResult<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
        .descriptors
        .iter()
        .map(|descriptor| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(u32::from(descriptor.binding))
                .descriptor_type(convert::descriptor_type(descriptor.descriptor_type))
                .descriptor_count(u32::from(descriptor.count.max(1)))
                .stage_flags(convert::shader_stages(descriptor.shader_stage))
                .build()
        })
        .collect();
    let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    Ok(unsafe { context.device.create_descriptor_set_layout(&create_info, None)? })
}

/// A pipeline, its layout and the set layouts the layout was built from
pub struct VulkanPipeline {
    context: Arc<VulkanContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
}

impl VulkanPipeline {
    /// Pipeline layout over one set layout per descriptor set. The pipeline itself is
    /// attached by the caller.
    pub(crate) fn with_layout(context: &Arc<VulkanContext>, sets: &[DescriptorSetHandle]) -> RhiResult<Self> {
        let mut pipeline = Self {
            context: Arc::clone(context),
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            set_layouts: Vec::with_capacity(sets.len()),
        };
        for set in sets {
            let layout = create_set_layout(context, set)?;
            pipeline.set_layouts.push(layout);
        }
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&pipeline.set_layouts);
        pipeline.layout = unsafe { context.device.create_pipeline_layout(&layout_info, None)? };
        Ok(pipeline)
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.destroy_pipeline(self.pipeline, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                device.destroy_pipeline_layout(self.layout, None);
            }
            for &layout in &self.set_layouts {
                device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}
