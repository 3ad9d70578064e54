//! Shader modules and pipeline state objects

use super::context::VulkanContext;
use super::convert;
use super::resources::VulkanPipeline;
use crate::rhi::error::{RhiError, RhiResult};
use crate::rhi::handles::{ComputePipelineHandle, GraphicsPipelineHandle};
use ash::vk;
use std::ffi::CStr;
use std::io::Cursor;
use std::sync::Arc;

const COMPUTE_ENTRY: &[u8] = b"main\0";
const VERTEX_ENTRY: &[u8] = b"mainVS\0";
const PIXEL_ENTRY: &[u8] = b"mainPS\0";

fn entry_name(bytes: &'static [u8]) -> RhiResult<&'static CStr> {
    CStr::from_bytes_with_nul(bytes).map_err(|e| RhiError::Backend(e.to_string()))
}

/// Shader module destroyed when dropped, once the pipeline has been created
struct ShaderModule<'a> {
    device: &'a ash::Device,
    module: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    fn new(device: &'a ash::Device, bytecode: &[u8]) -> RhiResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytecode))
            .map_err(|e| RhiError::Backend(format!("Invalid SPIR-V: {e}")))?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        Ok(Self { device, module })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

pub(crate) fn create_compute(context: &Arc<VulkanContext>, desc: &ComputePipelineHandle) -> RhiResult<VulkanPipeline> {
    let mut pipeline = VulkanPipeline::with_layout(context, &desc.descriptor_sets)?;
    let module = ShaderModule::new(&context.device, &desc.compute_shader)?;

    let stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module.module)
        .name(entry_name(COMPUTE_ENTRY)?)
        .build();
    let create_info = vk::ComputePipelineCreateInfo::builder().stage(stage).layout(pipeline.layout).build();

    let pipelines = unsafe {
        context
            .device
            .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
            .map_err(|(_, result)| result)?
    };
    pipeline.pipeline = pipelines.into_iter().next().unwrap_or_default();
    Ok(pipeline)
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn create_graphics(
    context: &Arc<VulkanContext>,
    desc: &GraphicsPipelineHandle,
    render_pass: vk::RenderPass,
) -> RhiResult<VulkanPipeline> {
    let mut pipeline = VulkanPipeline::with_layout(context, &desc.descriptor_sets)?;
    let device = &context.device;

    let mut modules = Vec::with_capacity(2);
    let mut stages = Vec::with_capacity(2);
    for (bytecode, stage, entry) in [
        (&desc.vertex_shader, vk::ShaderStageFlags::VERTEX, VERTEX_ENTRY),
        (&desc.pixel_shader, vk::ShaderStageFlags::FRAGMENT, PIXEL_ENTRY),
    ] {
        if bytecode.is_empty() {
            continue;
        }
        let module = ShaderModule::new(device, bytecode)?;
        stages.push(
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(stage)
                .module(module.module)
                .name(entry_name(entry)?)
                .build(),
        );
        modules.push(module);
    }

    // One vertex buffer binding per distinct binding slot, all sharing the layout stride.
    let layout = &desc.vertex_layout;
    let mut bindings: Vec<vk::VertexInputBindingDescription> = Vec::new();
    let mut attributes = Vec::with_capacity(layout.inputs.len());
    for (location, input) in layout.inputs.iter().enumerate() {
        let binding = u32::from(input.binding);
        if !bindings.iter().any(|existing| existing.binding == binding) {
            bindings.push(vk::VertexInputBindingDescription {
                binding,
                stride: layout.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            });
        }
        attributes.push(vk::VertexInputAttributeDescription {
            location: location as u32,
            binding,
            format: convert::vertex_format(input.input_type),
            offset: u32::from(input.offset),
        });
    }
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(convert::topology(desc.topology))
        .primitive_restart_enable(desc.primitive_restart);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder().viewport_count(1).scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(convert::cull_mode(desc.cull_mode))
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .alpha_to_coverage_enable(desc.blend_state.alpha_to_coverage);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(desc.depth_test)
        .depth_write_enable(desc.depth_write)
        .depth_compare_op(convert::compare_op(desc.compare_op))
        .depth_bounds_test_enable(false)
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0)
        .stencil_test_enable(desc.stencil_test);

    let color_count = desc.render_pass.as_ref().map_or(1, |pass| pass.color.len());
    let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
        .blend_state
        .rt_blends
        .iter()
        .take(color_count)
        .map(|blend| {
            // A zero mask writes every channel.
            let write_mask = if blend.write_mask == 0 {
                vk::ColorComponentFlags::R
                    | vk::ColorComponentFlags::G
                    | vk::ColorComponentFlags::B
                    | vk::ColorComponentFlags::A
            } else {
                vk::ColorComponentFlags::from_raw(u32::from(blend.write_mask & 0xF))
            };
            vk::PipelineColorBlendAttachmentState::builder()
                .blend_enable(desc.blend_state.enabled)
                .src_color_blend_factor(convert::blend_factor(blend.src_blend))
                .dst_color_blend_factor(convert::blend_factor(blend.dst_blend))
                .color_blend_op(convert::blend_op(blend.blend_op))
                .src_alpha_blend_factor(convert::blend_factor(blend.src_blend_alpha))
                .dst_alpha_blend_factor(convert::blend_factor(blend.dst_blend_alpha))
                .alpha_blend_op(convert::blend_op(blend.blend_op_alpha))
                .color_write_mask(write_mask)
                .build()
        })
        .collect();
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(pipeline.layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
            .map_err(|(_, result)| result)?
    };
    pipeline.pipeline = pipelines.into_iter().next().unwrap_or_default();
    drop(modules);
    Ok(pipeline)
}
