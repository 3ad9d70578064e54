//! Resource lifecycle through the public device API

use rust_rhi::backend::mock::MockCommand;
use rust_rhi::prelude::*;

fn device() -> Device<MockBackend> {
    Device::new(MockBackend::new(), DeviceConfig::default()).unwrap()
}

fn uniform_and_sampler() -> DescriptorSetHandle {
    DescriptorSetHandle::new(vec![
        Descriptor::new(DescriptorType::Uniform, ShaderStage::VERTEX, 0),
        Descriptor::new(DescriptorType::Sampler, ShaderStage::PIXEL, 1),
    ])
}

#[test]
fn test_every_kind_loads_and_unloads() {
    let mut device = device();

    let buffer = BufferHandle::new(BufferUsage::VERTEX, 256, false);
    let texture = TextureHandle::new_2d(16, 16, Format::R8G8B8A8Unorm, TextureUsage::SRV | TextureUsage::RTV);
    let target = RenderTargetHandle::default();
    let set = uniform_and_sampler();
    let compute = ComputePipelineHandle::new(Vec::new(), vec![set.clone()]);
    let graphics = GraphicsPipelineHandle::new(Vec::new(), Vec::new());

    device.load_buffer(&buffer).unwrap();
    device.load_texture(&texture).unwrap();
    device.load_render_target(&target).unwrap();
    device.load_descriptor_set(&set).unwrap();
    device.load_compute_pipeline(&compute).unwrap();
    device.load_graphics_pipeline(&graphics).unwrap();
    let pass = RenderPassHandle::new().with_color(RenderPassAttachment::color(texture, LoadOp::Clear));
    device.load_render_pass(&pass).unwrap();

    assert!(device.has_buffer(&buffer));
    assert!(device.has_texture(&texture));
    assert!(device.has_render_target(&target));
    assert!(device.has_descriptor_set(&set));
    assert!(device.has_compute_pipeline(&compute));
    assert!(device.has_graphics_pipeline(&graphics));
    assert!(device.has_render_pass(&pass));

    let stats = device.backend().stats();
    assert_eq!(stats.live_buffers, 1);
    assert_eq!(stats.live_textures, 1);
    assert_eq!(stats.live_pipelines, 2);

    device.unload_render_pass(&pass);
    device.unload_graphics_pipeline(&graphics);
    device.unload_compute_pipeline(&compute);
    device.unload_descriptor_set(&set);
    device.unload_render_target(&target);
    device.unload_texture(&texture);
    device.unload_buffer(&buffer);

    assert!(!device.has_buffer(&buffer));
    assert!(!device.has_texture(&texture));
    assert!(!device.has_render_target(&target));
    assert!(!device.has_descriptor_set(&set));
    assert!(!device.has_compute_pipeline(&compute));
    assert!(!device.has_graphics_pipeline(&graphics));
    assert!(!device.has_render_pass(&pass));

    let stats = device.backend().stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_textures, 0);
    assert_eq!(stats.live_render_targets, 0);
    assert_eq!(stats.live_descriptor_sets, 0);
    assert_eq!(stats.live_pipelines, 0);
}

#[test]
#[should_panic(expected = "is not loaded")]
fn test_unloading_a_handle_that_was_never_loaded_panics() {
    let mut device = device();
    device.unload_buffer(&BufferHandle::new(BufferUsage::UNIFORM, 64, true));
}

#[test]
#[should_panic(expected = "is already loaded")]
fn test_loading_twice_panics() {
    let mut device = device();
    let texture = TextureHandle::new_2d(4, 4, Format::R8G8B8A8Unorm, TextureUsage::SRV);
    device.load_texture(&texture).unwrap();
    device.load_texture(&texture).unwrap();
}

#[test]
#[should_panic(expected = "invalid id 0")]
fn test_invalid_id_is_rejected() {
    let device = device();
    let mut buffer = BufferHandle::new(BufferUsage::UNIFORM, 64, true);
    buffer.id = 0;
    device.has_buffer(&buffer);
}

#[test]
fn test_mapping_reads_back_what_was_written() {
    let mut device = device();
    let buffer = BufferHandle::new(BufferUsage::UNIFORM, 16, true);
    device.load_buffer(&buffer).unwrap();

    device.write_buffer(&buffer, 4, &[0xAABB_CCDD_u32, 7]).unwrap();
    {
        let mut mapping = device.map_buffer(&buffer).unwrap();
        assert_eq!(mapping.len(), 16);
        assert_eq!(&mapping[4..8], &0xAABB_CCDD_u32.to_ne_bytes());
        assert_eq!(&mapping[8..12], &7_u32.to_ne_bytes());
        mapping[0] = 1;
    }

    let mapping = device.map_buffer(&buffer).unwrap();
    assert_eq!(mapping[0], 1);
    mapping.unmap();
}

#[test]
#[should_panic(expected = "overflows buffer")]
fn test_mapped_write_past_the_end_panics() {
    let mut device = device();
    let buffer = BufferHandle::new(BufferUsage::UNIFORM, 8, true);
    device.load_buffer(&buffer).unwrap();
    device.write_buffer(&buffer, 4, &[0_u32, 0]).unwrap();
}

#[test]
#[should_panic(expected = "is not CPU accessible")]
fn test_device_local_buffers_cannot_be_mapped() {
    let mut device = device();
    let buffer = BufferHandle::new(BufferUsage::VERTEX, 64, false);
    device.load_buffer(&buffer).unwrap();
    let _mapping = device.map_buffer(&buffer);
}

#[test]
fn test_descriptor_replicas_are_written_once_per_change() {
    let mut device = device();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
    device.load_swapchain(&swapchain).unwrap();

    let uniforms = BufferHandle::new(BufferUsage::UNIFORM, 64, true);
    let texture = TextureHandle::new_2d(8, 8, Format::R8G8B8A8Unorm, TextureUsage::SRV);
    let set = uniform_and_sampler();
    let mut pipeline = GraphicsPipelineHandle::new(Vec::new(), Vec::new());
    pipeline.descriptor_sets = vec![set.clone()];
    device.load_buffer(&uniforms).unwrap();
    device.load_texture(&texture).unwrap();
    device.load_descriptor_set(&set).unwrap();
    device.load_graphics_pipeline(&pipeline).unwrap();
    device.bind_buffer(&set, 0, &uniforms);
    device.bind_texture(&set, 1, &texture);

    let mut instances = Vec::new();
    for frame in 0..5 {
        if frame == 4 {
            device.bind_buffer(&set, 0, &uniforms);
        }
        device.begin_frame_exp(&swapchain).unwrap();
        let cmd = device.begin_command_list_exp().unwrap();
        device.bind_descriptor_set(&cmd, &pipeline, &set, 0);
        let raw = device.raw_command_buffer(&cmd);
        device.end_frame_exp(&swapchain).unwrap();

        for command in device.backend().commands(raw) {
            if let MockCommand::BindDescriptorSet { index, instance, .. } = command {
                assert_eq!(index, 0);
                instances.push(instance);
            }
        }
    }

    assert_eq!(instances, [0, 1, 2, 0, 1]);
    // Three replicas converge, then the rebind costs one more write for the frame that used it.
    assert_eq!(device.backend().stats().descriptor_writes, 4);
}

#[test]
fn test_graphics_pipelines_default_to_the_backbuffer_pass() {
    let mut device = device();
    let pipeline = GraphicsPipelineHandle::new(Vec::new(), Vec::new());
    device.load_graphics_pipeline(&pipeline).unwrap();

    assert_eq!(device.fbo_cache().render_pass_count(), 1);
    assert_eq!(device.backend().stats().render_passes_created, 1);

    let swapchain = SwapchainHandle::new(WindowHandle::headless(32, 32));
    device.load_swapchain(&swapchain).unwrap();
    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_target_pass(&cmd, &swapchain.backbuffer).unwrap();
    device.end_render_pass(&cmd);
    device.end_frame_exp(&swapchain).unwrap();

    assert_eq!(device.backend().stats().render_passes_created, 1);
}

#[test]
fn test_explicit_render_pass_clears_every_attachment() {
    let mut device = device();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(32, 32));
    device.load_swapchain(&swapchain).unwrap();

    let color = TextureHandle::new_2d(48, 24, Format::R8G8B8A8Unorm, TextureUsage::RTV);
    let depth = TextureHandle::new_2d(48, 24, Format::D32Float, TextureUsage::DSV);
    device.load_texture(&color).unwrap();
    device.load_texture(&depth).unwrap();
    let pass = RenderPassHandle::new()
        .with_color(RenderPassAttachment::color(color, LoadOp::Clear))
        .with_depth_stencil(RenderPassAttachment::depth_stencil(depth, LoadOp::Clear));
    device.load_render_pass(&pass).unwrap();

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_pass(&cmd, &pass).unwrap();
    device.end_render_pass(&cmd);
    let raw = device.raw_command_buffer(&cmd);
    device.end_frame_exp(&swapchain).unwrap();

    match &device.backend().commands(raw)[0] {
        MockCommand::BeginRenderPass { width, height, clear_values, .. } => {
            assert_eq!((*width, *height), (48, 24));
            assert_eq!(clear_values.len(), 2);
        }
        other => panic!("expected a render pass begin, got {other:?}"),
    }

    // Unloading an attachment drops the cached framebuffer once the frame retires.
    device.unload_texture(&depth);
    assert_eq!(device.fbo_cache().framebuffer_count(), 0);
    device.wait_idle().unwrap();
    assert_eq!(device.backend().stats().live_framebuffers, 0);
}

#[test]
#[should_panic(expected = "unload the swapchain instead")]
fn test_backbuffers_cannot_be_unloaded_directly() {
    let mut device = device();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(32, 32));
    device.load_swapchain(&swapchain).unwrap();
    device.unload_render_target(&swapchain.backbuffer);
}
