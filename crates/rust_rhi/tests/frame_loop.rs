//! Frame lifecycle tests against the software backend

use rust_rhi::backend::mock::MockCommand;
use rust_rhi::backend::ClearValue;
use rust_rhi::prelude::*;
use rust_rhi::rhi::swapchain::FrameState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup(config: DeviceConfig) -> (Device<MockBackend>, MockBackend, SwapchainHandle) {
    let backend = MockBackend::new();
    let mut device = Device::new(backend.clone(), config).unwrap();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(256, 256));
    device.load_swapchain(&swapchain).unwrap();
    (device, backend, swapchain)
}

fn offscreen_pass(device: &mut Device<MockBackend>) -> RenderPassHandle {
    let color = TextureHandle::new_2d(256, 256, Format::R8G8B8A8Unorm, TextureUsage::RTV | TextureUsage::SRV);
    device.load_texture(&color).unwrap();
    let pass = RenderPassHandle::new().with_color(RenderPassAttachment::color(color, LoadOp::Clear));
    device.load_render_pass(&pass).unwrap();
    pass
}

fn draw_nothing(device: &mut Device<MockBackend>, swapchain: &SwapchainHandle, pass: &RenderPassHandle) -> CommandList {
    device.begin_frame_exp(swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_pass(&cmd, pass).unwrap();
    device.end_render_pass(&cmd);
    device.end_frame_exp(swapchain).unwrap();
    cmd
}

#[test]
fn test_identical_frames_hit_the_cache() {
    let (mut device, backend, swapchain) = setup(DeviceConfig::default());
    let pass = offscreen_pass(&mut device);

    draw_nothing(&mut device, &swapchain, &pass);
    let first = backend.stats();
    assert_eq!(first.render_passes_created, 1);
    assert_eq!(first.framebuffers_created, 1);

    draw_nothing(&mut device, &swapchain, &pass);
    let second = backend.stats();
    assert_eq!(second.render_passes_created, 1);
    assert_eq!(second.framebuffers_created, 1);
    assert_eq!(device.fbo_cache().framebuffer_count(), 1);
}

#[test]
fn test_backbuffer_pass_records_one_clear() {
    let (mut device, backend, swapchain) = setup(DeviceConfig::default());

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_target_pass(&cmd, &swapchain.backbuffer).unwrap();
    device.bind_viewports(&cmd, &[Viewport::new(256, 256)]);
    device.end_render_pass(&cmd);
    let raw = device.raw_command_buffer(&cmd);
    device.end_frame_exp(&swapchain).unwrap();

    let commands = backend.commands(raw);
    assert_eq!(commands.len(), 3);
    match &commands[0] {
        MockCommand::BeginRenderPass { width, height, clear_values, .. } => {
            assert_eq!((*width, *height), (256, 256));
            assert_eq!(clear_values.as_slice(), &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])]);
        }
        other => panic!("expected a render pass begin, got {other:?}"),
    }
    assert_eq!(commands[2], MockCommand::EndRenderPass);
}

#[test]
fn test_each_frame_is_one_batch_with_frame_sync() {
    let (mut device, backend, swapchain) = setup(DeviceConfig::default());

    device.begin_frame_exp(&swapchain).unwrap();
    let first = device.begin_command_list_exp().unwrap();
    let second = device.begin_command_list_exp().unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.backbuffer_id, swapchain.backbuffer.id);
    device.end_frame_exp(&swapchain).unwrap();

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    let sync = device.swapchain_context(&swapchain).frame_sync(0);
    assert_eq!(submissions[0].queue, QueueType::Graphics);
    assert_eq!(submissions[0].command_buffers.len(), 2);
    assert_eq!(submissions[0].wait.map(|(semaphore, _)| semaphore), Some(sync.acquire));
    assert_eq!(submissions[0].signal, Some(sync.present));
    assert_eq!(submissions[0].fence, Some(sync.fence));
    assert_eq!(backend.stats().presents, 1);
}

#[test]
fn test_command_list_ids_are_recycled_each_frame() {
    let (mut device, _backend, swapchain) = setup(DeviceConfig::default().with_max_command_lists(2));

    for _ in 0..4 {
        device.begin_frame_exp(&swapchain).unwrap();
        let ids = [device.begin_command_list_exp().unwrap().id, device.begin_command_list_exp().unwrap().id];
        assert_eq!(ids, [0, 1]);
        device.end_frame_exp(&swapchain).unwrap();
    }
}

#[test]
#[should_panic]
fn test_command_list_capacity_is_enforced() {
    let (mut device, _backend, swapchain) = setup(DeviceConfig::default().with_max_command_lists(2));

    device.begin_frame_exp(&swapchain).unwrap();
    for _ in 0..3 {
        device.begin_command_list_exp().unwrap();
    }
}

#[test]
#[should_panic(expected = "while a frame is recording")]
fn test_command_list_requires_a_frame() {
    let (mut device, _backend, swapchain) = setup(DeviceConfig::default());
    device.begin_frame_exp(&swapchain).unwrap();
    device.end_frame_exp(&swapchain).unwrap();
    device.begin_command_list_exp().unwrap();
}

#[test]
#[should_panic(expected = "swapchain handle has the invalid id 0")]
fn test_end_frame_rejects_the_invalid_id() {
    let (mut device, _backend, swapchain) = setup(DeviceConfig::default());
    device.begin_frame_exp(&swapchain).unwrap();
    let mut stale = swapchain;
    stale.id = 0;
    device.end_frame_exp(&stale).unwrap();
}

#[test]
fn test_early_submission_replaces_the_frame_batch() {
    let (mut device, backend, swapchain) = setup(DeviceConfig::default());

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.queue_submit(QueueType::Graphics, &cmd).unwrap();
    assert_eq!(device.swapchain_context(&swapchain).state(), FrameState::Submitted);
    device.end_frame_exp(&swapchain).unwrap();

    assert_eq!(backend.stats().submits, 1);
    assert_eq!(backend.stats().presents, 1);
}

#[test]
fn test_cpu_blocks_once_every_slot_is_in_flight() {
    let (backend, gpu) = MockBackend::manual();
    let mut device = Device::new(backend, DeviceConfig::default().with_backbuffer_count(3)).unwrap();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
    device.load_swapchain(&swapchain).unwrap();

    for _ in 0..2 {
        device.begin_frame_exp(&swapchain).unwrap();
        device.end_frame_exp(&swapchain).unwrap();
    }
    assert_eq!(gpu.pending(), 2);
    assert_eq!(device.swapchain_context(&swapchain).buffers_in_flight(), 2);

    let released = Arc::new(AtomicBool::new(false));
    let helper = {
        let released = Arc::clone(&released);
        let gpu = gpu.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
            assert!(gpu.complete_oldest());
        })
    };

    // The third frame fills the ring and waits on the first frame's fence.
    device.begin_frame_exp(&swapchain).unwrap();
    device.end_frame_exp(&swapchain).unwrap();
    assert!(released.load(Ordering::SeqCst));
    helper.join().unwrap();

    let context = device.swapchain_context(&swapchain);
    assert_eq!(context.buffers_in_flight(), 2);
    assert_eq!(context.current_frame(), 0);

    gpu.complete_all();
    device.wait_idle().unwrap();
}

#[test]
fn test_rebuild_swapchain_keeps_the_backbuffer_identity() {
    let (mut device, backend, mut swapchain) = setup(DeviceConfig::default());

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_target_pass(&cmd, &swapchain.backbuffer).unwrap();
    device.end_render_pass(&cmd);
    device.end_frame_exp(&swapchain).unwrap();
    assert_eq!(backend.stats().live_framebuffers, 1);

    swapchain.window = WindowHandle::headless(512, 384);
    device.rebuild_swapchain(&swapchain).unwrap();
    assert!(device.has_render_target(&swapchain.backbuffer));
    assert_eq!(backend.stats().live_framebuffers, 0);
    assert_eq!(backend.stats().swapchain_recreations, 1);

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_target_pass(&cmd, &swapchain.backbuffer).unwrap();
    device.end_render_pass(&cmd);
    let raw = device.raw_command_buffer(&cmd);
    device.end_frame_exp(&swapchain).unwrap();

    match &backend.commands(raw)[0] {
        MockCommand::BeginRenderPass { width, height, .. } => assert_eq!((*width, *height), (512, 384)),
        other => panic!("expected a render pass begin, got {other:?}"),
    }
}

#[test]
fn test_unloading_a_swapchain_releases_its_sync_objects() {
    let (mut device, backend, swapchain) = setup(DeviceConfig::default());
    let base = backend.stats();
    assert_eq!(base.live_fences, 3);
    assert_eq!(base.live_semaphores, 6);

    device.begin_frame_exp(&swapchain).unwrap();
    device.end_frame_exp(&swapchain).unwrap();
    device.unload_swapchain(&swapchain).unwrap();

    let stats = backend.stats();
    assert!(!device.has_swapchain(&swapchain));
    assert!(!device.has_render_target(&swapchain.backbuffer));
    assert_eq!(stats.live_swapchains, 0);
    assert_eq!(stats.live_fences, 0);
    assert_eq!(stats.live_semaphores, 0);
}

struct BoundSet {
    uniforms: BufferHandle,
    set: DescriptorSetHandle,
    pipeline: GraphicsPipelineHandle,
}

fn bound_set(device: &mut Device<MockBackend>) -> BoundSet {
    let uniforms = BufferHandle::new(BufferUsage::UNIFORM, 64, true);
    let set = DescriptorSetHandle::new(vec![Descriptor::new(DescriptorType::Uniform, ShaderStage::VERTEX, 0)]);
    let mut pipeline = GraphicsPipelineHandle::new(Vec::new(), Vec::new());
    pipeline.descriptor_sets = vec![set.clone()];
    device.load_buffer(&uniforms).unwrap();
    device.load_descriptor_set(&set).unwrap();
    device.load_graphics_pipeline(&pipeline).unwrap();
    device.bind_buffer(&set, 0, &uniforms);
    BoundSet { uniforms, set, pipeline }
}

// Rebinds the uniform buffer, binds the set in a fresh frame and returns the replica used.
// The frame is ended by the caller.
fn rebind_in_new_frame(device: &mut Device<MockBackend>, swapchain: &SwapchainHandle, bound: &BoundSet) -> usize {
    device.bind_buffer(&bound.set, 0, &bound.uniforms);
    device.begin_frame_exp(swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.bind_descriptor_set(&cmd, &bound.pipeline, &bound.set, 0);
    let raw = device.raw_command_buffer(&cmd);
    device
        .backend()
        .commands(raw)
        .into_iter()
        .find_map(|command| match command {
            MockCommand::BindDescriptorSet { instance, .. } => Some(instance),
            _ => None,
        })
        .unwrap()
}

fn replicas_across_pending_frames(backbuffer_count: usize) -> (Vec<usize>, MockBackend) {
    let (backend, gpu) = MockBackend::manual();
    let mut device = Device::new(backend.clone(), DeviceConfig::default().with_backbuffer_count(backbuffer_count)).unwrap();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
    device.load_swapchain(&swapchain).unwrap();
    let bound = bound_set(&mut device);

    let mut instances = Vec::new();
    for _ in 0..backbuffer_count - 1 {
        instances.push(rebind_in_new_frame(&mut device, &swapchain, &bound));
        device.end_frame_exp(&swapchain).unwrap();
    }
    assert_eq!(gpu.pending(), backbuffer_count - 1);

    // Every earlier frame is still on the GPU while the last slot rewrites its replica.
    instances.push(rebind_in_new_frame(&mut device, &swapchain, &bound));
    assert_eq!(gpu.pending(), backbuffer_count - 1);
    assert!(gpu.complete_oldest());
    device.end_frame_exp(&swapchain).unwrap();

    gpu.complete_all();
    device.wait_idle().unwrap();
    (instances, backend)
}

#[test]
fn test_fourth_slot_gets_its_own_descriptor_replica() {
    let (instances, backend) = replicas_across_pending_frames(4);
    assert_eq!(instances, [0, 1, 2, 3]);
    assert_eq!(backend.stats().descriptor_writes, 4);
}

#[test]
fn test_descriptor_replicas_are_distinct_at_the_largest_backbuffer_count() {
    let (instances, backend) = replicas_across_pending_frames(8);
    assert_eq!(instances, (0..8).collect::<Vec<_>>());
    assert_eq!(backend.stats().descriptor_writes, 8);
}
