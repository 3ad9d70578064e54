//! Command recording, transfer lists and layout transitions

use rust_rhi::backend::mock::MockCommand;
use rust_rhi::rhi::barrier::PipelineStage;
use rust_rhi::prelude::*;

fn device() -> Device<MockBackend> {
    Device::new(MockBackend::new(), DeviceConfig::default()).unwrap()
}

#[test]
fn test_transfer_list_submits_without_sync_and_waits() {
    let mut device = device();
    let src = BufferHandle::new(BufferUsage::TRANSFER_SRC, 128, true);
    let dst = BufferHandle::new(BufferUsage::TRANSFER_DST | BufferUsage::VERTEX, 256, false);
    device.load_buffer(&src).unwrap();
    device.load_buffer(&dst).unwrap();

    let cmd = device.begin_transfer_list().unwrap();
    assert!(cmd.transfer);
    device.copy_buffer(&cmd, &src, &dst);
    let raw = device.raw_command_buffer(&cmd);
    let idle_waits = device.backend().stats().idle_waits;
    device.queue_submit(QueueType::Transfer, &cmd).unwrap();

    match &device.backend().commands(raw)[..] {
        [MockCommand::CopyBuffer { size, .. }] => assert_eq!(*size, 128),
        other => panic!("expected one buffer copy, got {other:?}"),
    }

    let submissions = device.backend().submissions();
    let last = submissions.last().unwrap();
    assert_eq!(last.queue, QueueType::Transfer);
    assert_eq!(last.command_buffers, [raw]);
    assert_eq!((last.wait, last.signal, last.fence), (None, None, None));
    assert_eq!(device.backend().stats().idle_waits, idle_waits + 1);
}

#[test]
fn test_transfer_pool_is_created_once_and_reset() {
    let mut device = device();
    let before = device.backend().stats();

    for _ in 0..3 {
        let cmd = device.begin_transfer_list().unwrap();
        device.queue_submit(QueueType::Transfer, &cmd).unwrap();
    }

    let after = device.backend().stats();
    assert_eq!(after.command_pools_created - before.command_pools_created, 1);
    assert_eq!(after.pool_resets - before.pool_resets, 2);
}

#[test]
fn test_transfer_list_records_and_waits_on_the_transfer_family() {
    let mut device = device();
    let families = device.queue_families();
    assert_ne!(families.transfer, families.graphics);

    let cmd = device.begin_transfer_list().unwrap();
    device.queue_submit(QueueType::Transfer, &cmd).unwrap();

    let last = device.backend().submissions().pop().unwrap();
    assert_eq!(last.queue, QueueType::Transfer);
    assert_eq!(device.backend().queues_waited_idle(), vec![QueueType::Transfer]);
}

#[test]
#[should_panic(expected = "transfer lists are recorded on family 2 and cannot be submitted to the graphics queue")]
fn test_transfer_list_cannot_go_to_another_family() {
    let mut device = device();
    let cmd = device.begin_transfer_list().unwrap();
    device.queue_submit(QueueType::Graphics, &cmd).unwrap();
}

#[test]
fn test_transfer_barriers_use_copy_stages_only() {
    let mut device = device();
    let staging = BufferHandle::new(BufferUsage::TRANSFER_SRC, 8 * 8 * 4, true);
    let mut texture = TextureHandle::new_2d(8, 8, Format::R8G8B8A8Unorm, TextureUsage::SRV);
    device.load_buffer(&staging).unwrap();
    device.load_texture(&texture).unwrap();

    let cmd = device.begin_transfer_list().unwrap();
    device.copy_buffer_to_texture(&cmd, &staging, &mut texture, 0).unwrap();
    let raw = device.raw_command_buffer(&cmd);
    device.queue_submit(QueueType::Transfer, &cmd).unwrap();

    let copy_stages = PipelineStage::TOP_OF_PIPE | PipelineStage::TRANSFER | PipelineStage::BOTTOM_OF_PIPE;
    let barriers: Vec<_> = device
        .backend()
        .commands(raw)
        .into_iter()
        .filter_map(|command| match command {
            MockCommand::TextureBarrier { barrier, .. } => Some(barrier),
            _ => None,
        })
        .collect();
    assert_eq!(barriers.len(), 2);
    for barrier in &barriers {
        assert!(copy_stages.contains(barrier.src_stage | barrier.dst_stage), "{barrier:?}");
    }
    assert_eq!(barriers[1].new_layout, ImageLayout::ShaderResource);
    assert_eq!(barriers[1].dst_stage, PipelineStage::BOTTOM_OF_PIPE);
}

#[test]
#[should_panic(expected = "already recording")]
fn test_one_transfer_list_at_a_time() {
    let mut device = device();
    device.begin_transfer_list().unwrap();
    device.begin_transfer_list().unwrap();
}

#[test]
#[should_panic(expected = "overflows buffer")]
fn test_copy_into_a_smaller_buffer_panics() {
    let mut device = device();
    let src = BufferHandle::new(BufferUsage::TRANSFER_SRC, 256, true);
    let dst = BufferHandle::new(BufferUsage::TRANSFER_DST, 64, false);
    device.load_buffer(&src).unwrap();
    device.load_buffer(&dst).unwrap();

    let cmd = device.begin_transfer_list().unwrap();
    device.copy_buffer(&cmd, &src, &dst);
}

#[test]
fn test_upload_leaves_the_texture_readable() {
    let mut device = device();
    let staging = BufferHandle::new(BufferUsage::TRANSFER_SRC, 16 * 16 * 4, true);
    let mut texture = TextureHandle::new_2d(16, 16, Format::R8G8B8A8Unorm, TextureUsage::SRV);
    device.load_buffer(&staging).unwrap();
    device.load_texture(&texture).unwrap();

    let cmd = device.begin_transfer_list().unwrap();
    device.copy_buffer_to_texture(&cmd, &staging, &mut texture, 0).unwrap();
    let raw = device.raw_command_buffer(&cmd);
    device.queue_submit(QueueType::Transfer, &cmd).unwrap();
    assert_eq!(texture.layout, ImageLayout::ShaderResource);

    let layouts: Vec<(ImageLayout, ImageLayout)> = device
        .backend()
        .commands(raw)
        .into_iter()
        .filter_map(|command| match command {
            MockCommand::TextureBarrier { barrier, .. } => Some((barrier.old_layout, barrier.new_layout)),
            _ => None,
        })
        .collect();
    assert_eq!(
        layouts,
        [
            (ImageLayout::Undefined, ImageLayout::TransferDst),
            (ImageLayout::TransferDst, ImageLayout::ShaderResource)
        ]
    );

    // A second upload would start from ShaderResource, which the upload path refuses.
    let cmd = device.begin_transfer_list().unwrap();
    let err = device.copy_buffer_to_texture(&cmd, &staging, &mut texture, 0).unwrap_err();
    assert!(matches!(
        err,
        RhiError::UnsupportedLayoutTransition { from: ImageLayout::ShaderResource, to: ImageLayout::TransferDst }
    ));
    assert_eq!(texture.layout, ImageLayout::ShaderResource);
    device.queue_submit(QueueType::Transfer, &cmd).unwrap();
}

#[test]
fn test_barrier_tracks_the_layout_and_refuses_undefined() {
    let mut device = device();
    let mut texture = TextureHandle::new_2d(8, 8, Format::R8G8B8A8Unorm, TextureUsage::SRV | TextureUsage::RTV);
    device.load_texture(&texture).unwrap();

    let cmd = device.begin_transfer_list().unwrap();
    device.barrier(&cmd, &mut texture, ImageLayout::RenderTarget).unwrap();
    assert_eq!(texture.layout, ImageLayout::RenderTarget);
    device.barrier(&cmd, &mut texture, ImageLayout::ShaderResource).unwrap();
    assert_eq!(texture.layout, ImageLayout::ShaderResource);

    let err = device.barrier(&cmd, &mut texture, ImageLayout::Undefined).unwrap_err();
    assert!(matches!(err, RhiError::UnsupportedLayoutTransition { to: ImageLayout::Undefined, .. }));
    assert_eq!(texture.layout, ImageLayout::ShaderResource);
    device.queue_submit(QueueType::Transfer, &cmd).unwrap();
}

#[test]
fn test_draw_records_in_call_order() {
    let mut device = device();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(128, 128));
    device.load_swapchain(&swapchain).unwrap();

    let vertices = BufferHandle::new(BufferUsage::VERTEX, 1024, false);
    let indices = BufferHandle::new(BufferUsage::INDEX, 256, false);
    let pipeline = GraphicsPipelineHandle::new(Vec::new(), Vec::new());
    device.load_buffer(&vertices).unwrap();
    device.load_buffer(&indices).unwrap();
    device.load_graphics_pipeline(&pipeline).unwrap();

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    device.begin_render_target_pass(&cmd, &swapchain.backbuffer).unwrap();
    device.bind_viewports(&cmd, &[Viewport::new(128, 128)]);
    device.bind_scissor_rects(&cmd, &[Rect::new(128, 128)]);
    device.bind_pipeline_state(&cmd, &pipeline);
    device.bind_vertex_buffer(&cmd, &vertices, 0);
    device.bind_index_buffer(&cmd, &indices, 16, IndexFormat::Index16);
    device.draw_indexed(&cmd, 36, 0, 0);
    device.end_render_pass(&cmd);
    let raw = device.raw_command_buffer(&cmd);
    device.end_frame_exp(&swapchain).unwrap();

    let commands = device.backend().commands(raw);
    assert_eq!(commands.len(), 8);
    assert!(matches!(commands[0], MockCommand::BeginRenderPass { .. }));
    assert_eq!(commands[1], MockCommand::SetViewports(vec![Viewport::new(128, 128)]));
    assert_eq!(commands[2], MockCommand::SetScissors(vec![Rect::new(128, 128)]));
    assert!(matches!(commands[3], MockCommand::BindGraphicsPipeline(_)));
    assert!(matches!(commands[4], MockCommand::BindVertexBuffer { slot: 0, .. }));
    assert!(matches!(
        commands[5],
        MockCommand::BindIndexBuffer { offset: 16, format: IndexFormat::Index16, .. }
    ));
    assert_eq!(commands[6], MockCommand::DrawIndexed { index_count: 36, first_index: 0, vertex_offset: 0 });
    assert_eq!(commands[7], MockCommand::EndRenderPass);
}

#[test]
#[should_panic(expected = "is not a loaded swapchain backbuffer")]
fn test_offscreen_targets_have_no_default_pass() {
    let mut device = device();
    let swapchain = SwapchainHandle::new(WindowHandle::headless(32, 32));
    device.load_swapchain(&swapchain).unwrap();
    let target = RenderTargetHandle::default();
    device.load_render_target(&target).unwrap();

    device.begin_frame_exp(&swapchain).unwrap();
    let cmd = device.begin_command_list_exp().unwrap();
    let _ = device.begin_render_target_pass(&cmd, &target);
}
