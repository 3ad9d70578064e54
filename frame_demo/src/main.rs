//! Frame loop demo
//!
//! Drives the RHI through a few frames on the software backend: loads a swapchain, uploads a
//! texture through a transfer list, clears the backbuffer every frame, resizes once and
//! reports what the render pass cache and the simulated GPU saw.
//!
//! Usage: `frame_demo [config.toml|config.ron] [frames]`

use rust_rhi::foundation::logging;
use rust_rhi::prelude::*;

const DEFAULT_FRAMES: u32 = 8;

/// Configuration from `path`, falling back to defaults. The second value says why the file
/// was rejected; it is logged once logging runs at the configured level.
fn load_config(path: Option<&str>) -> (DeviceConfig, Option<String>) {
    let Some(path) = path else {
        return (DeviceConfig::new("frame_demo"), None);
    };
    match DeviceConfig::load_validated(path) {
        Ok(config) => (config, None),
        Err(err) => (DeviceConfig::new("frame_demo"), Some(format!("Failed to load {path}: {err}"))),
    }
}

fn upload_checkerboard(device: &mut Device<MockBackend>, texture: &mut TextureHandle) -> RhiResult<()> {
    let width = texture.width;
    let texels: Vec<u32> = (0..width * texture.height)
        .map(|i| if ((i % width) / 8 + (i / width) / 8) % 2 == 0 { 0xFFFF_FFFF } else { 0xFF00_0000 })
        .collect();

    let staging = BufferHandle::new(BufferUsage::TRANSFER_SRC, texture.size, true);
    device.load_buffer(&staging)?;
    device.set_name(&staging, "checkerboard staging");
    device.write_buffer(&staging, 0, &texels)?;

    let cmd = device.begin_transfer_list()?;
    device.copy_buffer_to_texture(&cmd, &staging, texture, 0)?;
    device.queue_submit(QueueType::Transfer, &cmd)?;

    device.unload_buffer(&staging);
    log::info!("Uploaded {}x{} checkerboard", texture.width, texture.height);
    Ok(())
}

fn draw_frame(device: &mut Device<MockBackend>, swapchain: &SwapchainHandle) -> RhiResult<()> {
    let image = device.begin_frame_exp(swapchain)?;
    let cmd = device.begin_command_list_exp()?;

    device.begin_render_target_pass(&cmd, &swapchain.backbuffer)?;
    device.bind_viewports(&cmd, &[Viewport::new(swapchain.window.width, swapchain.window.height)]);
    device.bind_scissor_rects(&cmd, &[Rect::new(swapchain.window.width, swapchain.window.height)]);
    device.end_render_pass(&cmd);

    device.end_frame_exp(swapchain)?;
    log::debug!("Presented image {image}");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let (config, rejected) = load_config(args.get(1).map(String::as_str));
    let frames = args.get(2).and_then(|arg| arg.parse().ok()).unwrap_or(DEFAULT_FRAMES);

    logging::init_with_level(&config.log_level);
    if let Some(reason) = rejected {
        log::warn!("{reason}; using defaults");
    }
    log::info!("Starting frame demo ({frames} frames, {} in flight)", config.backbuffer_count);

    let backend = MockBackend::new();
    let mut device = Device::new(backend.clone(), config)?;
    log::info!("Adapter: {}", device.adapter_info().name);

    let mut swapchain = SwapchainHandle::new(WindowHandle::headless(640, 480));
    device.load_swapchain(&swapchain)?;

    let mut texture = TextureHandle::new_2d(64, 64, Format::R8G8B8A8Unorm, TextureUsage::SRV);
    device.load_texture(&texture)?;
    device.set_name(&texture, "checkerboard");
    upload_checkerboard(&mut device, &mut texture)?;

    for frame in 0..frames {
        if frame == frames / 2 {
            swapchain.window = WindowHandle::headless(800, 600);
            device.rebuild_swapchain(&swapchain)?;
        }
        draw_frame(&mut device, &swapchain)?;
    }

    device.wait_idle()?;
    let stats = backend.stats();
    log::info!(
        "Done: {} render passes and {} framebuffers created, {} submissions, {} presents",
        stats.render_passes_created,
        stats.framebuffers_created,
        stats.submits,
        stats.presents
    );

    device.unload_texture(&texture);
    device.unload_swapchain(&swapchain)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_falls_back_with_a_reason() {
        let (config, rejected) = load_config(Some("does/not/exist.toml"));
        assert_eq!(config.application_name, "frame_demo");
        assert!(rejected.unwrap().contains("does/not/exist.toml"));
    }

    #[test]
    fn test_shipped_config_loads_cleanly() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/device.toml");
        let (config, rejected) = load_config(Some(path));
        assert!(rejected.is_none());
        assert_eq!(config.backbuffer_count, 3);
    }

    #[test]
    fn test_no_path_uses_defaults() {
        let (config, rejected) = load_config(None);
        assert!(rejected.is_none());
        assert_eq!(config.application_name, "frame_demo");
    }
}
