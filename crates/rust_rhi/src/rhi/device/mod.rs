//! Device facade
//!
//! [`Device`] is the single entry point of the RHI. It owns every resource table, the
//! render pass / framebuffer cache, one [`SwapchainContext`] per loaded swapchain and the
//! synchronous transfer list. Handles are plain descriptors; the device maps their ids to
//! backend objects.
//!
//! Contract violations (id 0, double load, unloading or using a handle that is not loaded,
//! recording outside a frame) panic. Backend failures are returned as [`RhiError`].

mod frame;
mod load;
mod mapping;
mod record;

pub use mapping::BufferMapping;

use crate::backend::{Backend, DebugObject, RawCommandBuffer, RawCommandPool, RawFramebuffer, RawImageView};
use crate::config::{ConfigError, DeviceConfig};
use crate::foundation::collections::IdArena;
use crate::foundation::id::{HandleId, INVALID_ID};
use crate::rhi::adapter::{AdapterInfo, QueueFamilies};
use crate::rhi::commands::CommandList;
use crate::rhi::error::{RhiError, RhiResult};
use crate::rhi::fbo_cache::FboCache;
use crate::rhi::handles::{BufferHandle, RenderPassHandle, SwapchainHandle, TextureHandle};
use crate::rhi::resources::{ResourceTables, Retired};
use crate::rhi::swapchain::SwapchainContext;
use crate::rhi::types::ResourceView;
use std::collections::HashMap;

/// A loaded swapchain and its frame state
pub(crate) struct LoadedSwapchain<B: Backend> {
    pub(crate) native: B::Swapchain,
    pub(crate) context: SwapchainContext<B>,
    pub(crate) handle: SwapchainHandle,
}

/// The one-shot transfer list
#[derive(Debug, Default)]
struct TransferList {
    pool: Option<RawCommandPool>,
    buffer: RawCommandBuffer,
    recording: bool,
}

/// Resource a debug name can be attached to
#[derive(Debug, Clone, Copy)]
pub enum Named<'a> {
    /// Buffer
    Buffer(&'a BufferHandle),
    /// Texture, its sampler and its views
    Texture(&'a TextureHandle),
    /// Explicit render pass
    RenderPass(&'a RenderPassHandle),
}

impl<'a> From<&'a BufferHandle> for Named<'a> {
    fn from(handle: &'a BufferHandle) -> Self {
        Self::Buffer(handle)
    }
}

impl<'a> From<&'a TextureHandle> for Named<'a> {
    fn from(handle: &'a TextureHandle) -> Self {
        Self::Texture(handle)
    }
}

impl<'a> From<&'a RenderPassHandle> for Named<'a> {
    fn from(handle: &'a RenderPassHandle) -> Self {
        Self::RenderPass(handle)
    }
}

/// Logical GPU device
pub struct Device<B: Backend> {
    backend: B,
    config: DeviceConfig,
    families: QueueFamilies,
    image_count: u32,
    tables: ResourceTables<B>,
    fbo_cache: FboCache,
    swapchains: IdArena<LoadedSwapchain<B>>,
    /// Backbuffer render target id -> swapchain id
    backbuffers: HashMap<HandleId, HandleId>,
    /// Swapchain of the most recent `begin_frame_exp`
    current_swapchain: Option<HandleId>,
    transfer: TransferList,
}

fn expect_valid(id: HandleId, kind: &str) {
    assert_ne!(id, INVALID_ID, "{kind} handle has the invalid id 0");
}

fn not_loaded(kind: &str, id: HandleId) -> ! {
    panic!("{kind} {id} is not loaded")
}

impl<B: Backend> Device<B> {
    /// Create a device over `backend`
    pub fn new(backend: B, config: DeviceConfig) -> RhiResult<Self> {
        config.validate().map_err(|e| RhiError::Config(ConfigError::Invalid(e)))?;
        let image_count = u32::try_from(config.backbuffer_count)
            .map_err(|_| RhiError::Config(ConfigError::Invalid("backbuffer_count out of range".to_string())))?;

        let adapter = backend.adapter_info();
        let families = backend.queue_families();
        log::info!(
            "Created device '{}' on {} ({:?}): {} frame(s) in flight, queue families {:?}",
            config.application_name,
            adapter.name,
            adapter.adapter_type,
            config.backbuffer_count,
            families
        );

        Ok(Self {
            backend,
            config,
            families,
            image_count,
            tables: ResourceTables::new(),
            fbo_cache: FboCache::new(),
            swapchains: IdArena::new(),
            backbuffers: HashMap::new(),
            current_swapchain: None,
            transfer: TransferList::default(),
        })
    }

    /// Backend the device runs on
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Configuration the device was created with
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Adapter the device runs on
    pub fn adapter_info(&self) -> AdapterInfo {
        self.backend.adapter_info()
    }

    /// Queue families in use
    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    /// Render pass / framebuffer cache
    pub fn fbo_cache(&self) -> &FboCache {
        &self.fbo_cache
    }

    /// Retire cached render passes no framebuffer references anymore. Returns how many were
    /// evicted.
    pub fn trim_render_pass_cache(&mut self) -> usize {
        let evicted = self.fbo_cache.evict_unreferenced_render_passes();
        let count = evicted.len();
        for render_pass in evicted {
            self.retire(Retired::RenderPass(render_pass));
        }
        if count > 0 {
            log::debug!("Trimmed {count} unreferenced render pass(es) from the cache");
        }
        count
    }

    /// Frame state of a loaded swapchain
    pub fn swapchain_context(&self, handle: &SwapchainHandle) -> &SwapchainContext<B> {
        match self.swapchains.get(handle.id) {
            Some(swapchain) => &swapchain.context,
            None => not_loaded("swapchain", handle.id),
        }
    }

    /// Unloaded objects still waiting for the GPU
    pub fn pending_destruction(&self) -> usize {
        self.swapchains.values().map(|swapchain| swapchain.context.pending_retired()).sum()
    }

    /// Native command buffer a list records into
    pub fn raw_command_buffer(&self, cmd: &CommandList) -> RawCommandBuffer {
        if cmd.transfer {
            assert!(self.transfer.recording, "transfer list is not recording");
            return self.transfer.buffer;
        }
        let swapchain = self
            .backbuffers
            .get(&cmd.backbuffer_id)
            .and_then(|id| self.swapchains.get(*id))
            .unwrap_or_else(|| panic!("command list {} belongs to unknown backbuffer {}", cmd.id, cmd.backbuffer_id));
        swapchain.context.command_buffer(cmd.id)
    }

    /// Destroy `object` once the current frame has completed, or now when nothing is in flight
    fn retire(&mut self, object: Retired<B>) {
        let context = self
            .current_swapchain
            .and_then(|id| self.swapchains.get_mut(id))
            .map(|swapchain| &mut swapchain.context);
        match context {
            Some(context) if self.config.deferred_destruction => context.retire(object),
            _ => object.release(&self.backend),
        }
    }

    fn retire_framebuffers(&mut self, framebuffers: Vec<RawFramebuffer>) {
        if !framebuffers.is_empty() {
            log::debug!("Evicted {} cached framebuffer(s)", framebuffers.len());
        }
        for framebuffer in framebuffers {
            self.retire(Retired::Framebuffer(framebuffer));
        }
    }

    /// Evict cached framebuffers built on any of `views`
    fn evict_views(&mut self, views: &[RawImageView]) -> Vec<RawFramebuffer> {
        views.iter().flat_map(|&view| self.fbo_cache.evict_view(view)).collect()
    }

    fn texture_views(&self, texture: &B::Texture) -> Vec<RawImageView> {
        [ResourceView::Srv, ResourceView::Uav, ResourceView::Rtv, ResourceView::Dsv]
            .into_iter()
            .filter_map(|view| self.backend.texture_view(texture, view))
            .collect()
    }

    /// Attach a debug name. Textures also name their sampler and views
    /// (`"<name> - Sampler"`, `" - RTV"`, `" - SRV"`, `" - DSV"`, `" - UAV"`).
    pub fn set_name<'a>(&self, target: impl Into<Named<'a>>, name: &str) {
        if !self.config.debug_names {
            return;
        }

        match target.into() {
            Named::Buffer(handle) => {
                let buffer = self.tables.buffers.get(handle.id).unwrap_or_else(|| not_loaded("buffer", handle.id));
                self.backend.set_debug_name(DebugObject::Buffer(buffer), name);
            }
            Named::Texture(handle) => {
                let texture = self.tables.textures.get(handle.id).unwrap_or_else(|| not_loaded("texture", handle.id));
                self.backend.set_debug_name(DebugObject::Image(texture), name);
                self.backend.set_debug_name(DebugObject::Sampler(texture), &format!("{name} - Sampler"));
                for (view, suffix) in [
                    (ResourceView::Rtv, "RTV"),
                    (ResourceView::Srv, "SRV"),
                    (ResourceView::Dsv, "DSV"),
                    (ResourceView::Uav, "UAV"),
                ] {
                    if let Some(raw) = self.backend.texture_view(texture, view) {
                        self.backend.set_debug_name(DebugObject::View(raw), &format!("{name} - {suffix}"));
                    }
                }
            }
            Named::RenderPass(handle) => {
                let render_pass =
                    self.tables.render_passes.get(handle.id).unwrap_or_else(|| not_loaded("render pass", handle.id));
                self.backend.set_debug_name(DebugObject::RenderPass(render_pass.native), name);
            }
        }
    }

    /// Block until the GPU is idle, then destroy every retired object
    pub fn wait_idle(&mut self) -> RhiResult<()> {
        self.backend.device_wait_idle()?;
        let released: usize = self
            .swapchains
            .values_mut()
            .map(|swapchain| swapchain.context.release_retired(&self.backend))
            .sum();
        if released > 0 {
            log::debug!("wait_idle released {released} retired object(s)");
        }
        Ok(())
    }
}

impl<B: Backend> Drop for Device<B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.device_wait_idle() {
            log::warn!("Device wait idle failed during shutdown: {err}");
        }

        let mut natives = Vec::with_capacity(self.swapchains.len());
        for (_, swapchain) in self.swapchains.drain() {
            swapchain.context.destroy(&self.backend);
            natives.push(swapchain.native);
        }
        self.backbuffers.clear();
        self.current_swapchain = None;

        if let Some(pool) = self.transfer.pool.take() {
            self.backend.destroy_command_pool(pool);
        }

        self.fbo_cache.reset(&self.backend);
        self.tables.clear(&self.backend);
        // Backbuffer render targets are gone, so the swapchains can follow.
        drop(natives);

        log::info!("Device '{}' destroyed", self.config.application_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockCommand};
    use crate::rhi::commands::QueueType;
    use crate::rhi::handles::{
        Descriptor, DescriptorSetHandle, DescriptorType, GraphicsPipelineHandle, LoadOp, RenderPassAttachment,
        WindowHandle,
    };
    use crate::rhi::types::{BufferUsage, Format, ImageLayout, ShaderStage, TextureUsage};

    fn device(config: DeviceConfig) -> Device<MockBackend> {
        Device::new(MockBackend::new(), config).unwrap()
    }

    fn frame(device: &mut Device<MockBackend>, swapchain: &SwapchainHandle) {
        device.begin_frame_exp(swapchain).unwrap();
        device.end_frame_exp(swapchain).unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DeviceConfig::default().with_backbuffer_count(1);
        assert!(matches!(Device::new(MockBackend::new(), config), Err(RhiError::Config(_))));
    }

    #[test]
    fn test_set_name_labels_sampler_and_views() {
        let mut device = device(DeviceConfig::default());
        let texture = TextureHandle::new_2d(8, 8, Format::R8G8B8A8Unorm, TextureUsage::SRV | TextureUsage::RTV);
        device.load_texture(&texture).unwrap();
        device.set_name(&texture, "albedo");

        let loaded = device.tables.textures.get(texture.id).unwrap();
        let backend = device.backend();
        let srv = backend.texture_view(loaded, ResourceView::Srv).unwrap();
        let rtv = backend.texture_view(loaded, ResourceView::Rtv).unwrap();
        assert_eq!(backend.debug_name(loaded.id()).as_deref(), Some("albedo"));
        assert_eq!(backend.debug_name(loaded.sampler()).as_deref(), Some("albedo - Sampler"));
        assert_eq!(backend.debug_name(srv.as_raw()).as_deref(), Some("albedo - SRV"));
        assert_eq!(backend.debug_name(rtv.as_raw()).as_deref(), Some("albedo - RTV"));
    }

    #[test]
    fn test_set_name_is_ignored_when_disabled() {
        let mut device = device(DeviceConfig::default().with_debug_names(false));
        let buffer = BufferHandle::new(BufferUsage::VERTEX, 16, false);
        device.load_buffer(&buffer).unwrap();
        device.set_name(&buffer, "vertices");

        let loaded = device.tables.buffers.get(buffer.id).unwrap();
        assert_eq!(device.backend().debug_name(loaded.id()), None);
    }

    #[test]
    fn test_unload_without_a_frame_releases_immediately() {
        let mut device = device(DeviceConfig::default());
        let buffer = BufferHandle::new(BufferUsage::UNIFORM, 64, true);
        device.load_buffer(&buffer).unwrap();
        device.unload_buffer(&buffer);

        assert!(!device.has_buffer(&buffer));
        assert_eq!(device.pending_destruction(), 0);
        assert_eq!(device.backend().stats().live_buffers, 0);
    }

    #[test]
    fn test_unload_waits_for_the_slot_fence() {
        let mut device = device(DeviceConfig::default());
        let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
        device.load_swapchain(&swapchain).unwrap();
        let buffer = BufferHandle::new(BufferUsage::VERTEX, 64, false);
        device.load_buffer(&buffer).unwrap();

        device.begin_frame_exp(&swapchain).unwrap();
        device.unload_buffer(&buffer);
        device.end_frame_exp(&swapchain).unwrap();
        assert!(!device.has_buffer(&buffer));
        assert_eq!(device.pending_destruction(), 1);

        // Slot 0 is waited on when the third frame fills the ring.
        frame(&mut device, &swapchain);
        assert_eq!(device.backend().stats().live_buffers, 1);
        frame(&mut device, &swapchain);
        assert_eq!(device.pending_destruction(), 0);
        assert_eq!(device.backend().stats().live_buffers, 0);
    }

    #[test]
    fn test_deferred_destruction_can_be_disabled() {
        let mut device = device(DeviceConfig::default().with_deferred_destruction(false));
        let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
        device.load_swapchain(&swapchain).unwrap();
        let texture = TextureHandle::new_2d(4, 4, Format::R8G8B8A8Unorm, TextureUsage::SRV);
        device.load_texture(&texture).unwrap();

        frame(&mut device, &swapchain);
        device.unload_texture(&texture);
        assert_eq!(device.pending_destruction(), 0);
        assert_eq!(device.backend().stats().live_textures, 0);
    }

    #[test]
    fn test_wait_idle_drains_retired_objects() {
        let mut device = device(DeviceConfig::default());
        let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
        device.load_swapchain(&swapchain).unwrap();
        let buffer = BufferHandle::new(BufferUsage::INDEX, 32, false);
        device.load_buffer(&buffer).unwrap();

        frame(&mut device, &swapchain);
        device.unload_buffer(&buffer);
        assert_eq!(device.pending_destruction(), 1);

        device.wait_idle().unwrap();
        assert_eq!(device.pending_destruction(), 0);
        assert_eq!(device.backend().stats().live_buffers, 0);
    }

    #[test]
    fn test_resize_texture_evicts_framebuffers_and_dirties_sets() {
        let mut device = device(DeviceConfig::default());
        let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
        device.load_swapchain(&swapchain).unwrap();

        let mut target = TextureHandle::new_2d(32, 32, Format::R8G8B8A8Unorm, TextureUsage::RTV | TextureUsage::SRV);
        device.load_texture(&target).unwrap();
        let render_pass = RenderPassHandle::new().with_color(RenderPassAttachment::color(target, LoadOp::Clear));
        device.load_render_pass(&render_pass).unwrap();

        let set = DescriptorSetHandle::new(vec![Descriptor::new(DescriptorType::Sampler, ShaderStage::PIXEL, 1)]);
        device.load_descriptor_set(&set).unwrap();
        device.bind_texture(&set, 1, &target);
        let pipeline = GraphicsPipelineHandle::default();
        device.load_graphics_pipeline(&pipeline).unwrap();

        device.begin_frame_exp(&swapchain).unwrap();
        let cmd = device.begin_command_list_exp().unwrap();
        device.begin_render_pass(&cmd, &render_pass).unwrap();
        device.end_render_pass(&cmd);
        device.bind_descriptor_set(&cmd, &pipeline, &set, 0);
        device.end_frame_exp(&swapchain).unwrap();

        assert_eq!(device.fbo_cache().framebuffer_count(), 1);
        assert!(!device.tables.descriptor_sets.get(set.id).unwrap().bindings.is_dirty(0));

        device.resize_texture(&mut target, 128, 64).unwrap();
        assert_eq!((target.width, target.height), (128, 64));
        assert_eq!(target.layout, ImageLayout::Undefined);
        assert_eq!(device.fbo_cache().framebuffer_count(), 0);
        assert!(device.tables.descriptor_sets.get(set.id).unwrap().bindings.is_dirty(0));

        device.wait_idle().unwrap();
        assert_eq!(device.backend().stats().live_textures, 1);
        assert_eq!(device.backend().stats().live_framebuffers, 0);
    }

    #[test]
    fn test_upload_records_one_region_per_layer() {
        let mut device = device(DeviceConfig::default());
        let staging = BufferHandle::new(BufferUsage::TRANSFER_SRC, 6 * 64, true);
        let mut cube = TextureHandle::new_cube(4, Format::R8G8B8A8Unorm, TextureUsage::SRV);
        device.load_buffer(&staging).unwrap();
        device.load_texture(&cube).unwrap();

        let cmd = device.begin_transfer_list().unwrap();
        device.copy_buffer_to_texture(&cmd, &staging, &mut cube, 64).unwrap();
        assert_eq!(cube.layout, ImageLayout::ShaderResource);

        let commands = device.backend().commands(device.raw_command_buffer(&cmd));
        assert_eq!(commands.len(), 3);
        match &commands[1] {
            MockCommand::CopyBufferToTexture { regions, .. } => {
                let offsets: Vec<u64> = regions.iter().map(|region| region.buffer_offset).collect();
                assert_eq!(offsets, vec![0, 64, 128, 192, 256, 320]);
            }
            other => panic!("expected a buffer to texture copy, got {other:?}"),
        }

        // The texture is no longer Undefined, so a second upload has no recipe.
        let err = device.copy_buffer_to_texture(&cmd, &staging, &mut cube, 64).unwrap_err();
        assert!(matches!(
            err,
            RhiError::UnsupportedLayoutTransition { from: ImageLayout::ShaderResource, to: ImageLayout::TransferDst }
        ));
        device.queue_submit(QueueType::Transfer, &cmd).unwrap();
    }

    #[test]
    fn test_trim_releases_unreferenced_cached_passes() {
        let mut device = device(DeviceConfig::default());
        let pipeline = GraphicsPipelineHandle::default();
        device.load_graphics_pipeline(&pipeline).unwrap();
        assert_eq!(device.fbo_cache().render_pass_count(), 1);

        assert_eq!(device.trim_render_pass_cache(), 1);
        assert_eq!(device.fbo_cache().render_pass_count(), 0);
        assert_eq!(device.backend().stats().render_passes_destroyed, 1);
    }

    #[test]
    fn test_drop_releases_everything() {
        let backend = MockBackend::new();
        let observer = backend.clone();
        {
            let mut device = Device::new(backend, DeviceConfig::default()).unwrap();
            let swapchain = SwapchainHandle::new(WindowHandle::headless(64, 64));
            device.load_swapchain(&swapchain).unwrap();
            device.load_buffer(&BufferHandle::new(BufferUsage::VERTEX, 16, false)).unwrap();
            device.begin_frame_exp(&swapchain).unwrap();
            let cmd = device.begin_command_list_exp().unwrap();
            device.begin_render_target_pass(&cmd, &swapchain.backbuffer).unwrap();
            device.end_render_pass(&cmd);
            device.end_frame_exp(&swapchain).unwrap();
            device.begin_transfer_list().unwrap();
        }

        let stats = observer.stats();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.live_swapchains, 0);
        assert_eq!(stats.live_render_targets, 0);
        assert_eq!(stats.live_render_passes, 0);
        assert_eq!(stats.live_framebuffers, 0);
        assert_eq!(stats.live_command_pools, 0);
        assert_eq!(stats.live_semaphores, 0);
        assert_eq!(stats.live_fences, 0);
    }
}
