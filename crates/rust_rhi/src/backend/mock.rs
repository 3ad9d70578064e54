//! In-process backend
//!
//! [`MockBackend`] implements [`Backend`] without a GPU. It keeps every native object in a
//! shared table and checks the API contract a real driver's validation layer would check:
//!
//! - Binary semaphores move `Unsignaled -> (PendingSignal ->) Signaled -> Unsignaled`; a wait
//!   must find a signal to consume and a signal must find the semaphore unsignaled.
//! - Fences can only be submitted while unsignaled and only reset once the GPU is done.
//! - Command buffers move `Initial -> Recording -> Executable`; a pool in use by a pending
//!   submission cannot be reset or destroyed.
//! - Destroying an object that does not exist is a double free.
//!
//! By default submissions complete immediately. [`MockBackend::manual`] returns a
//! [`MockGpu`] that completes them one by one, possibly from another thread, which lets
//! tests observe the CPU blocking on a fence.

use crate::backend::{
    Backend, BackendBuffer, BoundResource, BufferTextureCopy, ClearValue, DebugObject, DescriptorWrite,
    FramebufferDesc, RawCommandBuffer, RawCommandPool, RawFence, RawFramebuffer, RawImageView, RawRenderPass,
    RawSemaphore, RenderPassBegin, RenderPassDesc, SubmitInfo, INFINITE_TIMEOUT,
};
use crate::rhi::adapter::{select_queue_families, AdapterInfo, AdapterType, QueueFamilies, QueueFamilyCaps};
use crate::rhi::barrier::{LayoutBarrier, PipelineStage};
use crate::rhi::commands::{QueueType, Rect, Viewport};
use crate::rhi::error::{RhiError, RhiResult};
use crate::rhi::handles::{
    BufferHandle, ComputePipelineHandle, DescriptorSetHandle, GraphicsPipelineHandle, TextureHandle,
    WindowHandle,
};
use crate::rhi::types::{IndexFormat, ResourceView, TextureUsage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Counters and live-object totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockStats {
    /// Render passes ever created
    pub render_passes_created: usize,
    /// Render passes destroyed
    pub render_passes_destroyed: usize,
    /// Framebuffers ever created
    pub framebuffers_created: usize,
    /// Framebuffers destroyed
    pub framebuffers_destroyed: usize,
    /// `update_descriptor_set` calls
    pub descriptor_writes: usize,
    /// Command pools ever created
    pub command_pools_created: usize,
    /// Command pool resets
    pub pool_resets: usize,
    /// Queue submissions
    pub submits: usize,
    /// Presents
    pub presents: usize,
    /// Image acquisitions
    pub acquires: usize,
    /// `wait_for_fence` calls
    pub fence_waits: usize,
    /// Queue or device idle waits
    pub idle_waits: usize,
    /// Swapchain recreations
    pub swapchain_recreations: usize,
    /// Live buffers
    pub live_buffers: usize,
    /// Live textures
    pub live_textures: usize,
    /// Live render targets
    pub live_render_targets: usize,
    /// Live swapchains
    pub live_swapchains: usize,
    /// Live descriptor sets
    pub live_descriptor_sets: usize,
    /// Live pipelines, compute and graphics
    pub live_pipelines: usize,
    /// Live render passes
    pub live_render_passes: usize,
    /// Live framebuffers
    pub live_framebuffers: usize,
    /// Live command pools
    pub live_command_pools: usize,
    /// Live semaphores
    pub live_semaphores: usize,
    /// Live fences
    pub live_fences: usize,
}

/// A recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    /// Render pass begin
    BeginRenderPass {
        /// Render pass
        render_pass: RawRenderPass,
        /// Framebuffer
        framebuffer: RawFramebuffer,
        /// Render area width
        width: u32,
        /// Render area height
        height: u32,
        /// Clear values
        clear_values: Vec<ClearValue>,
    },
    /// Render pass end
    EndRenderPass,
    /// Viewports
    SetViewports(Vec<Viewport>),
    /// Scissors
    SetScissors(Vec<Rect>),
    /// Vertex buffer bind
    BindVertexBuffer {
        /// Binding slot
        slot: u32,
        /// Buffer object
        buffer: u64,
    },
    /// Index buffer bind
    BindIndexBuffer {
        /// Buffer object
        buffer: u64,
        /// Byte offset
        offset: u64,
        /// Index width
        format: IndexFormat,
    },
    /// Descriptor set bind
    BindDescriptorSet {
        /// Set index
        index: u32,
        /// Descriptor set object
        set: u64,
        /// Replica
        instance: usize,
    },
    /// Graphics pipeline bind
    BindGraphicsPipeline(u64),
    /// Indexed draw
    DrawIndexed {
        /// Index count
        index_count: u32,
        /// First index
        first_index: u32,
        /// Added to each index
        vertex_offset: i32,
    },
    /// Buffer copy
    CopyBuffer {
        /// Source buffer object
        src: u64,
        /// Destination buffer object
        dst: u64,
        /// Bytes copied
        size: u64,
    },
    /// Buffer to texture copy
    CopyBufferToTexture {
        /// Source buffer object
        src: u64,
        /// Destination texture object
        dst: u64,
        /// Regions
        regions: Vec<BufferTextureCopy>,
    },
    /// Texture layout barrier
    TextureBarrier {
        /// Texture object
        texture: u64,
        /// Barrier
        barrier: LayoutBarrier,
    },
}

/// A submission as the queue saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSubmission {
    /// Queue
    pub queue: QueueType,
    /// Command buffers, in order
    pub command_buffers: Vec<RawCommandBuffer>,
    /// Waited semaphore and stage
    pub wait: Option<(RawSemaphore, PipelineStage)>,
    /// Signaled semaphore
    pub signal: Option<RawSemaphore>,
    /// Signaled fence
    pub fence: Option<RawFence>,
}

/// State of a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// Allocated or reset
    Initial,
    /// Between begin and end
    Recording,
    /// Ended, ready to submit
    Executable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SemaphoreState {
    Unsignaled,
    PendingSignal(u64),
    Signaled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Unsignaled,
    Pending(u64),
    Signaled,
}

#[derive(Debug)]
struct PoolRecord {
    family: u32,
    resettable_buffers: bool,
    buffers: Vec<u64>,
}

#[derive(Debug)]
struct CommandBufferRecord {
    pool: u64,
    state: CommandBufferState,
    commands: Vec<MockCommand>,
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    queue: QueueType,
    command_buffers: Vec<u64>,
    signal: Option<u64>,
    fence: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum ObjectKind {
    Buffer,
    Texture,
    RenderTarget,
    Swapchain,
    DescriptorSet,
    Pipeline,
}

#[derive(Debug, Default)]
struct State {
    next_object: u64,
    next_submission: u64,
    manual: bool,
    stats: MockStats,
    render_passes: HashMap<u64, RenderPassDesc>,
    framebuffers: HashMap<u64, FramebufferDesc>,
    pools: HashMap<u64, PoolRecord>,
    command_buffers: HashMap<u64, CommandBufferRecord>,
    semaphores: HashMap<u64, SemaphoreState>,
    fences: HashMap<u64, FenceState>,
    in_flight: VecDeque<InFlight>,
    submissions: Vec<MockSubmission>,
    idle_waited: Vec<QueueType>,
    command_pool_limit: Option<usize>,
    debug_names: HashMap<u64, String>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_object += 1;
        self.next_object
    }

    fn live(&mut self, kind: ObjectKind) -> &mut usize {
        match kind {
            ObjectKind::Buffer => &mut self.stats.live_buffers,
            ObjectKind::Texture => &mut self.stats.live_textures,
            ObjectKind::RenderTarget => &mut self.stats.live_render_targets,
            ObjectKind::Swapchain => &mut self.stats.live_swapchains,
            ObjectKind::DescriptorSet => &mut self.stats.live_descriptor_sets,
            ObjectKind::Pipeline => &mut self.stats.live_pipelines,
        }
    }

    fn is_pending(&self, command_buffer: u64) -> bool {
        self.in_flight.iter().any(|submission| submission.command_buffers.contains(&command_buffer))
    }

    // Whether a submission the GPU has not completed binds replica `instance` of `set`.
    fn replica_in_use(&self, set: u64, instance: usize) -> bool {
        self.in_flight
            .iter()
            .flat_map(|submission| &submission.command_buffers)
            .filter_map(|buffer| self.command_buffers.get(buffer))
            .flat_map(|record| &record.commands)
            .any(|command| {
                matches!(command, MockCommand::BindDescriptorSet { set: bound, instance: used, .. }
                    if *bound == set && *used == instance)
            })
    }

    fn complete(&mut self, submission: &InFlight) {
        if let Some(semaphore) = submission.signal {
            if let Some(state) = self.semaphores.get_mut(&semaphore) {
                if *state == SemaphoreState::PendingSignal(submission.id) {
                    *state = SemaphoreState::Signaled;
                }
            }
        }
        if let Some(fence) = submission.fence {
            if let Some(state) = self.fences.get_mut(&fence) {
                if *state == FenceState::Pending(submission.id) {
                    *state = FenceState::Signaled;
                }
            }
        }
    }

    fn record(&mut self, cmd: RawCommandBuffer, command: MockCommand) {
        match self.command_buffers.get_mut(&cmd.as_raw()) {
            Some(record) if record.state == CommandBufferState::Recording => record.commands.push(command),
            Some(record) => violation(&format!("recording into command buffer {cmd:?} in state {:?}", record.state)),
            None => violation(&format!("recording into unknown command buffer {cmd:?}")),
        }
    }
}

/// Contract violations panic, unless the thread is already unwinding from one.
fn violation(message: &str) {
    if std::thread::panicking() {
        log::error!("{message}");
    } else {
        panic!("{message}");
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    completed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete_where(&self, mut predicate: impl FnMut(&InFlight) -> bool) -> usize {
        let mut state = self.lock();
        let (done, remaining): (VecDeque<InFlight>, VecDeque<InFlight>) =
            std::mem::take(&mut state.in_flight).into_iter().partition(|submission| predicate(submission));
        state.in_flight = remaining;
        for submission in &done {
            state.complete(submission);
        }
        drop(state);
        self.completed.notify_all();
        done.len()
    }
}

/// Live-object token; decrements the live counter of its kind on drop
#[derive(Debug)]
struct Tracked {
    id: u64,
    kind: ObjectKind,
    shared: Arc<Shared>,
}

impl Tracked {
    fn new(shared: &Arc<Shared>, kind: ObjectKind) -> Self {
        let mut state = shared.lock();
        let id = state.allocate();
        *state.live(kind) += 1;
        Self { id, kind, shared: Arc::clone(shared) }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let live = state.live(self.kind);
        *live = live.saturating_sub(1);
    }
}

/// Buffer backed by host memory
#[derive(Debug)]
pub struct MockBuffer {
    tracked: Tracked,
    desc: BufferHandle,
    data: Vec<u8>,
    mapped: bool,
}

impl MockBuffer {
    /// Object id
    pub fn id(&self) -> u64 {
        self.tracked.id
    }

    /// Descriptor the buffer was created from
    pub fn desc(&self) -> &BufferHandle {
        &self.desc
    }

    /// Current contents
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl BackendBuffer for MockBuffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn mapped_bytes(&self) -> Option<&[u8]> {
        self.mapped.then_some(self.data.as_slice())
    }

    fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]> {
        if self.mapped {
            Some(&mut self.data)
        } else {
            None
        }
    }
}

/// Texture with one view per usage flag
#[derive(Debug)]
pub struct MockTexture {
    tracked: Tracked,
    sampler: u64,
    desc: TextureHandle,
    views: Vec<(ResourceView, RawImageView)>,
}

impl MockTexture {
    /// Object id of the image
    pub fn id(&self) -> u64 {
        self.tracked.id
    }

    /// Object id of the sampler
    pub fn sampler(&self) -> u64 {
        self.sampler
    }

    /// Descriptor the texture was created from
    pub fn desc(&self) -> &TextureHandle {
        &self.desc
    }
}

/// Render target: swapchain images or an empty offscreen target
#[derive(Debug)]
pub struct MockRenderTarget {
    tracked: Tracked,
    views: Vec<RawImageView>,
    extent: (u32, u32),
}

impl MockRenderTarget {
    /// Object id
    pub fn id(&self) -> u64 {
        self.tracked.id
    }
}

/// Swapchain handing out images round-robin
#[derive(Debug)]
pub struct MockSwapchain {
    tracked: Tracked,
    image_count: u32,
    extent: (u32, u32),
    next_image: AtomicU32,
}

impl MockSwapchain {
    /// Object id
    pub fn id(&self) -> u64 {
        self.tracked.id
    }

    /// Number of images
    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    /// Current image size
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }
}

/// Descriptor set replicas, each a binding → resource object table
#[derive(Debug)]
pub struct MockDescriptorSet {
    tracked: Tracked,
    layout: DescriptorSetHandle,
    instances: Vec<HashMap<u32, u64>>,
}

impl MockDescriptorSet {
    /// Object id
    pub fn id(&self) -> u64 {
        self.tracked.id
    }

    /// Resource object written at `binding` of replica `instance`
    pub fn binding(&self, instance: usize, binding: u32) -> Option<u64> {
        self.instances.get(instance).and_then(|bindings| bindings.get(&binding).copied())
    }

    /// Layout the set was created from
    pub fn layout(&self) -> &DescriptorSetHandle {
        &self.layout
    }
}

/// Compute pipeline
#[derive(Debug)]
pub struct MockComputePipeline {
    tracked: Tracked,
}

impl MockComputePipeline {
    /// Object id
    pub fn id(&self) -> u64 {
        self.tracked.id
    }
}

/// Graphics pipeline
#[derive(Debug)]
pub struct MockGraphicsPipeline {
    tracked: Tracked,
    render_pass: RawRenderPass,
}

impl MockGraphicsPipeline {
    /// Object id
    pub fn id(&self) -> u64 {
        self.tracked.id
    }

    /// Render pass the pipeline was created against
    pub fn render_pass(&self) -> RawRenderPass {
        self.render_pass
    }
}

/// Completes submissions of a manual-mode [`MockBackend`]
#[derive(Debug, Clone)]
pub struct MockGpu {
    shared: Arc<Shared>,
}

impl MockGpu {
    /// Complete the oldest pending submission. Returns false when nothing was pending.
    pub fn complete_oldest(&self) -> bool {
        let mut first = true;
        self.shared.complete_where(|_| std::mem::replace(&mut first, false)) == 1
    }

    /// Complete everything pending
    pub fn complete_all(&self) -> usize {
        self.shared.complete_where(|_| true)
    }

    /// Submissions the GPU has not completed yet
    pub fn pending(&self) -> usize {
        self.shared.lock().in_flight.len()
    }
}

/// Software backend. Clones share the same simulated GPU.
#[derive(Debug, Clone)]
pub struct MockBackend {
    shared: Arc<Shared>,
    families: QueueFamilies,
}

impl MockBackend {
    /// Backend whose submissions complete immediately
    pub fn new() -> Self {
        // A universal family, an async compute family and a copy-only family.
        let caps = [
            QueueFamilyCaps { index: 0, graphics: true, compute: true, transfer: true },
            QueueFamilyCaps { index: 1, graphics: false, compute: true, transfer: true },
            QueueFamilyCaps { index: 2, graphics: false, compute: false, transfer: true },
        ];
        let families = select_queue_families(&caps).unwrap_or(QueueFamilies { graphics: 0, compute: 0, transfer: 0 });
        Self { shared: Arc::default(), families }
    }

    /// Backend whose submissions stay pending until the returned [`MockGpu`] completes them
    pub fn manual() -> (Self, MockGpu) {
        let backend = Self::new();
        backend.shared.lock().manual = true;
        let gpu = MockGpu { shared: Arc::clone(&backend.shared) };
        (backend, gpu)
    }

    /// Counter snapshot
    pub fn stats(&self) -> MockStats {
        let state = self.shared.lock();
        MockStats {
            live_render_passes: state.render_passes.len(),
            live_framebuffers: state.framebuffers.len(),
            live_command_pools: state.pools.len(),
            live_semaphores: state.semaphores.len(),
            live_fences: state.fences.len(),
            ..state.stats
        }
    }

    /// Commands recorded into `cmd` since its last begin
    pub fn commands(&self, cmd: RawCommandBuffer) -> Vec<MockCommand> {
        self.shared
            .lock()
            .command_buffers
            .get(&cmd.as_raw())
            .map(|record| record.commands.clone())
            .unwrap_or_default()
    }

    /// State of `cmd`
    pub fn command_buffer_state(&self, cmd: RawCommandBuffer) -> Option<CommandBufferState> {
        self.shared.lock().command_buffers.get(&cmd.as_raw()).map(|record| record.state)
    }

    /// Every submission so far, oldest first
    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.shared.lock().submissions.clone()
    }

    /// Queues passed to `queue_wait_idle`, oldest first
    pub fn queues_waited_idle(&self) -> Vec<QueueType> {
        self.shared.lock().idle_waited.clone()
    }

    /// Make `create_command_pool` fail while `limit` pools are live. `None` lifts the limit.
    pub fn limit_command_pools(&self, limit: Option<usize>) {
        self.shared.lock().command_pool_limit = limit;
    }

    /// Debug name attached to object `id`
    pub fn debug_name(&self, id: u64) -> Option<String> {
        self.shared.lock().debug_names.get(&id).cloned()
    }

    /// Description of a live render pass
    pub fn render_pass_desc(&self, render_pass: RawRenderPass) -> Option<RenderPassDesc> {
        self.shared.lock().render_passes.get(&render_pass.as_raw()).cloned()
    }

    /// Description of a live framebuffer
    pub fn framebuffer_desc(&self, framebuffer: RawFramebuffer) -> Option<FramebufferDesc> {
        self.shared.lock().framebuffers.get(&framebuffer.as_raw()).cloned()
    }

    fn wait_semaphore(state: &mut State, semaphore: RawSemaphore, what: &str) {
        match state.semaphores.get_mut(&semaphore.as_raw()) {
            Some(current @ (SemaphoreState::Signaled | SemaphoreState::PendingSignal(_))) => {
                *current = SemaphoreState::Unsignaled;
            }
            Some(SemaphoreState::Unsignaled) => {
                violation(&format!("{what} waits on semaphore {semaphore:?} that has no pending signal"));
            }
            None => violation(&format!("{what} waits on unknown semaphore {semaphore:?}")),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MockBackend {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type RenderTarget = MockRenderTarget;
    type Swapchain = MockSwapchain;
    type DescriptorSet = MockDescriptorSet;
    type ComputePipeline = MockComputePipeline;
    type GraphicsPipeline = MockGraphicsPipeline;

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            id: 0,
            name: "Mock Adapter".to_string(),
            vendor_id: 0,
            adapter_type: AdapterType::Cpu,
        }
    }

    fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn create_buffer(&self, desc: &BufferHandle) -> RhiResult<MockBuffer> {
        let size = usize::try_from(desc.size).map_err(|_| RhiError::OutOfMemory { requested: desc.size })?;
        Ok(MockBuffer {
            tracked: Tracked::new(&self.shared, ObjectKind::Buffer),
            desc: *desc,
            data: vec![0; size],
            mapped: false,
        })
    }

    fn map_buffer(&self, buffer: &mut MockBuffer) -> RhiResult<()> {
        if !buffer.desc.cpu_access {
            return Err(RhiError::Backend(format!("buffer {} is not host visible", buffer.desc.id)));
        }
        buffer.mapped = true;
        Ok(())
    }

    fn unmap_buffer(&self, buffer: &mut MockBuffer) {
        buffer.mapped = false;
    }

    fn create_texture(&self, desc: &TextureHandle) -> RhiResult<MockTexture> {
        let tracked = Tracked::new(&self.shared, ObjectKind::Texture);
        let mut state = self.shared.lock();
        let sampler = state.allocate();
        let views = [ResourceView::Srv, ResourceView::Uav, ResourceView::Rtv, ResourceView::Dsv]
            .into_iter()
            .filter(|&view| desc.usage.contains(TextureUsage::for_view(view)))
            .map(|view| (view, RawImageView(state.allocate())))
            .collect();
        Ok(MockTexture { tracked, sampler, desc: *desc, views })
    }

    fn texture_view(&self, texture: &MockTexture, view: ResourceView) -> Option<RawImageView> {
        texture.views.iter().find(|(kind, _)| *kind == view).map(|&(_, raw)| raw)
    }

    fn create_offscreen_render_target(&self) -> RhiResult<MockRenderTarget> {
        Ok(MockRenderTarget {
            tracked: Tracked::new(&self.shared, ObjectKind::RenderTarget),
            views: Vec::new(),
            extent: (0, 0),
        })
    }

    fn create_backbuffer(&self, swapchain: &MockSwapchain) -> RhiResult<MockRenderTarget> {
        let tracked = Tracked::new(&self.shared, ObjectKind::RenderTarget);
        let mut state = self.shared.lock();
        let views = (0..swapchain.image_count).map(|_| RawImageView(state.allocate())).collect();
        Ok(MockRenderTarget { tracked, views, extent: swapchain.extent })
    }

    fn render_target_view(&self, target: &MockRenderTarget, image_index: u32) -> Option<RawImageView> {
        target.views.get(usize::try_from(image_index).ok()?).copied()
    }

    fn render_target_views(&self, target: &MockRenderTarget) -> Vec<RawImageView> {
        target.views.clone()
    }

    fn render_target_extent(&self, target: &MockRenderTarget) -> (u32, u32) {
        target.extent
    }

    fn create_swapchain(&self, window: &WindowHandle, image_count: u32) -> RhiResult<MockSwapchain> {
        if window.width == 0 || window.height == 0 {
            return Err(RhiError::Backend("swapchain extent must be non-zero".to_string()));
        }
        Ok(MockSwapchain {
            tracked: Tracked::new(&self.shared, ObjectKind::Swapchain),
            image_count,
            extent: (window.width, window.height),
            next_image: AtomicU32::new(0),
        })
    }

    fn recreate_swapchain(&self, swapchain: &mut MockSwapchain, window: &WindowHandle) -> RhiResult<()> {
        if window.width == 0 || window.height == 0 {
            return Err(RhiError::Backend("swapchain extent must be non-zero".to_string()));
        }
        let mut state = self.shared.lock();
        if !state.in_flight.is_empty() {
            violation("swapchain recreated while the GPU is busy");
        }
        state.stats.swapchain_recreations += 1;
        swapchain.extent = (window.width, window.height);
        swapchain.next_image.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn present_family(&self, _swapchain: &MockSwapchain) -> u32 {
        self.families.graphics
    }

    fn create_descriptor_set(&self, desc: &DescriptorSetHandle, instances: usize) -> RhiResult<MockDescriptorSet> {
        Ok(MockDescriptorSet {
            tracked: Tracked::new(&self.shared, ObjectKind::DescriptorSet),
            layout: desc.clone(),
            instances: vec![HashMap::new(); instances],
        })
    }

    fn update_descriptor_set(&self, set: &mut MockDescriptorSet, instance: usize, writes: &[DescriptorWrite<'_, Self>]) {
        let mut state = self.shared.lock();
        if state.replica_in_use(set.id(), instance) {
            violation(&format!("descriptor set {} replica {instance} rewritten while in use by the GPU", set.id()));
        }
        let bindings = &mut set.instances[instance];
        for write in writes {
            let object = match write.resource {
                BoundResource::UniformBuffer(buffer) => buffer.id(),
                BoundResource::CombinedImageSampler(texture) => texture.id(),
            };
            bindings.insert(write.binding, object);
        }
        state.stats.descriptor_writes += 1;
    }

    fn create_compute_pipeline(&self, _desc: &ComputePipelineHandle) -> RhiResult<MockComputePipeline> {
        Ok(MockComputePipeline { tracked: Tracked::new(&self.shared, ObjectKind::Pipeline) })
    }

    fn create_graphics_pipeline(
        &self,
        _desc: &GraphicsPipelineHandle,
        render_pass: RawRenderPass,
    ) -> RhiResult<MockGraphicsPipeline> {
        if !self.shared.lock().render_passes.contains_key(&render_pass.as_raw()) {
            violation(&format!("graphics pipeline created against unknown render pass {render_pass:?}"));
        }
        Ok(MockGraphicsPipeline {
            tracked: Tracked::new(&self.shared, ObjectKind::Pipeline),
            render_pass,
        })
    }

    fn set_debug_name(&self, object: DebugObject<'_, Self>, name: &str) {
        let id = match object {
            DebugObject::Buffer(buffer) => buffer.id(),
            DebugObject::Image(texture) => texture.id(),
            DebugObject::Sampler(texture) => texture.sampler(),
            DebugObject::View(view) => view.as_raw(),
            DebugObject::RenderPass(render_pass) => render_pass.as_raw(),
        };
        self.shared.lock().debug_names.insert(id, name.to_string());
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RhiResult<RawRenderPass> {
        let mut state = self.shared.lock();
        let id = state.allocate();
        state.render_passes.insert(id, desc.clone());
        state.stats.render_passes_created += 1;
        Ok(RawRenderPass(id))
    }

    fn destroy_render_pass(&self, render_pass: RawRenderPass) {
        let mut state = self.shared.lock();
        if state.render_passes.remove(&render_pass.as_raw()).is_none() {
            violation(&format!("destroying unknown render pass {render_pass:?}"));
            return;
        }
        if let Some((framebuffer, _)) = state.framebuffers.iter().find(|(_, fb)| fb.render_pass == render_pass) {
            violation(&format!("render pass {render_pass:?} destroyed while framebuffer {framebuffer:#x} uses it"));
        }
        state.stats.render_passes_destroyed += 1;
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> RhiResult<RawFramebuffer> {
        let mut state = self.shared.lock();
        if !state.render_passes.contains_key(&desc.render_pass.as_raw()) {
            violation(&format!("framebuffer created against unknown render pass {:?}", desc.render_pass));
        }
        let id = state.allocate();
        state.framebuffers.insert(id, desc.clone());
        state.stats.framebuffers_created += 1;
        Ok(RawFramebuffer(id))
    }

    fn destroy_framebuffer(&self, framebuffer: RawFramebuffer) {
        let mut state = self.shared.lock();
        if state.framebuffers.remove(&framebuffer.as_raw()).is_none() {
            violation(&format!("destroying unknown framebuffer {framebuffer:?}"));
            return;
        }
        state.stats.framebuffers_destroyed += 1;
    }

    fn create_command_pool(&self, family: u32, resettable_buffers: bool) -> RhiResult<RawCommandPool> {
        let mut state = self.shared.lock();
        if state.command_pool_limit.is_some_and(|limit| state.pools.len() >= limit) {
            return Err(RhiError::Backend(format!("command pool limit reached ({} live)", state.pools.len())));
        }
        if !self.families.unique().contains(&family) {
            violation(&format!("creating a command pool on unknown queue family {family}"));
        }
        let id = state.allocate();
        state.pools.insert(id, PoolRecord { family, resettable_buffers, buffers: Vec::new() });
        state.stats.command_pools_created += 1;
        Ok(RawCommandPool(id))
    }

    fn destroy_command_pool(&self, pool: RawCommandPool) {
        let mut state = self.shared.lock();
        let Some(record) = state.pools.remove(&pool.as_raw()) else {
            violation(&format!("destroying unknown command pool {pool:?}"));
            return;
        };
        if record.buffers.iter().any(|&buffer| state.is_pending(buffer)) {
            violation(&format!("command pool {pool:?} destroyed while in use by the GPU"));
        }
        for buffer in record.buffers {
            state.command_buffers.remove(&buffer);
        }
    }

    fn reset_command_pool(&self, pool: RawCommandPool) -> RhiResult<()> {
        let mut state = self.shared.lock();
        let Some(buffers) = state.pools.get(&pool.as_raw()).map(|record| record.buffers.clone()) else {
            violation(&format!("resetting unknown command pool {pool:?}"));
            return Ok(());
        };
        if buffers.iter().any(|&buffer| state.is_pending(buffer)) {
            violation(&format!("command pool {pool:?} reset while in use by the GPU"));
        }
        for buffer in buffers {
            if let Some(record) = state.command_buffers.get_mut(&buffer) {
                record.state = CommandBufferState::Initial;
                record.commands.clear();
            }
        }
        state.stats.pool_resets += 1;
        Ok(())
    }

    fn allocate_command_buffer(&self, pool: RawCommandPool) -> RhiResult<RawCommandBuffer> {
        let mut state = self.shared.lock();
        let id = state.allocate();
        match state.pools.get_mut(&pool.as_raw()) {
            Some(record) => record.buffers.push(id),
            None => violation(&format!("allocating from unknown command pool {pool:?}")),
        }
        state.command_buffers.insert(
            id,
            CommandBufferRecord { pool: pool.as_raw(), state: CommandBufferState::Initial, commands: Vec::new() },
        );
        Ok(RawCommandBuffer(id))
    }

    fn begin_command_buffer(&self, cmd: RawCommandBuffer, _one_time_submit: bool) -> RhiResult<()> {
        let mut state = self.shared.lock();
        let pending = state.is_pending(cmd.as_raw());
        let Some(record) = state.command_buffers.get(&cmd.as_raw()) else {
            violation(&format!("beginning unknown command buffer {cmd:?}"));
            return Ok(());
        };
        let resettable = state.pools.get(&record.pool).is_some_and(|pool| pool.resettable_buffers);
        let allowed = match record.state {
            CommandBufferState::Initial => true,
            CommandBufferState::Executable => resettable,
            CommandBufferState::Recording => false,
        };
        if !allowed || pending {
            violation(&format!("beginning command buffer {cmd:?} in state {:?}", record.state));
        }
        if let Some(record) = state.command_buffers.get_mut(&cmd.as_raw()) {
            record.state = CommandBufferState::Recording;
            record.commands.clear();
        }
        Ok(())
    }

    fn end_command_buffer(&self, cmd: RawCommandBuffer) -> RhiResult<()> {
        let mut state = self.shared.lock();
        match state.command_buffers.get_mut(&cmd.as_raw()) {
            Some(record) if record.state == CommandBufferState::Recording => {
                record.state = CommandBufferState::Executable;
            }
            Some(record) => violation(&format!("ending command buffer {cmd:?} in state {:?}", record.state)),
            None => violation(&format!("ending unknown command buffer {cmd:?}")),
        }
        Ok(())
    }

    fn cmd_begin_render_pass(&self, cmd: RawCommandBuffer, begin: &RenderPassBegin<'_>) {
        let mut state = self.shared.lock();
        match state.framebuffers.get(&begin.framebuffer.as_raw()) {
            Some(framebuffer) if framebuffer.render_pass != begin.render_pass => {
                violation(&format!("framebuffer {:?} is not compatible with {:?}", begin.framebuffer, begin.render_pass));
            }
            Some(_) => {}
            None => violation(&format!("render pass begun with unknown framebuffer {:?}", begin.framebuffer)),
        }
        state.record(
            cmd,
            MockCommand::BeginRenderPass {
                render_pass: begin.render_pass,
                framebuffer: begin.framebuffer,
                width: begin.width,
                height: begin.height,
                clear_values: begin.clear_values.to_vec(),
            },
        );
    }

    fn cmd_end_render_pass(&self, cmd: RawCommandBuffer) {
        self.shared.lock().record(cmd, MockCommand::EndRenderPass);
    }

    fn cmd_set_viewports(&self, cmd: RawCommandBuffer, viewports: &[Viewport]) {
        self.shared.lock().record(cmd, MockCommand::SetViewports(viewports.to_vec()));
    }

    fn cmd_set_scissors(&self, cmd: RawCommandBuffer, scissors: &[Rect]) {
        self.shared.lock().record(cmd, MockCommand::SetScissors(scissors.to_vec()));
    }

    fn cmd_bind_vertex_buffer(&self, cmd: RawCommandBuffer, slot: u32, buffer: &MockBuffer) {
        self.shared.lock().record(cmd, MockCommand::BindVertexBuffer { slot, buffer: buffer.id() });
    }

    fn cmd_bind_index_buffer(&self, cmd: RawCommandBuffer, buffer: &MockBuffer, offset: u64, format: IndexFormat) {
        self.shared.lock().record(cmd, MockCommand::BindIndexBuffer { buffer: buffer.id(), offset, format });
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: RawCommandBuffer,
        _pipeline: &MockGraphicsPipeline,
        index: u32,
        set: &MockDescriptorSet,
        instance: usize,
    ) {
        self.shared.lock().record(cmd, MockCommand::BindDescriptorSet { index, set: set.id(), instance });
    }

    fn cmd_bind_graphics_pipeline(&self, cmd: RawCommandBuffer, pipeline: &MockGraphicsPipeline) {
        self.shared.lock().record(cmd, MockCommand::BindGraphicsPipeline(pipeline.id()));
    }

    fn cmd_draw_indexed(&self, cmd: RawCommandBuffer, index_count: u32, first_index: u32, vertex_offset: i32) {
        self.shared.lock().record(cmd, MockCommand::DrawIndexed { index_count, first_index, vertex_offset });
    }

    fn cmd_copy_buffer(&self, cmd: RawCommandBuffer, src: &MockBuffer, dst: &MockBuffer, size: u64) {
        self.shared.lock().record(cmd, MockCommand::CopyBuffer { src: src.id(), dst: dst.id(), size });
    }

    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: RawCommandBuffer,
        src: &MockBuffer,
        dst: &MockTexture,
        regions: &[BufferTextureCopy],
    ) {
        self.shared
            .lock()
            .record(cmd, MockCommand::CopyBufferToTexture { src: src.id(), dst: dst.id(), regions: regions.to_vec() });
    }

    fn cmd_texture_barrier(&self, cmd: RawCommandBuffer, texture: &MockTexture, barrier: &LayoutBarrier) {
        self.shared.lock().record(cmd, MockCommand::TextureBarrier { texture: texture.id(), barrier: *barrier });
    }

    fn create_semaphore(&self) -> RhiResult<RawSemaphore> {
        let mut state = self.shared.lock();
        let id = state.allocate();
        state.semaphores.insert(id, SemaphoreState::Unsignaled);
        Ok(RawSemaphore(id))
    }

    fn destroy_semaphore(&self, semaphore: RawSemaphore) {
        if self.shared.lock().semaphores.remove(&semaphore.as_raw()).is_none() {
            violation(&format!("destroying unknown semaphore {semaphore:?}"));
        }
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<RawFence> {
        let mut state = self.shared.lock();
        let id = state.allocate();
        let initial = if signaled { FenceState::Signaled } else { FenceState::Unsignaled };
        state.fences.insert(id, initial);
        Ok(RawFence(id))
    }

    fn destroy_fence(&self, fence: RawFence) {
        match self.shared.lock().fences.remove(&fence.as_raw()) {
            Some(FenceState::Pending(_)) => violation(&format!("fence {fence:?} destroyed while in use by the GPU")),
            Some(_) => {}
            None => violation(&format!("destroying unknown fence {fence:?}")),
        }
    }

    fn wait_for_fence(&self, fence: RawFence, timeout: u64) -> RhiResult<()> {
        let mut state = self.shared.lock();
        state.stats.fence_waits += 1;
        match state.fences.get(&fence.as_raw()) {
            Some(FenceState::Unsignaled) => {
                violation(&format!("waiting on fence {fence:?} that was never submitted"));
                return Ok(());
            }
            None => {
                violation(&format!("waiting on unknown fence {fence:?}"));
                return Ok(());
            }
            Some(_) => {}
        }

        let busy = |state: &mut State| matches!(state.fences.get(&fence.as_raw()), Some(FenceState::Pending(_)));
        if timeout == INFINITE_TIMEOUT {
            drop(self.shared.completed.wait_while(state, busy).unwrap_or_else(PoisonError::into_inner));
            return Ok(());
        }

        let (_state, result) = self
            .shared
            .completed
            .wait_timeout_while(state, Duration::from_nanos(timeout), busy)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            return Err(RhiError::Backend(format!("timed out waiting on fence {fence:?}")));
        }
        Ok(())
    }

    fn reset_fence(&self, fence: RawFence) -> RhiResult<()> {
        let mut state = self.shared.lock();
        match state.fences.get_mut(&fence.as_raw()) {
            Some(FenceState::Pending(_)) => violation(&format!("fence {fence:?} reset while in use by the GPU")),
            Some(current) => *current = FenceState::Unsignaled,
            None => violation(&format!("resetting unknown fence {fence:?}")),
        }
        Ok(())
    }

    fn acquire_next_image(&self, swapchain: &MockSwapchain, signal: RawSemaphore, _timeout: u64) -> RhiResult<u32> {
        let mut state = self.shared.lock();
        match state.semaphores.get_mut(&signal.as_raw()) {
            Some(current @ SemaphoreState::Unsignaled) => *current = SemaphoreState::Signaled,
            Some(current) => violation(&format!("acquire signals semaphore {signal:?} in state {current:?}")),
            None => violation(&format!("acquire signals unknown semaphore {signal:?}")),
        }
        state.stats.acquires += 1;
        Ok(swapchain.next_image.fetch_add(1, Ordering::Relaxed) % swapchain.image_count.max(1))
    }

    fn queue_submit(&self, queue: QueueType, submit: &SubmitInfo<'_>) -> RhiResult<()> {
        let mut state = self.shared.lock();
        state.stats.submits += 1;

        let family = self.families.family(queue);
        for cmd in submit.command_buffers {
            match state.command_buffers.get(&cmd.as_raw()).map(|record| (record.state, record.pool)) {
                Some((CommandBufferState::Executable, _)) if state.is_pending(cmd.as_raw()) => {
                    violation(&format!("submitting command buffer {cmd:?} while it is pending"));
                }
                Some((CommandBufferState::Executable, pool)) => {
                    let pool_family = state.pools.get(&pool).map(|record| record.family);
                    if pool_family != Some(family) {
                        violation(&format!(
                            "command buffer {cmd:?} from family {pool_family:?} submitted to the {queue} queue (family {family})"
                        ));
                    }
                }
                Some((current, _)) => violation(&format!("submitting command buffer {cmd:?} in state {current:?}")),
                None => violation(&format!("submitting unknown command buffer {cmd:?}")),
            }
        }
        if let Some((semaphore, _)) = submit.wait {
            Self::wait_semaphore(&mut state, semaphore, "submission");
        }

        state.next_submission += 1;
        let id = state.next_submission;

        if let Some(semaphore) = submit.signal {
            match state.semaphores.get_mut(&semaphore.as_raw()) {
                Some(current @ SemaphoreState::Unsignaled) => *current = SemaphoreState::PendingSignal(id),
                Some(current) => violation(&format!("submission signals semaphore {semaphore:?} in state {current:?}")),
                None => violation(&format!("submission signals unknown semaphore {semaphore:?}")),
            }
        }
        if let Some(fence) = submit.fence {
            match state.fences.get_mut(&fence.as_raw()) {
                Some(current @ FenceState::Unsignaled) => *current = FenceState::Pending(id),
                Some(current) => violation(&format!("submission signals fence {fence:?} in state {current:?}")),
                None => violation(&format!("submission signals unknown fence {fence:?}")),
            }
        }

        state.submissions.push(MockSubmission {
            queue,
            command_buffers: submit.command_buffers.to_vec(),
            wait: submit.wait,
            signal: submit.signal,
            fence: submit.fence,
        });

        let in_flight = InFlight {
            id,
            queue,
            command_buffers: submit.command_buffers.iter().map(|cmd| cmd.as_raw()).collect(),
            signal: submit.signal.map(RawSemaphore::as_raw),
            fence: submit.fence.map(RawFence::as_raw),
        };
        if state.manual {
            state.in_flight.push_back(in_flight);
        } else {
            state.complete(&in_flight);
            drop(state);
            self.shared.completed.notify_all();
        }
        Ok(())
    }

    fn queue_present(&self, swapchain: &MockSwapchain, image_index: u32, wait: RawSemaphore) -> RhiResult<()> {
        if image_index >= swapchain.image_count {
            violation(&format!("presenting image {image_index} of a {}-image swapchain", swapchain.image_count));
        }
        let mut state = self.shared.lock();
        Self::wait_semaphore(&mut state, wait, "present");
        state.stats.presents += 1;
        Ok(())
    }

    // The CPU blocks until the queue drains, so pending work completes here.
    fn queue_wait_idle(&self, queue: QueueType) -> RhiResult<()> {
        {
            let mut state = self.shared.lock();
            state.stats.idle_waits += 1;
            state.idle_waited.push(queue);
        }
        self.shared.complete_where(|submission| submission.queue == queue);
        Ok(())
    }

    fn device_wait_idle(&self) -> RhiResult<()> {
        self.shared.lock().stats.idle_waits += 1;
        self.shared.complete_where(|_| true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::types::{BufferUsage, Format};

    fn executable_buffer(backend: &MockBackend) -> RawCommandBuffer {
        executable_buffer_on(backend, 0)
    }

    fn executable_buffer_on(backend: &MockBackend, family: u32) -> RawCommandBuffer {
        let pool = backend.create_command_pool(family, false).unwrap();
        let cmd = backend.allocate_command_buffer(pool).unwrap();
        backend.begin_command_buffer(cmd, true).unwrap();
        backend.end_command_buffer(cmd).unwrap();
        cmd
    }

    #[test]
    fn test_default_queue_families_are_distinct() {
        let families = MockBackend::new().queue_families();
        assert_eq!(families, QueueFamilies { graphics: 0, compute: 1, transfer: 2 });
    }

    #[test]
    fn test_raii_objects_track_live_counts() {
        let backend = MockBackend::new();
        let buffer = backend.create_buffer(&BufferHandle::new(BufferUsage::VERTEX, 8, false)).unwrap();
        let texture = backend
            .create_texture(&TextureHandle::new_2d(4, 4, Format::R8G8B8A8Unorm, TextureUsage::SRV | TextureUsage::RTV))
            .unwrap();
        assert!(backend.texture_view(&texture, ResourceView::Srv).is_some());
        assert!(backend.texture_view(&texture, ResourceView::Dsv).is_none());
        assert_eq!(backend.stats().live_buffers, 1);
        assert_eq!(backend.stats().live_textures, 1);

        drop(buffer);
        drop(texture);
        assert_eq!(backend.stats().live_buffers, 0);
        assert_eq!(backend.stats().live_textures, 0);
    }

    #[test]
    fn test_mapping_requires_host_visible_memory() {
        let backend = MockBackend::new();
        let mut device_local = backend.create_buffer(&BufferHandle::new(BufferUsage::VERTEX, 8, false)).unwrap();
        assert!(matches!(backend.map_buffer(&mut device_local), Err(RhiError::Backend(_))));

        let mut upload = backend.create_buffer(&BufferHandle::new(BufferUsage::UNIFORM, 8, true)).unwrap();
        backend.map_buffer(&mut upload).unwrap();
        upload.mapped_bytes_mut().unwrap()[0] = 7;
        backend.unmap_buffer(&mut upload);
        assert!(upload.mapped_bytes().is_none());
        assert_eq!(upload.contents()[0], 7);
    }

    #[test]
    fn test_manual_gpu_holds_fences_until_completed() {
        let (backend, gpu) = MockBackend::manual();
        let cmd = executable_buffer(&backend);
        let fence = backend.create_fence(false).unwrap();

        backend
            .queue_submit(QueueType::Graphics, &SubmitInfo { command_buffers: &[cmd], fence: Some(fence), ..SubmitInfo::default() })
            .unwrap();
        assert_eq!(gpu.pending(), 1);
        assert!(backend.wait_for_fence(fence, 1_000).is_err());

        assert!(gpu.complete_oldest());
        assert!(!gpu.complete_oldest());
        backend.wait_for_fence(fence, INFINITE_TIMEOUT).unwrap();
        backend.reset_fence(fence).unwrap();
    }

    #[test]
    fn test_wait_idle_drains_pending_work() {
        let (backend, gpu) = MockBackend::manual();
        let cmd = executable_buffer_on(&backend, backend.queue_families().transfer);
        backend.queue_submit(QueueType::Transfer, &SubmitInfo { command_buffers: &[cmd], ..SubmitInfo::default() }).unwrap();

        backend.queue_wait_idle(QueueType::Graphics).unwrap();
        assert_eq!(gpu.pending(), 1);
        backend.queue_wait_idle(QueueType::Transfer).unwrap();
        assert_eq!(gpu.pending(), 0);
        assert_eq!(backend.queues_waited_idle(), vec![QueueType::Graphics, QueueType::Transfer]);
    }

    #[test]
    #[should_panic(expected = "submitted to the transfer queue (family 2)")]
    fn test_submitting_to_a_foreign_family_panics() {
        let backend = MockBackend::new();
        let cmd = executable_buffer(&backend);
        backend.queue_submit(QueueType::Transfer, &SubmitInfo { command_buffers: &[cmd], ..SubmitInfo::default() }).unwrap();
    }

    #[test]
    fn test_command_pool_limit_fails_creation() {
        let backend = MockBackend::new();
        backend.limit_command_pools(Some(1));
        let pool = backend.create_command_pool(0, false).unwrap();
        assert!(matches!(backend.create_command_pool(0, false), Err(RhiError::Backend(_))));

        backend.destroy_command_pool(pool);
        backend.create_command_pool(0, false).unwrap();
        backend.limit_command_pools(None);
        backend.create_command_pool(1, false).unwrap();
        assert_eq!(backend.stats().live_command_pools, 2);
    }

    #[test]
    fn test_semaphore_round_trip() {
        let backend = MockBackend::new();
        let swapchain = backend.create_swapchain(&WindowHandle::headless(8, 8), 2).unwrap();
        let acquire = backend.create_semaphore().unwrap();
        let present = backend.create_semaphore().unwrap();
        let cmd = executable_buffer(&backend);

        for expected in [0, 1, 0] {
            let image = backend.acquire_next_image(&swapchain, acquire, INFINITE_TIMEOUT).unwrap();
            assert_eq!(image, expected);
            let submit = SubmitInfo {
                command_buffers: &[cmd],
                wait: Some((acquire, PipelineStage::COLOR_ATTACHMENT_OUTPUT)),
                signal: Some(present),
                fence: None,
            };
            backend.queue_submit(QueueType::Graphics, &submit).unwrap();
            backend.queue_present(&swapchain, image, present).unwrap();
        }
        assert_eq!(backend.stats().presents, 3);
    }

    #[test]
    #[should_panic(expected = "has no pending signal")]
    fn test_present_without_signal_panics() {
        let backend = MockBackend::new();
        let swapchain = backend.create_swapchain(&WindowHandle::headless(8, 8), 2).unwrap();
        let semaphore = backend.create_semaphore().unwrap();
        backend.queue_present(&swapchain, 0, semaphore).unwrap();
    }

    #[test]
    #[should_panic(expected = "reset while in use")]
    fn test_resetting_a_busy_pool_panics() {
        let (backend, _gpu) = MockBackend::manual();
        let pool = backend.create_command_pool(0, false).unwrap();
        let cmd = backend.allocate_command_buffer(pool).unwrap();
        backend.begin_command_buffer(cmd, false).unwrap();
        backend.end_command_buffer(cmd).unwrap();
        backend.queue_submit(QueueType::Graphics, &SubmitInfo { command_buffers: &[cmd], ..SubmitInfo::default() }).unwrap();
        backend.reset_command_pool(pool).unwrap();
    }

    #[test]
    #[should_panic(expected = "in state Executable")]
    fn test_rebegin_requires_reset_without_resettable_pool() {
        let backend = MockBackend::new();
        let cmd = executable_buffer(&backend);
        backend.begin_command_buffer(cmd, false).unwrap();
    }

    #[test]
    #[should_panic(expected = "destroying unknown framebuffer")]
    fn test_double_free_panics() {
        let backend = MockBackend::new();
        let render_pass = backend.create_render_pass(&RenderPassDesc::default()).unwrap();
        let framebuffer = backend
            .create_framebuffer(&FramebufferDesc { render_pass, attachments: Vec::new(), width: 1, height: 1, layers: 1 })
            .unwrap();
        backend.destroy_framebuffer(framebuffer);
        backend.destroy_framebuffer(framebuffer);
    }
}
