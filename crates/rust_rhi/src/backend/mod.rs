//! Backend abstraction
//!
//! [`Backend`] is the seam between the device facade and a native graphics API. Long-lived
//! resources (buffers, textures, render targets, swapchains, descriptor sets, pipelines) are
//! RAII associated types that release their native objects on drop. Objects the device
//! tracks itself (render passes, framebuffers, command pools, semaphores, fences) are
//! copyable raw ids destroyed through explicit `destroy_*` calls.

pub mod mock;
#[cfg(feature = "vulkan")]
pub mod vulkan;

use crate::rhi::adapter::{AdapterInfo, QueueFamilies};
use crate::rhi::barrier::{Access, LayoutBarrier, PipelineStage};
use crate::rhi::commands::{QueueType, Rect, Viewport};
use crate::rhi::error::RhiResult;
use crate::rhi::handles::{
    BufferHandle, ComputePipelineHandle, DescriptorSetHandle, GraphicsPipelineHandle, LoadOp,
    StoreOp, TextureHandle, WindowHandle,
};
use crate::rhi::types::{Format, ImageLayout, IndexFormat, ResourceView};

macro_rules! raw_handles {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
            pub struct $name(pub u64);

            impl $name {
                /// The null object
                pub const NULL: Self = Self(0);

                /// Raw 64-bit value
                pub const fn as_raw(self) -> u64 {
                    self.0
                }

                /// Whether this is the null object
                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

raw_handles!(
    /// Native render pass
    RawRenderPass,
    /// Native framebuffer
    RawFramebuffer,
    /// Native image view
    RawImageView,
    /// Native command pool
    RawCommandPool,
    /// Native command buffer
    RawCommandBuffer,
    /// Native binary semaphore
    RawSemaphore,
    /// Native fence
    RawFence,
);

/// Timeout meaning "wait forever"
pub const INFINITE_TIMEOUT: u64 = u64::MAX;

/// One attachment of a native render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    /// View format
    pub format: Format,
    /// Samples per pixel
    pub samples: u8,
    /// Color/depth load behavior
    pub load_op: LoadOp,
    /// Color/depth store behavior
    pub store_op: StoreOp,
    /// Stencil load behavior
    pub stencil_load_op: LoadOp,
    /// Stencil store behavior
    pub stencil_store_op: StoreOp,
    /// Layout at pass begin
    pub initial_layout: ImageLayout,
    /// Layout at pass end
    pub final_layout: ImageLayout,
}

/// Reference from the single subpass to an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Index into [`RenderPassDesc::attachments`]
    pub attachment: u32,
    /// Layout during the subpass
    pub layout: ImageLayout,
}

/// Dependency from outside the pass into subpass 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalDependency {
    /// Stages before the pass
    pub src_stage: PipelineStage,
    /// Stages of the subpass that wait
    pub dst_stage: PipelineStage,
    /// Accesses made available
    pub src_access: Access,
    /// Accesses made visible
    pub dst_access: Access,
}

/// Single-subpass render pass description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderPassDesc {
    /// Attachments, in framebuffer order
    pub attachments: Vec<AttachmentDesc>,
    /// Color references of the subpass
    pub color_refs: Vec<AttachmentRef>,
    /// Depth-stencil reference of the subpass
    pub depth_ref: Option<AttachmentRef>,
    /// External dependencies
    pub dependencies: Vec<ExternalDependency>,
}

/// Framebuffer description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    /// Compatible render pass
    pub render_pass: RawRenderPass,
    /// Attachment views, in render pass order
    pub attachments: Vec<RawImageView>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Array layers
    pub layers: u32,
}

/// Clear value for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// RGBA color
    Color([f32; 4]),
    /// Depth and stencil
    DepthStencil {
        /// Depth
        depth: f32,
        /// Stencil
        stencil: u32,
    },
}

/// Render pass begin parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassBegin<'a> {
    /// Render pass
    pub render_pass: RawRenderPass,
    /// Framebuffer
    pub framebuffer: RawFramebuffer,
    /// Render area width
    pub width: u32,
    /// Render area height
    pub height: u32,
    /// One clear value per attachment that clears
    pub clear_values: &'a [ClearValue],
}

/// One buffer-to-image copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTextureCopy {
    /// Byte offset into the source buffer
    pub buffer_offset: u64,
    /// Destination array layer
    pub layer: u32,
    /// Copy width
    pub width: u32,
    /// Copy height
    pub height: u32,
}

/// Queue submission parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmitInfo<'a> {
    /// Command buffers, executed in order
    pub command_buffers: &'a [RawCommandBuffer],
    /// Semaphore to wait on, and the stage that waits
    pub wait: Option<(RawSemaphore, PipelineStage)>,
    /// Semaphore signaled on completion
    pub signal: Option<RawSemaphore>,
    /// Fence signaled on completion
    pub fence: Option<RawFence>,
}

/// Resource written into a descriptor binding
pub enum BoundResource<'a, B: Backend> {
    /// Uniform buffer, whole range
    UniformBuffer(&'a B::Buffer),
    /// Shader resource view plus the texture's sampler
    CombinedImageSampler(&'a B::Texture),
}

/// One descriptor write
pub struct DescriptorWrite<'a, B: Backend> {
    /// Binding slot
    pub binding: u32,
    /// Resource
    pub resource: BoundResource<'a, B>,
}

/// Object a debug name is attached to
pub enum DebugObject<'a, B: Backend> {
    /// Buffer
    Buffer(&'a B::Buffer),
    /// Texture image
    Image(&'a B::Texture),
    /// Texture sampler
    Sampler(&'a B::Texture),
    /// Image view
    View(RawImageView),
    /// Render pass
    RenderPass(RawRenderPass),
}

/// CPU access to a buffer's memory
pub trait BackendBuffer {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Whether the buffer is currently mapped
    fn is_mapped(&self) -> bool;

    /// Mapped bytes, if mapped
    fn mapped_bytes(&self) -> Option<&[u8]>;

    /// Mapped bytes for writing, if mapped
    fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]>;
}

/// Native graphics API used by [`Device`](crate::rhi::Device).
pub trait Backend: Sized {
    /// Buffer plus its memory
    type Buffer: BackendBuffer;
    /// Image plus views and sampler
    type Texture;
    /// Set of presentable (or offscreen) images
    type RenderTarget;
    /// Presentation engine
    type Swapchain;
    /// Descriptor set layout plus its replicated instances
    type DescriptorSet;
    /// Compute pipeline plus layout
    type ComputePipeline;
    /// Graphics pipeline plus layout
    type GraphicsPipeline;

    // Device info

    /// Adapter the backend runs on
    fn adapter_info(&self) -> AdapterInfo;

    /// Queue families chosen at creation
    fn queue_families(&self) -> QueueFamilies;

    // Resources

    /// Create a buffer
    fn create_buffer(&self, desc: &BufferHandle) -> RhiResult<Self::Buffer>;

    /// Map a CPU-visible buffer
    fn map_buffer(&self, buffer: &mut Self::Buffer) -> RhiResult<()>;

    /// Unmap a buffer (no-op when not mapped)
    fn unmap_buffer(&self, buffer: &mut Self::Buffer);

    /// Create a texture with one view per usage flag and a sampler
    fn create_texture(&self, desc: &TextureHandle) -> RhiResult<Self::Texture>;

    /// View of a texture, when its usage provides one
    fn texture_view(&self, texture: &Self::Texture, view: ResourceView) -> Option<RawImageView>;

    /// Render target without images, rendered into through explicit passes
    fn create_offscreen_render_target(&self) -> RhiResult<Self::RenderTarget>;

    /// Render target over the swapchain's images
    fn create_backbuffer(&self, swapchain: &Self::Swapchain) -> RhiResult<Self::RenderTarget>;

    /// View of image `image_index`
    fn render_target_view(&self, target: &Self::RenderTarget, image_index: u32) -> Option<RawImageView>;

    /// Every view owned by the render target
    fn render_target_views(&self, target: &Self::RenderTarget) -> Vec<RawImageView>;

    /// Size of the render target images
    fn render_target_extent(&self, target: &Self::RenderTarget) -> (u32, u32);

    /// Create a swapchain for `window` with `image_count` images
    fn create_swapchain(&self, window: &WindowHandle, image_count: u32) -> RhiResult<Self::Swapchain>;

    /// Recreate the swapchain images after a resize. The device is idle when this runs.
    fn recreate_swapchain(&self, swapchain: &mut Self::Swapchain, window: &WindowHandle) -> RhiResult<()>;

    /// Queue family that presents this swapchain
    fn present_family(&self, swapchain: &Self::Swapchain) -> u32;

    /// Create a descriptor set with `instances` replicated native sets
    fn create_descriptor_set(&self, desc: &DescriptorSetHandle, instances: usize) -> RhiResult<Self::DescriptorSet>;

    /// Write bindings into one replica
    fn update_descriptor_set(&self, set: &mut Self::DescriptorSet, instance: usize, writes: &[DescriptorWrite<'_, Self>]);

    /// Create a compute pipeline
    fn create_compute_pipeline(&self, desc: &ComputePipelineHandle) -> RhiResult<Self::ComputePipeline>;

    /// Create a graphics pipeline compatible with `render_pass`
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineHandle,
        render_pass: RawRenderPass,
    ) -> RhiResult<Self::GraphicsPipeline>;

    /// Attach a debug name
    fn set_debug_name(&self, object: DebugObject<'_, Self>, name: &str);

    // Render passes and framebuffers

    /// Create a render pass
    fn create_render_pass(&self, desc: &RenderPassDesc) -> RhiResult<RawRenderPass>;

    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: RawRenderPass);

    /// Create a framebuffer
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> RhiResult<RawFramebuffer>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: RawFramebuffer);

    // Command buffers

    /// Create a command pool on `family`. `resettable_buffers` lets single buffers be reset.
    fn create_command_pool(&self, family: u32, resettable_buffers: bool) -> RhiResult<RawCommandPool>;

    /// Destroy a pool and every buffer allocated from it
    fn destroy_command_pool(&self, pool: RawCommandPool);

    /// Reset a pool, returning all of its buffers to the initial state
    fn reset_command_pool(&self, pool: RawCommandPool) -> RhiResult<()>;

    /// Allocate one primary command buffer
    fn allocate_command_buffer(&self, pool: RawCommandPool) -> RhiResult<RawCommandBuffer>;

    /// Begin recording
    fn begin_command_buffer(&self, cmd: RawCommandBuffer, one_time_submit: bool) -> RhiResult<()>;

    /// End recording
    fn end_command_buffer(&self, cmd: RawCommandBuffer) -> RhiResult<()>;

    // Recording

    /// Begin a render pass
    fn cmd_begin_render_pass(&self, cmd: RawCommandBuffer, begin: &RenderPassBegin<'_>);

    /// End the current render pass
    fn cmd_end_render_pass(&self, cmd: RawCommandBuffer);

    /// Set viewports starting at 0
    fn cmd_set_viewports(&self, cmd: RawCommandBuffer, viewports: &[Viewport]);

    /// Set scissors starting at 0
    fn cmd_set_scissors(&self, cmd: RawCommandBuffer, scissors: &[Rect]);

    /// Bind a vertex buffer at `slot`
    fn cmd_bind_vertex_buffer(&self, cmd: RawCommandBuffer, slot: u32, buffer: &Self::Buffer);

    /// Bind an index buffer
    fn cmd_bind_index_buffer(&self, cmd: RawCommandBuffer, buffer: &Self::Buffer, offset: u64, format: IndexFormat);

    /// Bind replica `instance` of `set` at set index `index`
    fn cmd_bind_descriptor_set(
        &self,
        cmd: RawCommandBuffer,
        pipeline: &Self::GraphicsPipeline,
        index: u32,
        set: &Self::DescriptorSet,
        instance: usize,
    );

    /// Bind a graphics pipeline
    fn cmd_bind_graphics_pipeline(&self, cmd: RawCommandBuffer, pipeline: &Self::GraphicsPipeline);

    /// Indexed draw
    fn cmd_draw_indexed(&self, cmd: RawCommandBuffer, index_count: u32, first_index: u32, vertex_offset: i32);

    /// Copy `size` bytes between buffers
    fn cmd_copy_buffer(&self, cmd: RawCommandBuffer, src: &Self::Buffer, dst: &Self::Buffer, size: u64);

    /// Copy buffer regions into a texture in `TransferDst` layout
    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: RawCommandBuffer,
        src: &Self::Buffer,
        dst: &Self::Texture,
        regions: &[BufferTextureCopy],
    );

    /// Image layout barrier over every layer of the texture
    fn cmd_texture_barrier(&self, cmd: RawCommandBuffer, texture: &Self::Texture, barrier: &LayoutBarrier);

    // Synchronization

    /// Create a binary semaphore
    fn create_semaphore(&self) -> RhiResult<RawSemaphore>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: RawSemaphore);

    /// Create a fence
    fn create_fence(&self, signaled: bool) -> RhiResult<RawFence>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: RawFence);

    /// Block until the fence signals
    fn wait_for_fence(&self, fence: RawFence, timeout: u64) -> RhiResult<()>;

    /// Return a fence to the unsignaled state
    fn reset_fence(&self, fence: RawFence) -> RhiResult<()>;

    /// Acquire the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(&self, swapchain: &Self::Swapchain, signal: RawSemaphore, timeout: u64) -> RhiResult<u32>;

    /// Submit command buffers
    fn queue_submit(&self, queue: QueueType, submit: &SubmitInfo<'_>) -> RhiResult<()>;

    /// Present image `image_index` once `wait` signals
    fn queue_present(&self, swapchain: &Self::Swapchain, image_index: u32, wait: RawSemaphore) -> RhiResult<()>;

    /// Block until the queue has no pending work
    fn queue_wait_idle(&self, queue: QueueType) -> RhiResult<()>;

    /// Block until the whole device is idle
    fn device_wait_idle(&self) -> RhiResult<()>;
}
