//! Resource tables and deferred destruction
//!
//! The device owns one [`IdArena`] per resource kind, keyed by handle id. Unloading removes
//! the entry right away (so `has_*` turns false) but the native object is parked in the
//! retirement queue of the frame-in-flight slot being recorded. The queue is released once
//! that slot's fence has been waited on, i.e. once every submission that could still
//! reference the object has completed. Submissions on the graphics queue complete in order,
//! so waiting on a slot's fence also covers every earlier frame.

use crate::backend::{Backend, RawFramebuffer, RawRenderPass};
use crate::foundation::collections::IdArena;
use crate::rhi::descriptor_set::DescriptorSet;

/// Explicit render pass loaded from a `RenderPassHandle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedRenderPass {
    /// Native render pass
    pub native: RawRenderPass,
}

/// A native object waiting for the GPU to finish with it
pub enum Retired<B: Backend> {
    /// Buffer
    Buffer(B::Buffer),
    /// Texture
    Texture(B::Texture),
    /// Render target
    RenderTarget(B::RenderTarget),
    /// Descriptor set
    DescriptorSet(DescriptorSet<B>),
    /// Compute pipeline
    ComputePipeline(B::ComputePipeline),
    /// Graphics pipeline
    GraphicsPipeline(B::GraphicsPipeline),
    /// Render pass
    RenderPass(RawRenderPass),
    /// Framebuffer
    Framebuffer(RawFramebuffer),
}

impl<B: Backend> Retired<B> {
    /// Destroy the object now
    pub fn release(self, backend: &B) {
        match self {
            Self::RenderPass(render_pass) => backend.destroy_render_pass(render_pass),
            Self::Framebuffer(framebuffer) => backend.destroy_framebuffer(framebuffer),
            // RAII objects release their native handles on drop.
            Self::Buffer(_)
            | Self::Texture(_)
            | Self::RenderTarget(_)
            | Self::DescriptorSet(_)
            | Self::ComputePipeline(_)
            | Self::GraphicsPipeline(_) => {}
        }
    }
}

/// Per-slot retirement lists
pub struct RetireQueue<B: Backend> {
    slots: Vec<Vec<Retired<B>>>,
}

impl<B: Backend> RetireQueue<B> {
    /// One empty list per frame slot
    pub fn new(slots: usize) -> Self {
        Self { slots: (0..slots).map(|_| Vec::new()).collect() }
    }

    /// Park `object` until slot `slot` completes
    pub fn retire(&mut self, slot: usize, object: Retired<B>) {
        self.slots[slot].push(object);
    }

    /// Release everything parked on `slot`, returning how many objects were destroyed
    pub fn release_slot(&mut self, backend: &B, slot: usize) -> usize {
        let retired: Vec<Retired<B>> = self.slots[slot].drain(..).collect();
        let count = retired.len();
        for object in retired {
            object.release(backend);
        }
        if count > 0 {
            log::debug!("Released {count} retired object(s) from frame slot {slot}");
        }
        count
    }

    /// Release every slot. The device must be idle.
    pub fn release_all(&mut self, backend: &B) -> usize {
        (0..self.slots.len()).map(|slot| self.release_slot(backend, slot)).sum()
    }

    /// Objects currently parked
    pub fn pending(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }
}

/// Every resource table of a device
pub struct ResourceTables<B: Backend> {
    /// Buffers
    pub buffers: IdArena<B::Buffer>,
    /// Textures
    pub textures: IdArena<B::Texture>,
    /// Render targets (offscreen and backbuffers)
    pub render_targets: IdArena<B::RenderTarget>,
    /// Descriptor sets
    pub descriptor_sets: IdArena<DescriptorSet<B>>,
    /// Compute pipelines
    pub compute_pipelines: IdArena<B::ComputePipeline>,
    /// Graphics pipelines
    pub graphics_pipelines: IdArena<B::GraphicsPipeline>,
    /// Explicit render passes
    pub render_passes: IdArena<LoadedRenderPass>,
}

impl<B: Backend> ResourceTables<B> {
    /// Empty tables
    pub fn new() -> Self {
        Self {
            buffers: IdArena::new(),
            textures: IdArena::new(),
            render_targets: IdArena::new(),
            descriptor_sets: IdArena::new(),
            compute_pipelines: IdArena::new(),
            graphics_pipelines: IdArena::new(),
            render_passes: IdArena::new(),
        }
    }

    /// Total live entries across all tables
    pub fn len(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.render_targets.len()
            + self.descriptor_sets.len()
            + self.compute_pipelines.len()
            + self.graphics_pipelines.len()
            + self.render_passes.len()
    }

    /// Whether every table is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy everything. The device must be idle.
    pub fn clear(&mut self, backend: &B) {
        for (_, render_pass) in self.render_passes.drain() {
            backend.destroy_render_pass(render_pass.native);
        }
        self.graphics_pipelines.drain();
        self.compute_pipelines.drain();
        self.descriptor_sets.drain();
        self.render_targets.drain();
        self.textures.drain();
        self.buffers.drain();
    }
}

impl<B: Backend> Default for ResourceTables<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::rhi::handles::BufferHandle;
    use crate::rhi::types::BufferUsage;

    #[test]
    fn test_retired_objects_live_until_their_slot_is_released() {
        let backend = MockBackend::new();
        let mut queue: RetireQueue<MockBackend> = RetireQueue::new(3);

        let buffer = backend.create_buffer(&BufferHandle::new(BufferUsage::VERTEX, 16, false)).unwrap();
        queue.retire(1, Retired::Buffer(buffer));
        assert_eq!(backend.stats().live_buffers, 1);

        assert_eq!(queue.release_slot(&backend, 0), 0);
        assert_eq!(backend.stats().live_buffers, 1);

        assert_eq!(queue.release_slot(&backend, 1), 1);
        assert_eq!(backend.stats().live_buffers, 0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_release_all_destroys_raw_objects() {
        let backend = MockBackend::new();
        let mut queue: RetireQueue<MockBackend> = RetireQueue::new(2);
        let render_pass = backend.create_render_pass(&crate::backend::RenderPassDesc::default()).unwrap();
        let framebuffer = backend
            .create_framebuffer(&crate::backend::FramebufferDesc {
                render_pass,
                attachments: Vec::new(),
                width: 1,
                height: 1,
                layers: 1,
            })
            .unwrap();
        queue.retire(0, Retired::Framebuffer(framebuffer));
        queue.retire(1, Retired::RenderPass(render_pass));

        assert_eq!(queue.release_all(&backend), 2);
        assert_eq!(backend.stats().render_passes_destroyed, 1);
        assert_eq!(backend.stats().framebuffers_destroyed, 1);
    }
}
