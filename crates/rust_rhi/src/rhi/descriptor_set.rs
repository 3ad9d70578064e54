//! Descriptor set binding and dirtiness
//!
//! A loaded descriptor set owns one native replica per frame slot (`backbuffer_count`), so
//! a frame still in flight never sees its bindings rewritten. Changing a binding marks every
//! replica dirty; a replica is rewritten lazily the next time a frame asks for it, and only
//! once per binding change no matter how many frames pass in between. The cost is that one
//! change eventually pays a write for every replica.

use crate::backend::{Backend, BoundResource, DescriptorWrite};
use crate::foundation::collections::IdArena;
use crate::foundation::id::HandleId;
use crate::rhi::handles::DescriptorSetHandle;

/// Highest binding slot (exclusive) a set may use
pub const MAX_BINDING: usize = 10;

/// Binding table plus per-replica dirty flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBindings {
    buffers: [Option<HandleId>; MAX_BINDING],
    textures: [Option<HandleId>; MAX_BINDING],
    dirty: Vec<bool>,
}

impl DescriptorBindings {
    /// Empty table for `instances` replicas, all dirty
    pub fn new(instances: usize) -> Self {
        Self {
            buffers: [None; MAX_BINDING],
            textures: [None; MAX_BINDING],
            dirty: vec![true; instances],
        }
    }

    /// Bind a uniform buffer and dirty every replica
    pub fn set_buffer(&mut self, binding: usize, buffer: HandleId) {
        assert!(binding < MAX_BINDING, "binding {binding} exceeds MAX_BINDING ({MAX_BINDING})");
        self.buffers[binding] = Some(buffer);
        self.mark_all_dirty();
    }

    /// Bind a sampled texture and dirty every replica
    pub fn set_texture(&mut self, binding: usize, texture: HandleId) {
        assert!(binding < MAX_BINDING, "binding {binding} exceeds MAX_BINDING ({MAX_BINDING})");
        self.textures[binding] = Some(texture);
        self.mark_all_dirty();
    }

    fn mark_all_dirty(&mut self) {
        self.dirty.iter_mut().for_each(|dirty| *dirty = true);
    }

    /// Dirty every replica without changing bindings (a bound resource was recreated)
    pub fn invalidate(&mut self) {
        self.mark_all_dirty();
    }

    /// Whether any binding refers to texture `id`
    pub fn references_texture(&self, id: HandleId) -> bool {
        self.textures.contains(&Some(id))
    }

    /// Whether replica `instance` needs rewriting
    pub fn is_dirty(&self, instance: usize) -> bool {
        self.dirty[instance]
    }

    /// Number of replicas
    pub fn instances(&self) -> usize {
        self.dirty.len()
    }

    /// Bound buffers as `(binding, id)`
    pub fn buffers(&self) -> impl Iterator<Item = (usize, HandleId)> + '_ {
        self.buffers.iter().enumerate().filter_map(|(binding, id)| id.map(|id| (binding, id)))
    }

    /// Bound textures as `(binding, id)`
    pub fn textures(&self) -> impl Iterator<Item = (usize, HandleId)> + '_ {
        self.textures.iter().enumerate().filter_map(|(binding, id)| id.map(|id| (binding, id)))
    }
}

/// A loaded descriptor set
pub struct DescriptorSet<B: Backend> {
    /// Native set layout and replicas
    pub native: B::DescriptorSet,
    /// Bindings and dirtiness
    pub bindings: DescriptorBindings,
    /// Layout the set was loaded from
    pub layout: DescriptorSetHandle,
}

impl<B: Backend> DescriptorSet<B> {
    /// Create the native set for `layout`
    pub fn new(backend: &B, layout: &DescriptorSetHandle, instances: usize) -> crate::rhi::RhiResult<Self> {
        Ok(Self {
            native: backend.create_descriptor_set(layout, instances)?,
            bindings: DescriptorBindings::new(instances),
            layout: layout.clone(),
        })
    }

    /// Replica `instance`, rewritten first if its bindings changed.
    ///
    /// Panics when a bound resource is no longer loaded.
    pub fn get_descriptor_set(
        &mut self,
        backend: &B,
        instance: usize,
        buffers: &IdArena<B::Buffer>,
        textures: &IdArena<B::Texture>,
    ) -> &B::DescriptorSet {
        if self.bindings.is_dirty(instance) {
            let mut writes: Vec<DescriptorWrite<'_, B>> = Vec::new();
            for (binding, id) in self.bindings.buffers() {
                let buffer = buffers
                    .get(id)
                    .unwrap_or_else(|| panic!("descriptor binding {binding} references unloaded buffer {id}"));
                #[allow(clippy::cast_possible_truncation)]
                writes.push(DescriptorWrite { binding: binding as u32, resource: BoundResource::UniformBuffer(buffer) });
            }
            for (binding, id) in self.bindings.textures() {
                let texture = textures
                    .get(id)
                    .unwrap_or_else(|| panic!("descriptor binding {binding} references unloaded texture {id}"));
                #[allow(clippy::cast_possible_truncation)]
                writes.push(DescriptorWrite {
                    binding: binding as u32,
                    resource: BoundResource::CombinedImageSampler(texture),
                });
            }

            backend.update_descriptor_set(&mut self.native, instance, &writes);
            self.bindings.dirty[instance] = false;
            log::trace!("Rewrote descriptor set {} replica {instance} ({} write(s))", self.layout.id, writes.len());
        }
        &self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::rhi::handles::{BufferHandle, Descriptor, DescriptorType};
    use crate::rhi::types::{BufferUsage, ShaderStage};

    #[test]
    fn test_new_bindings_start_dirty() {
        let bindings = DescriptorBindings::new(3);
        assert!((0..3).all(|i| bindings.is_dirty(i)));
        assert_eq!(bindings.buffers().count(), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds MAX_BINDING")]
    fn test_binding_out_of_range_panics() {
        DescriptorBindings::new(3).set_texture(MAX_BINDING, 1);
    }

    #[test]
    fn test_dirty_flags_converge_without_extra_writes() {
        let backend = MockBackend::new();
        let layout = DescriptorSetHandle::new(vec![Descriptor::new(DescriptorType::Uniform, ShaderStage::VERTEX, 0)]);
        let mut set = DescriptorSet::new(&backend, &layout, 3).unwrap();

        let handle = BufferHandle::new(BufferUsage::UNIFORM, 64, true);
        let mut buffers = IdArena::new();
        assert!(buffers.insert(handle.id, backend.create_buffer(&handle).unwrap()).is_ok());
        let textures = IdArena::new();

        set.bindings.set_buffer(0, handle.id);
        for instance in 0..3 {
            set.get_descriptor_set(&backend, instance, &buffers, &textures);
        }
        assert!((0..3).all(|i| !set.bindings.is_dirty(i)));
        let writes = backend.stats().descriptor_writes;
        assert_eq!(writes, 3);

        for instance in 0..3 {
            set.get_descriptor_set(&backend, instance, &buffers, &textures);
        }
        assert_eq!(backend.stats().descriptor_writes, writes);

        // A new binding dirties every replica again, but only the requested one is rewritten.
        set.bindings.set_buffer(1, handle.id);
        set.get_descriptor_set(&backend, 1, &buffers, &textures);
        assert!(set.bindings.is_dirty(0) && !set.bindings.is_dirty(1) && set.bindings.is_dirty(2));
        assert_eq!(backend.stats().descriptor_writes, writes + 1);
    }

    #[test]
    #[should_panic(expected = "unloaded texture")]
    fn test_flushing_an_unloaded_binding_panics() {
        let backend = MockBackend::new();
        let mut set = DescriptorSet::new(&backend, &DescriptorSetHandle::default(), 3).unwrap();
        set.bindings.set_texture(2, 12345);
        set.get_descriptor_set(&backend, 0, &IdArena::new(), &IdArena::new());
    }
}
