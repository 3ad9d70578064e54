//! Scoped CPU access to buffers

use super::{expect_valid, not_loaded, Device};
use crate::backend::{Backend, BackendBuffer};
use crate::foundation::id::HandleId;
use crate::rhi::error::RhiResult;
use crate::rhi::handles::BufferHandle;
use bytemuck::Pod;
use std::ops::{Deref, DerefMut};

/// A mapped buffer. Dereferences to the buffer's bytes and unmaps on drop.
pub struct BufferMapping<'a, B: Backend> {
    backend: &'a B,
    buffer: &'a mut B::Buffer,
    id: HandleId,
}

impl<'a, B: Backend> BufferMapping<'a, B> {
    /// Id of the mapped buffer
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Copy `data` into the mapping at byte `offset`
    pub fn write<T: Pod>(&mut self, offset: usize, data: &[T]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let end = offset + bytes.len();
        let len = self.len();
        assert!(end <= len, "write of {} bytes at offset {offset} overflows buffer {} ({len} bytes)", bytes.len(), self.id);
        self[offset..end].copy_from_slice(bytes);
    }

    /// Unmap now
    pub fn unmap(self) {
        drop(self);
    }
}

impl<B: Backend> Deref for BufferMapping<'_, B> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.mapped_bytes().unwrap_or_default()
    }
}

impl<B: Backend> DerefMut for BufferMapping<'_, B> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.mapped_bytes_mut().unwrap_or_default()
    }
}

impl<B: Backend> Drop for BufferMapping<'_, B> {
    fn drop(&mut self) {
        self.backend.unmap_buffer(self.buffer);
    }
}

impl<B: Backend> Device<B> {
    /// Map a CPU-accessible buffer
    pub fn map_buffer(&mut self, handle: &BufferHandle) -> RhiResult<BufferMapping<'_, B>> {
        expect_valid(handle.id, "buffer");
        assert!(handle.cpu_access, "buffer {} is not CPU accessible", handle.id);

        let buffer = self.tables.buffers.get_mut(handle.id).unwrap_or_else(|| not_loaded("buffer", handle.id));
        self.backend.map_buffer(buffer)?;
        Ok(BufferMapping { backend: &self.backend, buffer, id: handle.id })
    }

    /// Unmap a buffer whose mapping was leaked. No-op when it is not mapped.
    pub fn unmap_buffer(&mut self, handle: &BufferHandle) {
        expect_valid(handle.id, "buffer");
        let buffer = self.tables.buffers.get_mut(handle.id).unwrap_or_else(|| not_loaded("buffer", handle.id));
        if buffer.is_mapped() {
            self.backend.unmap_buffer(buffer);
        }
    }

    /// Map, copy `data` at byte `offset`, unmap
    pub fn write_buffer<T: Pod>(&mut self, handle: &BufferHandle, offset: usize, data: &[T]) -> RhiResult<()> {
        let mut mapping = self.map_buffer(handle)?;
        mapping.write(offset, data);
        Ok(())
    }
}
