//! Command list multiplexer
//!
//! Each frame-in-flight slot owns one command pool and one primary buffer per logical command
//! list id. Ids travel between a free ring and an active ring: beginning a list pops a free id
//! (or allocates a new id for every slot at once so slots stay in lockstep), resets that id's
//! pool in the current slot and starts recording; ending the frame drains the active ring back
//! into the free ring.
//!
//! Resetting the pool rather than the buffer keeps the 1:1 mapping between a logical list and
//! a pool, so two lists recorded in the same frame never share an allocator.

use crate::backend::{Backend, RawCommandBuffer, RawCommandPool};
use crate::foundation::ring_buffer::RingBuffer;
use crate::rhi::error::RhiResult;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Hard upper bound on command lists per swapchain (ring capacity)
pub const COMMANDLIST_COUNT: usize = 64;

/// Per-slot command pools and buffers, indexed by list id
#[derive(Debug, Default)]
pub struct SlotCommandBuffers {
    pools: Vec<RawCommandPool>,
    buffers: Vec<RawCommandBuffer>,
}

impl SlotCommandBuffers {
    /// Buffer of list `id`
    pub fn buffer(&self, id: u8) -> RawCommandBuffer {
        *self
            .buffers
            .get(usize::from(id))
            .unwrap_or_else(|| panic!("command list {id} was never allocated"))
    }

    /// Number of allocated lists
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no list was allocated yet
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Free/active bookkeeping for one swapchain's command lists
#[derive(Debug)]
pub struct CommandListMultiplexer {
    free: RingBuffer<u8, COMMANDLIST_COUNT>,
    active: RingBuffer<u8, COMMANDLIST_COUNT>,
    count: AtomicUsize,
    capacity: usize,
    family: u32,
}

impl CommandListMultiplexer {
    /// Multiplexer allowing `capacity` lists, recording on queue family `family`
    pub fn new(capacity: usize, family: u32) -> Self {
        assert!(
            (1..=COMMANDLIST_COUNT).contains(&capacity),
            "command list capacity must be in 1..={COMMANDLIST_COUNT}"
        );
        Self {
            free: RingBuffer::new(),
            active: RingBuffer::new(),
            count: AtomicUsize::new(0),
            capacity,
            family,
        }
    }

    /// Start recording a list in slot `current`, returning its id.
    ///
    /// Panics when more than `capacity` lists are needed at once.
    pub fn begin<B: Backend>(
        &self,
        backend: &B,
        slots: &mut [SlotCommandBuffers],
        current: usize,
    ) -> RhiResult<u8> {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                let next = self.count.load(Ordering::Relaxed);
                assert!(
                    next < self.capacity,
                    "command list capacity ({}) exceeded",
                    self.capacity
                );
                // Slots only grow once every one of them got its pool, keeping ids in lockstep.
                let created = self.allocate_in_every_slot(backend, slots.len())?;
                for (slot, (pool, buffer)) in slots.iter_mut().zip(created) {
                    slot.pools.push(pool);
                    slot.buffers.push(buffer);
                }
                self.count.store(next + 1, Ordering::Relaxed);
                log::debug!("Allocated command list {next} across {} frame slot(s)", slots.len());
                #[allow(clippy::cast_possible_truncation)]
                let id = next as u8;
                id
            }
        };

        let slot = &slots[current];
        backend.reset_command_pool(slot.pools[usize::from(id)])?;
        backend.begin_command_buffer(slot.buffers[usize::from(id)], false)?;

        if self.active.push(id).is_err() {
            panic!("active command list ring overflow");
        }
        Ok(id)
    }

    fn allocate_in_every_slot<B: Backend>(
        &self,
        backend: &B,
        slot_count: usize,
    ) -> RhiResult<Vec<(RawCommandPool, RawCommandBuffer)>> {
        let mut created = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let allocated = backend
                .create_command_pool(self.family, false)
                .and_then(|pool| match backend.allocate_command_buffer(pool) {
                    Ok(buffer) => Ok((pool, buffer)),
                    Err(err) => {
                        backend.destroy_command_pool(pool);
                        Err(err)
                    }
                });
            match allocated {
                Ok(pair) => created.push(pair),
                Err(err) => {
                    for (pool, _) in created {
                        backend.destroy_command_pool(pool);
                    }
                    return Err(err);
                }
            }
        }
        Ok(created)
    }

    /// End every active list, move the ids to the free ring and return the buffers in
    /// activation order.
    pub fn end_all<B: Backend>(&self, backend: &B, slot: &SlotCommandBuffers) -> RhiResult<Vec<RawCommandBuffer>> {
        let mut buffers = Vec::with_capacity(self.active.len());
        while let Some(id) = self.active.pop() {
            let buffer = slot.buffer(id);
            backend.end_command_buffer(buffer)?;
            buffers.push(buffer);
            self.release(id);
        }
        Ok(buffers)
    }

    /// Remove `id` from the active ring (for an early submission). Returns whether it was active.
    pub fn take_active(&self, id: u8) -> bool {
        let mut found = false;
        for _ in 0..self.active.len() {
            if let Some(active) = self.active.pop() {
                if active == id && !found {
                    found = true;
                } else if self.active.push(active).is_err() {
                    panic!("active command list ring overflow");
                }
            }
        }
        found
    }

    /// Return `id` to the free ring
    pub fn release(&self, id: u8) {
        if self.free.push(id).is_err() {
            panic!("free command list ring overflow");
        }
    }

    /// Whether any list is recording
    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Ids in the free ring, in reuse order
    pub fn free_ids(&mut self) -> Vec<u8> {
        self.free.to_vec()
    }

    /// Ids in the active ring, in activation order
    pub fn active_ids(&mut self) -> Vec<u8> {
        self.active.to_vec()
    }

    /// Lists allocated so far
    pub fn allocated(&self) -> usize {
        self.count.load(Ordering::Relaxed).min(self.capacity)
    }

    /// Destroy every pool of every slot
    pub fn destroy<B: Backend>(&self, backend: &B, slots: &mut [SlotCommandBuffers]) {
        for slot in slots {
            for pool in slot.pools.drain(..) {
                backend.destroy_command_pool(pool);
            }
            slot.buffers.clear();
        }
    }
}
