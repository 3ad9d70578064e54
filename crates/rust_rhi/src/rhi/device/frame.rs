//! Command lists, submission and frame pacing

use super::{expect_valid, not_loaded, Device, LoadedSwapchain};
use crate::backend::{Backend, SubmitInfo};
use crate::foundation::id::INVALID_ID;
use crate::rhi::commands::{CommandList, QueueType};
use crate::rhi::error::RhiResult;
use crate::rhi::handles::SwapchainHandle;
use crate::rhi::swapchain::FrameState;

impl<B: Backend> Device<B> {
    fn loaded_swapchain_mut(&mut self, handle: &SwapchainHandle) -> &mut LoadedSwapchain<B> {
        expect_valid(handle.id, "swapchain");
        self.swapchains.get_mut(handle.id).unwrap_or_else(|| not_loaded("swapchain", handle.id))
    }

    /// Begin a command list on the swapchain of the frame being recorded
    pub fn begin_command_list_exp(&mut self) -> RhiResult<CommandList> {
        let id = self
            .current_swapchain
            .unwrap_or_else(|| panic!("command lists can only be begun while a frame is recording"));
        let swapchain = self.swapchains.get_mut(id).unwrap_or_else(|| not_loaded("swapchain", id));
        let list = swapchain.context.begin_command_list(&self.backend)?;

        log::trace!("Began command list {list} on swapchain {id}");
        Ok(CommandList { id: list, backbuffer_id: swapchain.handle.backbuffer.id, transfer: false })
    }

    /// Begin the one-shot transfer list. It is recorded on the transfer family and its
    /// submission blocks until the queue is idle.
    pub fn begin_transfer_list(&mut self) -> RhiResult<CommandList> {
        assert!(!self.transfer.recording, "transfer list is already recording");

        let pool = match self.transfer.pool {
            Some(pool) => {
                self.backend.reset_command_pool(pool)?;
                pool
            }
            None => {
                let pool = self.backend.create_command_pool(self.families.transfer, true)?;
                self.transfer.buffer = self.backend.allocate_command_buffer(pool)?;
                self.transfer.pool = Some(pool);
                log::debug!("Created transfer command pool on family {}", self.families.transfer);
                pool
            }
        };

        self.backend.begin_command_buffer(self.transfer.buffer, true)?;
        self.transfer.recording = true;
        log::trace!("Began transfer list (pool {:#x})", pool.as_raw());
        Ok(CommandList { id: 0, backbuffer_id: INVALID_ID, transfer: true })
    }

    /// Submit a list on `queue`.
    ///
    /// Transfer lists are submitted without semaphores or fence to a queue of the transfer
    /// family, normally [`QueueType::Transfer`], and the call waits for that queue to drain. A frame list becomes the frame's only submission: it waits for the
    /// acquired image, signals presentation and the slot fence; `end_frame_exp` then only
    /// presents.
    pub fn queue_submit(&mut self, queue: QueueType, cmd: &CommandList) -> RhiResult<()> {
        if cmd.transfer {
            assert!(self.transfer.recording, "transfer list is not recording");
            assert_eq!(
                self.families.family(queue),
                self.families.transfer,
                "transfer lists are recorded on family {} and cannot be submitted to the {queue} queue",
                self.families.transfer
            );

            let buffer = self.transfer.buffer;
            self.backend.end_command_buffer(buffer)?;
            self.transfer.recording = false;
            self.backend
                .queue_submit(queue, &SubmitInfo { command_buffers: &[buffer], ..SubmitInfo::default() })?;
            self.backend.queue_wait_idle(queue)?;
            log::trace!("Transfer list completed on the {queue} queue");
            return Ok(());
        }

        let swapchain_id = *self
            .backbuffers
            .get(&cmd.backbuffer_id)
            .unwrap_or_else(|| panic!("command list {} belongs to unknown backbuffer {}", cmd.id, cmd.backbuffer_id));
        let swapchain = self.swapchains.get_mut(swapchain_id).unwrap_or_else(|| not_loaded("swapchain", swapchain_id));
        swapchain.context.submit_list(&self.backend, cmd.id, queue)
    }

    /// Acquire the next image of `handle` and start recording a frame. Returns the image index.
    pub fn begin_frame_exp(&mut self, handle: &SwapchainHandle) -> RhiResult<u32> {
        expect_valid(handle.id, "swapchain");
        let backend = &self.backend;
        let swapchain = self.swapchains.get_mut(handle.id).unwrap_or_else(|| not_loaded("swapchain", handle.id));
        let image = swapchain.context.begin_frame(backend, &swapchain.native)?;
        self.current_swapchain = Some(handle.id);
        Ok(image)
    }

    /// Submit the frame's command lists, present, and block once `backbuffer_count` frames
    /// are in flight until the oldest one completes
    pub fn end_frame_exp(&mut self, handle: &SwapchainHandle) -> RhiResult<()> {
        expect_valid(handle.id, "swapchain");
        let backend = &self.backend;
        let swapchain = self.swapchains.get_mut(handle.id).unwrap_or_else(|| not_loaded("swapchain", handle.id));
        swapchain.context.end_frame(backend, &swapchain.native)
    }

    /// Recreate the swapchain images for the handle's current window size and rebuild its
    /// backbuffer render target under the same id. Frame sync primitives are reused.
    pub fn rebuild_swapchain(&mut self, handle: &SwapchainHandle) -> RhiResult<()> {
        {
            let swapchain = self.loaded_swapchain_mut(handle);
            assert_eq!(
                swapchain.context.state(),
                FrameState::Idle,
                "rebuild_swapchain called while a frame is in progress"
            );
            assert_eq!(
                swapchain.handle.backbuffer.id, handle.backbuffer.id,
                "swapchain {} was loaded with a different backbuffer",
                handle.id
            );
        }
        self.wait_idle()?;

        let backbuffer_id = handle.backbuffer.id;
        if let Some(target) = self.tables.render_targets.remove(backbuffer_id) {
            let views = self.backend.render_target_views(&target);
            // The device is idle, nothing can still reference these.
            for framebuffer in self.evict_views(&views) {
                self.backend.destroy_framebuffer(framebuffer);
            }
            drop(target);
        }

        let backend = &self.backend;
        let swapchain = self.swapchains.get_mut(handle.id).unwrap_or_else(|| not_loaded("swapchain", handle.id));
        backend.recreate_swapchain(&mut swapchain.native, &handle.window)?;
        swapchain.handle.window = handle.window;
        let backbuffer = backend.create_backbuffer(&swapchain.native)?;

        if self.tables.render_targets.insert(backbuffer_id, backbuffer).is_err() {
            panic!("render target {backbuffer_id} is already loaded");
        }
        log::info!(
            "Rebuilt swapchain {} at {}x{}",
            handle.id,
            handle.window.width,
            handle.window.height
        );
        Ok(())
    }
}
