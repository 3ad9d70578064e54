//! Swapchain & frame synchronization
//!
//! One [`SwapchainContext`] exists per loaded swapchain. It owns a ring of frame-in-flight
//! slots, each with an acquire semaphore, a present semaphore, a completion fence and the
//! slot's command buffers. A frame moves through
//! `Idle -> Acquiring -> Recording -> Submitted -> Presenting -> Idle`:
//!
//! - **Acquire** blocks until the presentation engine hands out an image, signaling the
//!   slot's acquire semaphore.
//! - **Submit** sends every active command list as one batch that waits on the acquire
//!   semaphore at color-attachment output, signals the present semaphore and the slot fence.
//! - **Present** waits on the present semaphore. Afterwards the buffers-in-flight counter
//!   grows by one; once it reaches the slot count the CPU blocks on the fence of the next
//!   slot before reusing it. The CPU can therefore run at most `slots - 1` frames ahead.
//!
//! Sync primitives survive swapchain recreation; only images and views are rebuilt.

use crate::backend::{Backend, RawCommandBuffer, RawFence, RawSemaphore, SubmitInfo, INFINITE_TIMEOUT};
use crate::rhi::barrier::PipelineStage;
use crate::rhi::command_lists::{CommandListMultiplexer, SlotCommandBuffers};
use crate::rhi::commands::QueueType;
use crate::rhi::error::RhiResult;
use crate::rhi::resources::{RetireQueue, Retired};

/// Phase of the frame state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Between frames
    Idle,
    /// Waiting for an image
    Acquiring,
    /// Image acquired, command lists may be recorded
    Recording,
    /// The frame's work was submitted early through `queue_submit`
    Submitted,
    /// Waiting on presentation and throttling
    Presenting,
}

/// Synchronization primitives of one frame-in-flight slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSync {
    /// Signaled when the acquired image is ready
    pub acquire: RawSemaphore,
    /// Signaled when rendering is done and the image can be presented
    pub present: RawSemaphore,
    /// Signaled when the slot's submission completed
    pub fence: RawFence,
}

/// Per-swapchain frame state
pub struct SwapchainContext<B: Backend> {
    sync: Vec<FrameSync>,
    commands: Vec<SlotCommandBuffers>,
    lists: CommandListMultiplexer,
    retired: RetireQueue<B>,
    current_frame: usize,
    current_image: u32,
    buffers_in_flight: usize,
    present_family: u32,
    state: FrameState,
}

impl<B: Backend> SwapchainContext<B> {
    /// Create `backbuffer_count` slots. Fences start unsignaled.
    pub fn new(
        backend: &B,
        swapchain: &B::Swapchain,
        backbuffer_count: usize,
        max_command_lists: usize,
    ) -> RhiResult<Self> {
        assert!(backbuffer_count >= 2, "at least two frame slots are required");

        let mut sync = Vec::with_capacity(backbuffer_count);
        for _ in 0..backbuffer_count {
            sync.push(FrameSync {
                acquire: backend.create_semaphore()?,
                present: backend.create_semaphore()?,
                fence: backend.create_fence(false)?,
            });
        }

        let present_family = backend.present_family(swapchain);
        let graphics_family = backend.queue_families().graphics;
        log::debug!(
            "Created swapchain context: {backbuffer_count} frame slot(s), present family {present_family}"
        );

        Ok(Self {
            sync,
            commands: (0..backbuffer_count).map(|_| SlotCommandBuffers::default()).collect(),
            lists: CommandListMultiplexer::new(max_command_lists, graphics_family),
            retired: RetireQueue::new(backbuffer_count),
            current_frame: 0,
            current_image: 0,
            buffers_in_flight: 0,
            present_family,
            state: FrameState::Idle,
        })
    }

    /// Number of frame slots
    pub fn backbuffer_count(&self) -> usize {
        self.sync.len()
    }

    /// Slot being recorded
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Swapchain image acquired for the current frame
    pub fn current_image(&self) -> u32 {
        self.current_image
    }

    /// Frames presented whose fence has not been waited on yet
    pub fn buffers_in_flight(&self) -> usize {
        self.buffers_in_flight
    }

    /// Queue family used for presentation
    pub fn present_family(&self) -> u32 {
        self.present_family
    }

    /// Current phase
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Sync primitives of `slot`
    pub fn frame_sync(&self, slot: usize) -> FrameSync {
        self.sync[slot]
    }

    /// Command list bookkeeping
    pub fn command_lists(&mut self) -> &mut CommandListMultiplexer {
        &mut self.lists
    }

    /// Acquire the next image on the current slot's acquire semaphore
    pub fn begin_frame(&mut self, backend: &B, swapchain: &B::Swapchain) -> RhiResult<u32> {
        assert_eq!(self.state, FrameState::Idle, "begin_frame_exp called while a frame is in progress");

        self.state = FrameState::Acquiring;
        let acquire = self.sync[self.current_frame].acquire;
        let image = match backend.acquire_next_image(swapchain, acquire, INFINITE_TIMEOUT) {
            Ok(image) => image,
            Err(err) => {
                self.state = FrameState::Idle;
                return Err(err);
            }
        };

        self.current_image = image;
        self.state = FrameState::Recording;
        log::trace!("Acquired image {image} in frame slot {}", self.current_frame);
        Ok(image)
    }

    /// Begin a command list in the current slot
    pub fn begin_command_list(&mut self, backend: &B) -> RhiResult<u8> {
        assert_eq!(self.state, FrameState::Recording, "command lists can only be begun while a frame is recording");
        self.lists.begin(backend, &mut self.commands, self.current_frame)
    }

    /// Native buffer of list `id` in the current slot
    pub fn command_buffer(&self, id: u8) -> RawCommandBuffer {
        self.commands[self.current_frame].buffer(id)
    }

    fn frame_submit_info<'a>(&self, command_buffers: &'a [RawCommandBuffer]) -> SubmitInfo<'a> {
        let sync = self.sync[self.current_frame];
        SubmitInfo {
            command_buffers,
            wait: Some((sync.acquire, PipelineStage::COLOR_ATTACHMENT_OUTPUT)),
            signal: Some(sync.present),
            fence: Some(sync.fence),
        }
    }

    /// Submit one list ahead of `end_frame`. It becomes the frame's only submission.
    pub fn submit_list(&mut self, backend: &B, id: u8, queue: QueueType) -> RhiResult<()> {
        assert_eq!(self.state, FrameState::Recording, "frame already submitted");
        assert!(self.lists.take_active(id), "command list {id} is not recording");

        let buffer = self.command_buffer(id);
        backend.end_command_buffer(buffer)?;
        let buffers = [buffer];
        backend.queue_submit(queue, &self.frame_submit_info(&buffers))?;
        self.lists.release(id);
        self.state = FrameState::Submitted;
        Ok(())
    }

    /// Submit the frame's lists (unless submitted early), present and throttle.
    pub fn end_frame(&mut self, backend: &B, swapchain: &B::Swapchain) -> RhiResult<()> {
        match self.state {
            FrameState::Recording => {
                let buffers = self.lists.end_all(backend, &self.commands[self.current_frame])?;
                backend.queue_submit(QueueType::Graphics, &self.frame_submit_info(&buffers))?;
                log::trace!("Submitted {} command list(s) in frame slot {}", buffers.len(), self.current_frame);
            }
            FrameState::Submitted => {
                assert!(
                    !self.lists.has_active(),
                    "command lists begun after an early frame submission cannot be presented"
                );
            }
            state => panic!("end_frame_exp called in state {state:?}"),
        }

        self.state = FrameState::Presenting;
        self.present(backend, swapchain)
    }

    fn present(&mut self, backend: &B, swapchain: &B::Swapchain) -> RhiResult<()> {
        let sync = self.sync[self.current_frame];
        backend.queue_present(swapchain, self.current_image, sync.present)?;

        self.buffers_in_flight += 1;
        let next = (self.current_frame + 1) % self.sync.len();

        if self.buffers_in_flight == self.sync.len() {
            let fence = self.sync[next].fence;
            backend.wait_for_fence(fence, INFINITE_TIMEOUT)?;
            backend.reset_fence(fence)?;
            self.buffers_in_flight -= 1;
            self.retired.release_slot(backend, next);
        }

        self.current_frame = next;
        self.state = FrameState::Idle;
        Ok(())
    }

    /// Park `object` until the slot being recorded has completed on the GPU
    pub fn retire(&mut self, object: Retired<B>) {
        self.retired.retire(self.current_frame, object);
    }

    /// Objects waiting for their slot to complete
    pub fn pending_retired(&self) -> usize {
        self.retired.pending()
    }

    /// Release every retired object. The device must be idle.
    pub fn release_retired(&mut self, backend: &B) -> usize {
        self.retired.release_all(backend)
    }

    /// Destroy pools and sync primitives. The device must be idle.
    pub fn destroy(mut self, backend: &B) {
        self.retired.release_all(backend);
        self.lists.destroy(backend, &mut self.commands);
        for sync in self.sync.drain(..) {
            backend.destroy_semaphore(sync.acquire);
            backend.destroy_semaphore(sync.present);
            backend.destroy_fence(sync.fence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::rhi::handles::WindowHandle;

    fn context(backend: &MockBackend, slots: usize) -> (SwapchainContext<MockBackend>, <MockBackend as Backend>::Swapchain) {
        let swapchain = backend.create_swapchain(&WindowHandle::headless(64, 64), 3).unwrap();
        let context = SwapchainContext::new(backend, &swapchain, slots, 4).unwrap();
        (context, swapchain)
    }

    #[test]
    fn test_frame_advances_slots_and_caps_in_flight() {
        let backend = MockBackend::new();
        let (mut ctx, swapchain) = context(&backend, 3);

        for frame in 0..7 {
            assert_eq!(ctx.current_frame(), frame % 3);
            ctx.begin_frame(&backend, &swapchain).unwrap();
            ctx.begin_command_list(&backend).unwrap();
            ctx.end_frame(&backend, &swapchain).unwrap();
            assert!(ctx.buffers_in_flight() <= 2);
        }

        let stats = backend.stats();
        assert_eq!(stats.submits, 7);
        assert_eq!(stats.presents, 7);
        // The first wait happens on the third frame, then once per frame.
        assert_eq!(stats.fence_waits, 5);
        ctx.destroy(&backend);
        assert_eq!(backend.stats().live_semaphores, 0);
        assert_eq!(backend.stats().live_fences, 0);
    }

    #[test]
    fn test_early_submission_replaces_frame_batch() {
        let backend = MockBackend::new();
        let (mut ctx, swapchain) = context(&backend, 2);

        ctx.begin_frame(&backend, &swapchain).unwrap();
        let id = ctx.begin_command_list(&backend).unwrap();
        ctx.submit_list(&backend, id, QueueType::Graphics).unwrap();
        assert_eq!(ctx.state(), FrameState::Submitted);
        ctx.end_frame(&backend, &swapchain).unwrap();

        assert_eq!(backend.stats().submits, 1);
        assert_eq!(ctx.command_lists().free_ids(), vec![id]);
        assert_eq!(ctx.state(), FrameState::Idle);
    }

    #[test]
    #[should_panic(expected = "frame is in progress")]
    fn test_double_begin_panics() {
        let backend = MockBackend::new();
        let (mut ctx, swapchain) = context(&backend, 2);
        ctx.begin_frame(&backend, &swapchain).unwrap();
        ctx.begin_frame(&backend, &swapchain).unwrap();
    }

    #[test]
    #[should_panic(expected = "while a frame is recording")]
    fn test_command_list_outside_frame_panics() {
        let backend = MockBackend::new();
        let (mut ctx, _swapchain) = context(&backend, 2);
        ctx.begin_command_list(&backend).unwrap();
    }
}
