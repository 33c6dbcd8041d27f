use crate::{context::RenderContext, types::QueueType, Backend};

/// Frame index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Frame(usize);

impl From<usize> for Frame {
    fn from(value: usize) -> Self {
        Frame(value)
    }
}

impl From<Frame> for usize {
    fn from(value: Frame) -> Self {
        value.0
    }
}

/// Bounds how far the CPU runs ahead of the GPU.
///
/// Each frame in flight has a slot remembering the last submission made on each queue while
/// that frame was recorded. Before a slot is reused, [`FramePacer::begin_frame`] waits on
/// those submissions.
pub struct FramePacer {
    slots: Vec<[u64; QueueType::COUNT]>,
    current: usize,
}

impl FramePacer {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: vec![[0; QueueType::COUNT]; frames_in_flight.max(1)],
            current: 0,
        }
    }

    #[inline(always)]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn current(&self) -> Frame {
        Frame(self.current)
    }

    /// Waits until the GPU has finished the frame that last used this slot, then retires
    /// completed work. Returns `false` if the wait timed out; the caller may skip the frame.
    pub fn begin_frame<B: Backend>(&mut self, ctx: &RenderContext<B>) -> bool {
        puffin::profile_function!();

        let timeout = ctx.config().wait_timeout();
        let mut reached = true;
        for ty in QueueType::ALL {
            let id = self.slots[self.current][ty.index()];
            if id != 0 && !ctx.wait_command_list(ty, id, timeout) {
                log::warn!("timed out waiting on frame {} ({ty:?} submission {id})", self.current);
                reached = false;
            }
        }

        ctx.retire();

        if reached {
            self.slots[self.current] = [0; QueueType::COUNT];
        }
        reached
    }

    /// Remembers a submission made while recording the current frame.
    pub fn record_submission(&mut self, queue: QueueType, id: u64) {
        let slot = &mut self.slots[self.current][queue.index()];
        *slot = (*slot).max(id);
    }

    pub fn end_frame(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }
}
