use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    id_gen::ResourceId, resource::ResourceRef, types::QueueType, Backend, BackendError,
};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unable to allocate a command buffer on the {queue:?} queue: {source}")]
    OutOfCommandBuffers {
        queue: QueueType,
        source: BackendError,
    },
    #[error("submission to the {queue:?} queue failed: {source}")]
    Submit {
        queue: QueueType,
        source: BackendError,
    },
    #[error("{0}")]
    Backend(#[from] BackendError),
}

/// Where a pooled command buffer is in its life.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandBufferState {
    Free,
    Recording,
    /// Submitted and waiting for the queue to reach the given id.
    InFlight { submission_id: u64 },
}

/// A dependency on another queue's submission, consumed by the next submit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct QueueWait {
    pub queue: QueueType,
    pub submission_id: u64,
}

/// A pooled command buffer along with every resource its recorded work refers to.
pub struct TrackedCommandBuffer<B: Backend> {
    raw: B::CommandBuffer,
    state: CommandBufferState,
    recording_id: u64,
    submission_id: u64,
    referenced: FxHashMap<ResourceId, ResourceRef<B>>,
}

/// Command buffer pool and submission timeline for one hardware queue.
pub struct Queue<B: Backend> {
    ty: QueueType,
    backend: Arc<B>,
    next_recording_id: AtomicU64,
    last_submitted: AtomicU64,
    /// Last completed value we've seen from the backend. Never ahead of the real value.
    last_completed: AtomicU64,
    state: Mutex<QueueState<B>>,
}

struct QueueState<B: Backend> {
    free: Vec<TrackedCommandBuffer<B>>,
    /// Ordered by submission id.
    in_flight: VecDeque<TrackedCommandBuffer<B>>,
    pending_waits: SmallVec<[QueueWait; 2]>,
    /// Total number of command buffers allocated from the backend.
    command_buffer_count: usize,
}

impl<B: Backend> TrackedCommandBuffer<B> {
    #[inline(always)]
    pub fn raw(&self) -> &B::CommandBuffer {
        &self.raw
    }

    #[inline(always)]
    pub(crate) fn raw_mut(&mut self) -> &mut B::CommandBuffer {
        &mut self.raw
    }

    #[inline(always)]
    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    #[inline(always)]
    pub fn recording_id(&self) -> u64 {
        self.recording_id
    }

    /// Zero until the buffer has been submitted.
    #[inline(always)]
    pub fn submission_id(&self) -> u64 {
        self.submission_id
    }

    /// Keeps `resource` alive until this buffer's work is retired.
    #[inline(always)]
    pub(crate) fn reference(&mut self, resource: impl Into<ResourceRef<B>>) {
        let resource = resource.into();
        self.referenced.entry(resource.id()).or_insert(resource);
    }

    #[inline(always)]
    pub fn referenced_count(&self) -> usize {
        self.referenced.len()
    }
}

impl<B: Backend> Queue<B> {
    pub(crate) fn new(ty: QueueType, backend: Arc<B>) -> Self {
        Self {
            ty,
            backend,
            next_recording_id: AtomicU64::new(0),
            last_submitted: AtomicU64::new(0),
            last_completed: AtomicU64::new(0),
            state: Mutex::new(QueueState {
                free: Vec::default(),
                in_flight: VecDeque::default(),
                pending_waits: SmallVec::default(),
                command_buffer_count: 0,
            }),
        }
    }

    #[inline(always)]
    pub fn ty(&self) -> QueueType {
        self.ty
    }

    /// Checks out a command buffer for recording. Free buffers are reused before new ones are
    /// allocated.
    ///
    /// # Panics
    /// If the backend reports a fatal error while allocating.
    pub fn acquire(&self) -> Result<TrackedCommandBuffer<B>, QueueError> {
        let recording_id = self.next_recording_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.lock();

        let raw = match state.free.pop() {
            Some(cb) => cb.raw,
            None => match self.allocate(&mut state) {
                Ok(raw) => raw,
                Err(err) => {
                    // Out of space. Recycle whatever has finished and try once more.
                    log::warn!(
                        "command buffer allocation failed on the {:?} queue ({err}). retrying.",
                        self.ty
                    );
                    self.retire_locked(&mut state);
                    match state.free.pop() {
                        Some(cb) => cb.raw,
                        None => self.allocate(&mut state).map_err(|source| {
                            QueueError::OutOfCommandBuffers {
                                queue: self.ty,
                                source,
                            }
                        })?,
                    }
                }
            },
        };

        Ok(TrackedCommandBuffer {
            raw,
            state: CommandBufferState::Recording,
            recording_id,
            submission_id: 0,
            referenced: FxHashMap::default(),
        })
    }

    /// Hands a command buffer that was never submitted back to the pool.
    pub(crate) fn recycle(&self, mut cb: TrackedCommandBuffer<B>) {
        cb.referenced.clear();
        cb.state = CommandBufferState::Free;
        unsafe {
            self.backend.reset_command_buffer(&mut cb.raw);
        }
        self.lock().free.push(cb);
    }

    /// Submits a batch of closed command buffers. Returns the id the queue's timeline will
    /// reach once all of them have completed.
    ///
    /// On failure the buffers are returned to the pool and their references released. Pending
    /// cross-queue waits are kept for the next submission.
    pub fn submit(&self, buffers: Vec<TrackedCommandBuffer<B>>) -> Result<u64, QueueError> {
        puffin::profile_function!();

        let mut state = self.lock();
        let id = self.last_submitted.load(Ordering::Acquire) + 1;
        let waits = std::mem::take(&mut state.pending_waits);

        let result = {
            let raw: SmallVec<[&B::CommandBuffer; 4]> =
                buffers.iter().map(|cb| &cb.raw).collect();
            unsafe { self.backend.submit(self.ty, &raw, id, &waits) }
        };

        if let Err(source) = result {
            log::error!("submission to the {:?} queue failed: {source}", self.ty);
            // The dependencies still apply to whatever is submitted next.
            state.pending_waits = waits;
            for mut cb in buffers {
                cb.referenced.clear();
                cb.state = CommandBufferState::Free;
                unsafe {
                    self.backend.reset_command_buffer(&mut cb.raw);
                }
                state.free.push(cb);
            }
            return Err(QueueError::Submit {
                queue: self.ty,
                source,
            });
        }

        self.last_submitted.store(id, Ordering::Release);
        for mut cb in buffers {
            debug_assert_eq!(cb.state, CommandBufferState::Recording);
            cb.submission_id = id;
            cb.state = CommandBufferState::InFlight { submission_id: id };
            state.in_flight.push_back(cb);
        }

        Ok(id)
    }

    /// Moves every command buffer whose work has completed back to the free list, releasing
    /// the resources it referenced. Never blocks on the GPU. Returns how many were retired.
    pub fn retire(&self) -> usize {
        puffin::profile_function!();
        let mut state = self.lock();
        self.retire_locked(&mut state)
    }

    /// Non-blocking check for whether submission `id` has completed.
    pub fn poll(&self, id: u64) -> bool {
        debug_assert!(
            id <= self.last_submitted_id(),
            "polled id {id} was never submitted to the {:?} queue",
            self.ty
        );

        if id <= self.last_completed.load(Ordering::Acquire) {
            return true;
        }

        self.refresh_completed() >= id
    }

    /// Blocks until submission `id` has completed or `timeout` elapses. `None` waits forever.
    pub fn wait(&self, id: u64, timeout: Option<Duration>) -> bool {
        debug_assert!(
            id <= self.last_submitted_id(),
            "waited on id {id} which was never submitted to the {:?} queue",
            self.ty
        );

        if self.poll(id) {
            return true;
        }

        puffin::profile_function!();
        let reached = unsafe { self.backend.wait_for_value(self.ty, id, timeout) };
        if reached {
            self.last_completed.fetch_max(id, Ordering::AcqRel);
        }
        reached
    }

    /// Waits for everything submitted so far, then retires it.
    pub fn wait_idle(&self) {
        let last = self.last_submitted_id();
        if last > 0 {
            self.wait(last, None);
        }
        self.retire();
    }

    /// Makes the next submission on this queue wait for `wait`.
    pub fn add_wait(&self, wait: QueueWait) {
        debug_assert_ne!(wait.queue, self.ty, "a queue can't wait on itself");
        self.lock().pending_waits.push(wait);
    }

    #[inline(always)]
    pub fn last_submitted_id(&self) -> u64 {
        self.last_submitted.load(Ordering::Acquire)
    }

    /// Re-reads the timeline from the backend.
    #[inline(always)]
    pub fn last_completed_id(&self) -> u64 {
        self.refresh_completed()
    }

    #[inline(always)]
    pub fn free_count(&self) -> usize {
        self.lock().free.len()
    }

    #[inline(always)]
    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    #[inline(always)]
    pub fn command_buffer_count(&self) -> usize {
        self.lock().command_buffer_count
    }

    /// Frees every pooled command buffer. Everything must have been retired first.
    pub(crate) unsafe fn release(&self) {
        let mut state = self.lock();
        debug_assert!(state.in_flight.is_empty());

        let free = std::mem::take(&mut state.free);
        for cb in free {
            self.backend.free_command_buffer(self.ty, cb.raw);
        }
        state.command_buffer_count = 0;
    }

    #[inline(always)]
    fn lock(&self) -> MutexGuard<QueueState<B>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline(always)]
    fn refresh_completed(&self) -> u64 {
        let completed = unsafe { self.backend.completed_value(self.ty) };
        self.last_completed.fetch_max(completed, Ordering::AcqRel);
        completed
    }

    fn allocate(&self, state: &mut QueueState<B>) -> Result<B::CommandBuffer, BackendError> {
        match unsafe { self.backend.allocate_command_buffer(self.ty) } {
            Ok(raw) => {
                state.command_buffer_count += 1;
                log::debug!(
                    "allocated command buffer #{} on the {:?} queue",
                    state.command_buffer_count,
                    self.ty
                );
                Ok(raw)
            }
            Err(err) if err.is_fatal() => {
                log::error!(
                    "fatal error while allocating a command buffer on the {:?} queue: {err}",
                    self.ty
                );
                panic!("fatal command buffer allocation failure: {err}");
            }
            Err(err) => Err(err),
        }
    }

    fn retire_locked(&self, state: &mut QueueState<B>) -> usize {
        let completed = self.refresh_completed();
        let mut retired = 0;

        while state
            .in_flight
            .front()
            .map(|cb| cb.submission_id <= completed)
            .unwrap_or(false)
        {
            let Some(mut cb) = state.in_flight.pop_front() else {
                break;
            };
            cb.referenced.clear();
            cb.state = CommandBufferState::Free;
            unsafe {
                self.backend.reset_command_buffer(&mut cb.raw);
            }
            state.free.push(cb);
            retired += 1;
        }

        retired
    }
}
