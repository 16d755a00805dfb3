//! FIFO of composite frames shared between one producer and its consumers.
//!
//! The deque and its "new frame" flag live under a single lock; consumers
//! block on the paired condition variable with a deadline.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use frames::CompositeFrame;
use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct QueueState {
    frames: VecDeque<CompositeFrame>,
    /// Set by every push, cleared once consumers have drained the queue
    new_frame: bool,
}

/// Blocking frame queue
#[derive(Default)]
pub struct FrameQueue {
    state: Mutex<QueueState>,
    event: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and wake one waiting consumer. Never blocks on consumers.
    ///
    /// Returns the queue length after the push.
    pub fn push(&self, frame: CompositeFrame) -> usize {
        let mut state = self.state.lock();
        state.frames.push_back(frame);
        state.new_frame = true;
        let len = state.frames.len();
        self.event.notify_one();
        len
    }

    /// Oldest frame, waiting up to `timeout` when the queue is empty.
    ///
    /// Returns the frame and the remaining queue length, or `None` on timeout.
    pub fn pop_next(&self, timeout: Duration) -> Option<(CompositeFrame, usize)> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        if state.frames.is_empty() {
            state.new_frame = false;
            while state.frames.is_empty() {
                if self.event.wait_until(&mut state, deadline).timed_out()
                    && state.frames.is_empty()
                {
                    return None;
                }
            }
        }

        let frame = state.frames.pop_front()?;
        if state.frames.is_empty() {
            state.new_frame = false;
        }
        Some((frame, state.frames.len()))
    }

    /// Newest frame once one has arrived since the last drain, discarding the backlog.
    ///
    /// Returns the frame and how many older frames were dropped, or `None` on
    /// timeout.
    pub fn pop_latest(&self, timeout: Duration) -> Option<(CompositeFrame, usize)> {
        let deadline = Instant::now() + timeout;
        let ready = |s: &QueueState| s.new_frame && !s.frames.is_empty();

        let mut state = self.state.lock();
        while !ready(&*state) {
            if self.event.wait_until(&mut state, deadline).timed_out() && !ready(&*state) {
                return None;
            }
        }

        let frame = state.frames.pop_back()?;
        let dropped = state.frames.len();
        state.frames.clear();
        state.new_frame = false;
        Some((frame, dropped))
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().frames.is_empty()
    }
}
