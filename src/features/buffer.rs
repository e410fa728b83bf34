//! Streaming feature buffer.
//!
//! Decouples audio ingestion from feature consumption: the producer pushes
//! raw waveform, the consumer reads fully formed feature frames. Supports
//! exactly one concurrent producer and one concurrent consumer; reads block
//! until enough frames exist or end-of-input is observed, so no frame is
//! ever fabricated or skipped.

use crate::error::{Result, RillError};
use crate::features::extractor::{FeatureExtractor, FeatureFrame};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

struct BufferState {
    queue: VecDeque<FeatureFrame>,
    /// Waveform samples not yet covering a complete analysis window.
    tail: Vec<f32>,
    frames_produced: u64,
    finished: bool,
}

/// Thread-safe bounded queue of feature frames fed by raw audio.
pub struct StreamingFeatureBuffer {
    extractor: Box<dyn FeatureExtractor>,
    state: Mutex<BufferState>,
    available: Condvar,
}

impl StreamingFeatureBuffer {
    /// Creates a buffer around the given feature extractor.
    pub fn new(extractor: Box<dyn FeatureExtractor>) -> Self {
        Self {
            extractor,
            state: Mutex::new(BufferState {
                queue: VecDeque::new(),
                tail: Vec::new(),
                frames_produced: 0,
                finished: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // A panic while holding the lock leaves the state coherent enough to
        // read; recover instead of propagating the poison.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends raw audio and pushes every fully formed feature frame.
    ///
    /// Previously unconsumed tail samples are prepended before extraction;
    /// samples not yet covering a complete window are retained as the new
    /// tail. Fails with a misuse error once [`finish`](Self::finish) has
    /// been called.
    pub fn accept_waveform(&self, samples: &[f32]) -> Result<()> {
        let mut state = self.lock();
        if state.finished {
            return Err(RillError::misuse("waveform accepted after input finished"));
        }

        let mut waves = std::mem::take(&mut state.tail);
        waves.extend_from_slice(samples);

        let frames = self.extractor.compute(&waves);
        let consumed = frames.len() * self.extractor.frame_shift();

        state.tail = waves.split_off(consumed.min(waves.len()));
        state.frames_produced += frames.len() as u64;
        state.queue.extend(frames);

        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Marks the end of input. No further waveform may be accepted; readers
    /// drain the remaining queued frames and then observe exhaustion.
    ///
    /// Calling this twice is a misuse error.
    pub fn finish(&self) -> Result<()> {
        let mut state = self.lock();
        if state.finished {
            return Err(RillError::misuse("input finished twice"));
        }
        state.finished = true;
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Reads the next frame, blocking until one is available.
    ///
    /// Returns `None` once the queue is drained after end-of-input.
    pub fn read_one(&self) -> Option<FeatureFrame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.queue.pop_front() {
                return Some(frame);
            }
            if state.finished {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Reads exactly `n` frames, blocking until they are available.
    ///
    /// Returns `None` if fewer than `n` frames remain before exhaustion. The
    /// failure path consumes nothing: a partial batch is never handed out
    /// and the queued frames stay readable one by one.
    pub fn read_batch(&self, n: usize) -> Option<Vec<FeatureFrame>> {
        let mut state = self.lock();
        loop {
            if state.queue.len() >= n {
                return Some(state.queue.drain(..n).collect());
            }
            if state.finished {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Total frames produced since construction or the last reset.
    pub fn num_frames_produced(&self) -> u64 {
        self.lock().frames_produced
    }

    /// Frames currently queued and not yet read.
    pub fn num_frames_queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns true once [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Clears all state (queue, tail, counters, flag) for a new utterance.
    ///
    /// Must not race with an in-flight read; resets are exclusive by
    /// contract.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.queue.clear();
        state.tail.clear();
        state.frames_produced = 0;
        state.finished = false;
        drop(state);
        self.available.notify_all();
    }
}
