//! Inference engine boundary.
//!
//! The neural network itself (parameter loading, forward-pass execution) is
//! an external collaborator behind the [`InferenceEngine`] trait. The
//! decoding loop hands it feature windows plus the session's cache and gets
//! back encoder output and an updated cache; it never looks inside either.

pub mod cache;

pub use cache::EncoderCache;

use crate::defaults;
use crate::error::{Result, RillError};
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Trait for the opaque forward-pass executor.
///
/// Implementations must treat the cache as theirs alone: the value passed to
/// `forward` is exactly the value returned from the previous call (or the
/// empty seed), and the returned value is stored untouched.
pub trait InferenceEngine: Send + Sync {
    /// Runs one encoder chunk.
    ///
    /// `window` holds the chunk's feature frames plus the trailing
    /// right-context lookahead; `offset` is the absolute index of the first
    /// frame whose output this call produces. Returns the encoder output for
    /// the chunk (one row per newly covered frame, i.e. the window minus its
    /// lookahead) and the updated cache.
    fn forward(
        &self,
        window: ArrayView2<f32>,
        cache: &EncoderCache,
        offset: usize,
    ) -> Result<(Array2<f32>, EncoderCache)>;

    /// Projects encoder output to per-frame log-probabilities over the
    /// vocabulary (blank included).
    fn project(&self, encoder_out: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Scores one candidate sequence against the full encoder output.
    fn rescore(&self, encoder_out: ArrayView2<f32>, candidate: &[u32]) -> Result<f32>;

    /// Output dimension of [`project`](Self::project); must match the
    /// symbol table size.
    fn vocab_size(&self) -> usize;

    /// Lookahead frames this encoder needs beyond each chunk.
    fn right_context(&self) -> usize;
}

/// Implement InferenceEngine for Arc<T> to allow sharing across sessions.
impl<T: InferenceEngine> InferenceEngine for Arc<T> {
    fn forward(
        &self,
        window: ArrayView2<f32>,
        cache: &EncoderCache,
        offset: usize,
    ) -> Result<(Array2<f32>, EncoderCache)> {
        (**self).forward(window, cache, offset)
    }

    fn project(&self, encoder_out: ArrayView2<f32>) -> Result<Array2<f32>> {
        (**self).project(encoder_out)
    }

    fn rescore(&self, encoder_out: ArrayView2<f32>, candidate: &[u32]) -> Result<f32> {
        (**self).rescore(encoder_out, candidate)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn right_context(&self) -> usize {
        (**self).right_context()
    }
}

/// Deterministic mock engine for testing.
///
/// Behaves like a streaming encoder with an internal recurrence: each output
/// row mixes its frame with the lookahead frames after it, plus a running
/// state threaded through the cache. Feeding the same frames chunk-by-chunk
/// or all at once therefore yields identical output — unless the caller
/// mis-slices the window, passes a stale cache, or advances the offset
/// wrongly, in which case outputs diverge or `forward` reports an error.
///
/// Encoder output rows carry `[absolute_frame_index, mixed_value]`; the
/// projection reads the absolute index to look up a scripted per-frame token
/// (defaulting to blank), so decoded sequences pin down exactly which frames
/// were processed.
#[derive(Debug, Clone)]
pub struct MockEngine {
    vocab_size: usize,
    right_context: usize,
    /// Token emitted at each absolute frame index; frames beyond the script
    /// emit blank.
    frame_tokens: Vec<u32>,
    /// Probability mass placed on the scripted token.
    peak: f32,
    /// Rescoring bonus per preferred sequence.
    preferred: Vec<(Vec<u32>, f32)>,
    fail_forward: bool,
    fail_rescore: bool,
}

impl MockEngine {
    /// Creates a mock with a 6-symbol vocabulary and 2 frames of lookahead.
    pub fn new() -> Self {
        Self {
            vocab_size: 6,
            right_context: 2,
            frame_tokens: Vec::new(),
            peak: 0.9,
            preferred: Vec::new(),
            fail_forward: false,
            fail_rescore: false,
        }
    }

    /// Overrides the vocabulary size.
    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = vocab_size;
        self
    }

    /// Overrides the required lookahead.
    pub fn with_right_context(mut self, right_context: usize) -> Self {
        self.right_context = right_context;
        self
    }

    /// Scripts the token emitted per absolute frame index.
    pub fn with_frame_tokens(mut self, tokens: Vec<u32>) -> Self {
        self.frame_tokens = tokens;
        self
    }

    /// Overrides the probability mass on the scripted token.
    pub fn with_peak(mut self, peak: f32) -> Self {
        self.peak = peak;
        self
    }

    /// Adds a rescoring bonus for one candidate sequence.
    pub fn with_preferred(mut self, sequence: Vec<u32>, bonus: f32) -> Self {
        self.preferred.push((sequence, bonus));
        self
    }

    /// Configures the mock to fail on forward.
    pub fn with_forward_failure(mut self) -> Self {
        self.fail_forward = true;
        self
    }

    /// Configures the mock to fail on rescore.
    pub fn with_rescore_failure(mut self) -> Self {
        self.fail_rescore = true;
        self
    }

    fn token_at(&self, frame: usize) -> u32 {
        self.frame_tokens
            .get(frame)
            .copied()
            .unwrap_or(defaults::BLANK_ID)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine for MockEngine {
    fn forward(
        &self,
        window: ArrayView2<f32>,
        cache: &EncoderCache,
        offset: usize,
    ) -> Result<(Array2<f32>, EncoderCache)> {
        if self.fail_forward {
            return Err(RillError::Engine {
                message: "mock forward failure".to_string(),
            });
        }

        // The cache must be the exact value from the previous call: the
        // seed pairs with offset 0, a live cache records the offset it was
        // produced at.
        let mut state = if cache.is_empty() {
            if offset != 0 {
                return Err(RillError::Engine {
                    message: format!("seed cache passed at offset {}", offset),
                });
            }
            0.0f32
        } else {
            let recorded = cache.subsampling[[0, 1]];
            if recorded != offset as f32 {
                return Err(RillError::Engine {
                    message: format!(
                        "cache recorded offset {} but forward called at {}",
                        recorded, offset
                    ),
                });
            }
            cache.subsampling[[0, 0]]
        };

        let in_rows = window.nrows();
        let emitted = in_rows.saturating_sub(self.right_context);
        let mut out = Array2::zeros((emitted, 2));
        for i in 0..emitted {
            // Mix the frame with its lookahead, weighted by distance.
            let mut base = 0.0f32;
            for j in 0..=self.right_context {
                base += window[[i + j, 0]] / (j + 1) as f32;
            }
            out[[i, 0]] = (offset + i) as f32;
            out[[i, 1]] = base + 0.001 * state;
            state += base;
        }

        let mut subsampling = Array2::zeros((1, 2));
        subsampling[[0, 0]] = state;
        subsampling[[0, 1]] = (offset + emitted) as f32;
        let new_cache = EncoderCache {
            subsampling,
            layers: vec![Array2::from_elem((1, 1), (offset + emitted) as f32)],
            conv: Vec::new(),
        };

        Ok((out, new_cache))
    }

    fn project(&self, encoder_out: ArrayView2<f32>) -> Result<Array2<f32>> {
        let frames = encoder_out.nrows();
        let vocab = self.vocab_size;
        let peak = self.peak.ln();
        let rest = ((1.0 - self.peak) / (vocab - 1) as f32).ln();

        let mut log_probs = Array2::from_elem((frames, vocab), rest);
        for i in 0..frames {
            let frame = encoder_out[[i, 0]].round() as usize;
            let token = self.token_at(frame) as usize;
            log_probs[[i, token]] = peak;
        }
        Ok(log_probs)
    }

    fn rescore(&self, encoder_out: ArrayView2<f32>, candidate: &[u32]) -> Result<f32> {
        if self.fail_rescore {
            return Err(RillError::Rescore {
                message: "mock rescore failure".to_string(),
            });
        }

        let bonus = self
            .preferred
            .iter()
            .find(|(seq, _)| seq == candidate)
            .map(|(_, b)| *b)
            .unwrap_or(0.0);

        // Longer candidates cost more; the encoder output length nudges the
        // score so rescoring visibly depends on the accumulated output.
        Ok(bonus - 0.05 * candidate.len() as f32 - 0.0001 * encoder_out.nrows() as f32)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn right_context(&self) -> usize {
        self.right_context
    }
}
