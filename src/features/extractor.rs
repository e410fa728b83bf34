//! Feature extraction boundary.

use crate::defaults;

/// One acoustic feature vector covering a single time step.
///
/// Immutable once produced; the buffer and decoding loop only move it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    values: Vec<f32>,
}

impl FeatureFrame {
    /// Creates a frame from its feature values.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Returns the feature dimension.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Returns the feature values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Trait for the acoustic feature transform.
///
/// Implementations must be pure functions of the input window: the same
/// samples always produce the same frames, regardless of how the audio was
/// split across calls. The framing accessors let the buffer compute how many
/// samples each produced frame consumed.
pub trait FeatureExtractor: Send + Sync {
    /// Computes feature frames over every complete analysis window in
    /// `samples`. Samples beyond the last complete window are ignored; the
    /// caller retains them for the next call.
    fn compute(&self, samples: &[f32]) -> Vec<FeatureFrame>;

    /// Analysis window length in samples.
    fn frame_length(&self) -> usize;

    /// Hop between successive analysis windows in samples.
    fn frame_shift(&self) -> usize;

    /// Feature dimension of each produced frame.
    fn num_bins(&self) -> usize;
}

/// Mock feature extractor for testing.
///
/// Produces deterministic frames: every bin of a frame holds the mean of its
/// analysis window, so frame values are a pure function of the input window
/// and chunking-invariance can be asserted exactly.
#[derive(Debug, Clone)]
pub struct MockFeatureExtractor {
    frame_length: usize,
    frame_shift: usize,
    num_bins: usize,
}

impl MockFeatureExtractor {
    /// Creates a mock with the default 25ms/10ms geometry at 16kHz.
    pub fn new() -> Self {
        Self {
            frame_length: defaults::ms_to_samples(defaults::FRAME_LENGTH_MS, defaults::SAMPLE_RATE),
            frame_shift: defaults::ms_to_samples(defaults::FRAME_SHIFT_MS, defaults::SAMPLE_RATE),
            num_bins: defaults::NUM_BINS,
        }
    }

    /// Overrides the window geometry (samples).
    pub fn with_geometry(mut self, frame_length: usize, frame_shift: usize) -> Self {
        self.frame_length = frame_length;
        self.frame_shift = frame_shift;
        self
    }

    /// Overrides the feature dimension.
    pub fn with_bins(mut self, num_bins: usize) -> Self {
        self.num_bins = num_bins;
        self
    }

    /// Number of complete windows in `len` samples.
    fn num_frames(&self, len: usize) -> usize {
        if len < self.frame_length {
            0
        } else {
            1 + (len - self.frame_length) / self.frame_shift
        }
    }
}

impl Default for MockFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for MockFeatureExtractor {
    fn compute(&self, samples: &[f32]) -> Vec<FeatureFrame> {
        let num_frames = self.num_frames(samples.len());
        (0..num_frames)
            .map(|i| {
                let start = i * self.frame_shift;
                let window = &samples[start..start + self.frame_length];
                let mean = window.iter().sum::<f32>() / self.frame_length as f32;
                FeatureFrame::new(vec![mean; self.num_bins])
            })
            .collect()
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn frame_shift(&self) -> usize {
        self.frame_shift
    }

    fn num_bins(&self) -> usize {
        self.num_bins
    }
}
