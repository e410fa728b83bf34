//! Default configuration constants for rill.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and matches the rate most
/// streaming acoustic models are trained on.
pub const SAMPLE_RATE: u32 = 16000;

/// Default number of mel filterbank bins per feature frame.
pub const NUM_BINS: usize = 80;

/// Default analysis window length in milliseconds.
pub const FRAME_LENGTH_MS: u32 = 25;

/// Default hop between successive analysis windows in milliseconds.
pub const FRAME_SHIFT_MS: u32 = 10;

/// Default number of feature frames per encoder chunk.
///
/// 16 frames at a 10ms shift gives a 160ms decoding step, which keeps
/// first-word latency well under half a second.
pub const CHUNK_SIZE: usize = 16;

/// Default right-context lookahead in frames.
///
/// Streaming encoders need a few future frames to stabilize the output at
/// the chunk boundary. These frames are read ahead but re-enter the next
/// chunk's window.
pub const RIGHT_CONTEXT: usize = 4;

/// Default prefix-search beam width.
///
/// 10 candidates is enough for the second pass to recover most search
/// errors without hurting the per-chunk latency budget.
pub const BEAM_WIDTH: usize = 10;

/// Default weight applied to the prefix-search score when combining it with
/// the second-pass rescoring log-probability.
pub const SEARCH_WEIGHT: f32 = 0.5;

/// Default number of beam candidates handed to the rescorer.
pub const RESCORE_TOP_K: usize = 5;

/// Symbol id reserved for the CTC blank.
pub const BLANK_ID: u32 = 0;

/// Converts a duration in milliseconds to a sample count at the given rate.
pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}
