//! Chunk-driven decoding session.
//!
//! Pulls fixed-size frame windows (plus right-context lookahead) from the
//! feature buffer, runs the inference engine with the carried encoder
//! cache, and advances the prefix search after every chunk.
//!
//! Lookahead accounting: the session keeps the last `right_context` frames
//! of each window and prepends them to the next one, so every frame is read
//! from the buffer exactly once but lookahead frames inform two consecutive
//! windows. The offset handed to the engine advances by the number of
//! output rows the engine emitted, never by the lookahead.

use crate::config::Config;
use crate::engine::{EncoderCache, InferenceEngine};
use crate::error::{Result, RillError};
use crate::features::buffer::StreamingFeatureBuffer;
use crate::features::extractor::FeatureFrame;
use crate::search::prefix_beam::{PrefixBeamSearch, PrefixBeamSearchConfig};
use crate::decoder::rescorer::Rescorer;
use crate::symbols::SymbolTable;
use ndarray::{Array2, Axis};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Running,
    Finished,
    /// Engine failure left the cache inconsistent; only reset() recovers.
    Failed,
}

/// One utterance's decoding state: cache, offset, accumulated encoder
/// output and candidate beam. Serves one utterance at a time; reset()
/// prepares it for the next.
pub struct DecodeSession<E: InferenceEngine> {
    engine: E,
    buffer: Arc<StreamingFeatureBuffer>,
    symbols: SymbolTable,
    chunk_size: usize,
    right_context: usize,
    rescorer: Rescorer,
    search: PrefixBeamSearch,
    cache: EncoderCache,
    /// Lookahead frames carried into the next window.
    lookahead: Vec<FeatureFrame>,
    /// Encoder output, one entry per processed chunk.
    encoder_chunks: Vec<Array2<f32>>,
    /// Absolute index of the next frame whose output the engine will emit.
    offset: usize,
    started: bool,
    state: SessionState,
}

impl<E: InferenceEngine> DecodeSession<E> {
    /// Creates a session, validating the configuration against the engine
    /// and symbol table before any audio flows.
    pub fn new(
        engine: E,
        buffer: Arc<StreamingFeatureBuffer>,
        symbols: SymbolTable,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        if engine.vocab_size() != symbols.size() {
            return Err(RillError::VocabSizeMismatch {
                engine: engine.vocab_size(),
                table: symbols.size(),
            });
        }
        if engine.right_context() != config.decode.right_context {
            return Err(RillError::ConfigInvalidValue {
                key: "decode.right_context".to_string(),
                message: format!(
                    "engine requires {} frames of lookahead, configured {}",
                    engine.right_context(),
                    config.decode.right_context
                ),
            });
        }

        let search = PrefixBeamSearch::with_config(PrefixBeamSearchConfig {
            beam_width: config.decode.beam_width,
            blank_id: crate::defaults::BLANK_ID,
        });

        Ok(Self {
            engine,
            buffer,
            symbols,
            chunk_size: config.decode.chunk_size,
            right_context: config.decode.right_context,
            rescorer: Rescorer::with_config(config.rescore.clone()),
            search,
            cache: EncoderCache::empty(),
            lookahead: Vec::new(),
            encoder_chunks: Vec::new(),
            offset: 0,
            started: false,
            state: SessionState::Running,
        })
    }

    /// Processes the next chunk. Blocks until a full window is available or
    /// end-of-input is observed.
    ///
    /// Returns `Ok(true)` once decoding reached the end of the feature
    /// stream. Calling again after that, or after a failure, is a misuse
    /// error.
    pub fn advance(&mut self) -> Result<bool> {
        match self.state {
            SessionState::Finished => {
                return Err(RillError::misuse("advance called after decoding finished"));
            }
            SessionState::Failed => {
                return Err(RillError::misuse(
                    "advance called on a failed session; reset first",
                ));
            }
            SessionState::Running => {}
        }

        let needed = self.chunk_size + self.right_context - self.lookahead.len();
        let (fresh, at_end) = match self.buffer.read_batch(needed) {
            Some(frames) => (frames, false),
            None => {
                // Input finished with less than a full window left; the
                // failed batch read consumed nothing, so drain the rest
                // for one final short chunk.
                let mut rest = Vec::new();
                while let Some(frame) = self.buffer.read_one() {
                    rest.push(frame);
                }
                (rest, true)
            }
        };

        let mut window = std::mem::take(&mut self.lookahead);
        window.extend(fresh);

        // Only carried lookahead (or nothing) remains: every emitted frame
        // already has its output, so there is no further chunk to run.
        if at_end && window.len() <= self.right_context {
            self.state = SessionState::Finished;
            return Ok(true);
        }

        let input = frames_to_matrix(&window);
        let (out, new_cache) = match self.engine.forward(input.view(), &self.cache, self.offset) {
            Ok(result) => result,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        self.cache = new_cache;
        self.started = true;

        let emitted = out.nrows();
        if emitted > 0 {
            let log_probs = match self.engine.project(out.view()) {
                Ok(matrix) => matrix,
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            };
            self.search.update(log_probs.view());
            self.offset += emitted;
            self.encoder_chunks.push(out);
        }

        if at_end {
            self.state = SessionState::Finished;
            Ok(true)
        } else {
            // Keep the lookahead for the next window.
            let carry_from = window.len() - self.right_context;
            self.lookahead = window.split_off(carry_from);
            Ok(false)
        }
    }

    /// Drives [`advance`](Self::advance) until the feature stream ends.
    pub fn decode(&mut self) -> Result<()> {
        while !self.advance()? {}
        Ok(())
    }

    /// The current best candidate's symbol sequence. Valid at any time.
    pub fn partial_result(&self) -> &[u32] {
        self.search.result()
    }

    /// The current best candidate as text. Valid at any time.
    pub fn partial_text(&self) -> Result<String> {
        self.symbols.decode(self.search.result())
    }

    /// Runs the second-pass rescorer and returns the final transcription.
    ///
    /// Requires a finished session; a rescoring failure leaves the session
    /// failed.
    pub fn final_text(&mut self) -> Result<String> {
        if self.state != SessionState::Finished {
            return Err(RillError::misuse("final_text requires a finished session"));
        }

        let encoder_out = self.encoder_output();
        let nbest = self.search.nbest();
        let sequence = match self
            .rescorer
            .select(&self.engine, encoder_out.as_ref(), &nbest)
        {
            Ok(sequence) => sequence,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        self.symbols.decode(&sequence)
    }

    /// The accumulated encoder output, or `None` before the first chunk.
    pub fn encoder_output(&self) -> Option<Array2<f32>> {
        if self.encoder_chunks.is_empty() {
            return None;
        }
        let views: Vec<_> = self.encoder_chunks.iter().map(Array2::view).collect();
        ndarray::concatenate(Axis(0), &views).ok()
    }

    /// Frames whose encoder output has been produced so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True once the first chunk has been through the engine.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// True once the feature stream has been fully decoded.
    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    /// True after a fatal engine failure; reset() is required for reuse.
    pub fn is_failed(&self) -> bool {
        self.state == SessionState::Failed
    }

    /// The shared feature buffer fed by the audio producer.
    pub fn buffer(&self) -> Arc<StreamingFeatureBuffer> {
        self.buffer.clone()
    }

    /// Returns the session (and its buffer) to the initial state for a new
    /// utterance. No residual cache, candidates or frames survive.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.search.reset();
        self.cache = EncoderCache::empty();
        self.lookahead.clear();
        self.encoder_chunks.clear();
        self.offset = 0;
        self.started = false;
        self.state = SessionState::Running;
    }
}

fn frames_to_matrix(frames: &[FeatureFrame]) -> Array2<f32> {
    let dim = frames.first().map(FeatureFrame::dim).unwrap_or(0);
    Array2::from_shape_fn((frames.len(), dim), |(i, j)| frames[i].values()[j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::features::extractor::MockFeatureExtractor;

    /// One frame per sample, so frame index i carries sample value i.
    fn per_sample_buffer() -> Arc<StreamingFeatureBuffer> {
        Arc::new(StreamingFeatureBuffer::new(Box::new(
            MockFeatureExtractor::new().with_geometry(1, 1).with_bins(2),
        )))
    }

    fn table() -> SymbolTable {
        SymbolTable::from_symbols(
            ["<blank>", "a", "b", "c", "d", "e"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.decode.chunk_size = 4;
        config.decode.right_context = 2;
        config.decode.beam_width = 4;
        config
    }

    fn feed(buffer: &StreamingFeatureBuffer, n: usize) {
        let samples: Vec<f32> = (0..n).map(|i| i as f32 * 0.1).collect();
        buffer.accept_waveform(&samples).unwrap();
        buffer.finish().unwrap();
    }

    #[test]
    fn test_construction_rejects_vocab_mismatch() {
        let engine = MockEngine::new().with_vocab_size(10);
        let result = DecodeSession::new(engine, per_sample_buffer(), table(), &config());

        match result {
            Err(RillError::VocabSizeMismatch { engine: 10, table: 6 }) => {}
            other => panic!("Expected VocabSizeMismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_construction_rejects_right_context_mismatch() {
        let engine = MockEngine::new().with_right_context(8);
        let result = DecodeSession::new(engine, per_sample_buffer(), table(), &config());

        match result {
            Err(RillError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "decode.right_context");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_construction_rejects_invalid_config() {
        let mut bad = config();
        bad.decode.beam_width = 0;
        let result = DecodeSession::new(MockEngine::new(), per_sample_buffer(), table(), &bad);
        assert!(result.is_err());
    }

    #[test]
    fn test_advance_processes_chunks_and_finishes() {
        let buffer = per_sample_buffer();
        let mut session =
            DecodeSession::new(MockEngine::new(), buffer.clone(), table(), &config()).unwrap();

        // 14 frames, chunk 4, lookahead 2: windows of 6/6/6 then the rest.
        feed(&buffer, 14);

        assert!(!session.has_started());
        assert!(!session.advance().unwrap());
        assert!(session.has_started());
        assert_eq!(session.offset(), 4);

        assert!(!session.advance().unwrap());
        assert_eq!(session.offset(), 8);

        // The third window still fills exactly (frames 8..14 with the
        // carried lookahead), leaving only the carry behind.
        assert!(!session.advance().unwrap());
        assert_eq!(session.offset(), 12);

        // Nothing but the lookahead tail remains; those frames already
        // informed every emitted output.
        assert!(session.advance().unwrap());
        assert!(session.is_finished());
        assert_eq!(session.offset(), 12);
    }

    #[test]
    fn test_advance_after_finished_is_misuse() {
        let buffer = per_sample_buffer();
        let mut session =
            DecodeSession::new(MockEngine::new(), buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 6);
        session.decode().unwrap();

        assert!(matches!(
            session.advance(),
            Err(RillError::Misuse { .. })
        ));
    }

    #[test]
    fn test_empty_input_finishes_immediately() {
        let buffer = per_sample_buffer();
        let mut session =
            DecodeSession::new(MockEngine::new(), buffer.clone(), table(), &config()).unwrap();
        buffer.finish().unwrap();

        assert!(session.advance().unwrap());
        assert!(session.is_finished());
        assert!(!session.has_started());
        assert_eq!(session.offset(), 0);
        assert!(session.encoder_output().is_none());
    }

    #[test]
    fn test_engine_failure_is_fatal_until_reset() {
        let buffer = per_sample_buffer();
        let engine = MockEngine::new().with_forward_failure();
        let mut session = DecodeSession::new(engine, buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 10);

        assert!(matches!(session.advance(), Err(RillError::Engine { .. })));
        assert!(session.is_failed());

        // Further advances are misuse, not silent skips.
        assert!(matches!(session.advance(), Err(RillError::Misuse { .. })));

        session.reset();
        assert!(!session.is_failed());
    }

    #[test]
    fn test_scripted_tokens_decode_to_text() {
        let buffer = per_sample_buffer();
        // Frames 1-2 say "a" (collapsed), frame 4 says "b".
        let engine = MockEngine::new().with_frame_tokens(vec![0, 1, 1, 0, 2, 0]);
        let mut session = DecodeSession::new(engine, buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 10);

        session.decode().unwrap();
        assert_eq!(session.partial_result(), &[1, 2]);
        assert_eq!(session.partial_text().unwrap(), "ab");
        assert_eq!(session.final_text().unwrap(), "ab");
    }

    #[test]
    fn test_partial_result_available_mid_stream() {
        let buffer = per_sample_buffer();
        let engine = MockEngine::new().with_frame_tokens(vec![1, 1, 1, 1]);
        let mut session = DecodeSession::new(engine, buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 10);

        session.advance().unwrap();
        // First chunk covers frames 0..4, all scripted to "a".
        assert_eq!(session.partial_text().unwrap(), "a");
        assert!(!session.is_finished());
    }

    #[test]
    fn test_final_text_requires_finished() {
        let buffer = per_sample_buffer();
        let mut session =
            DecodeSession::new(MockEngine::new(), buffer.clone(), table(), &config()).unwrap();

        assert!(matches!(
            session.final_text(),
            Err(RillError::Misuse { .. })
        ));
    }

    #[test]
    fn test_rescore_failure_marks_session_failed() {
        let buffer = per_sample_buffer();
        let engine = MockEngine::new()
            .with_frame_tokens(vec![1, 1, 1, 1])
            .with_rescore_failure();
        let mut session = DecodeSession::new(engine, buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 10);
        session.decode().unwrap();

        assert!(matches!(
            session.final_text(),
            Err(RillError::Rescore { .. })
        ));
        assert!(session.is_failed());
    }

    #[test]
    fn test_encoder_output_accumulates_across_chunks() {
        let buffer = per_sample_buffer();
        let mut session =
            DecodeSession::new(MockEngine::new(), buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 14);
        session.decode().unwrap();

        let out = session.encoder_output().expect("encoder output");
        assert_eq!(out.nrows(), session.offset());
        // Absolute frame indices in column 0 must be gapless.
        for i in 0..out.nrows() {
            assert_eq!(out[[i, 0]], i as f32);
        }
    }

    #[test]
    fn test_reset_clears_session_and_buffer() {
        let buffer = per_sample_buffer();
        let engine = MockEngine::new().with_frame_tokens(vec![1, 1, 1, 1, 1, 1]);
        let mut session = DecodeSession::new(engine, buffer.clone(), table(), &config()).unwrap();
        feed(&buffer, 10);
        session.decode().unwrap();
        assert!(!session.partial_result().is_empty());

        session.reset();

        assert!(!session.is_finished());
        assert!(!session.has_started());
        assert_eq!(session.offset(), 0);
        assert!(session.partial_result().is_empty());
        assert!(session.encoder_output().is_none());
        assert!(!buffer.is_finished());
    }
}
