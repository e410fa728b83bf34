//! Async decoding runner.
//!
//! Wires an audio sample channel into the feature buffer on one task and
//! drives the blocking decode loop on the blocking thread pool. Preserves
//! the session's concurrency contract: exactly one producer feeds the
//! buffer, exactly one consumer decodes, and chunks stay strictly ordered.

use crate::decoder::session::DecodeSession;
use crate::engine::InferenceEngine;
use crate::error::{Result, RillError};
use tokio::sync::mpsc;

/// Configuration for the decoding runner.
#[derive(Debug, Clone)]
pub struct DecoderPipelineConfig {
    /// Audio channel buffer size (sample batches in flight).
    pub channel_buffer_size: usize,
}

impl Default for DecoderPipelineConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 100,
        }
    }
}

/// Runs a decoding session against a channel of audio sample batches.
pub struct DecoderPipeline {
    config: DecoderPipelineConfig,
}

impl DecoderPipeline {
    /// Creates a pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(DecoderPipelineConfig::default())
    }

    /// Creates a pipeline with custom configuration.
    pub fn with_config(config: DecoderPipelineConfig) -> Self {
        Self { config }
    }

    /// Creates the audio channel this pipeline is sized for.
    pub fn audio_channel(&self) -> (mpsc::Sender<Vec<f32>>, mpsc::Receiver<Vec<f32>>) {
        mpsc::channel(self.config.channel_buffer_size)
    }

    /// Decodes one utterance and returns the final transcription.
    ///
    /// Consumes sample batches from `audio_rx` until the sender is dropped,
    /// which marks end-of-input.
    pub async fn run<E>(
        &self,
        session: DecodeSession<E>,
        audio_rx: mpsc::Receiver<Vec<f32>>,
    ) -> Result<String>
    where
        E: InferenceEngine + 'static,
    {
        self.run_with_callback(session, audio_rx, |_| {}).await
    }

    /// Decodes one utterance, invoking `on_partial` with the current best
    /// text after every chunk.
    pub async fn run_with_callback<E, F>(
        &self,
        mut session: DecodeSession<E>,
        mut audio_rx: mpsc::Receiver<Vec<f32>>,
        on_partial: F,
    ) -> Result<String>
    where
        E: InferenceEngine + 'static,
        F: Fn(&str) + Send + 'static,
    {
        let buffer = session.buffer();

        // Ingestion task: single producer for the feature buffer.
        let ingest = tokio::spawn(async move {
            while let Some(samples) = audio_rx.recv().await {
                if let Err(e) = buffer.accept_waveform(&samples) {
                    // Close the stream so the decode loop can observe
                    // end-of-input instead of blocking forever.
                    let _ = buffer.finish();
                    return Err(e);
                }
            }
            buffer.finish()
        });

        // Decode task: single consumer, sequential chunk order.
        let decode = tokio::task::spawn_blocking(move || -> Result<String> {
            loop {
                let finished = session.advance()?;
                on_partial(&session.partial_text()?);
                if finished {
                    break;
                }
            }
            session.final_text()
        });

        let (ingest_result, decode_result) = tokio::join!(ingest, decode);

        ingest_result.map_err(|e| RillError::AudioRead {
            message: format!("ingestion task panicked: {}", e),
        })??;
        decode_result.map_err(|e| RillError::Engine {
            message: format!("decode task panicked: {}", e),
        })?
    }
}

impl Default for DecoderPipeline {
    fn default() -> Self {
        Self::new()
    }
}
