//! WAV file audio source for feeding a decoding session.

use crate::defaults;
use crate::error::{Result, RillError};
use std::io::Read;

/// Audio source that reads WAV data into normalized f32 samples.
/// Supports arbitrary sample rates and channels, downmixing to mono and
/// resampling to the target rate.
pub struct WavSource {
    samples: Vec<f32>,
    position: usize,
    chunk_size: usize,
}

impl WavSource {
    /// Create from any reader, resampling to the default 16kHz.
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        Self::from_reader_at_rate(reader, defaults::SAMPLE_RATE)
    }

    /// Create from any reader, resampling to `target_rate`.
    pub fn from_reader_at_rate(reader: Box<dyn Read + Send>, target_rate: u32) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| RillError::AudioRead {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        let source_rate = spec.sample_rate;
        let source_channels = spec.channels;

        let raw_samples: Vec<f32> = wav_reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RillError::AudioRead {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        // Downmix to mono if stereo
        let mono_samples = if source_channels == 2 {
            raw_samples
                .chunks_exact(2)
                .map(|pair| (pair[0] + pair[1]) / 2.0)
                .collect()
        } else {
            raw_samples
        };

        // Resample if needed
        let samples = if source_rate != target_rate {
            resample(&mono_samples, source_rate, target_rate)
        } else {
            mono_samples
        };

        // 100ms slices at the target rate
        let chunk_size = (target_rate / 10) as usize;

        Ok(Self {
            samples,
            position: 0,
            chunk_size,
        })
    }

    /// Consume the source and return all samples as a single buffer.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Total duration in samples at the target rate.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true when the source holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reads the next streaming-sized slice of samples.
    ///
    /// Returns an empty vector once the source is drained.
    pub fn read_samples(&mut self) -> Vec<f32> {
        if self.position >= self.samples.len() {
            return Vec::new();
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        chunk
    }
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}
