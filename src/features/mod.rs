//! Acoustic feature frontend.
//!
//! The transform itself (mel filterbank math) lives behind the
//! [`FeatureExtractor`] trait; this module owns the framing arithmetic and
//! the producer/consumer buffer that decouples audio ingestion from the
//! decoding loop.

pub mod buffer;
pub mod extractor;

pub use buffer::StreamingFeatureBuffer;
pub use extractor::{FeatureExtractor, FeatureFrame, MockFeatureExtractor};
