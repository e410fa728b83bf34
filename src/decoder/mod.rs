//! Chunked decoding core.
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌───────────────┐    ┌──────────┐
//! │  audio   │───▶│ Feature      │───▶│ DecodeSession │───▶│ Prefix   │
//! │ producer │    │ buffer       │    │ (chunk loop)  │    │ search   │
//! └──────────┘    └──────────────┘    └───────┬───────┘    └────┬─────┘
//!                                             │ on finish       │
//!                                             ▼                 ▼
//!                                        ┌──────────┐      best text
//!                                        │ Rescorer │───▶  (final)
//!                                        └──────────┘
//! ```

pub mod pipeline;
pub mod rescorer;
pub mod session;

pub use pipeline::{DecoderPipeline, DecoderPipelineConfig};
pub use rescorer::Rescorer;
pub use session::DecodeSession;
