//! Incremental hypothesis search.

pub mod prefix_beam;

pub use prefix_beam::{Candidate, PrefixBeamSearch, PrefixBeamSearchConfig};
