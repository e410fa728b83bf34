//! Encoder cache carried between chunk inference calls.

use ndarray::Array2;

/// Streaming encoder state for one decoding session.
///
/// An explicit, tagged structure rather than a type-erased blob: cache-shape
/// mismatches become construction-time errors inside the engine instead of
/// silent corruption mid-stream. The decoding loop owns exactly one of these
/// per session and round-trips it through the engine untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderCache {
    /// Subsampling-layer output retained for the next window.
    pub subsampling: Array2<f32>,
    /// Per-layer attention output cache.
    pub layers: Vec<Array2<f32>>,
    /// Per-layer convolution module cache.
    pub conv: Vec<Array2<f32>>,
}

impl EncoderCache {
    /// The seed cache for the first chunk of an utterance.
    pub fn empty() -> Self {
        Self {
            subsampling: Array2::zeros((0, 0)),
            layers: Vec::new(),
            conv: Vec::new(),
        }
    }

    /// Returns true for the seed state (no chunk has been processed yet).
    pub fn is_empty(&self) -> bool {
        self.subsampling.is_empty() && self.layers.is_empty() && self.conv.is_empty()
    }
}

impl Default for EncoderCache {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_empty_cache() {
        let cache = EncoderCache::empty();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_populated_cache_is_not_empty() {
        let cache = EncoderCache {
            subsampling: arr2(&[[1.0, 2.0]]),
            layers: vec![arr2(&[[0.5]])],
            conv: Vec::new(),
        };
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_cache_clone_round_trips() {
        let cache = EncoderCache {
            subsampling: arr2(&[[1.0, 2.0], [3.0, 4.0]]),
            layers: vec![arr2(&[[0.1, 0.2]]), arr2(&[[0.3, 0.4]])],
            conv: vec![arr2(&[[7.0]])],
        };
        assert_eq!(cache.clone(), cache);
    }
}
