//! Incremental CTC prefix beam search.
//!
//! Maintains a bounded set of candidate prefixes over the per-frame symbol
//! log-probabilities the encoder emits. Each prefix tracks two scores: the
//! probability of all paths ending in blank and of all paths ending in the
//! prefix's last symbol. Distinct paths that collapse to the same symbol
//! sequence merge by log-sum-exp; after every frame the set is pruned to
//! the beam width.

use crate::defaults;
use ndarray::ArrayView2;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Configuration for the prefix beam search.
#[derive(Debug, Clone)]
pub struct PrefixBeamSearchConfig {
    /// Maximum candidates retained after each frame.
    pub beam_width: usize,
    /// Vocabulary id of the blank symbol.
    pub blank_id: u32,
}

impl Default for PrefixBeamSearchConfig {
    fn default() -> Self {
        Self {
            beam_width: defaults::BEAM_WIDTH,
            blank_id: defaults::BLANK_ID,
        }
    }
}

/// A candidate transcription with its accumulated search score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Emitted symbol ids, duplicates already collapsed.
    pub sequence: Vec<u32>,
    /// Total log-probability over all paths collapsing to this sequence.
    pub score: f32,
}

/// Per-prefix score pair in the log domain.
#[derive(Debug, Clone, Copy)]
struct PathScore {
    /// Log-probability of paths ending in blank.
    blank: f32,
    /// Log-probability of paths ending in the last emitted symbol.
    label: f32,
}

impl PathScore {
    fn none() -> Self {
        Self {
            blank: f32::NEG_INFINITY,
            label: f32::NEG_INFINITY,
        }
    }

    fn total(&self) -> f32 {
        log_add(self.blank, self.label)
    }
}

/// Numerically stable log(exp(a) + exp(b)).
fn log_add(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Deterministic candidate order: higher score first, then shorter
/// sequence, then lexicographically smaller. Applied after every pruning
/// step so results are reproducible across runs.
fn compare(a: &(Vec<u32>, PathScore), b: &(Vec<u32>, PathScore)) -> Ordering {
    b.1.total()
        .total_cmp(&a.1.total())
        .then_with(|| a.0.len().cmp(&b.0.len()))
        .then_with(|| a.0.cmp(&b.0))
}

/// Incremental prefix search over CTC-style frame outputs.
pub struct PrefixBeamSearch {
    config: PrefixBeamSearchConfig,
    /// Live beam, kept sorted by [`compare`].
    hyps: Vec<(Vec<u32>, PathScore)>,
}

impl PrefixBeamSearch {
    /// Creates a search with default configuration.
    pub fn new() -> Self {
        Self::with_config(PrefixBeamSearchConfig::default())
    }

    /// Creates a search with custom configuration.
    pub fn with_config(config: PrefixBeamSearchConfig) -> Self {
        Self {
            config,
            hyps: vec![(
                Vec::new(),
                PathScore {
                    blank: 0.0,
                    label: f32::NEG_INFINITY,
                },
            )],
        }
    }

    /// Advances the beam over one chunk of [frames × vocab]
    /// log-probabilities.
    pub fn update(&mut self, log_probs: ArrayView2<f32>) {
        for frame in log_probs.rows() {
            let mut next: HashMap<Vec<u32>, PathScore> = HashMap::new();

            for (prefix, score) in &self.hyps {
                for (symbol, &p) in frame.iter().enumerate() {
                    let symbol = symbol as u32;

                    if symbol == self.config.blank_id {
                        // Blank keeps the prefix and absorbs both endings.
                        let entry = next
                            .entry(prefix.clone())
                            .or_insert_with(PathScore::none);
                        entry.blank = log_add(entry.blank, score.total() + p);
                    } else if Some(&symbol) == prefix.last() {
                        // Repeat of the last symbol: the label-ending path
                        // collapses the duplicate...
                        let entry = next
                            .entry(prefix.clone())
                            .or_insert_with(PathScore::none);
                        entry.label = log_add(entry.label, score.label + p);

                        // ...while the blank-ending path starts a genuine
                        // new emission of the same symbol.
                        let mut extended = prefix.clone();
                        extended.push(symbol);
                        let entry = next.entry(extended).or_insert_with(PathScore::none);
                        entry.label = log_add(entry.label, score.blank + p);
                    } else {
                        let mut extended = prefix.clone();
                        extended.push(symbol);
                        let entry = next.entry(extended).or_insert_with(PathScore::none);
                        entry.label = log_add(entry.label, score.total() + p);
                    }
                }
            }

            let mut hyps: Vec<_> = next.into_iter().collect();
            hyps.sort_by(compare);
            hyps.truncate(self.config.beam_width);
            self.hyps = hyps;
        }
    }

    /// The current best candidate's symbol sequence.
    ///
    /// Valid at any time; supports partial results while streaming.
    pub fn result(&self) -> &[u32] {
        self.hyps.first().map(|(seq, _)| seq.as_slice()).unwrap_or(&[])
    }

    /// The current beam as scored candidates, best first.
    pub fn nbest(&self) -> Vec<Candidate> {
        self.hyps
            .iter()
            .map(|(sequence, score)| Candidate {
                sequence: sequence.clone(),
                score: score.total(),
            })
            .collect()
    }

    /// Returns the search to its initial single-empty-prefix state.
    pub fn reset(&mut self) {
        self.hyps = vec![(
            Vec::new(),
            PathScore {
                blank: 0.0,
                label: f32::NEG_INFINITY,
            },
        )];
    }
}

impl Default for PrefixBeamSearch {
    fn default() -> Self {
        Self::new()
    }
}
