//! Second-pass rescoring over the full encoder output.
//!
//! Runs once per utterance, after the streaming loop finishes: the top beam
//! candidates are re-scored against the complete encoder output and the
//! weighted combination of both passes picks the final transcription.

use crate::config::RescoreConfig;
use crate::engine::InferenceEngine;
use crate::error::Result;
use crate::search::prefix_beam::Candidate;
use ndarray::Array2;

/// Selects the final candidate from the beam, optionally rescored.
pub struct Rescorer {
    config: RescoreConfig,
}

impl Rescorer {
    /// Creates a rescorer with the given configuration.
    pub fn with_config(config: RescoreConfig) -> Self {
        Self { config }
    }

    /// Picks the final symbol sequence.
    ///
    /// Rescores the top-K candidates and combines each rescoring
    /// log-probability with the search score as
    /// `rescored + search_weight * search_score`. With rescoring disabled,
    /// no encoder output, or an empty beam, the top search candidate is
    /// returned unmodified.
    pub fn select<E: InferenceEngine>(
        &self,
        engine: &E,
        encoder_out: Option<&Array2<f32>>,
        candidates: &[Candidate],
    ) -> Result<Vec<u32>> {
        let Some(top) = candidates.first() else {
            return Ok(Vec::new());
        };

        let encoder_out = match encoder_out {
            Some(out) if self.config.enabled && out.nrows() > 0 => out,
            _ => return Ok(top.sequence.clone()),
        };

        let limit = self.config.top_k.min(candidates.len());
        let mut best: Option<(f32, &Candidate)> = None;
        for candidate in &candidates[..limit] {
            let rescored = engine.rescore(encoder_out.view(), &candidate.sequence)?;
            let combined = rescored + self.config.search_weight * candidate.score;

            let wins = match best {
                None => true,
                Some((best_score, best_candidate)) => {
                    combined > best_score
                        || (combined == best_score && prefer(candidate, best_candidate))
                }
            };
            if wins {
                best = Some((combined, candidate));
            }
        }

        Ok(best.map(|(_, c)| c.sequence.clone()).unwrap_or_default())
    }
}

/// Tie-break matching the search's pruning order: shorter sequence first,
/// then lexicographically smaller.
fn prefer(a: &Candidate, b: &Candidate) -> bool {
    a.sequence.len() < b.sequence.len()
        || (a.sequence.len() == b.sequence.len() && a.sequence < b.sequence)
}
