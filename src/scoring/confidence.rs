use serde::{Deserialize, Serialize};

use crate::flags::CONTRADICTORY_FLAGS;

/// Coefficients for the confidence blend. The formula shape is fixed;
/// the constants are configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub answered: f64,
    pub specificity: f64,
    pub coherence: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            answered: 0.5,
            specificity: 0.3,
            coherence: 0.2,
        }
    }
}

/// confidence = w_a·answered_fraction + w_s·specificity + w_c·coherence,
/// clipped to [0, 1]. Coherence drops for each contradictory flag pair
/// present at once.
pub fn compute(
    weights: &ConfidenceWeights,
    answered_fraction: f64,
    specificity: f64,
    flags: &[String],
) -> f64 {
    let coherence = flag_coherence(flags);
    let raw = weights.answered * answered_fraction
        + weights.specificity * specificity
        + weights.coherence * coherence;
    raw.clamp(0.0, 1.0)
}

fn flag_coherence(flags: &[String]) -> f64 {
    let contradictions = CONTRADICTORY_FLAGS
        .iter()
        .filter(|(a, b)| {
            flags.iter().any(|f| f == a) && flags.iter().any(|f| f == b)
        })
        .count();
    (1.0 - 0.5 * contradictions as f64).max(0.0)
}
