pub mod confidence;
pub mod gates;
pub mod tier;

pub use confidence::ConfidenceWeights;
pub use gates::{AppliedGate, GateOutcome};
pub use tier::Tier;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assessment::Evaluation;
use crate::catalog::schema::ModuleConfig;
use crate::utils::EngineError;

/// Ranked entry for one tier. Every scoring pass ranks all five tiers
/// exactly once; the winner is the tier whose threshold band contains the
/// summed needs score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRanking {
    pub tier: Tier,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub total_score: i64,
    pub top_tier: Tier,
    pub rankings: Vec<TierRanking>,
    pub confidence: f64,
    /// Top contributors by absolute score, as short ordered reasons.
    pub rationale: Vec<String>,
}

/// Deterministic scoring pass: sum contributions, select the band winner,
/// rank the rest by band proximity, blend confidence. Cannot fail for
/// valid input; missing threshold bands are a configuration error.
pub fn score(
    module: &ModuleConfig,
    evaluation: &Evaluation,
    weights: &ConfidenceWeights,
) -> Result<ScoringResult, EngineError> {
    for tier in Tier::ALL {
        if !module.thresholds.contains_key(&tier) {
            return Err(EngineError::ThresholdMissing(module.id.clone()));
        }
    }

    let total_score: i64 = evaluation.contributions.iter().map(|c| c.points).sum();

    // Rank each tier by proximity of the total to its band: the containing
    // band scores highest, the rest fall off with distance. Ties break
    // toward the higher-acuity tier.
    let mut rankings: Vec<TierRanking> = Tier::ALL
        .iter()
        .map(|&tier| {
            let band = &module.thresholds[&tier];
            TierRanking {
                tier,
                score: (total_score - band.distance(total_score)) as f64,
            }
        })
        .collect();
    rankings.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.tier.acuity().cmp(&a.tier.acuity()))
    });
    let top_tier = rankings[0].tier;

    let confidence = confidence::compute(
        weights,
        evaluation.completeness,
        evaluation.specificity,
        &evaluation.flags,
    );

    let rationale = top_contributors(evaluation);

    debug!(
        module = %module.id,
        total_score,
        top_tier = %top_tier,
        confidence,
        "Deterministic scoring complete"
    );

    Ok(ScoringResult {
        total_score,
        top_tier,
        rankings,
        confidence,
        rationale,
    })
}

/// The 2–4 largest contributors by absolute points, most significant
/// first, formatted as display-ready reasons.
fn top_contributors(evaluation: &Evaluation) -> Vec<String> {
    let mut contributions = evaluation.contributions.clone();
    contributions.sort_by_key(|c| std::cmp::Reverse(c.points.abs()));
    contributions
        .iter()
        .take(4)
        .filter(|c| c.points != 0)
        .map(|c| format!("{} ({:+})", c.label, c.points))
        .collect()
}
