use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::assessment::Evaluation;
use crate::catalog::schema::ModuleConfig;
use crate::flags::{self, FeatureFlags};
use crate::llm::{FieldKind, LlmClient, LlmRequest, ResponseSchema};
use crate::scoring::{self, gates, GateOutcome, ScoringResult, Tier};

const SYSTEM_PROMPT: &str = "You are a senior-care placement advisor. \
Given deterministic scoring output and clinical flags, select the most \
appropriate care tier from the allowed list. Respond with strict JSON \
only: {\"tier\": one of the allowed tier keys, \"confidence\": number \
between 0 and 1, \"reasons\": array of 2 to 4 short strings}.";

/// How the final tier was chosen. Published as contract provenance so a
/// reviewer can tell an LLM-accepted result from the deterministic path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "path")]
pub enum AdjudicationPath {
    LlmAccepted,
    LlmRejected { reason: String },
    Deterministic,
}

/// Final reconciliation of deterministic scoring and the optional LLM
/// suggestion. Behavior gates have already run by the time this exists.
#[derive(Debug, Clone)]
pub struct Adjudication {
    pub tier: Tier,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub path: AdjudicationPath,
    pub gate_outcome: GateOutcome,
    pub correlation_id: String,
}

fn response_schema(allowed: &[Tier]) -> ResponseSchema {
    ResponseSchema::default()
        .field_with_allowed(
            "tier",
            allowed.iter().map(|t| t.as_str().to_string()).collect(),
        )
        .field_with_range("confidence", 0.0, 1.0)
        .field("reasons", FieldKind::StringArray)
}

fn user_prompt(
    allowed: &[Tier],
    scoring_result: &ScoringResult,
    evaluation: &Evaluation,
) -> String {
    let context = serde_json::json!({
        "allowed_tiers": allowed.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        "summed_score": scoring_result.total_score,
        "deterministic_tier": scoring_result.top_tier.as_str(),
        "top_contributors": scoring_result.rationale,
        "flags": evaluation.flags,
        "completeness": evaluation.completeness,
    });
    format!(
        "Assessment summary:\n{}\n\nSelect the care tier.",
        serde_json::to_string_pretty(&context).unwrap_or_default()
    )
}

/// LLM-first tier selection with deterministic disposal: the LLM proposes,
/// validation rejects anything unsafe or out of bounds, and the scoring
/// result stands in on any rejection. Gates run last and may raise the
/// tier regardless of what the LLM said.
pub async fn adjudicate(
    module: &ModuleConfig,
    evaluation: &Evaluation,
    scoring_result: &ScoringResult,
    allowed_tiers: &[Tier],
    features: &FeatureFlags,
    client: &dyn LlmClient,
    confidence_floor: f64,
) -> Adjudication {
    let correlation_id = Uuid::new_v4().to_string();

    let (candidate, confidence, reasons, path) = if features.adjudication_active() {
        match consult_llm(
            evaluation,
            scoring_result,
            allowed_tiers,
            client,
            confidence_floor,
        )
        .await
        {
            Ok((tier, confidence, reasons)) => {
                (tier, confidence, reasons, AdjudicationPath::LlmAccepted)
            }
            Err(reason) => {
                crate::log_llm_fallback!(correlation_id.as_str(), reason.as_str());
                let (tier, confidence, reasons) = deterministic_outcome(scoring_result, allowed_tiers);
                (tier, confidence, reasons, AdjudicationPath::LlmRejected { reason })
            }
        }
    } else {
        let (tier, confidence, reasons) = deterministic_outcome(scoring_result, allowed_tiers);
        (tier, confidence, reasons, AdjudicationPath::Deterministic)
    };

    // Gates always win last, over either path.
    let gate_outcome = gates::apply(
        &module.behavior_gates,
        &evaluation.fields,
        &evaluation.flag_set(),
        candidate,
    );

    crate::log_adjudication!(
        match &path {
            AdjudicationPath::LlmAccepted => "llm_accepted",
            AdjudicationPath::LlmRejected { .. } => "llm_rejected",
            AdjudicationPath::Deterministic => "deterministic",
        },
        correlation_id.as_str(),
        gate_outcome.tier.as_str(),
        gated = gate_outcome.overrode()
    );

    Adjudication {
        tier: gate_outcome.tier,
        confidence,
        reasons,
        path,
        gate_outcome,
        correlation_id,
    }
}

async fn consult_llm(
    evaluation: &Evaluation,
    scoring_result: &ScoringResult,
    allowed_tiers: &[Tier],
    client: &dyn LlmClient,
    confidence_floor: f64,
) -> Result<(Tier, f64, Vec<String>), String> {
    let request = LlmRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: user_prompt(allowed_tiers, scoring_result, evaluation),
        schema: response_schema(allowed_tiers),
    };

    let response = client
        .complete(request)
        .await
        .map_err(|e| e.to_string())?;

    // Schema validation already constrained tier to the allowed set and
    // confidence to [0, 1]; re-parse defensively and apply policy rules.
    let tier: Tier = serde_json::from_value(response["tier"].clone())
        .map_err(|_| "unparseable tier".to_string())?;
    let confidence = response["confidence"].as_f64().unwrap_or(0.0);

    if confidence < confidence_floor {
        return Err(format!("confidence {confidence:.2} below floor {confidence_floor:.2}"));
    }

    // Safety rule: a safety-critical flag forbids recommending no care.
    if tier == Tier::NoCareNeeded {
        if let Some(flag) = evaluation.flags.iter().find(|f| flags::is_safety_critical(f)) {
            return Err(format!(
                "suggested no_care_needed while safety flag '{flag}' is set"
            ));
        }
    }

    let reasons: Vec<String> = response["reasons"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    info!(tier = %tier, confidence, "LLM tier suggestion accepted");
    Ok((tier, confidence, reasons))
}

/// Deterministic disposal: top-ranked tier restricted to the allowed set,
/// with the scoring engine's confidence and rationale.
fn deterministic_outcome(
    scoring_result: &ScoringResult,
    allowed_tiers: &[Tier],
) -> (Tier, f64, Vec<String>) {
    let tier = if allowed_tiers.contains(&scoring_result.top_tier) {
        scoring_result.top_tier
    } else {
        scoring_result
            .rankings
            .iter()
            .map(|r| r.tier)
            .find(|t| allowed_tiers.contains(t))
            .unwrap_or(scoring_result.top_tier)
    };
    (
        tier,
        scoring_result.confidence,
        scoring_result.rationale.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::EngineError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    struct StaticClient(Result<Value, bool>); // Err(true) = timeout

    #[async_trait]
    impl LlmClient for StaticClient {
        async fn complete(&self, request: LlmRequest) -> Result<Value, EngineError> {
            match &self.0 {
                Ok(value) => {
                    request.schema.validate(value)?;
                    Ok(value.clone())
                }
                Err(true) => Err(EngineError::LlmTimeout(Duration::from_secs(15))),
                Err(false) => Err(EngineError::LlmInvalid("bad response".to_string())),
            }
        }
    }

    fn module() -> ModuleConfig {
        serde_json::from_value(json!({
            "id": "care_assessment",
            "title": "Care Assessment",
            "questions": [],
            "thresholds": {
                "no_care_needed": {"min": 0, "max": 8},
                "in_home": {"min": 9, "max": 16},
                "assisted_living": {"min": 17, "max": 24},
                "memory_care": {"min": 25, "max": 39},
                "memory_care_high_acuity": {"min": 40}
            },
            "behavior_gates": [
                {"id": "wandering_floor", "label": "Wandering floor",
                 "when": {"all": [{"flag": "wandering"}, {"flag": "aggression"}]},
                 "action": {"floor": "memory_care_high_acuity"},
                 "rationale": "Wandering with aggression needs a secured setting"}
            ],
            "output_contract": "care_recommendation"
        }))
        .unwrap()
    }

    fn evaluation(flags: &[&str]) -> Evaluation {
        Evaluation {
            visible_questions: Vec::new(),
            derived_fields: HashMap::new(),
            fields: HashMap::new(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
            contributions: Vec::new(),
            completeness: 1.0,
            specificity: 1.0,
        }
    }

    fn scoring_result(top: Tier) -> ScoringResult {
        let rankings = Tier::ALL
            .iter()
            .map(|&tier| scoring::TierRanking {
                tier,
                score: if tier == top { 30.0 } else { 10.0 },
            })
            .collect();
        ScoringResult {
            total_score: 30,
            top_tier: top,
            rankings,
            confidence: 0.75,
            rationale: vec!["deterministic reason".to_string()],
        }
    }

    fn features_on() -> FeatureFlags {
        FeatureFlags {
            llm_enabled: true,
            llm_adjudication: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn accepts_valid_llm_tier() {
        let client = StaticClient(Ok(json!({
            "tier": "assisted_living", "confidence": 0.8,
            "reasons": ["moderate support needs", "manageable safety profile"]
        })));
        let result = adjudicate(
            &module(),
            &evaluation(&[]),
            &scoring_result(Tier::MemoryCare),
            &Tier::ALL,
            &features_on(),
            &client,
            0.5,
        )
        .await;
        assert_eq!(result.tier, Tier::AssistedLiving);
        assert_eq!(result.path, AdjudicationPath::LlmAccepted);
    }

    #[tokio::test]
    async fn timeout_falls_back_to_deterministic() {
        let client = StaticClient(Err(true));
        let result = adjudicate(
            &module(),
            &evaluation(&[]),
            &scoring_result(Tier::AssistedLiving),
            &Tier::ALL,
            &features_on(),
            &client,
            0.5,
        )
        .await;
        assert_eq!(result.tier, Tier::AssistedLiving);
        assert!(matches!(result.path, AdjudicationPath::LlmRejected { .. }));
        assert_eq!(result.confidence, 0.75);
    }

    #[tokio::test]
    async fn out_of_set_tier_rejected_by_schema() {
        let client = StaticClient(Ok(json!({
            "tier": "memory_care_high_acuity", "confidence": 0.9, "reasons": []
        })));
        // high acuity excluded from the allowed set
        let allowed = [Tier::NoCareNeeded, Tier::InHome, Tier::AssistedLiving];
        let result = adjudicate(
            &module(),
            &evaluation(&[]),
            &scoring_result(Tier::InHome),
            &allowed,
            &features_on(),
            &client,
            0.5,
        )
        .await;
        assert_eq!(result.tier, Tier::InHome);
        assert!(matches!(result.path, AdjudicationPath::LlmRejected { .. }));
    }

    #[tokio::test]
    async fn safety_flag_blocks_no_care_suggestion() {
        let client = StaticClient(Ok(json!({
            "tier": "no_care_needed", "confidence": 0.95, "reasons": ["looks fine"]
        })));
        let result = adjudicate(
            &module(),
            &evaluation(&["wandering"]),
            &scoring_result(Tier::MemoryCare),
            &Tier::ALL,
            &features_on(),
            &client,
            0.5,
        )
        .await;
        assert_eq!(result.tier, Tier::MemoryCare);
        assert!(matches!(result.path, AdjudicationPath::LlmRejected { .. }));
    }

    #[tokio::test]
    async fn gates_raise_over_accepted_llm_tier() {
        let client = StaticClient(Ok(json!({
            "tier": "assisted_living", "confidence": 0.9,
            "reasons": ["family prefers assisted living"]
        })));
        let result = adjudicate(
            &module(),
            &evaluation(&["wandering", "aggression"]),
            &scoring_result(Tier::MemoryCare),
            &Tier::ALL,
            &features_on(),
            &client,
            0.5,
        )
        .await;
        // gate floors to high acuity regardless of the LLM's pick
        assert_eq!(result.tier, Tier::MemoryCareHighAcuity);
        assert_eq!(result.path, AdjudicationPath::LlmAccepted);
        assert!(result.gate_outcome.overrode());
    }

    #[tokio::test]
    async fn disabled_features_never_touch_the_llm() {
        struct PanickingClient;
        #[async_trait]
        impl LlmClient for PanickingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<Value, EngineError> {
                panic!("LLM must not be called when the feature is off");
            }
        }
        let result = adjudicate(
            &module(),
            &evaluation(&[]),
            &scoring_result(Tier::InHome),
            &Tier::ALL,
            &FeatureFlags::default(),
            &PanickingClient,
            0.5,
        )
        .await;
        assert_eq!(result.tier, Tier::InHome);
        assert_eq!(result.path, AdjudicationPath::Deterministic);
    }
}
