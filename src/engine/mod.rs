use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::adjudicator::{self, Adjudication};
use crate::assessment::{AssessmentState, Evaluation};
use crate::catalog::{Catalog, CatalogSnapshot};
use crate::config::EngineConfig;
use crate::cost;
use crate::finance::{self, FinancialProfile, FinancialSections};
use crate::flags::{self, FeatureFlags};
use crate::hours::{self, HoursEstimate};
use crate::llm::{DisabledLlmClient, HttpLlmClient, LlmClient};
use crate::mcip::{
    CareRecommendation, Contract, JourneyState, Mcip, NextStep, ProductKey, Provenance,
};
use crate::scoring::{self, ConfidenceWeights, Tier};
use crate::storage::{SessionSnapshot, SessionStore};
use crate::utils::{Clock, EngineError, SystemClock};

pub const CARE_MODULE_ID: &str = "care_assessment";

/// Shared services for all sessions: the configuration catalog, feature
/// toggles, LLM client, and clock.
pub struct Engine {
    catalog: Arc<Catalog>,
    features: FeatureFlags,
    confidence_weights: ConfidenceWeights,
    enabled_tiers: Vec<Tier>,
    llm_confidence_floor: f64,
    llm: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(
        catalog: Arc<Catalog>,
        config: &EngineConfig,
        llm: Arc<dyn LlmClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            features: config.features,
            confidence_weights: config.scoring.confidence,
            enabled_tiers: config.scoring.enabled_tiers.clone(),
            llm_confidence_floor: config.llm.confidence_floor,
            llm,
            clock,
        }
    }

    /// Standard wiring: HTTP LLM client when the feature is on, the
    /// disabled stand-in otherwise, system clock.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let catalog = Arc::new(Catalog::load(&config.content.dir)?);
        let llm: Arc<dyn LlmClient> = if config.features.llm_enabled {
            Arc::new(HttpLlmClient::new(
                config.llm.endpoint.clone(),
                config.llm.model.clone(),
                config.llm.api_key.clone(),
                config.llm.timeout(),
            ))
        } else {
            Arc::new(DisabledLlmClient)
        };
        Ok(Self::new(catalog, config, llm, Arc::new(SystemClock)))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn start_session(&self) -> Result<Session, EngineError> {
        self.start_session_with_id(Uuid::new_v4().to_string())
    }

    pub fn start_session_with_id(&self, session_id: String) -> Result<Session, EngineError> {
        let snapshot = self.catalog.snapshot();
        let module = snapshot.module(CARE_MODULE_ID).ok_or_else(|| {
            EngineError::config(CARE_MODULE_ID, "care assessment module is not loaded")
        })?;
        info!(session_id = %session_id, "Session started");
        Ok(Session {
            session_id,
            features: self.features,
            confidence_weights: self.confidence_weights,
            enabled_tiers: self.enabled_tiers.clone(),
            llm_confidence_floor: self.llm_confidence_floor,
            llm: self.llm.clone(),
            clock: self.clock.clone(),
            snapshot,
            care_state: AssessmentState::new(module),
            finances: FinancialSections::standard(),
            mcip: Arc::new(Mcip::new(self.clock.clone())),
        })
    }

    /// Rebuild a session from a stored snapshot.
    pub fn resume_session(&self, stored: SessionSnapshot) -> Result<Session, EngineError> {
        let mut session = self.start_session_with_id(stored.session_id)?;
        if let Some(answers) = stored.answers.get(CARE_MODULE_ID) {
            let module = session
                .snapshot
                .module(CARE_MODULE_ID)
                .expect("module checked at session start");
            session.care_state = AssessmentState::restore(module, answers.clone());
        }
        if let Some(finances) = stored.finances {
            session.finances = finances;
        }
        Ok(session)
    }
}

/// One family's journey: the care assessment, the financial picture, and
/// the per-session coordinator holding published contracts. The catalog
/// snapshot is pinned at session start; a hot reload applies to the next
/// session.
pub struct Session {
    session_id: String,
    features: FeatureFlags,
    confidence_weights: ConfidenceWeights,
    enabled_tiers: Vec<Tier>,
    llm_confidence_floor: f64,
    llm: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
    snapshot: Arc<CatalogSnapshot>,
    care_state: AssessmentState,
    finances: FinancialSections,
    mcip: Arc<Mcip>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn mcip(&self) -> &Mcip {
        &self.mcip
    }

    pub fn finances_mut(&mut self) -> &mut FinancialSections {
        &mut self.finances
    }

    pub fn apply_answer(&mut self, question_id: &str, value: Value) -> Result<(), EngineError> {
        self.care_state.apply_answer(question_id, value)
    }

    pub fn commit_page(&mut self) {
        self.care_state.commit_page();
    }

    pub fn evaluate_care(&self) -> Evaluation {
        self.care_state.evaluate(&self.snapshot.va_rates)
    }

    /// Complete the care module: score, adjudicate, publish the
    /// recommendation, and mark the assessment product complete.
    pub async fn complete_care_assessment(&mut self) -> Result<CareRecommendation, EngineError> {
        self.care_state.commit_page();
        let module = self
            .snapshot
            .module(CARE_MODULE_ID)
            .expect("module checked at session start");
        let evaluation = self.evaluate_care();
        let scoring_result = scoring::score(&module, &evaluation, &self.confidence_weights)?;

        let adjudication = adjudicator::adjudicate(
            &module,
            &evaluation,
            &scoring_result,
            &self.enabled_tiers,
            &self.features,
            self.llm.as_ref(),
            self.llm_confidence_floor,
        )
        .await;

        let recommendation = self.build_recommendation(&module.version, &evaluation, &scoring_result, &adjudication);
        self.mcip
            .publish(Contract::Care(recommendation.clone()));
        self.mcip.mark_complete(ProductKey::GuidedAssessment);
        Ok(recommendation)
    }

    fn build_recommendation(
        &self,
        module_version: &str,
        evaluation: &Evaluation,
        scoring_result: &scoring::ScoringResult,
        adjudication: &Adjudication,
    ) -> CareRecommendation {
        let now = self.clock.now();
        let flag_records = evaluation
            .flags
            .iter()
            .filter_map(|name| flags::lookup(name))
            .map(|def| def.record())
            .collect();

        let mut rationale = adjudication.reasons.clone();
        for gate in &adjudication.gate_outcome.applied {
            rationale.push(gate.rationale.clone());
        }

        CareRecommendation {
            tier: adjudication.tier,
            tier_score: scoring_result.total_score,
            tier_rankings: scoring_result.rankings.clone(),
            confidence: adjudication.confidence,
            flags: flag_records,
            rationale,
            next_step: next_step_for(adjudication.tier),
            generated_at: now,
            version: module_version.to_string(),
            rule_set: CARE_MODULE_ID.to_string(),
            input_snapshot_id: self.input_snapshot_id(),
            last_updated: now,
            needs_refresh: false,
            provenance: Provenance {
                path: adjudication.path.clone(),
                gate_adjusted: adjudication.gate_outcome.overrode(),
            },
        }
    }

    /// Stable hash of the committed answer set; ties a published
    /// recommendation to the answers that produced it.
    pub fn input_snapshot_id(&self) -> String {
        let ordered: std::collections::BTreeMap<&String, &Value> =
            self.care_state.persisted_answers().iter().collect();
        let canonical = serde_json::to_string(&ordered).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }

    /// True when answers changed after the last published recommendation.
    pub fn recommendation_is_stale(&self) -> bool {
        match self.mcip.care_recommendation() {
            Ok(record) => record.input_snapshot_id != self.input_snapshot_id(),
            Err(_) => false,
        }
    }

    /// Run the cost planner: consume the published recommendation,
    /// estimate hours, project costs, and publish the financial profile.
    /// The tier and flags come from the contract; the hours estimator is
    /// a core service fed by the shared assessment state, not a reach
    /// into another product.
    pub async fn run_cost_planner(
        &mut self,
        zip: Option<&str>,
        state: Option<&str>,
    ) -> Result<FinancialProfile, EngineError> {
        let recommendation = self.mcip.care_recommendation()?;
        let evaluation = self.evaluate_care();

        let hours = self.estimate_hours(&evaluation).await;

        // Engine-computed VA income flows into the profile as a detail
        // field; the readonly widget can only display it.
        if let Some(va_amount) = evaluation
            .derived_fields
            .get("va_monthly_benefit")
            .and_then(Value::as_f64)
        {
            if va_amount > 0.0 {
                if let Some(section) = self.finances.section_mut("income_monthly") {
                    section.set_computed("income_va_disability", va_amount)?;
                }
            }
        }

        let addon_fields = addon_context(&evaluation, &recommendation);
        let addon_flags = recommendation
            .flags
            .iter()
            .map(|f| f.name.clone())
            .collect();
        let hours_scalar = (recommendation.tier == Tier::InHome).then_some(hours.hours_scalar);

        let projection = cost::compute(
            &self.snapshot.cost,
            &self.snapshot.regional,
            &self.snapshot.addons,
            recommendation.tier,
            zip,
            state,
            &addon_fields,
            &addon_flags,
            hours_scalar,
        );

        let profile = finance::build_profile(&self.finances, &projection, &hours, self.clock.now());
        self.mcip
            .publish(Contract::Financial(profile.clone()));
        self.mcip.mark_complete(ProductKey::CostPlanner);
        Ok(profile)
    }

    async fn estimate_hours(&self, evaluation: &Evaluation) -> HoursEstimate {
        let baseline = hours::estimate(evaluation);
        if self.features.hours_refinement_active() {
            hours::refine::refine(
                baseline,
                evaluation,
                self.llm.as_ref(),
                self.llm_confidence_floor,
            )
            .await
        } else {
            baseline
        }
    }

    pub fn journey_state(&self) -> JourneyState {
        self.mcip.journey_state()
    }

    /// Snapshot for the persistence adapter; saving is the caller's call.
    pub fn snapshot_for_store(&self) -> SessionSnapshot {
        let mut answers = HashMap::new();
        answers.insert(
            CARE_MODULE_ID.to_string(),
            self.care_state.persisted_answers().clone(),
        );
        SessionSnapshot {
            session_id: self.session_id.clone(),
            answers,
            finances: Some(self.finances.clone()),
            saved_at: self.clock.now(),
        }
    }

    pub async fn save_to(&self, store: &dyn SessionStore) -> Result<(), EngineError> {
        store
            .save(&self.snapshot_for_store())
            .await
            .map_err(|e| EngineError::validation("session_store", e.to_string()))
    }
}

/// Every tier routes to the cost planner next; planning is useful even
/// when no care is needed yet.
fn next_step_for(tier: Tier) -> NextStep {
    NextStep {
        label: match tier {
            Tier::NoCareNeeded => "Plan ahead with the Cost Planner".to_string(),
            _ => "See what this care costs".to_string(),
        },
        route: "cost_planner".to_string(),
        filter: match tier {
            Tier::InHome => Some("in_home_services".to_string()),
            Tier::MemoryCare | Tier::MemoryCareHighAcuity => Some("memory_care".to_string()),
            _ => None,
        },
    }
}

/// Context the add-on rules evaluate against: assessment fields plus the
/// contract-level facts rules commonly key on.
fn addon_context(
    evaluation: &Evaluation,
    recommendation: &CareRecommendation,
) -> HashMap<String, Value> {
    let mut fields = evaluation.fields.clone();
    let adl_count = [hours::FIELD_BADLS, hours::FIELD_IADLS]
        .iter()
        .filter_map(|f| fields.get(*f))
        .filter_map(Value::as_array)
        .map(Vec::len)
        .sum::<usize>();
    fields.insert("adl_count".to_string(), serde_json::json!(adl_count));
    fields.insert(
        "care_tier".to_string(),
        serde_json::json!(recommendation.tier.as_str()),
    );
    fields.insert(
        "tier_score".to_string(),
        serde_json::json!(recommendation.tier_score),
    );
    fields.insert(
        "high_acuity".to_string(),
        serde_json::json!(recommendation.tier == Tier::MemoryCareHighAcuity),
    );
    fields
}
