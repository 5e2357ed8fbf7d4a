use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::contracts::ContractType;

/// Products in the family's journey, in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKey {
    GuidedAssessment,
    CostPlanner,
    PlanReview,
}

impl ProductKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKey::GuidedAssessment => "guided_assessment",
            ProductKey::CostPlanner => "cost_planner",
            ProductKey::PlanReview => "plan_review",
        }
    }

    pub fn hub(&self) -> &'static str {
        match self {
            ProductKey::GuidedAssessment => "care_hub",
            ProductKey::CostPlanner => "planning_hub",
            ProductKey::PlanReview => "advisor_hub",
        }
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative prerequisite: a product unlocks once the listed contracts
/// are published and the listed products are complete.
#[derive(Debug, Clone)]
pub struct UnlockRule {
    pub product: ProductKey,
    pub requires_contracts: Vec<ContractType>,
    pub requires_completed: Vec<ProductKey>,
}

/// Default unlock graph, declared in topological order. Journey gating is
/// a pure function of this graph plus published contracts and completion
/// signals; no UI event feeds it.
pub fn default_unlock_graph() -> Vec<UnlockRule> {
    vec![
        UnlockRule {
            product: ProductKey::GuidedAssessment,
            requires_contracts: Vec::new(),
            requires_completed: Vec::new(),
        },
        UnlockRule {
            product: ProductKey::CostPlanner,
            requires_contracts: vec![ContractType::CareRecommendation],
            requires_completed: vec![ProductKey::GuidedAssessment],
        },
        UnlockRule {
            product: ProductKey::PlanReview,
            requires_contracts: vec![ContractType::FinancialProfile],
            requires_completed: vec![ProductKey::CostPlanner],
        },
    ]
}

/// Derived journey snapshot. Never published; recomputed on demand from
/// coordinator state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyState {
    pub current_hub: String,
    pub completed_products: BTreeSet<ProductKey>,
    pub unlocked_products: BTreeSet<ProductKey>,
    pub recommended_next: Option<ProductKey>,
    /// True once every product in the graph is complete.
    pub journey_complete: bool,
}

pub fn derive(
    graph: &[UnlockRule],
    completed: &BTreeSet<ProductKey>,
    published: &HashSet<ContractType>,
) -> JourneyState {
    let mut unlocked = BTreeSet::new();
    for rule in graph {
        let contracts_ready = rule
            .requires_contracts
            .iter()
            .all(|ct| published.contains(ct));
        let products_ready = rule
            .requires_completed
            .iter()
            .all(|p| completed.contains(p));
        if contracts_ready && products_ready {
            unlocked.insert(rule.product);
        }
    }

    // First undone product, in graph order, whose prerequisites hold.
    let recommended_next = graph
        .iter()
        .map(|rule| rule.product)
        .find(|p| unlocked.contains(p) && !completed.contains(p));

    let journey_complete = graph.iter().all(|rule| completed.contains(&rule.product));
    let current_hub = recommended_next
        .map(|p| p.hub())
        .unwrap_or(if journey_complete { "advisor_hub" } else { "care_hub" })
        .to_string();

    JourneyState {
        current_hub,
        completed_products: completed.clone(),
        unlocked_products: unlocked,
        recommended_next,
        journey_complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_published_unlocks_only_the_first_product() {
        let state = derive(&default_unlock_graph(), &BTreeSet::new(), &HashSet::new());
        assert_eq!(
            state.unlocked_products,
            BTreeSet::from([ProductKey::GuidedAssessment])
        );
        assert_eq!(state.recommended_next, Some(ProductKey::GuidedAssessment));
        assert_eq!(state.current_hub, "care_hub");
        assert!(!state.journey_complete);
    }

    #[test]
    fn unlock_requires_both_contract_and_completion() {
        let graph = default_unlock_graph();

        // contract published but assessment not marked complete
        let published = HashSet::from([ContractType::CareRecommendation]);
        let state = derive(&graph, &BTreeSet::new(), &published);
        assert!(!state.unlocked_products.contains(&ProductKey::CostPlanner));

        // both present
        let completed = BTreeSet::from([ProductKey::GuidedAssessment]);
        let state = derive(&graph, &completed, &published);
        assert!(state.unlocked_products.contains(&ProductKey::CostPlanner));
        assert_eq!(state.recommended_next, Some(ProductKey::CostPlanner));
        assert_eq!(state.current_hub, "planning_hub");
    }

    #[test]
    fn full_journey_completes() {
        let graph = default_unlock_graph();
        let completed = BTreeSet::from([
            ProductKey::GuidedAssessment,
            ProductKey::CostPlanner,
            ProductKey::PlanReview,
        ]);
        let published = HashSet::from([
            ContractType::CareRecommendation,
            ContractType::FinancialProfile,
        ]);
        let state = derive(&graph, &completed, &published);
        assert!(state.journey_complete);
        assert_eq!(state.recommended_next, None);
    }
}
