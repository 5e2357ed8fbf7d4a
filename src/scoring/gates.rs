use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::info;

use crate::assessment::predicate::{self, PredicateContext};
use crate::catalog::schema::{BehaviorGate, GateAction};

use super::Tier;

/// Result of running the module's behavior gates over a candidate tier.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub tier: Tier,
    /// Gates that changed the tier, in the order they fired.
    pub applied: Vec<AppliedGate>,
}

#[derive(Debug, Clone)]
pub struct AppliedGate {
    pub id: String,
    pub label: String,
    pub rationale: String,
    pub from: Tier,
    pub to: Tier,
}

impl GateOutcome {
    pub fn overrode(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply gates in declared order. A gate may raise the tier freely;
/// lowering it requires `allow_downgrade` on that gate.
pub fn apply(
    gates: &[BehaviorGate],
    fields: &HashMap<String, Value>,
    flags: &HashSet<String>,
    candidate: Tier,
) -> GateOutcome {
    let ctx = PredicateContext::new(fields, flags);
    let mut tier = candidate;
    let mut applied = Vec::new();

    for gate in gates {
        if !predicate::evaluate(&gate.when, &ctx) {
            continue;
        }

        let target = match gate.action {
            GateAction::Floor { floor } => {
                if floor > tier {
                    floor
                } else {
                    tier
                }
            }
            GateAction::Override { set } => {
                if set < tier && !gate.allow_downgrade {
                    tier
                } else {
                    set
                }
            }
        };

        if target != tier {
            info!(
                gate = %gate.id,
                from = %tier,
                to = %target,
                "Behavior gate adjusted tier"
            );
            applied.push(AppliedGate {
                id: gate.id.clone(),
                label: gate.label.clone(),
                rationale: gate.rationale.clone(),
                from: tier,
                to: target,
            });
            tier = target;
        }
    }

    GateOutcome { tier, applied }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::Condition;
    use serde_json::json;

    fn gate(id: &str, when: Condition, action: GateAction, allow_downgrade: bool) -> BehaviorGate {
        BehaviorGate {
            id: id.to_string(),
            label: id.to_string(),
            when,
            action,
            allow_downgrade,
            rationale: format!("{id} fired"),
        }
    }

    fn flag_cond(name: &str) -> Condition {
        Condition::Flag {
            flag: name.to_string(),
        }
    }

    #[test]
    fn floor_raises_but_never_lowers() {
        let gates = vec![gate(
            "memory_floor",
            flag_cond("wandering"),
            GateAction::Floor {
                floor: Tier::MemoryCare,
            },
            false,
        )];
        let fields = HashMap::new();
        let flags: HashSet<String> = ["wandering".to_string()].into();

        let raised = apply(&gates, &fields, &flags, Tier::InHome);
        assert_eq!(raised.tier, Tier::MemoryCare);
        assert!(raised.overrode());

        let untouched = apply(&gates, &fields, &flags, Tier::MemoryCareHighAcuity);
        assert_eq!(untouched.tier, Tier::MemoryCareHighAcuity);
        assert!(!untouched.overrode());
    }

    #[test]
    fn override_needs_allow_downgrade_to_lower() {
        let fields = HashMap::new();
        let flags: HashSet<String> = ["adl_independent".to_string()].into();

        let locked = vec![gate(
            "downgrade",
            flag_cond("adl_independent"),
            GateAction::Override {
                set: Tier::NoCareNeeded,
            },
            false,
        )];
        let outcome = apply(&locked, &fields, &flags, Tier::AssistedLiving);
        assert_eq!(outcome.tier, Tier::AssistedLiving);

        let allowed = vec![gate(
            "downgrade",
            flag_cond("adl_independent"),
            GateAction::Override {
                set: Tier::NoCareNeeded,
            },
            true,
        )];
        let outcome = apply(&allowed, &fields, &flags, Tier::AssistedLiving);
        assert_eq!(outcome.tier, Tier::NoCareNeeded);
    }

    #[test]
    fn gates_chain_in_declared_order() {
        let gates = vec![
            gate(
                "al_floor",
                flag_cond("moderate_cognition"),
                GateAction::Floor {
                    floor: Tier::AssistedLiving,
                },
                false,
            ),
            gate(
                "high_acuity_floor",
                Condition::All {
                    all: vec![flag_cond("wandering"), flag_cond("aggression")],
                },
                GateAction::Floor {
                    floor: Tier::MemoryCareHighAcuity,
                },
                false,
            ),
        ];
        let fields: HashMap<String, Value> = [("age".to_string(), json!(82))].into();
        let flags: HashSet<String> = [
            "moderate_cognition".to_string(),
            "wandering".to_string(),
            "aggression".to_string(),
        ]
        .into();

        let outcome = apply(&gates, &fields, &flags, Tier::InHome);
        assert_eq!(outcome.tier, Tier::MemoryCareHighAcuity);
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.applied[0].to, Tier::AssistedLiving);
    }
}
