use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::catalog::schema::{Condition, ConditionOp};

/// Everything a condition can read: field values (answers and derived,
/// already merged by the caller) and the set of raised flags.
pub struct PredicateContext<'a> {
    pub fields: &'a HashMap<String, Value>,
    pub flags: &'a HashSet<String>,
}

impl<'a> PredicateContext<'a> {
    pub fn new(fields: &'a HashMap<String, Value>, flags: &'a HashSet<String>) -> Self {
        Self { fields, flags }
    }
}

pub fn evaluate(condition: &Condition, ctx: &PredicateContext<'_>) -> bool {
    match condition {
        Condition::All { all } => all.iter().all(|c| evaluate(c, ctx)),
        Condition::Any { any } => any.iter().any(|c| evaluate(c, ctx)),
        Condition::Flag { flag } => ctx.flags.contains(flag.as_str()),
        Condition::Field { field, op, value } => {
            let answer = ctx.fields.get(field.as_str());
            evaluate_field(answer, *op, value)
        }
    }
}

fn evaluate_field(answer: Option<&Value>, op: ConditionOp, expected: &Value) -> bool {
    match op {
        ConditionOp::Exists => answer.map_or(false, |v| !v.is_null()),
        ConditionOp::Equals => answer.map_or(false, |v| values_equal(v, expected)),
        ConditionOp::NotEquals => !answer.map_or(false, |v| values_equal(v, expected)),
        ConditionOp::In => {
            let Some(list) = expected.as_array() else {
                return false;
            };
            match answer {
                Some(Value::Array(selected)) => selected
                    .iter()
                    .any(|s| list.iter().any(|candidate| values_equal(s, candidate))),
                Some(single) => list.iter().any(|candidate| values_equal(single, candidate)),
                None => false,
            }
        }
        ConditionOp::Gt => compare(answer, expected).map_or(false, |(a, b)| a > b),
        ConditionOp::Lt => compare(answer, expected).map_or(false, |(a, b)| a < b),
    }
}

fn compare(answer: Option<&Value>, expected: &Value) -> Option<(f64, f64)> {
    Some((answer?.as_f64()?, expected.as_f64()?))
}

/// Value comparison is by option *value*, never label; numbers compare
/// numerically so `70` and `70.0` match.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(fields: &[(&str, Value)]) -> (HashMap<String, Value>, HashSet<String>) {
        let map = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        (map, HashSet::new())
    }

    fn field_cond(field: &str, op: ConditionOp, value: Value) -> Condition {
        Condition::Field {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn equals_is_value_based_and_numeric_tolerant() {
        let (fields, flags) = ctx_with(&[("rating", json!(70))]);
        let ctx = PredicateContext::new(&fields, &flags);
        assert!(evaluate(&field_cond("rating", ConditionOp::Equals, json!(70.0)), &ctx));
        assert!(!evaluate(&field_cond("rating", ConditionOp::Equals, json!(80)), &ctx));
    }

    #[test]
    fn in_matches_any_selected_value() {
        let (fields, flags) = ctx_with(&[("badls", json!(["bathing", "dressing"]))]);
        let ctx = PredicateContext::new(&fields, &flags);
        assert!(evaluate(
            &field_cond("badls", ConditionOp::In, json!(["toileting", "bathing"])),
            &ctx
        ));
        assert!(!evaluate(
            &field_cond("badls", ConditionOp::In, json!(["toileting"])),
            &ctx
        ));
    }

    #[test]
    fn not_equals_true_for_missing_field() {
        let (fields, flags) = ctx_with(&[]);
        let ctx = PredicateContext::new(&fields, &flags);
        assert!(evaluate(
            &field_cond("anything", ConditionOp::NotEquals, json!("x")),
            &ctx
        ));
        assert!(!evaluate(&field_cond("anything", ConditionOp::Exists, Value::Null), &ctx));
    }

    #[test]
    fn composite_all_any_and_flags() {
        let (fields, mut flags) = ctx_with(&[("age", json!(80))]);
        flags.insert("wandering".to_string());
        let ctx = PredicateContext::new(&fields, &flags);

        let cond = Condition::All {
            all: vec![
                Condition::Flag {
                    flag: "wandering".to_string(),
                },
                field_cond("age", ConditionOp::Gt, json!(75)),
            ],
        };
        assert!(evaluate(&cond, &ctx));

        let cond = Condition::Any {
            any: vec![
                Condition::Flag {
                    flag: "aggression".to_string(),
                },
                field_cond("age", ConditionOp::Lt, json!(75)),
            ],
        };
        assert!(!evaluate(&cond, &ctx));
    }
}
