use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::schema::{Condition, ConditionOp, ModuleConfig, Question, QuestionType};
use crate::flags;

/// Validation classes for module configuration. Each maps to a distinct
/// failure message so a misconfigured file names the rule it broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    SchemaError { detail: String },
    UnknownFlag { flag: String, context: String },
    DuplicateOption { question: String, value: String },
    DanglingVisibleIf { question: String, field: String },
    DerivedCycle { field: String },
}

impl ConfigIssue {
    pub fn message(&self) -> String {
        match self {
            ConfigIssue::SchemaError { detail } => format!("SchemaError: {detail}"),
            ConfigIssue::UnknownFlag { flag, context } => {
                format!("UnknownFlag: '{flag}' referenced by {context} is not in the flag registry")
            }
            ConfigIssue::DuplicateOption { question, value } => {
                format!("DuplicateOption: question '{question}' declares option value '{value}' more than once")
            }
            ConfigIssue::DanglingVisibleIf { question, field } => {
                format!("DanglingVisibleIf: question '{question}' depends on undeclared field '{field}'")
            }
            ConfigIssue::DerivedCycle { field } => {
                format!("SchemaError: derived field '{field}' participates in a formula cycle")
            }
        }
    }
}

/// Full validation pass over one module. Returns every issue found, not
/// just the first, so a bad file can be fixed in one round.
pub fn validate_module(module: &ModuleConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    let mut question_ids = HashSet::new();
    for question in &module.questions {
        if !question_ids.insert(question.id.as_str()) {
            issues.push(ConfigIssue::SchemaError {
                detail: format!("duplicate question id '{}'", question.id),
            });
        }
        validate_question(question, &mut issues);
    }

    // A derived field may share its id with a readonly derived-type
    // question (the question is how the value is displayed); any other
    // collision is an error.
    let mut known_fields: HashSet<&str> = question_ids.clone();
    for derived in &module.derived_fields {
        if !known_fields.insert(derived.id.as_str()) {
            let paired_display = module
                .questions
                .iter()
                .any(|q| q.id == derived.id && q.kind == QuestionType::Derived);
            if !paired_display {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("derived field id '{}' collides with another field", derived.id),
                });
            }
        }
    }

    // visible_if may only reference declared questions or derived fields
    for question in &module.questions {
        if let Some(condition) = &question.visible_if {
            for field in condition_fields(condition) {
                if !known_fields.contains(field) {
                    issues.push(ConfigIssue::DanglingVisibleIf {
                        question: question.id.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
    }

    let declared_flags: HashSet<&str> = module.flags_emitted.iter().map(String::as_str).collect();
    for name in &module.flags_emitted {
        if !flags::is_known(name) {
            issues.push(ConfigIssue::UnknownFlag {
                flag: name.clone(),
                context: "flags_emitted".to_string(),
            });
        }
    }
    for question in &module.questions {
        for option in &question.options {
            for flag in &option.flags {
                check_flag(flag, &declared_flags, &format!("option '{}'", option.value), &mut issues);
            }
        }
    }
    for rule in &module.flag_rules {
        check_flag(&rule.flag, &declared_flags, "flag_rules", &mut issues);
        for field in condition_fields(&rule.when) {
            if !known_fields.contains(field) {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("flag rule '{}' references undeclared field '{field}'", rule.flag),
                });
            }
        }
    }
    for gate in &module.behavior_gates {
        for flag in condition_flags(&gate.when) {
            if !flags::is_known(flag) {
                issues.push(ConfigIssue::UnknownFlag {
                    flag: flag.to_string(),
                    context: format!("behavior gate '{}'", gate.id),
                });
            }
        }
    }

    for (tier, band) in &module.thresholds {
        if let Some(max) = band.max {
            if max < band.min {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("threshold band for '{tier}' has max {max} below min {}", band.min),
                });
            }
        }
    }

    issues.extend(detect_derived_cycles(module));
    issues
}

fn validate_question(question: &Question, issues: &mut Vec<ConfigIssue>) {
    match question.kind {
        QuestionType::SingleSelect | QuestionType::MultiSelect => {
            if question.options.is_empty() {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("select question '{}' has no options", question.id),
                });
            }
            let mut values = HashSet::new();
            for option in &question.options {
                if !values.insert(option.value.as_str()) {
                    issues.push(ConfigIssue::DuplicateOption {
                        question: question.id.clone(),
                        value: option.value.clone(),
                    });
                }
            }
        }
        QuestionType::Numeric | QuestionType::Currency => {
            if let (Some(min), Some(max)) = (question.min, question.max) {
                if max < min {
                    issues.push(ConfigIssue::SchemaError {
                        detail: format!("question '{}' has max {max} below min {min}", question.id),
                    });
                }
            }
        }
        QuestionType::Text => {}
        QuestionType::Derived => {
            if !question.readonly {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("derived question '{}' must be readonly", question.id),
                });
            }
        }
    }

    if let Some(Condition::Field { op, value, .. }) = &question.visible_if {
        validate_op_value(&question.id, *op, value, issues);
    }
}

fn validate_op_value(question: &str, op: ConditionOp, value: &Value, issues: &mut Vec<ConfigIssue>) {
    match op {
        ConditionOp::In => {
            if !value.is_array() {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("'{question}': 'in' condition requires an array value"),
                });
            }
        }
        ConditionOp::Gt | ConditionOp::Lt => {
            if !value.is_number() {
                issues.push(ConfigIssue::SchemaError {
                    detail: format!("'{question}': numeric comparison requires a number value"),
                });
            }
        }
        _ => {}
    }
}

fn check_flag(flag: &str, declared: &HashSet<&str>, context: &str, issues: &mut Vec<ConfigIssue>) {
    if !flags::is_known(flag) {
        issues.push(ConfigIssue::UnknownFlag {
            flag: flag.to_string(),
            context: context.to_string(),
        });
    } else if !declared.contains(flag) {
        issues.push(ConfigIssue::SchemaError {
            detail: format!("flag '{flag}' raised by {context} is missing from flags_emitted"),
        });
    }
}

/// Field names a condition reads (flag conditions read none).
pub fn condition_fields(condition: &Condition) -> Vec<&str> {
    match condition {
        Condition::All { all } => all.iter().flat_map(condition_fields).collect(),
        Condition::Any { any } => any.iter().flat_map(condition_fields).collect(),
        Condition::Flag { .. } => Vec::new(),
        Condition::Field { field, .. } => vec![field.as_str()],
    }
}

pub fn condition_flags(condition: &Condition) -> Vec<&str> {
    match condition {
        Condition::All { all } => all.iter().flat_map(condition_flags).collect(),
        Condition::Any { any } => any.iter().flat_map(condition_flags).collect(),
        Condition::Flag { flag } => vec![flag.as_str()],
        Condition::Field { .. } => Vec::new(),
    }
}

/// Derived formulas may read earlier derived fields; a cycle would make
/// evaluation order undefined, so it is rejected here.
fn detect_derived_cycles(module: &ModuleConfig) -> Vec<ConfigIssue> {
    let derived: HashMap<&str, Vec<&str>> = module
        .derived_fields
        .iter()
        .map(|d| (d.id.as_str(), d.formula.inputs()))
        .collect();

    let mut issues = Vec::new();
    for start in derived.keys() {
        let mut visiting = HashSet::new();
        if has_cycle(start, &derived, &mut visiting) {
            issues.push(ConfigIssue::DerivedCycle {
                field: start.to_string(),
            });
        }
    }
    issues
}

fn has_cycle<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visiting: &mut HashSet<&'a str>,
) -> bool {
    if !visiting.insert(node) {
        return true;
    }
    if let Some(inputs) = graph.get(node) {
        for input in inputs {
            if graph.contains_key(input) && has_cycle(input, graph, visiting) {
                return true;
            }
        }
    }
    visiting.remove(node);
    false
}
