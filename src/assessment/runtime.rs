use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::catalog::schema::{Formula, ModuleConfig, Question, QuestionType, VaRateTable};
use crate::utils::EngineError;

use super::predicate::{self, PredicateContext};

/// Everything one evaluation pass produces. Downstream consumers (scoring,
/// hours, cost add-ons) read from here instead of re-walking the module.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub visible_questions: Vec<String>,
    pub derived_fields: HashMap<String, Value>,
    /// Merged answers plus derived values, the view every later predicate
    /// is evaluated against.
    pub fields: HashMap<String, Value>,
    pub flags: Vec<String>,
    pub contributions: Vec<Contribution>,
    /// Fraction of required, visible questions with a non-default answer.
    pub completeness: f64,
    /// Fraction of answered select questions with a specific (not
    /// "not sure") choice.
    pub specificity: f64,
}

impl Evaluation {
    pub fn flag_set(&self) -> HashSet<String> {
        self.flags.iter().cloned().collect()
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }
}

/// One signed score contribution, kept for rationale extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub source: String,
    pub label: String,
    pub points: i64,
}

/// Mutable per-session state of one assessment module.
///
/// Answers land in a current-render buffer first and shadow persisted
/// state during evaluation, so a dependent question appears on the same
/// render pass as the answer that reveals it. `commit_page` moves the
/// buffer into persisted state at page boundaries.
pub struct AssessmentState {
    module: Arc<ModuleConfig>,
    persisted: HashMap<String, Value>,
    render: HashMap<String, Value>,
}

impl AssessmentState {
    pub fn new(module: Arc<ModuleConfig>) -> Self {
        Self {
            module,
            persisted: HashMap::new(),
            render: HashMap::new(),
        }
    }

    /// Rebuild from a stored answer map (persistence adapter output).
    pub fn restore(module: Arc<ModuleConfig>, answers: HashMap<String, Value>) -> Self {
        Self {
            module,
            persisted: answers,
            render: HashMap::new(),
        }
    }

    pub fn module(&self) -> &ModuleConfig {
        &self.module
    }

    /// Validate and record an answer in the current render pass. Invalid
    /// values are rejected here and never reach persisted state.
    pub fn apply_answer(&mut self, question_id: &str, value: Value) -> Result<(), EngineError> {
        let question = self
            .module
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| {
                EngineError::validation(question_id, "unknown question id")
            })?;

        if question.readonly || question.kind == QuestionType::Derived {
            return Err(EngineError::validation(
                question_id,
                "field is read-only; its value is computed by the engine",
            ));
        }

        if value.is_null() {
            self.render.insert(question_id.to_string(), Value::Null);
            return Ok(());
        }

        validate_answer(question, &value)?;
        self.render.insert(question_id.to_string(), value);
        Ok(())
    }

    /// Merge the render buffer into persisted state. Called at each page
    /// boundary; partially filled pages stay in the buffer until then.
    pub fn commit_page(&mut self) {
        for (id, value) in self.render.drain() {
            if value.is_null() {
                self.persisted.remove(&id);
            } else {
                self.persisted.insert(id, value);
            }
        }
    }

    pub fn persisted_answers(&self) -> &HashMap<String, Value> {
        &self.persisted
    }

    /// Current-render values shadow persisted ones. Nulls in the buffer
    /// mean "cleared this render" and hide the persisted value.
    pub fn merged_answers(&self) -> HashMap<String, Value> {
        let mut merged = self.persisted.clone();
        for (id, value) in &self.render {
            if value.is_null() {
                merged.remove(id);
            } else {
                merged.insert(id.clone(), value.clone());
            }
        }
        merged
    }

    /// Evaluate the module end-to-end: derived fields, visibility, flags,
    /// score contributions, completeness.
    pub fn evaluate(&self, va_rates: &VaRateTable) -> Evaluation {
        let answers = self.merged_answers();

        // Derived fields first, in declared order; later formulas may read
        // earlier results. Cycles were rejected at load.
        let mut fields = answers.clone();
        let mut derived_fields = HashMap::new();
        for derived in &self.module.derived_fields {
            let value = compute_formula(&derived.formula, &fields, va_rates);
            fields.insert(derived.id.clone(), value.clone());
            derived_fields.insert(derived.id.clone(), value);
        }

        // Visibility over the merged view, so a dependent question reacts
        // to an answer given in this same render pass.
        let empty_flags = HashSet::new();
        let visibility_ctx = PredicateContext::new(&fields, &empty_flags);
        let visible: Vec<&Question> = self
            .module
            .questions
            .iter()
            .filter(|q| {
                q.visible_if
                    .as_ref()
                    .map_or(true, |cond| predicate::evaluate(cond, &visibility_ctx))
            })
            .collect();
        let visible_questions: Vec<String> = visible.iter().map(|q| q.id.clone()).collect();

        // Flags and score contributions from selected options of visible
        // questions only; hidden answers stay inert.
        let mut flag_set: HashSet<String> = HashSet::new();
        let mut contributions = Vec::new();
        for question in &visible {
            for option in selected_options(question, &answers) {
                if option.points != 0 {
                    contributions.push(Contribution {
                        source: question.id.clone(),
                        label: option.label.clone(),
                        points: option.points,
                    });
                }
                for flag in &option.flags {
                    flag_set.insert(flag.clone());
                }
            }
        }

        // Declarative flag rules run in declared order and may read flags
        // raised by earlier rules.
        for rule in &self.module.flag_rules {
            let ctx = PredicateContext::new(&fields, &flag_set);
            if predicate::evaluate(&rule.when, &ctx) {
                if flag_set.insert(rule.flag.clone()) && rule.points != 0 {
                    let label = crate::flags::lookup(&rule.flag)
                        .map(|def| def.label.to_string())
                        .unwrap_or_else(|| rule.flag.clone());
                    contributions.push(Contribution {
                        source: rule.flag.clone(),
                        label,
                        points: rule.points,
                    });
                }
            }
        }

        let mut flags: Vec<String> = flag_set.into_iter().collect();
        flags.sort_by_key(|name| {
            (
                crate::flags::lookup(name).map_or(u8::MAX, |def| def.priority),
                name.clone(),
            )
        });

        let (completeness, specificity) = completeness_and_specificity(&visible, &answers);

        debug!(
            module = %self.module.id,
            visible = visible_questions.len(),
            flags = flags.len(),
            completeness,
            "Module evaluated"
        );

        Evaluation {
            visible_questions,
            derived_fields,
            fields,
            flags,
            contributions,
            completeness,
            specificity,
        }
    }
}

fn validate_answer(question: &Question, value: &Value) -> Result<(), EngineError> {
    match question.kind {
        QuestionType::SingleSelect => {
            let selected = value.as_str().ok_or_else(|| {
                EngineError::validation(&question.id, "single-select answer must be a string value")
            })?;
            if question.option(selected).is_none() {
                return Err(EngineError::validation(
                    &question.id,
                    format!("'{selected}' is not an option value"),
                ));
            }
        }
        QuestionType::MultiSelect => {
            let list = value.as_array().ok_or_else(|| {
                EngineError::validation(&question.id, "multi-select answer must be an array")
            })?;
            for item in list {
                let selected = item.as_str().ok_or_else(|| {
                    EngineError::validation(&question.id, "multi-select values must be strings")
                })?;
                if question.option(selected).is_none() {
                    return Err(EngineError::validation(
                        &question.id,
                        format!("'{selected}' is not an option value"),
                    ));
                }
            }
        }
        QuestionType::Numeric | QuestionType::Currency => {
            let number = value.as_f64().ok_or_else(|| {
                EngineError::validation(&question.id, "answer must be numeric")
            })?;
            if let Some(min) = question.min {
                if number < min {
                    return Err(EngineError::validation(
                        &question.id,
                        format!("value {number} is below minimum {min}"),
                    ));
                }
            }
            if let Some(max) = question.max {
                if number > max {
                    return Err(EngineError::validation(
                        &question.id,
                        format!("value {number} is above maximum {max}"),
                    ));
                }
            }
        }
        QuestionType::Text => {
            if !value.is_string() {
                return Err(EngineError::validation(&question.id, "answer must be a string"));
            }
        }
        QuestionType::Derived => unreachable!("derived questions are rejected before validation"),
    }
    Ok(())
}

fn selected_options<'a>(
    question: &'a Question,
    answers: &HashMap<String, Value>,
) -> Vec<&'a crate::catalog::schema::QuestionOption> {
    let Some(answer) = answers.get(&question.id) else {
        return Vec::new();
    };
    match question.kind {
        QuestionType::SingleSelect => answer
            .as_str()
            .and_then(|v| question.option(v))
            .into_iter()
            .collect(),
        QuestionType::MultiSelect => answer
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|v| question.option(v))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn compute_formula(
    formula: &Formula,
    fields: &HashMap<String, Value>,
    va_rates: &VaRateTable,
) -> Value {
    match formula {
        Formula::Sum { fields: names } => {
            let total: f64 = names
                .iter()
                .filter_map(|name| fields.get(name))
                .filter_map(Value::as_f64)
                .sum();
            serde_json::json!(total)
        }
        Formula::CountSelected { field } => {
            let count = fields
                .get(field)
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            serde_json::json!(count)
        }
        Formula::VaDisability {
            rating_field,
            spouse_field,
        } => {
            let rating = fields
                .get(rating_field)
                .and_then(Value::as_f64)
                .map(|r| r as u32);
            let with_spouse = fields
                .get(spouse_field)
                .map(is_truthy)
                .unwrap_or(false);
            match rating.and_then(|r| va_rates.monthly_amount(r, with_spouse)) {
                Some(amount) => serde_json::json!(amount),
                None => serde_json::json!(0.0),
            }
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "yes" | "true" | "with_spouse" | "married"),
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => false,
    }
}

fn completeness_and_specificity(
    visible: &[&Question],
    answers: &HashMap<String, Value>,
) -> (f64, f64) {
    let mut required = 0usize;
    let mut answered_required = 0usize;
    let mut answered_selects = 0usize;
    let mut specific_selects = 0usize;

    for question in visible {
        let answer = answers.get(&question.id);
        let answered = match answer {
            Some(value) => question.default.as_ref() != Some(value),
            None => false,
        };

        if question.required && question.kind != QuestionType::Derived {
            required += 1;
            if answered {
                answered_required += 1;
            }
        }

        if matches!(
            question.kind,
            QuestionType::SingleSelect | QuestionType::MultiSelect
        ) && answer.is_some()
        {
            answered_selects += 1;
            let vague = selected_options(question, answers)
                .iter()
                .any(|opt| opt.low_specificity);
            if !vague {
                specific_selects += 1;
            }
        }
    }

    let completeness = if required == 0 {
        1.0
    } else {
        answered_required as f64 / required as f64
    };
    let specificity = if answered_selects == 0 {
        1.0
    } else {
        specific_selects as f64 / answered_selects as f64
    };
    (completeness, specificity)
}
