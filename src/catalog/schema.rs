use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::Tier;

/// One assessment module as declared in its JSON file. Questions, scoring
/// thresholds, gates, and derived fields are all configuration; the runtime
/// interprets them without module-specific code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub id: String,
    pub title: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub questions: Vec<Question>,
    /// Score bands per tier. The band containing the summed needs score
    /// selects the winning tier.
    #[serde(default)]
    pub thresholds: HashMap<Tier, ScoreBand>,
    /// Flags raised by predicate rather than by a single option.
    #[serde(default)]
    pub flag_rules: Vec<FlagRule>,
    #[serde(default)]
    pub behavior_gates: Vec<BehaviorGate>,
    #[serde(default)]
    pub derived_fields: Vec<DerivedField>,
    /// Declarative list of every flag this module may raise.
    #[serde(default)]
    pub flags_emitted: Vec<String>,
    pub output_contract: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: i64,
    /// Open-ended band when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl ScoreBand {
    pub fn contains(&self, score: i64) -> bool {
        score >= self.min && self.max.map_or(true, |max| score <= max)
    }

    /// Distance from a score to this band; zero when the band contains it.
    pub fn distance(&self, score: i64) -> i64 {
        if score < self.min {
            self.min - score
        } else if let Some(max) = self.max {
            if score > max {
                score - max
            } else {
                0
            }
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleSelect,
    MultiSelect,
    Numeric,
    Currency,
    Text,
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionLevel {
    #[default]
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Condition>,
    #[serde(default)]
    pub level: QuestionLevel,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub readonly: bool,
}

impl Question {
    pub fn option(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|opt| opt.value == value)
    }
}

/// A selectable option. Comparisons elsewhere are always against `value`,
/// never `label`; labels are free to change without breaking config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
    /// Signed contribution to the module's needs score.
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub flags: Vec<String>,
    /// "Not sure" style options; they satisfy requiredness but lower the
    /// specificity term of confidence.
    #[serde(default)]
    pub low_specificity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Equals,
    NotEquals,
    In,
    Gt,
    Lt,
    Exists,
}

/// Predicate over answers and flags. Field conditions compare answer
/// values; flag conditions test whether a flag has been raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Flag { flag: String },
    Field {
        field: String,
        op: ConditionOp,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        value: Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRule {
    pub flag: String,
    pub when: Condition,
    /// Optional score contribution tied to the rule firing.
    #[serde(default)]
    pub points: i64,
}

/// Post-scoring override. Gates may raise the tier freely; lowering it
/// requires `allow_downgrade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorGate {
    pub id: String,
    pub label: String,
    pub when: Condition,
    pub action: GateAction,
    #[serde(default)]
    pub allow_downgrade: bool,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GateAction {
    Floor { floor: Tier },
    Override { set: Tier },
}

/// Computed field declared in module JSON. Evaluated in declared order
/// after visible questions resolve; cycles are rejected at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedField {
    pub id: String,
    #[serde(flatten)]
    pub formula: Formula,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Formula {
    /// Numeric sum over the named fields (answers or earlier derived).
    Sum { fields: Vec<String> },
    /// Number of selected values in a multi-select answer.
    CountSelected { field: String },
    /// Monthly VA disability amount from the rate table; readonly income.
    VaDisability {
        rating_field: String,
        spouse_field: String,
    },
}

impl Formula {
    /// Fields this formula reads, for cycle detection at load.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Formula::Sum { fields } => fields.iter().map(String::as_str).collect(),
            Formula::CountSelected { field } => vec![field.as_str()],
            Formula::VaDisability {
                rating_field,
                spouse_field,
            } => vec![rating_field.as_str(), spouse_field.as_str()],
        }
    }
}

// --- Rate and cost tables -------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionEntry {
    pub multiplier: f64,
    pub region_name: String,
}

/// Regional cost table with the ZIP → ZIP3 → State → National cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalTable {
    #[serde(default)]
    pub by_zip: HashMap<String, RegionEntry>,
    #[serde(default)]
    pub by_zip3: HashMap<String, RegionEntry>,
    #[serde(default)]
    pub by_state: HashMap<String, RegionEntry>,
    pub national: RegionEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    /// Monthly base cost per tier.
    pub tier_monthly_base: HashMap<Tier, f64>,
    /// Hourly rate used for the in-home hours-based path.
    pub in_home_hourly_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddonAmount {
    Fixed { fixed: f64 },
    PercentOfBase { percent_of_base: f64 },
}

/// Conditional cost add-on, applied in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonRule {
    pub id: String,
    pub label: String,
    pub when: Condition,
    pub amount: AddonAmount,
}

/// VA disability compensation table: rating (10% steps) to monthly amount
/// by dependent status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaRateTable {
    pub rates: HashMap<String, VaRateRow>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VaRateRow {
    pub alone: f64,
    pub with_spouse: f64,
}

impl VaRateTable {
    pub fn monthly_amount(&self, rating: u32, with_spouse: bool) -> Option<f64> {
        self.rates.get(&rating.to_string()).map(|row| {
            if with_spouse {
                row.with_spouse
            } else {
                row.alone
            }
        })
    }
}
