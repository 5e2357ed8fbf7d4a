pub mod refine;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::assessment::Evaluation;

/// Daily-hour weight per BADL task. Toileting is heaviest: needing help
/// there implies someone must be available through the day, not just for
/// the task itself.
const BADL_WEIGHTS: &[(&str, f64)] = &[
    ("bathing", 0.75),
    ("dressing", 0.5),
    ("toileting", 1.5),
    ("transferring", 0.75),
    ("feeding", 1.0),
    ("hygiene", 0.5),
];

const IADL_WEIGHTS: &[(&str, f64)] = &[
    ("medications", 0.4),
    ("meals", 1.0),
    ("housekeeping", 0.5),
    ("finances", 0.3),
    ("transport", 0.5),
    ("phone", 0.2),
    ("shopping", 0.4),
    ("laundry", 0.3),
];

/// Additive daily hours per behavior flag.
const BEHAVIOR_SURCHARGES: &[(&str, f64)] = &[
    ("wandering", 2.0),
    ("aggression", 1.5),
    ("sundowning", 1.0),
];

const MEDICATION_HOURS: &[(&str, f64)] = &[
    ("none", 0.0),
    ("simple", 0.25),
    ("moderate", 0.5),
    ("complex", 0.75),
    ("high_risk", 1.5),
];

const COGNITIVE_MULTIPLIER_CAP: f64 = 2.5;
const OVERNIGHT_FLOOR_HOURS: f64 = 16.0;

/// Field ids the estimator reads from the assessment evaluation.
pub const FIELD_BADLS: &str = "badl_support";
pub const FIELD_IADLS: &str = "iadl_support";
pub const FIELD_COGNITION: &str = "cognition_level";
pub const FIELD_MEDS: &str = "med_complexity";
pub const FIELD_OVERNIGHT: &str = "overnight_support";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoursBand {
    #[serde(rename = "<1h")]
    UnderOne,
    #[serde(rename = "1-3h")]
    OneToThree,
    #[serde(rename = "4-8h")]
    FourToEight,
    #[serde(rename = "24h")]
    TwentyFour,
}

impl HoursBand {
    pub const ALL: [HoursBand; 4] = [
        HoursBand::UnderOne,
        HoursBand::OneToThree,
        HoursBand::FourToEight,
        HoursBand::TwentyFour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HoursBand::UnderOne => "<1h",
            HoursBand::OneToThree => "1-3h",
            HoursBand::FourToEight => "4-8h",
            HoursBand::TwentyFour => "24h",
        }
    }

    pub fn parse(s: &str) -> Option<HoursBand> {
        HoursBand::ALL.iter().copied().find(|b| b.as_str() == s)
    }

    /// Scalar used by the in-home cost path.
    pub fn scalar(&self) -> f64 {
        match self {
            HoursBand::UnderOne => 0.5,
            HoursBand::OneToThree => 2.0,
            HoursBand::FourToEight => 6.0,
            HoursBand::TwentyFour => 24.0,
        }
    }

    /// Nearest band for a continuous daily-hours estimate. Boundaries sit
    /// midway between band representatives; the overnight floor of 16h
    /// lands in the 24h band.
    pub fn nearest(hours: f64) -> HoursBand {
        if hours < 1.0 {
            HoursBand::UnderOne
        } else if hours <= 3.5 {
            HoursBand::OneToThree
        } else if hours < 16.0 {
            HoursBand::FourToEight
        } else {
            HoursBand::TwentyFour
        }
    }
}

impl std::fmt::Display for HoursBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursSource {
    Baseline,
    LlmRefined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursEstimate {
    pub band: HoursBand,
    pub hours_scalar: f64,
    /// Continuous baseline figure before banding.
    pub hours_raw: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub source: HoursSource,
}

/// Deterministic baseline: weighted task hours, cognitive multiplier,
/// behavior surcharges, medication additive, overnight floor.
pub fn estimate(evaluation: &Evaluation) -> HoursEstimate {
    let badls = selected_list(evaluation, FIELD_BADLS);
    let iadls = selected_list(evaluation, FIELD_IADLS);

    let badl_hours: f64 = badls
        .iter()
        .filter_map(|task| weight_for(BADL_WEIGHTS, task))
        .sum();
    let iadl_hours: f64 = iadls
        .iter()
        .filter_map(|task| weight_for(IADL_WEIGHTS, task))
        .sum();

    let cognition = evaluation
        .fields
        .get(FIELD_COGNITION)
        .and_then(Value::as_str)
        .unwrap_or("none");
    let multiplier: f64 = match cognition {
        "mild" => 1.2,
        "moderate" => 1.6,
        "severe" => 2.2,
        _ => 1.0,
    };
    let multiplier = multiplier.min(COGNITIVE_MULTIPLIER_CAP);

    let mut hours = (badl_hours + iadl_hours) * multiplier;

    for (flag, surcharge) in BEHAVIOR_SURCHARGES {
        if evaluation.has_flag(flag) {
            hours += surcharge;
        }
    }

    let meds = evaluation
        .fields
        .get(FIELD_MEDS)
        .and_then(Value::as_str)
        .unwrap_or("none");
    hours += weight_for(MEDICATION_HOURS, meds).unwrap_or(0.0);

    let overnight = evaluation
        .fields
        .get(FIELD_OVERNIGHT)
        .and_then(Value::as_str)
        .map_or(false, |v| v == "yes")
        || evaluation.has_flag("overnight_need");
    if overnight {
        hours = hours.max(OVERNIGHT_FLOOR_HOURS);
    }

    let band = HoursBand::nearest(hours);
    let reasons = baseline_reasons(&badls, &iadls, cognition, overnight, evaluation);
    let confidence = baseline_confidence(evaluation);

    debug!(hours, band = %band, confidence, "Baseline hours estimated");

    HoursEstimate {
        band,
        hours_scalar: band.scalar(),
        hours_raw: hours,
        confidence,
        reasons,
        source: HoursSource::Baseline,
    }
}

fn selected_list(evaluation: &Evaluation, field: &str) -> Vec<String> {
    evaluation
        .fields
        .get(field)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn weight_for(table: &[(&str, f64)], key: &str) -> Option<f64> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, weight)| *weight)
}

fn baseline_reasons(
    badls: &[String],
    iadls: &[String],
    cognition: &str,
    overnight: bool,
    evaluation: &Evaluation,
) -> Vec<String> {
    let mut reasons = Vec::new();
    if !badls.is_empty() {
        reasons.push(format!(
            "{} daily-living task{} need hands-on help",
            badls.len(),
            if badls.len() == 1 { "" } else { "s" }
        ));
    }
    if !iadls.is_empty() {
        reasons.push(format!(
            "{} household task{} need support",
            iadls.len(),
            if iadls.len() == 1 { "" } else { "s" }
        ));
    }
    if cognition != "none" {
        reasons.push(format!("{cognition} cognitive changes increase supervision time"));
    }
    if evaluation.has_flag("wandering") || evaluation.has_flag("aggression") {
        reasons.push("behavioral symptoms require closer oversight".to_string());
    }
    if overnight {
        reasons.push("overnight availability required".to_string());
    }
    if reasons.is_empty() {
        reasons.push("currently independent in daily activities".to_string());
    }
    reasons
}

/// Confidence grows with how much of the clinical picture was answered.
fn baseline_confidence(evaluation: &Evaluation) -> f64 {
    let mut confidence: f64 = 0.6;
    if evaluation.fields.contains_key(FIELD_BADLS) {
        confidence += 0.15;
    }
    if evaluation.fields.contains_key(FIELD_COGNITION) {
        confidence += 0.15;
    }
    if evaluation.fields.contains_key(FIELD_IADLS) {
        confidence += 0.1;
    }
    confidence.min(1.0)
}
