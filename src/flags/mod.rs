use serde::{Deserialize, Serialize};

/// Grouping used for display and for coherence checks between flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    Safety,
    Cognition,
    Caregiver,
    Financial,
    Veteran,
    Health,
    Support,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Low,
    Moderate,
    High,
}

/// Call-to-action attached to a flag's display record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagCta {
    pub label: &'static str,
    pub route: &'static str,
}

/// Compile-time definition of a behavioral flag. Module configuration may
/// only raise flags that exist here; unknown names fail at load.
#[derive(Debug, Clone)]
pub struct FlagDef {
    pub name: &'static str,
    pub category: FlagCategory,
    pub severity: FlagSeverity,
    pub label: &'static str,
    pub description: &'static str,
    pub priority: u8,
    pub cta: Option<FlagCta>,
}

/// Runtime display record published inside contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub name: String,
    pub label: String,
    pub description: String,
    pub category: FlagCategory,
    pub severity: FlagSeverity,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_route: Option<String>,
}

impl FlagDef {
    pub fn record(&self) -> FlagRecord {
        FlagRecord {
            name: self.name.to_string(),
            label: self.label.to_string(),
            description: self.description.to_string(),
            category: self.category,
            severity: self.severity,
            priority: self.priority,
            cta_label: self.cta.as_ref().map(|c| c.label.to_string()),
            cta_route: self.cta.as_ref().map(|c| c.route.to_string()),
        }
    }
}

macro_rules! flag {
    ($name:literal, $cat:ident, $sev:ident, $prio:literal, $label:literal, $desc:literal) => {
        FlagDef {
            name: $name,
            category: FlagCategory::$cat,
            severity: FlagSeverity::$sev,
            label: $label,
            description: $desc,
            priority: $prio,
            cta: None,
        }
    };
    ($name:literal, $cat:ident, $sev:ident, $prio:literal, $label:literal, $desc:literal, $cta_label:literal => $cta_route:literal) => {
        FlagDef {
            name: $name,
            category: FlagCategory::$cat,
            severity: FlagSeverity::$sev,
            label: $label,
            description: $desc,
            priority: $prio,
            cta: Some(FlagCta {
                label: $cta_label,
                route: $cta_route,
            }),
        }
    };
}

/// Every flag the engine knows about. Assessment configuration references
/// these by name; the catalog loader rejects any name not listed here.
pub const FLAG_REGISTRY: &[FlagDef] = &[
    // Safety
    flag!("falls_risk", Safety, Moderate, 2, "Fall risk", "One or more falls reported in the last six months"),
    flag!("moderate_safety_concern", Safety, Moderate, 2, "Safety concern", "Home safety or supervision concerns that need attention"),
    flag!("high_safety_concern", Safety, High, 1, "Serious safety concern", "Safety risks that require prompt intervention"),
    flag!("wandering", Safety, High, 1, "Wandering", "Has left home or become lost without supervision"),
    flag!("unsafe_environment", Safety, High, 1, "Unsafe environment", "Current living environment presents hazards"),
    flag!("aggression", Safety, High, 1, "Aggressive behaviors", "Physical or verbal aggression reported"),
    // Cognition
    flag!("mild_cognitive_change", Cognition, Low, 4, "Mild cognitive change", "Occasional forgetfulness beyond normal aging"),
    flag!("moderate_cognition", Cognition, Moderate, 2, "Moderate cognitive decline", "Memory or judgment changes that affect daily life"),
    flag!("severe_cognition", Cognition, High, 1, "Severe cognitive decline", "Significant impairment requiring structured support"),
    flag!("sundowning", Cognition, Moderate, 2, "Sundowning", "Evening confusion or agitation patterns"),
    // Caregiver
    flag!("limited_support", Caregiver, Moderate, 3, "Limited support at home", "Family or informal support covers only part of the day"),
    flag!("caregiver_strain", Caregiver, Moderate, 2, "Caregiver strain", "Primary caregiver is stretched beyond sustainable limits"),
    flag!("no_caregiver", Caregiver, High, 1, "No regular caregiver", "No consistent informal support is available"),
    // Health
    flag!("chronic_present", Health, Moderate, 3, "Chronic conditions", "One or more chronic conditions under management"),
    flag!("complex_meds", Health, Moderate, 3, "Complex medications", "Multiple daily medications requiring organization"),
    flag!("high_risk_meds", Health, High, 2, "High-risk medications", "Insulin, injections, or medications needing monitoring"),
    flag!("overnight_need", Health, High, 1, "Overnight care need", "Needs someone available during the night"),
    // Financial
    flag!("financial_strain", Financial, Moderate, 3, "Financial strain", "Projected costs exceed available monthly resources", "Review funding options" => "cost_planner"),
    // Veteran
    flag!("veteran_aanda_risk", Veteran, Moderate, 3, "VA Aid & Attendance", "May qualify for VA Aid & Attendance benefits", "Check VA benefits" => "va_benefits"),
    // Support / independence
    flag!("lives_alone", Support, Low, 4, "Lives alone", "No one else in the household day to day"),
    flag!("adl_independent", Support, Low, 5, "Independent in ADLs", "Reports no help needed with daily activities"),
    flag!("daily_adl_help", Support, Moderate, 3, "Daily ADL help", "Needs hands-on help with daily activities every day"),
];

/// Flag pairs that cannot both be true of the same person; used by the
/// confidence model's coherence term.
pub const CONTRADICTORY_FLAGS: &[(&str, &str)] = &[
    ("adl_independent", "daily_adl_help"),
    ("adl_independent", "overnight_need"),
    ("no_caregiver", "caregiver_strain"),
];

pub fn lookup(name: &str) -> Option<&'static FlagDef> {
    FLAG_REGISTRY.iter().find(|def| def.name == name)
}

pub fn is_known(name: &str) -> bool {
    lookup(name).is_some()
}

/// Flags that forbid a `no_care_needed` recommendation regardless of score
/// or LLM output.
pub fn is_safety_critical(name: &str) -> bool {
    lookup(name).map_or(false, |def| {
        def.category == FlagCategory::Safety && def.severity >= FlagSeverity::Moderate
    })
}

/// Runtime feature toggles. Every consumer has a deterministic behavior
/// when its toggle is off, so the zero value is always safe.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub llm_enabled: bool,
    #[serde(default)]
    pub llm_adjudication: bool,
    #[serde(default)]
    pub llm_hours: bool,
    #[serde(default)]
    pub demo_mode: bool,
}

impl FeatureFlags {
    pub fn adjudication_active(&self) -> bool {
        self.llm_enabled && self.llm_adjudication
    }

    pub fn hours_refinement_active(&self) -> bool {
        self.llm_enabled && self.llm_hours
    }
}
