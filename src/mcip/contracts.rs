use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adjudicator::AdjudicationPath;
use crate::finance::FinancialProfile;
use crate::flags::FlagRecord;
use crate::scoring::{Tier, TierRanking};

/// Suggested downstream product for the family to open next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub label: String,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// How the recommendation was produced, for audit and display caveats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(flatten)]
    pub path: AdjudicationPath,
    pub gate_adjusted: bool,
}

/// Published recommendation contract. Immutable snapshot: regeneration
/// publishes a new record rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareRecommendation {
    pub tier: Tier,
    pub tier_score: i64,
    /// Every tier exactly once, winner first.
    pub tier_rankings: Vec<TierRanking>,
    pub confidence: f64,
    pub flags: Vec<FlagRecord>,
    pub rationale: Vec<String>,
    pub next_step: NextStep,
    pub generated_at: DateTime<Utc>,
    pub version: String,
    pub rule_set: String,
    /// Hash of the answer set that produced this record.
    pub input_snapshot_id: String,
    pub last_updated: DateTime<Utc>,
    pub needs_refresh: bool,
    pub provenance: Provenance,
}

/// The contract types the coordinator holds. `JourneyState` is derived,
/// not published, so it is not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    CareRecommendation,
    FinancialProfile,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::CareRecommendation => "care_recommendation",
            ContractType::FinancialProfile => "financial_profile",
        }
    }
}

impl std::fmt::Display for ContractType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contract {
    Care(CareRecommendation),
    Financial(FinancialProfile),
}

impl Contract {
    pub fn contract_type(&self) -> ContractType {
        match self {
            Contract::Care(_) => ContractType::CareRecommendation,
            Contract::Financial(_) => ContractType::FinancialProfile,
        }
    }

    pub fn stamp_last_updated(&mut self, now: DateTime<Utc>) {
        match self {
            Contract::Care(record) => record.last_updated = now,
            Contract::Financial(record) => record.last_updated = now,
        }
    }
}
