pub mod region;

pub use region::{RegionPrecision, RegionResolution};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::assessment::predicate::{self, PredicateContext};
use crate::catalog::schema::{AddonAmount, AddonRule, CostConfig, RegionalTable};
use crate::scoring::Tier;

/// Average days per month used by the hourly in-home path.
const DAYS_PER_MONTH: f64 = 30.44;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLineItem {
    pub label: String,
    pub amount: f64,
}

/// Monthly and multi-year projection with an ordered breakdown: base,
/// regional adjustment, then each triggered add-on. The line items sum
/// to `monthly_adjusted` exactly; each is rounded to cents when added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostProjection {
    pub tier: Tier,
    pub monthly_base: f64,
    pub monthly_adjusted: f64,
    pub annual: f64,
    pub three_year: f64,
    pub five_year: f64,
    pub breakdown: Vec<CostLineItem>,
    pub region_name: String,
    pub multiplier: f64,
    pub precision: RegionPrecision,
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Compute the projection for a tier. For in-home care with a known hours
/// scalar the base switches to the hourly path; the regional multiplier
/// applies to the rate either way.
#[allow(clippy::too_many_arguments)]
pub fn compute(
    cost_config: &CostConfig,
    regional: &RegionalTable,
    addon_rules: &[AddonRule],
    tier: Tier,
    zip: Option<&str>,
    state: Option<&str>,
    addon_fields: &HashMap<String, Value>,
    addon_flags: &HashSet<String>,
    hours_scalar: Option<f64>,
) -> CostProjection {
    let resolution = region::resolve(regional, zip, state);

    let (monthly_base, base_label) = match (tier, hours_scalar) {
        (Tier::InHome, Some(scalar)) => (
            round_cents(cost_config.in_home_hourly_rate * scalar * DAYS_PER_MONTH),
            format!(
                "In-home care, {scalar:.1} hrs/day at ${:.2}/hr",
                cost_config.in_home_hourly_rate
            ),
        ),
        _ => (
            round_cents(*cost_config.tier_monthly_base.get(&tier).unwrap_or(&0.0)),
            format!("{} base", tier.display_label()),
        ),
    };

    let mut breakdown = vec![CostLineItem {
        label: base_label,
        amount: monthly_base,
    }];

    let regional_add = round_cents(monthly_base * (resolution.multiplier - 1.0));
    if regional_add != 0.0 {
        breakdown.push(CostLineItem {
            label: format!("Regional adjustment ({})", resolution.region_name),
            amount: regional_add,
        });
    }

    // Conditional add-ons fire in declared order against the same
    // predicate machinery the assessment uses.
    let ctx = PredicateContext::new(addon_fields, addon_flags);
    for rule in addon_rules {
        if !predicate::evaluate(&rule.when, &ctx) {
            continue;
        }
        let amount = match rule.amount {
            AddonAmount::Fixed { fixed } => fixed,
            AddonAmount::PercentOfBase { percent_of_base } => {
                monthly_base * percent_of_base / 100.0
            }
        };
        let amount = round_cents(amount);
        if amount != 0.0 {
            debug!(rule = %rule.id, amount, "Cost add-on applied");
            breakdown.push(CostLineItem {
                label: rule.label.clone(),
                amount,
            });
        }
    }

    let monthly_adjusted = round_cents(breakdown.iter().map(|item| item.amount).sum());

    CostProjection {
        tier,
        monthly_base,
        monthly_adjusted,
        annual: round_cents(monthly_adjusted * 12.0),
        three_year: round_cents(monthly_adjusted * 36.0),
        five_year: round_cents(monthly_adjusted * 60.0),
        breakdown,
        region_name: resolution.region_name,
        multiplier: resolution.multiplier,
        precision: resolution.precision,
    }
}
