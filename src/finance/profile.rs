use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cost::{CostLineItem, CostProjection, RegionPrecision};
use crate::hours::{HoursBand, HoursEstimate};
use crate::scoring::Tier;

use super::section::MoneySection;

/// The financial picture a session works on: income sources, the five
/// asset categories, and debts, each as an aggregate/detail section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSections {
    pub income: Vec<MoneySection>,
    pub assets: Vec<MoneySection>,
    pub debts: Vec<MoneySection>,
}

impl FinancialSections {
    /// The standard category layout. Sections with one meaningful detail
    /// field render as direct inputs; the rest carry the Basic/Advanced
    /// toggle.
    pub fn standard() -> Self {
        Self {
            income: vec![
                MoneySection::new(
                    "income_monthly",
                    "Monthly Income",
                    &[
                        ("income_social_security", "Social Security"),
                        ("income_pension", "Pension"),
                        ("income_employment", "Employment"),
                        ("income_va_disability", "VA Disability"),
                        ("income_other", "Other"),
                    ],
                ),
            ],
            assets: vec![
                MoneySection::new(
                    "assets_liquid",
                    "Liquid Assets",
                    &[
                        ("liquid_checking", "Checking"),
                        ("liquid_savings", "Savings"),
                        ("liquid_other", "Other"),
                    ],
                ),
                MoneySection::new(
                    "assets_investments",
                    "Investments",
                    &[
                        ("investments_brokerage", "Brokerage"),
                        ("investments_bonds", "Bonds & CDs"),
                        ("investments_other", "Other"),
                    ],
                ),
                MoneySection::new(
                    "assets_retirement",
                    "Retirement Accounts",
                    &[
                        ("retirement_401k", "401(k) / 403(b)"),
                        ("retirement_ira", "IRA"),
                        ("retirement_other", "Other"),
                    ],
                ),
                MoneySection::new(
                    "assets_real_estate",
                    "Real Estate",
                    &[
                        ("real_estate_primary", "Primary Residence"),
                        ("real_estate_rental", "Rental Property"),
                        ("real_estate_other", "Other"),
                    ],
                ),
                MoneySection::new(
                    "assets_life_insurance",
                    "Life Insurance",
                    &[
                        ("life_insurance_cash_value", "Cash Value"),
                        ("life_insurance_other", "Other"),
                    ],
                ),
            ],
            debts: vec![
                MoneySection::new(
                    "debts_total",
                    "Debts",
                    &[
                        ("debt_mortgage", "Mortgage Balance"),
                        ("debt_credit_cards", "Credit Cards"),
                        ("debt_auto", "Auto Loans"),
                        ("debt_medical", "Medical Debt"),
                        ("debt_other", "Other"),
                    ],
                ),
            ],
        }
    }

    pub fn section_mut(&mut self, id: &str) -> Option<&mut MoneySection> {
        self.income
            .iter_mut()
            .chain(self.assets.iter_mut())
            .chain(self.debts.iter_mut())
            .find(|s| s.id == id)
    }

    /// Detail-sum totals. `entered` values and unallocated residuals are
    /// structurally unreachable from here.
    pub fn monthly_income(&self) -> f64 {
        self.income.iter().map(MoneySection::allocated).sum()
    }

    pub fn total_assets(&self) -> f64 {
        self.assets.iter().map(MoneySection::allocated).sum()
    }

    pub fn total_debt(&self) -> f64 {
        self.debts.iter().map(MoneySection::allocated).sum()
    }
}

/// Published financial contract. All money figures are detail-field sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialProfile {
    pub monthly_income: f64,
    pub total_assets: f64,
    pub total_debt: f64,
    pub net_worth: f64,
    pub estimated_monthly_cost: f64,
    /// Positive when projected cost exceeds income.
    pub monthly_gap: f64,
    /// Months the assets cover the gap; `None` when income covers cost.
    pub runway_months: Option<f64>,
    pub care_tier: Tier,
    pub region_name: String,
    pub region_multiplier: f64,
    pub region_precision: RegionPrecision,
    pub cost_breakdown: Vec<CostLineItem>,
    pub hours_per_day: f64,
    pub hours_band: HoursBand,
    pub generated_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

pub fn build_profile(
    sections: &FinancialSections,
    projection: &CostProjection,
    hours: &HoursEstimate,
    now: DateTime<Utc>,
) -> FinancialProfile {
    let monthly_income = sections.monthly_income();
    let total_assets = sections.total_assets();
    let total_debt = sections.total_debt();
    let estimated_monthly_cost = projection.monthly_adjusted;
    let monthly_gap = estimated_monthly_cost - monthly_income;
    let runway_months = if monthly_gap > 0.0 && total_assets > 0.0 {
        Some(total_assets / monthly_gap)
    } else {
        None
    };

    FinancialProfile {
        monthly_income,
        total_assets,
        total_debt,
        net_worth: total_assets - total_debt,
        estimated_monthly_cost,
        monthly_gap,
        runway_months,
        care_tier: projection.tier,
        region_name: projection.region_name.clone(),
        region_multiplier: projection.multiplier,
        region_precision: projection.precision,
        cost_breakdown: projection.breakdown.clone(),
        hours_per_day: hours.hours_scalar,
        hours_band: hours.band,
        generated_at: now,
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::section::DistributionStrategy;
    use chrono::TimeZone;

    fn projection() -> CostProjection {
        CostProjection {
            tier: Tier::AssistedLiving,
            monthly_base: 5400.0,
            monthly_adjusted: 6210.0,
            annual: 74_520.0,
            three_year: 223_560.0,
            five_year: 372_600.0,
            breakdown: vec![
                CostLineItem {
                    label: "Assisted Living base".to_string(),
                    amount: 5400.0,
                },
                CostLineItem {
                    label: "Regional adjustment (Seattle Metro)".to_string(),
                    amount: 810.0,
                },
            ],
            region_name: "Seattle Metro".to_string(),
            multiplier: 1.15,
            precision: RegionPrecision::Zip,
        }
    }

    fn hours() -> HoursEstimate {
        HoursEstimate {
            band: HoursBand::FourToEight,
            hours_scalar: 6.0,
            hours_raw: 5.2,
            confidence: 0.8,
            reasons: Vec::new(),
            source: crate::hours::HoursSource::Baseline,
        }
    }

    #[test]
    fn totals_come_from_details_only() {
        let mut sections = FinancialSections::standard();
        let liquid = sections.section_mut("assets_liquid").unwrap();
        liquid.set_entered(100_000.0).unwrap();
        liquid.to_advanced(DistributionStrategy::Even);
        liquid.set_detail("liquid_checking", 30_000.0).unwrap();
        liquid.set_detail("liquid_savings", 50_000.0).unwrap();
        liquid.set_detail("liquid_other", 0.0).unwrap();
        // entered stays 100k but only the 80k of details may count
        assert_eq!(sections.total_assets(), 80_000.0);

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let profile = build_profile(&sections, &projection(), &hours(), now);
        assert_eq!(profile.total_assets, 80_000.0);
    }

    #[test]
    fn gap_and_runway() {
        let mut sections = FinancialSections::standard();
        sections
            .section_mut("income_monthly")
            .unwrap()
            .set_entered(4210.0)
            .unwrap();
        sections
            .section_mut("assets_liquid")
            .unwrap()
            .set_entered(100_000.0)
            .unwrap();

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let profile = build_profile(&sections, &projection(), &hours(), now);
        assert!((profile.monthly_gap - 2000.0).abs() < 0.01);
        assert!((profile.runway_months.unwrap() - 50.0).abs() < 0.01);
        assert_eq!(profile.net_worth, 100_000.0);
    }

    #[test]
    fn no_runway_when_income_covers_cost() {
        let mut sections = FinancialSections::standard();
        sections
            .section_mut("income_monthly")
            .unwrap()
            .set_entered(9000.0)
            .unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let profile = build_profile(&sections, &projection(), &hours(), now);
        assert!(profile.monthly_gap < 0.0);
        assert!(profile.runway_months.is_none());
    }
}
