use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::EngineError;

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionMode {
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    Even,
    Proportional,
}

/// What to do with a leftover between a Basic-mode entry and the current
/// detail sum. Whatever the choice, calculations never see the residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnallocatedAction {
    ClearOriginal,
    MoveToOther,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailField {
    pub id: String,
    pub label: String,
    pub value: f64,
}

/// A money category with a Basic aggregate input and Advanced detail
/// fields.
///
/// The one hard rule: every calculation consumes `allocated()`, the sum
/// of detail values. `entered` exists for transparency only; a stale
/// Basic estimate can never leak into totals. To keep that rule airtight
/// a Basic entry is distributed into the details at entry time, so the
/// detail sum tracks the aggregate until Advanced edits diverge from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneySection {
    pub id: String,
    pub label: String,
    pub mode: SectionMode,
    /// Last Basic-mode input, kept for the Unallocated indicator.
    pub entered: f64,
    pub details: Vec<DetailField>,
}

impl MoneySection {
    pub fn new(id: &str, label: &str, detail_fields: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            mode: SectionMode::Basic,
            entered: 0.0,
            details: detail_fields
                .iter()
                .map(|(id, label)| DetailField {
                    id: id.to_string(),
                    label: label.to_string(),
                    value: 0.0,
                })
                .collect(),
        }
    }

    /// The toggle only exists for sections with genuine multi-category
    /// structure; single-field sections render as direct inputs.
    pub fn supports_mode_toggle(&self) -> bool {
        self.details.len() >= 2
    }

    /// The only number calculations may use.
    pub fn allocated(&self) -> f64 {
        round_cents(self.details.iter().map(|d| d.value).sum())
    }

    /// Residual between the Basic entry and the detail sum. Informational
    /// only; never part of any total.
    pub fn unallocated(&self) -> f64 {
        round_cents(self.entered - self.allocated())
    }

    pub fn has_unallocated(&self) -> bool {
        self.unallocated().abs() >= 0.01
    }

    /// Set the Basic aggregate and distribute it across details in the
    /// same step, so the detail sum never lags the entry.
    pub fn set_entered(&mut self, amount: f64) -> Result<(), EngineError> {
        if self.mode != SectionMode::Basic {
            return Err(EngineError::validation(
                &self.id,
                "aggregate is read-only in advanced mode",
            ));
        }
        if amount < 0.0 {
            return Err(EngineError::validation(&self.id, "amount cannot be negative"));
        }
        self.entered = round_cents(amount);
        let strategy = if self.details.iter().any(|d| d.value > 0.0) {
            DistributionStrategy::Proportional
        } else {
            DistributionStrategy::Even
        };
        let split = self.preview_distribution(strategy);
        self.apply_distribution(&split);
        Ok(())
    }

    pub fn set_detail(&mut self, field_id: &str, amount: f64) -> Result<(), EngineError> {
        if self.mode != SectionMode::Advanced {
            return Err(EngineError::validation(
                &self.id,
                "detail fields are editable only in advanced mode",
            ));
        }
        if amount < 0.0 {
            return Err(EngineError::validation(field_id, "amount cannot be negative"));
        }
        let field = self
            .details
            .iter_mut()
            .find(|d| d.id == field_id)
            .ok_or_else(|| EngineError::validation(field_id, "unknown detail field"))?;
        field.value = round_cents(amount);
        Ok(())
    }

    /// Write an engine-computed value (e.g. the VA disability amount)
    /// into a detail field. These fields are application-state owned;
    /// widgets never write them, so the mode guard does not apply. In
    /// Basic mode the aggregate tracks the detail sum to stay a faithful
    /// calculated label.
    pub fn set_computed(&mut self, field_id: &str, amount: f64) -> Result<(), EngineError> {
        let field = self
            .details
            .iter_mut()
            .find(|d| d.id == field_id)
            .ok_or_else(|| EngineError::validation(field_id, "unknown detail field"))?;
        field.value = round_cents(amount);
        if self.mode == SectionMode::Basic {
            self.entered = self.allocated();
        }
        Ok(())
    }

    /// The split the user will see before committing a mode switch.
    /// Even: equal shares with the rounding remainder on the first field.
    /// Proportional: weighted by current detail values, even when all are
    /// zero.
    pub fn preview_distribution(&self, strategy: DistributionStrategy) -> Vec<(String, f64)> {
        let count = self.details.len();
        if count == 0 {
            return Vec::new();
        }
        if count == 1 {
            return vec![(self.details[0].id.clone(), self.entered)];
        }

        let current_total: f64 = self.details.iter().map(|d| d.value).sum();
        let use_proportional =
            strategy == DistributionStrategy::Proportional && current_total > 0.0;

        let mut split: Vec<(String, f64)> = if use_proportional {
            self.details
                .iter()
                .map(|d| {
                    (
                        d.id.clone(),
                        round_cents(self.entered * d.value / current_total),
                    )
                })
                .collect()
        } else {
            let share = round_cents(self.entered / count as f64);
            self.details.iter().map(|d| (d.id.clone(), share)).collect()
        };

        // Push the rounding remainder onto the first field so the split
        // always sums exactly to the entry.
        let allocated: f64 = split.iter().map(|(_, v)| v).sum();
        let remainder = round_cents(self.entered - allocated);
        if remainder != 0.0 {
            split[0].1 = round_cents(split[0].1 + remainder);
        }
        split
    }

    fn apply_distribution(&mut self, split: &[(String, f64)]) {
        for (id, amount) in split {
            if let Some(field) = self.details.iter_mut().find(|d| d.id == *id) {
                field.value = *amount;
            }
        }
    }

    /// Commit the previewed distribution and enter Advanced mode. The
    /// distribution and the mode change happen in one step, so no
    /// calculation can observe a half-switched section.
    pub fn to_advanced(&mut self, strategy: DistributionStrategy) {
        if self.mode == SectionMode::Advanced {
            return;
        }
        let split = self.preview_distribution(strategy);
        self.apply_distribution(&split);
        self.mode = SectionMode::Advanced;
        debug!(section = %self.id, "Section switched to advanced mode");
    }

    /// Return to Basic mode. The aggregate becomes the detail sum, so no
    /// data is lost and the Unallocated residual disappears.
    pub fn to_basic(&mut self) {
        if self.mode == SectionMode::Basic {
            return;
        }
        self.entered = self.allocated();
        self.mode = SectionMode::Basic;
        debug!(section = %self.id, "Section switched to basic mode");
    }

    /// Resolve the Unallocated indicator. `Ignore` keeps the residual
    /// visible; either way totals are unaffected because they only ever
    /// read `allocated()`.
    pub fn resolve_unallocated(&mut self, action: UnallocatedAction) -> Result<(), EngineError> {
        match action {
            UnallocatedAction::ClearOriginal => {
                self.entered = self.allocated();
            }
            UnallocatedAction::MoveToOther => {
                let residual = self.unallocated();
                if residual <= 0.0 {
                    return Ok(());
                }
                let other = self
                    .details
                    .iter_mut()
                    .find(|d| d.id.ends_with("other"))
                    .ok_or_else(|| {
                        EngineError::validation(&self.id, "section has no 'other' detail field")
                    })?;
                other.value = round_cents(other.value + residual);
            }
            UnallocatedAction::Ignore => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liquid_section() -> MoneySection {
        MoneySection::new(
            "liquid",
            "Liquid Assets",
            &[
                ("liquid_checking", "Checking"),
                ("liquid_savings", "Savings"),
                ("liquid_other", "Other"),
            ],
        )
    }

    #[test]
    fn basic_entry_distributes_and_allocates_fully() {
        let mut section = liquid_section();
        section.set_entered(100_000.0).unwrap();
        assert_eq!(section.allocated(), 100_000.0);
        assert!(!section.has_unallocated());
    }

    #[test]
    fn even_split_carries_remainder_on_first_field() {
        let mut section = liquid_section();
        section.set_entered(100.0).unwrap();
        let total: f64 = section.details.iter().map(|d| d.value).sum();
        assert!((total - 100.0).abs() < 0.005);
        // 100 / 3 = 33.33 with the extra cent on the first field
        assert!((section.details[0].value - 33.34).abs() < 0.005);
    }

    #[test]
    fn advanced_edit_creates_unallocated_and_totals_ignore_it() {
        let mut section = MoneySection::new(
            "liquid",
            "Liquid Assets",
            &[
                ("liquid_checking", "Checking"),
                ("liquid_savings", "Savings"),
                ("liquid_other", "Other"),
            ],
        );
        // mirror of scenario: 100k entered, then checking cut to 30k
        section.set_entered(100_000.0).unwrap();
        section.to_advanced(DistributionStrategy::Even);
        section.set_detail("liquid_other", 0.0).unwrap();
        section.set_detail("liquid_checking", 50_000.0).unwrap();
        section.set_detail("liquid_savings", 50_000.0).unwrap();
        section.set_detail("liquid_checking", 30_000.0).unwrap();

        assert_eq!(section.allocated(), 80_000.0);
        assert_eq!(section.unallocated(), 20_000.0);
        assert!(section.has_unallocated());

        section.resolve_unallocated(UnallocatedAction::MoveToOther).unwrap();
        assert_eq!(section.allocated(), 100_000.0);
        assert!(!section.has_unallocated());
    }

    #[test]
    fn clear_original_drops_the_residual() {
        let mut section = liquid_section();
        section.set_entered(90_000.0).unwrap();
        section.to_advanced(DistributionStrategy::Even);
        section.set_detail("liquid_checking", 10_000.0).unwrap();
        assert!(section.has_unallocated());

        section.resolve_unallocated(UnallocatedAction::ClearOriginal).unwrap();
        assert!(!section.has_unallocated());
        assert_eq!(section.entered, section.allocated());
    }

    #[test]
    fn mode_round_trip_without_edits_preserves_aggregate() {
        let mut section = liquid_section();
        section.set_entered(100_000.0).unwrap();
        section.to_advanced(DistributionStrategy::Even);
        section.to_basic();
        assert_eq!(section.entered, 100_000.0);
        assert_eq!(section.mode, SectionMode::Basic);
    }

    #[test]
    fn advanced_to_basic_adopts_detail_sum() {
        let mut section = liquid_section();
        section.set_entered(100_000.0).unwrap();
        section.to_advanced(DistributionStrategy::Even);
        section.set_detail("liquid_checking", 0.0).unwrap();
        section.to_basic();
        // lost nothing: the aggregate now reflects the edited reality
        assert!((section.entered - section.allocated()).abs() < 0.005);
        assert!(section.entered < 100_000.0);
    }

    #[test]
    fn mode_guards_reject_wrong_mode_writes() {
        let mut section = liquid_section();
        assert!(section.set_detail("liquid_checking", 5.0).is_err());
        section.to_advanced(DistributionStrategy::Even);
        assert!(section.set_entered(5.0).is_err());
    }

    #[test]
    fn proportional_distribution_respects_existing_weights() {
        let mut section = liquid_section();
        section.set_entered(100_000.0).unwrap();
        section.to_advanced(DistributionStrategy::Even);
        section.set_detail("liquid_checking", 75_000.0).unwrap();
        section.set_detail("liquid_savings", 25_000.0).unwrap();
        section.set_detail("liquid_other", 0.0).unwrap();
        section.to_basic();
        assert_eq!(section.entered, 100_000.0);

        section.set_entered(50_000.0).unwrap();
        let checking = section.details.iter().find(|d| d.id == "liquid_checking").unwrap();
        let savings = section.details.iter().find(|d| d.id == "liquid_savings").unwrap();
        assert!((checking.value - 37_500.0).abs() < 0.01);
        assert!((savings.value - 12_500.0).abs() < 0.01);
    }

    #[test]
    fn single_field_section_has_no_toggle() {
        let section = MoneySection::new("home", "Primary Residence", &[("home_value", "Value")]);
        assert!(!section.supports_mode_toggle());
    }
}
