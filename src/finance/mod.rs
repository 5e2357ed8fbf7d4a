pub mod profile;
pub mod section;

pub use profile::{build_profile, FinancialProfile, FinancialSections};
pub use section::{DistributionStrategy, MoneySection, SectionMode, UnallocatedAction};
