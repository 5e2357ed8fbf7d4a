use serde::{Deserialize, Serialize};

/// The five care settings the engine can recommend, ordered by acuity.
/// Ordering is load-bearing: behavior gates compare tiers by severity and
/// ties in ranking break toward the higher-acuity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    NoCareNeeded,
    InHome,
    AssistedLiving,
    MemoryCare,
    MemoryCareHighAcuity,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::NoCareNeeded,
        Tier::InHome,
        Tier::AssistedLiving,
        Tier::MemoryCare,
        Tier::MemoryCareHighAcuity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::NoCareNeeded => "no_care_needed",
            Tier::InHome => "in_home",
            Tier::AssistedLiving => "assisted_living",
            Tier::MemoryCare => "memory_care",
            Tier::MemoryCareHighAcuity => "memory_care_high_acuity",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Tier::NoCareNeeded => "No Care Needed",
            Tier::InHome => "In-Home Care",
            Tier::AssistedLiving => "Assisted Living",
            Tier::MemoryCare => "Memory Care",
            Tier::MemoryCareHighAcuity => "Memory Care (High Acuity)",
        }
    }

    /// 0 for no-care through 4 for high-acuity memory care.
    pub fn acuity(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acuity_ordering_matches_declaration() {
        assert!(Tier::NoCareNeeded < Tier::InHome);
        assert!(Tier::MemoryCare < Tier::MemoryCareHighAcuity);
        assert_eq!(Tier::AssistedLiving.acuity(), 2);
    }

    #[test]
    fn serde_round_trip_uses_snake_case() {
        let json = serde_json::to_string(&Tier::MemoryCareHighAcuity).unwrap();
        assert_eq!(json, "\"memory_care_high_acuity\"");
        let tier: Tier = serde_json::from_str("\"assisted_living\"").unwrap();
        assert_eq!(tier, Tier::AssistedLiving);
    }
}
