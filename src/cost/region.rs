use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::schema::RegionalTable;

/// How specific the matched entry was. Reported so downstream surfaces
/// can caveat accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionPrecision {
    Zip,
    Zip3,
    State,
    National,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionResolution {
    pub multiplier: f64,
    pub region_name: String,
    pub precision: RegionPrecision,
}

/// ZIP → ZIP3 → State → National cascade, most specific match first.
/// Unknown or malformed inputs fall through silently; there is always a
/// national answer.
pub fn resolve(table: &RegionalTable, zip: Option<&str>, state: Option<&str>) -> RegionResolution {
    let zip = zip.map(str::trim).filter(|z| !z.is_empty());

    if let Some(zip) = zip {
        if zip.len() == 5 && zip.chars().all(|c| c.is_ascii_digit()) {
            if let Some(entry) = table.by_zip.get(zip) {
                debug!(zip, region = %entry.region_name, "Region matched at zip precision");
                return RegionResolution {
                    multiplier: entry.multiplier,
                    region_name: entry.region_name.clone(),
                    precision: RegionPrecision::Zip,
                };
            }
        }
        let zip3: String = zip.chars().take(3).collect();
        if zip3.len() == 3 && zip3.chars().all(|c| c.is_ascii_digit()) {
            if let Some(entry) = table.by_zip3.get(&zip3) {
                debug!(zip3 = %zip3, region = %entry.region_name, "Region matched at zip3 precision");
                return RegionResolution {
                    multiplier: entry.multiplier,
                    region_name: entry.region_name.clone(),
                    precision: RegionPrecision::Zip3,
                };
            }
        }
    }

    if let Some(state) = state.map(str::trim).filter(|s| !s.is_empty()) {
        let key = state.to_ascii_uppercase();
        if let Some(entry) = table.by_state.get(&key) {
            debug!(state = %key, region = %entry.region_name, "Region matched at state precision");
            return RegionResolution {
                multiplier: entry.multiplier,
                region_name: entry.region_name.clone(),
                precision: RegionPrecision::State,
            };
        }
    }

    RegionResolution {
        multiplier: table.national.multiplier,
        region_name: table.national.region_name.clone(),
        precision: RegionPrecision::National,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::RegionEntry;
    use std::collections::HashMap;

    fn table() -> RegionalTable {
        let mut by_zip = HashMap::new();
        by_zip.insert(
            "98101".to_string(),
            RegionEntry {
                multiplier: 1.15,
                region_name: "Seattle Metro".to_string(),
            },
        );
        let mut by_zip3 = HashMap::new();
        by_zip3.insert(
            "981".to_string(),
            RegionEntry {
                multiplier: 1.12,
                region_name: "Puget Sound".to_string(),
            },
        );
        let mut by_state = HashMap::new();
        by_state.insert(
            "WA".to_string(),
            RegionEntry {
                multiplier: 1.08,
                region_name: "Washington".to_string(),
            },
        );
        by_state.insert(
            "CA".to_string(),
            RegionEntry {
                multiplier: 1.18,
                region_name: "California".to_string(),
            },
        );
        RegionalTable {
            by_zip,
            by_zip3,
            by_state,
            national: RegionEntry {
                multiplier: 1.0,
                region_name: "National Average".to_string(),
            },
        }
    }

    #[test]
    fn exact_zip_wins() {
        let resolution = resolve(&table(), Some("98101"), Some("WA"));
        assert_eq!(resolution.precision, RegionPrecision::Zip);
        assert_eq!(resolution.multiplier, 1.15);
        assert_eq!(resolution.region_name, "Seattle Metro");
    }

    #[test]
    fn zip3_covers_unlisted_zip() {
        let resolution = resolve(&table(), Some("98109"), None);
        assert_eq!(resolution.precision, RegionPrecision::Zip3);
        assert_eq!(resolution.multiplier, 1.12);
    }

    #[test]
    fn state_catches_unknown_zip() {
        let resolution = resolve(&table(), Some("12345"), Some("ca"));
        assert_eq!(resolution.precision, RegionPrecision::State);
        assert_eq!(resolution.region_name, "California");
    }

    #[test]
    fn empty_input_is_national() {
        let resolution = resolve(&table(), None, None);
        assert_eq!(resolution.precision, RegionPrecision::National);
        assert_eq!(resolution.multiplier, 1.0);
        assert_eq!(resolution.region_name, "National Average");
    }

    #[test]
    fn malformed_zip_falls_through_silently() {
        let resolution = resolve(&table(), Some("98XYZ"), None);
        assert_eq!(resolution.precision, RegionPrecision::National);
    }
}
