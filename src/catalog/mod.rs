pub mod schema;
pub mod validate;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::utils::EngineError;
use schema::{AddonRule, CostConfig, ModuleConfig, RegionalTable, VaRateTable};
use validate::validate_module;

/// Immutable view of every configuration file the engine consumes. Built
/// once at load; reload produces a fresh snapshot and swaps it in whole,
/// so in-flight work keeps the snapshot it started with.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub modules: HashMap<String, Arc<ModuleConfig>>,
    pub regional: RegionalTable,
    pub cost: CostConfig,
    pub addons: Vec<AddonRule>,
    pub va_rates: VaRateTable,
}

impl CatalogSnapshot {
    pub fn module(&self, id: &str) -> Option<Arc<ModuleConfig>> {
        self.modules.get(id).cloned()
    }
}

/// Configuration cache. Read-mostly; `reload` replaces the snapshot
/// atomically and never mutates one in place.
#[derive(Debug)]
pub struct Catalog {
    content_dir: PathBuf,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl Catalog {
    pub fn load(content_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let content_dir = content_dir.as_ref().to_path_buf();
        let snapshot = load_snapshot(&content_dir)?;
        info!(
            modules = snapshot.modules.len(),
            addon_rules = snapshot.addons.len(),
            dir = %content_dir.display(),
            "Configuration catalog loaded"
        );
        Ok(Self {
            content_dir,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot
            .read()
            .expect("catalog lock poisoned")
            .clone()
    }

    /// Re-reads every file and swaps the cache in one step. On failure the
    /// previous snapshot stays active.
    pub fn reload(&self) -> Result<(), EngineError> {
        let fresh = load_snapshot(&self.content_dir)?;
        let mut guard = self.snapshot.write().expect("catalog lock poisoned");
        *guard = Arc::new(fresh);
        info!("Configuration catalog reloaded");
        Ok(())
    }
}

fn load_snapshot(content_dir: &Path) -> Result<CatalogSnapshot, EngineError> {
    let modules = load_modules(&content_dir.join("modules"))?;
    let regional: RegionalTable = read_json(&content_dir.join("regional_rates.json"))?;
    let cost: CostConfig = read_json(&content_dir.join("cost_config.json"))?;
    let addons: Vec<AddonRule> = read_json(&content_dir.join("addon_rules.json"))?;
    let va_rates: VaRateTable = read_json(&content_dir.join("va_rates.json"))?;

    validate_regional(&regional)?;
    validate_cost(&cost)?;
    validate_addons(&addons)?;

    Ok(CatalogSnapshot {
        modules,
        regional,
        cost,
        addons,
        va_rates,
    })
}

fn load_modules(dir: &Path) -> Result<HashMap<String, Arc<ModuleConfig>>, EngineError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| EngineError::config(dir.display().to_string(), e.to_string()))?;

    let mut modules = HashMap::new();
    for entry in entries {
        let path = entry
            .map_err(|e| EngineError::config(dir.display().to_string(), e.to_string()))?
            .path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        let module: ModuleConfig = read_json(&path)?;
        let issues = validate_module(&module);
        if !issues.is_empty() {
            let joined = issues
                .iter()
                .map(|i| i.message())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(EngineError::config(path.display().to_string(), joined));
        }

        debug!(module = %module.id, questions = module.questions.len(), "Module validated");
        if modules.insert(module.id.clone(), Arc::new(module)).is_some() {
            return Err(EngineError::config(
                path.display().to_string(),
                "duplicate module id",
            ));
        }
    }
    Ok(modules)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, EngineError> {
    let content = fs::read_to_string(path)
        .map_err(|e| EngineError::config(path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&content)
        .map_err(|e| EngineError::config(path.display().to_string(), e.to_string()))
}

fn validate_regional(table: &RegionalTable) -> Result<(), EngineError> {
    let all = table
        .by_zip
        .values()
        .chain(table.by_zip3.values())
        .chain(table.by_state.values())
        .chain(std::iter::once(&table.national));
    for entry in all {
        if entry.multiplier < 0.0 {
            return Err(EngineError::config(
                "regional_rates.json",
                format!("negative multiplier for region '{}'", entry.region_name),
            ));
        }
    }
    Ok(())
}

fn validate_cost(cost: &CostConfig) -> Result<(), EngineError> {
    for tier in crate::scoring::Tier::ALL {
        if !cost.tier_monthly_base.contains_key(&tier) {
            return Err(EngineError::config(
                "cost_config.json",
                format!("missing monthly base cost for tier '{tier}'"),
            ));
        }
    }
    if cost.in_home_hourly_rate <= 0.0 {
        return Err(EngineError::config(
            "cost_config.json",
            "in_home_hourly_rate must be positive",
        ));
    }
    Ok(())
}

fn validate_addons(rules: &[AddonRule]) -> Result<(), EngineError> {
    for rule in rules {
        for flag in validate::condition_flags(&rule.when) {
            if !crate::flags::is_known(flag) {
                return Err(EngineError::config(
                    "addon_rules.json",
                    format!("add-on rule '{}' references unknown flag '{flag}'", rule.id),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn seed_content(dir: &Path) {
        write_file(
            dir,
            "modules/care.json",
            r#"{
                "id": "care_assessment",
                "title": "Care Assessment",
                "questions": [
                    {"id": "mobility", "type": "single_select", "label": "Mobility",
                     "options": [{"value": "steady", "label": "Steady"},
                                 {"value": "unsteady", "label": "Unsteady", "points": 3}]}
                ],
                "thresholds": {
                    "no_care_needed": {"min": 0, "max": 8},
                    "in_home": {"min": 9, "max": 16},
                    "assisted_living": {"min": 17, "max": 24},
                    "memory_care": {"min": 25, "max": 39},
                    "memory_care_high_acuity": {"min": 40}
                },
                "output_contract": "care_recommendation"
            }"#,
        );
        write_file(
            dir,
            "regional_rates.json",
            r#"{"by_zip": {}, "by_zip3": {}, "by_state": {},
                "national": {"multiplier": 1.0, "region_name": "National Average"}}"#,
        );
        write_file(
            dir,
            "cost_config.json",
            r#"{"tier_monthly_base": {
                    "no_care_needed": 0.0, "in_home": 4800.0, "assisted_living": 5400.0,
                    "memory_care": 7200.0, "memory_care_high_acuity": 9500.0},
                "in_home_hourly_rate": 34.0}"#,
        );
        write_file(dir, "addon_rules.json", "[]");
        write_file(
            dir,
            "va_rates.json",
            r#"{"rates": {"70": {"alone": 1716.28, "with_spouse": 1908.95}}}"#,
        );
    }

    #[test]
    fn loads_and_reloads_atomically() {
        let temp = tempfile::tempdir().unwrap();
        seed_content(temp.path());

        let catalog = Catalog::load(temp.path()).unwrap();
        let before = catalog.snapshot();
        assert!(before.module("care_assessment").is_some());

        // A failing reload must leave the old snapshot in place
        write_file(temp.path(), "modules/broken.json", "{ not json");
        assert!(catalog.reload().is_err());
        assert!(catalog.snapshot().module("care_assessment").is_some());

        fs::remove_file(temp.path().join("modules/broken.json")).unwrap();
        catalog.reload().unwrap();

        // The snapshot taken before reload is still usable
        assert!(before.module("care_assessment").is_some());
    }

    #[test]
    fn rejects_missing_tier_base_cost() {
        let temp = tempfile::tempdir().unwrap();
        seed_content(temp.path());
        write_file(
            temp.path(),
            "cost_config.json",
            r#"{"tier_monthly_base": {"in_home": 4800.0}, "in_home_hourly_rate": 34.0}"#,
        );
        let err = Catalog::load(temp.path()).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn rejects_invalid_module_with_file_and_rule() {
        let temp = tempfile::tempdir().unwrap();
        seed_content(temp.path());
        write_file(
            temp.path(),
            "modules/bad.json",
            r#"{
                "id": "bad", "title": "Bad",
                "questions": [
                    {"id": "q", "type": "single_select", "label": "Q",
                     "options": [{"value": "a", "label": "A"}, {"value": "a", "label": "A again"}]}
                ],
                "output_contract": "care_recommendation"
            }"#,
        );
        let err = Catalog::load(temp.path()).unwrap_err();
        match err {
            EngineError::Config { file, message } => {
                assert!(file.contains("bad.json"));
                assert!(message.contains("DuplicateOption"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }
}
