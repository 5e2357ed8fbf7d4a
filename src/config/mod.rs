use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::flags::FeatureFlags;
use crate::scoring::{ConfidenceWeights, Tier};

/// Engine configuration: content locations, feature toggles, LLM
/// connection, and scoring coefficients. Loaded from TOML with
/// environment overrides; assessment content itself lives in the JSON
/// files under `content.dir`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub content: ContentConfig,
    pub features: FeatureFlags,
    pub llm: LlmConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentConfig {
    pub dir: PathBuf,
    pub sessions_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub timeout_secs: u64,
    /// Responses below this confidence are rejected in favor of the
    /// deterministic result.
    pub confidence_floor: f64,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    pub confidence: ConfidenceWeights,
    /// Tiers the adjudicator may select. Disabling a tier here removes it
    /// from the LLM's allowed set and from deterministic fallback.
    pub enabled_tiers: Vec<Tier>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let app_dir = home_dir.join(".care_navigator");

        Self {
            content: ContentConfig {
                dir: PathBuf::from("content"),
                sessions_dir: app_dir.join("sessions"),
            },
            features: FeatureFlags::default(),
            llm: LlmConfig {
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: String::new(),
                timeout_secs: 15,
                confidence_floor: 0.5,
            },
            scoring: ScoringConfig {
                confidence: ConfidenceWeights::default(),
                enabled_tiers: Tier::ALL.to_vec(),
            },
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir();
        let config_file = config_dir.join("engine.toml");

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

        let mut config = if config_file.exists() {
            info!("Loading configuration from: {}", config_file.display());
            let content = fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_file.display()))?
        } else {
            warn!("Config file not found, creating default configuration");
            let default_config = Self::default();
            default_config.save(&config_file)?;
            default_config
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let mut content = String::new();
        content.push_str("# Care Navigator Engine Configuration\n");
        content.push_str("#\n");
        content.push_str("# The LLM API key should be set in the environment, not here:\n");
        content.push_str("#   CARE_NAV_LLM_API_KEY=\"sk-...\"\n");
        content.push_str("#\n");
        content.push_str("# Optional environment overrides:\n");
        content.push_str("#   CARE_NAV_CONTENT_DIR=\"/path/to/content\"\n");
        content.push_str("#   CARE_NAV_LLM_ENABLED=\"true\"\n");
        content.push_str("#   CARE_NAV_DEMO_MODE=\"true\"\n");
        content.push('\n');

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        content.push_str(&config_content);

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(dir) = std::env::var("CARE_NAV_CONTENT_DIR") {
            if !dir.is_empty() {
                self.content.dir = PathBuf::from(dir);
            }
        }
        if let Ok(key) = std::env::var("CARE_NAV_LLM_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = key;
                info!("Loaded LLM API key from environment");
            }
        }
        if let Some(value) = env_bool("CARE_NAV_LLM_ENABLED") {
            self.features.llm_enabled = value;
        }
        if let Some(value) = env_bool("CARE_NAV_LLM_ADJUDICATION") {
            self.features.llm_adjudication = value;
        }
        if let Some(value) = env_bool("CARE_NAV_LLM_HOURS") {
            self.features.llm_hours = value;
        }
        if let Some(value) = env_bool("CARE_NAV_DEMO_MODE") {
            self.features.demo_mode = value;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 60 {
            anyhow::bail!("llm.timeout_secs must be between 1 and 60");
        }
        if !(0.0..=1.0).contains(&self.llm.confidence_floor) {
            anyhow::bail!("llm.confidence_floor must be in [0, 1]");
        }
        if self.scoring.enabled_tiers.is_empty() {
            anyhow::bail!("scoring.enabled_tiers cannot be empty");
        }
        if self.features.llm_enabled && self.llm.api_key.is_empty() {
            anyhow::bail!(
                "\nLLM features are enabled but no API key is set.\n\nPlease set the CARE_NAV_LLM_API_KEY environment variable:\n  export CARE_NAV_LLM_API_KEY=\"sk-...\"\n\nOr disable LLM features in engine.toml."
            );
        }
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".care_navigator")
    }
}

fn env_bool(variable: &str) -> Option<bool> {
    let value = std::env::var(variable).ok()?;
    match value.to_ascii_lowercase().parse::<bool>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring non-boolean value for {variable}");
            None
        }
    }
}
