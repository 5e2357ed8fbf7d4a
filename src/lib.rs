pub mod adjudicator;
pub mod assessment;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod engine;
pub mod finance;
pub mod flags;
pub mod hours;
pub mod llm;
pub mod mcip;
pub mod scoring;
pub mod storage;
pub mod utils;

pub use assessment::{AssessmentState, Evaluation};
pub use catalog::{Catalog, CatalogSnapshot};
pub use config::EngineConfig;
pub use cost::{CostProjection, RegionPrecision};
pub use engine::{Engine, Session};
pub use finance::{FinancialProfile, FinancialSections};
pub use flags::FeatureFlags;
pub use hours::{HoursBand, HoursEstimate};
pub use llm::{DisabledLlmClient, HttpLlmClient, LlmClient};
pub use mcip::{CareRecommendation, Contract, ContractType, JourneyState, Mcip, ProductKey};
pub use scoring::{ScoringResult, Tier};
pub use storage::{FileSessionStore, SessionSnapshot, SessionStore};
pub use utils::{setup_logging, Clock, EngineError, SystemClock};
