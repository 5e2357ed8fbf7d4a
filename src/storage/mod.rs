use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::finance::FinancialSections;

/// Everything worth persisting for one session: committed answers per
/// module plus the financial sections. Contracts are not stored; they are
/// regenerated from this state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub answers: HashMap<String, HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finances: Option<FinancialSections>,
    pub saved_at: DateTime<Utc>,
}

/// Persistence seam. At-least-once semantics: saving the same snapshot
/// twice must be harmless.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>>;
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
    async fn list_sessions(&self) -> Result<Vec<String>>;
}

/// Reference store over pretty-printed JSON files, one per session.
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let snapshot = serde_json::from_str(&content)?;
        debug!(session_id, path = %path.display(), "Session loaded");
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        let path = self.session_path(&snapshot.session_id);
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, content).await?;
        info!(session_id = %snapshot.session_id, path = %path.display(), "Session saved");
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        let mut read_dir = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    sessions.push(stem.to_string());
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(id: &str) -> SessionSnapshot {
        let mut care_answers = HashMap::new();
        care_answers.insert("age".to_string(), json!(80));
        let mut answers = HashMap::new();
        answers.insert("care_assessment".to_string(), care_answers);
        SessionSnapshot {
            session_id: id.to_string(),
            answers,
            finances: None,
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(temp.path());

        assert!(store.load("family-1").await.unwrap().is_none());

        store.save(&snapshot("family-1")).await.unwrap();
        let loaded = store.load("family-1").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, "family-1");
        assert_eq!(
            loaded.answers["care_assessment"]["age"],
            json!(80)
        );
    }

    #[tokio::test]
    async fn duplicate_saves_are_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(temp.path());
        let snapshot = snapshot("family-2");
        store.save(&snapshot).await.unwrap();
        store.save(&snapshot).await.unwrap();
        assert_eq!(store.list_sessions().await.unwrap(), vec!["family-2"]);
    }
}
