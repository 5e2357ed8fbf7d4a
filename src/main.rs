use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use care_navigator::engine::Engine;
use care_navigator::storage::{FileSessionStore, SessionStore};
use care_navigator::{setup_logging, EngineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    if let Err(e) = dotenv::dotenv() {
        if !e.to_string().contains("No such file or directory")
            && !e.to_string().contains("system cannot find the file")
        {
            warn!("Failed to load .env file: {}", e);
        }
    }

    setup_logging()?;
    info!("Starting Care Navigator v{}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load()?;
    let engine = Engine::from_config(&config).context("Failed to initialize engine")?;

    let mut args = std::env::args().skip(1);
    let answers_path = args.next().map(PathBuf::from);
    let zip = args.next();
    let state = args.next();

    let answers_path = match answers_path {
        Some(path) => path,
        None if config.features.demo_mode => config.content.dir.join("demo_profile.json"),
        None => {
            anyhow::bail!(
                "Usage: care-navigator <answers.json> [zip] [state]\n\
                 Or enable demo_mode in engine.toml to run the bundled profile."
            );
        }
    };

    let answers: HashMap<String, Value> = {
        let content = std::fs::read_to_string(&answers_path)
            .with_context(|| format!("Failed to read answers file: {}", answers_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse answers file: {}", answers_path.display()))?
    };

    let mut session = engine.start_session()?;
    info!(session_id = %session.id(), answers = answers.len(), "Running assessment");

    for (question_id, value) in answers {
        if let Err(error) = session.apply_answer(&question_id, value) {
            warn!(question = %question_id, %error, "Answer rejected");
        }
    }
    session.commit_page();

    let recommendation = session.complete_care_assessment().await?;
    println!("=== Care Recommendation ===");
    println!("{}", serde_json::to_string_pretty(&recommendation)?);

    let profile = session
        .run_cost_planner(zip.as_deref(), state.as_deref())
        .await?;
    println!("\n=== Financial Profile ===");
    println!("{}", serde_json::to_string_pretty(&profile)?);

    let journey = session.journey_state();
    println!("\n=== Journey State ===");
    println!("{}", serde_json::to_string_pretty(&journey)?);

    let store = FileSessionStore::new(&config.content.sessions_dir);
    session.save_to(&store).await?;
    info!(session_id = %session.id(), "Session persisted");

    Ok(())
}
