use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn setup_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .compact(),
        )
        .with(env_filter)
        .init();

    Ok(())
}

/// Log the path an adjudication took, with its correlation id
#[macro_export]
macro_rules! log_adjudication {
    ($path:expr, $correlation_id:expr, $tier:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            path = $path,
            correlation_id = $correlation_id,
            tier = $tier,
            $($key = $value,)*
            "Adjudication completed"
        );
    };
}

/// Log an absorbed LLM failure; the caller continues on the deterministic path
#[macro_export]
macro_rules! log_llm_fallback {
    ($correlation_id:expr, $reason:expr) => {
        tracing::warn!(
            correlation_id = $correlation_id,
            reason = $reason,
            event_type = "llm_fallback",
            "LLM path rejected, using deterministic result"
        );
    };
}
