use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessment::Evaluation;
use crate::llm::{FieldKind, LlmClient, LlmRequest, ResponseSchema};

use super::{HoursBand, HoursEstimate, HoursSource, FIELD_BADLS, FIELD_COGNITION, FIELD_IADLS, FIELD_MEDS};

const SYSTEM_PROMPT: &str = "You are a geriatric care planning assistant. \
Given a structured clinical summary, estimate how many hours of hands-on \
care per day are needed. Respond with strict JSON only: \
{\"band\": one of \"<1h\", \"1-3h\", \"4-8h\", \"24h\", \
\"confidence\": number between 0 and 1, \
\"reasons\": array of 2 to 3 short strings}.";

fn response_schema() -> ResponseSchema {
    ResponseSchema::default()
        .field_with_allowed(
            "band",
            HoursBand::ALL.iter().map(|b| b.as_str().to_string()).collect(),
        )
        .field_with_range("confidence", 0.0, 1.0)
        .field("reasons", FieldKind::StringArray)
}

fn user_prompt(evaluation: &Evaluation, baseline: &HoursEstimate) -> String {
    let context = serde_json::json!({
        "badl_tasks": evaluation.fields.get(FIELD_BADLS).cloned().unwrap_or(Value::Array(Vec::new())),
        "iadl_tasks": evaluation.fields.get(FIELD_IADLS).cloned().unwrap_or(Value::Array(Vec::new())),
        "cognition_level": evaluation.fields.get(FIELD_COGNITION).cloned().unwrap_or(Value::Null),
        "medication_complexity": evaluation.fields.get(FIELD_MEDS).cloned().unwrap_or(Value::Null),
        "flags": evaluation.flags,
        "baseline_band": baseline.band.as_str(),
        "baseline_daily_hours": baseline.hours_raw,
    });
    format!(
        "Clinical summary:\n{}\n\nConfirm or adjust the baseline band.",
        serde_json::to_string_pretty(&context).unwrap_or_default()
    )
}

/// LLM refinement of the baseline band. Any failure (timeout, malformed
/// JSON, band outside the allowed set, confidence below the floor) keeps
/// the baseline. The caller never sees an error from this path.
pub async fn refine(
    baseline: HoursEstimate,
    evaluation: &Evaluation,
    client: &dyn LlmClient,
    confidence_floor: f64,
) -> HoursEstimate {
    let correlation_id = Uuid::new_v4().to_string();
    let request = LlmRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: user_prompt(evaluation, &baseline),
        schema: response_schema(),
    };

    let response = match client.complete(request).await {
        Ok(response) => response,
        Err(error) => {
            crate::log_llm_fallback!(correlation_id.as_str(), error.to_string().as_str());
            return baseline;
        }
    };

    // Schema validation guarantees these fields exist and are in range.
    let band = response["band"].as_str().and_then(HoursBand::parse);
    let confidence = response["confidence"].as_f64().unwrap_or(0.0);

    let Some(band) = band else {
        warn!(correlation_id = %correlation_id, "LLM band unparseable after validation");
        return baseline;
    };
    if confidence < confidence_floor {
        crate::log_llm_fallback!(correlation_id.as_str(), "confidence below floor");
        return baseline;
    }

    let reasons: Vec<String> = response["reasons"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    info!(
        correlation_id = %correlation_id,
        baseline_band = %baseline.band,
        refined_band = %band,
        confidence,
        "Hours band refined by LLM"
    );

    HoursEstimate {
        band,
        hours_scalar: band.scalar(),
        hours_raw: baseline.hours_raw,
        confidence,
        reasons: if reasons.is_empty() { baseline.reasons } else { reasons },
        source: HoursSource::LlmRefined,
    }
}
