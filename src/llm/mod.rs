use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::utils::EngineError;

/// Hard ceiling for a single LLM interaction. One request, no retries;
/// a retry would keep the user waiting past the point of usefulness.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(15);

/// The one request shape every LLM consumer uses.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub schema: ResponseSchema,
}

/// Minimal response contract: required fields with types, allowed string
/// values, and numeric ranges. Responses failing it are `LlmInvalid`;
/// raw response text never leaves this module.
#[derive(Debug, Clone, Default)]
pub struct ResponseSchema {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub allowed: Option<Vec<String>>,
    pub range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    StringArray,
}

impl ResponseSchema {
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            allowed: None,
            range: None,
        });
        self
    }

    pub fn field_with_allowed(mut self, name: &str, allowed: Vec<String>) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::String,
            allowed: Some(allowed),
            range: None,
        });
        self
    }

    pub fn field_with_range(mut self, name: &str, min: f64, max: f64) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Number,
            allowed: None,
            range: Some((min, max)),
        });
        self
    }

    /// Strict validation of a parsed response against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), EngineError> {
        let object = value
            .as_object()
            .ok_or_else(|| EngineError::LlmInvalid("response is not a JSON object".to_string()))?;

        for spec in &self.fields {
            let field = object.get(&spec.name).ok_or_else(|| {
                EngineError::LlmInvalid(format!("missing required field '{}'", spec.name))
            })?;

            match spec.kind {
                FieldKind::String => {
                    let s = field.as_str().ok_or_else(|| {
                        EngineError::LlmInvalid(format!("field '{}' must be a string", spec.name))
                    })?;
                    if let Some(allowed) = &spec.allowed {
                        if !allowed.iter().any(|a| a == s) {
                            return Err(EngineError::LlmInvalid(format!(
                                "field '{}' value '{s}' not in allowed set",
                                spec.name
                            )));
                        }
                    }
                }
                FieldKind::Number => {
                    let n = field.as_f64().ok_or_else(|| {
                        EngineError::LlmInvalid(format!("field '{}' must be a number", spec.name))
                    })?;
                    if let Some((min, max)) = spec.range {
                        if n < min || n > max {
                            return Err(EngineError::LlmInvalid(format!(
                                "field '{}' value {n} outside [{min}, {max}]",
                                spec.name
                            )));
                        }
                    }
                }
                FieldKind::StringArray => {
                    let valid = field
                        .as_array()
                        .map_or(false, |a| a.iter().all(Value::is_string));
                    if !valid {
                        return Err(EngineError::LlmInvalid(format!(
                            "field '{}' must be an array of strings",
                            spec.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Adapter seam for the LLM. `complete` returns only schema-validated
/// JSON; consumers interpret validated fields and never see raw text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<Value, EngineError>;
}

/// HTTP implementation against an OpenAI-compatible chat completions
/// endpoint.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(endpoint: String, model: String, api_key: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            model,
            api_key,
            timeout,
        }
    }

    async fn request_content(&self, request: &LlmRequest) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.1
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::LlmInvalid(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::LlmInvalid(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| EngineError::LlmInvalid(format!("unreadable response body: {e}")))?;

        envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::LlmInvalid("response missing message content".to_string()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<Value, EngineError> {
        let content = tokio::time::timeout(self.timeout, self.request_content(&request))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "LLM request timed out");
                EngineError::LlmTimeout(self.timeout)
            })??;

        let parsed: Value = serde_json::from_str(content.trim())
            .map_err(|e| EngineError::LlmInvalid(format!("response is not valid JSON: {e}")))?;

        request.schema.validate(&parsed)?;
        debug!("LLM response validated against schema");
        Ok(parsed)
    }
}

/// Stand-in used when the LLM feature is off. Callers check the feature
/// flag first; this exists so wiring never needs an Option.
pub struct DisabledLlmClient;

#[async_trait]
impl LlmClient for DisabledLlmClient {
    async fn complete(&self, _request: LlmRequest) -> Result<Value, EngineError> {
        Err(EngineError::LlmInvalid("LLM is disabled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn band_schema() -> ResponseSchema {
        ResponseSchema::default()
            .field_with_allowed(
                "band",
                vec!["<1h".into(), "1-3h".into(), "4-8h".into(), "24h".into()],
            )
            .field_with_range("confidence", 0.0, 1.0)
            .field("reasons", FieldKind::StringArray)
    }

    #[test]
    fn valid_response_passes() {
        let schema = band_schema();
        let response = json!({
            "band": "4-8h",
            "confidence": 0.8,
            "reasons": ["multiple daily tasks", "cognitive changes"]
        });
        assert!(schema.validate(&response).is_ok());
    }

    #[test]
    fn out_of_set_value_rejected() {
        let schema = band_schema();
        let response = json!({"band": "12h", "confidence": 0.8, "reasons": []});
        let err = schema.validate(&response).unwrap_err();
        assert!(matches!(err, EngineError::LlmInvalid(_)));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let schema = band_schema();
        let response = json!({"band": "24h", "confidence": 1.4, "reasons": []});
        assert!(schema.validate(&response).is_err());
    }

    #[test]
    fn missing_field_and_wrong_types_rejected() {
        let schema = band_schema();
        assert!(schema.validate(&json!({"band": "24h", "confidence": 0.9})).is_err());
        assert!(schema
            .validate(&json!({"band": "24h", "confidence": 0.9, "reasons": [1, 2]}))
            .is_err());
        assert!(schema.validate(&json!("not an object")).is_err());
    }

    #[tokio::test]
    async fn disabled_client_reports_invalid() {
        let client = DisabledLlmClient;
        let request = LlmRequest {
            system_prompt: String::new(),
            user_prompt: String::new(),
            schema: ResponseSchema::default(),
        };
        let err = client.complete(request).await.unwrap_err();
        assert!(err.is_llm_failure());
    }
}
