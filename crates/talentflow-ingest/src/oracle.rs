//! Mapping oracle client
//!
//! When the heuristic resolver cannot map a single header, an external
//! completion endpoint can be asked to propose a mapping. The oracle is
//! strictly optional: it sits behind a trait so the rest of the pipeline
//! only ever sees "a suggestion or an error", and deployments without an
//! endpoint configured simply never construct one.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::mapping::CanonicalField;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle returned an unusable response: {0}")]
    BadResponse(String),

    #[error("oracle exhausted {0} attempts")]
    RetriesExhausted(u32),
}

/// A service that can propose header-to-field mappings.
#[async_trait]
pub trait MappingOracle: Send + Sync {
    async fn suggest_mapping(
        &self,
        headers: &[String],
    ) -> Result<BTreeMap<String, Option<CanonicalField>>, OracleError>;
}

/// Connection settings for the HTTP oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible completion API.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl OracleConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Oracle backed by an OpenAI-compatible chat completion endpoint.
pub struct HttpMappingOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl HttpMappingOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_prompt(headers: &[String]) -> String {
        let field_list = CanonicalField::ALL
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Map each spreadsheet column header to one of these candidate fields: {field_list}. \
             Respond with a JSON object whose keys are the original headers and whose values are \
             the field names, or null for columns that match no field. Headers: {headers:?}"
        )
    }

    async fn request_once(
        &self,
        prompt: &str,
    ) -> Result<BTreeMap<String, Option<CanonicalField>>, OracleError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": "You map spreadsheet headers to candidate record fields. Respond with JSON only."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.endpoint.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| OracleError::BadResponse("no choices in response".to_string()))?;

        parse_mapping_content(content)
    }
}

/// Extract the JSON payload from the completion text and canonicalize it.
///
/// Models wrap answers in prose or code fences often enough that this
/// scans for the outermost braces (or brackets) instead of parsing the
/// content whole. Both response shapes are accepted: an object of
/// `{header: field}` entries or a list of `[header, field]` pairs.
/// Unrecognized field names degrade to `None` rather than failing the
/// whole suggestion.
fn parse_mapping_content(
    content: &str,
) -> Result<BTreeMap<String, Option<CanonicalField>>, OracleError> {
    let parsed = extract_completion_json(content)?;

    let pairs: Vec<(String, Value)> = match parsed {
        Value::Object(object) => object.into_iter().collect(),
        Value::Array(items) => {
            let mut pairs = Vec::with_capacity(items.len());
            for item in items {
                let Value::Array(pair) = item else {
                    return Err(OracleError::BadResponse(
                        "mapping list entry is not a pair".to_string(),
                    ));
                };
                let mut pair = pair.into_iter();
                let (Some(Value::String(header)), Some(field), None) =
                    (pair.next(), pair.next(), pair.next())
                else {
                    return Err(OracleError::BadResponse(
                        "mapping list entry is not a [header, field] pair".to_string(),
                    ));
                };
                pairs.push((header, field));
            }
            pairs
        }
        _ => {
            return Err(OracleError::BadResponse(
                "completion JSON is neither an object nor a list".to_string(),
            ));
        }
    };

    let mut mapping = BTreeMap::new();
    for (header, field_value) in pairs {
        let field = match field_value {
            Value::String(name) => {
                let parsed = name.parse::<CanonicalField>().ok();
                if parsed.is_none() {
                    debug!(field = %name, "oracle proposed unknown field, ignoring");
                }
                parsed
            }
            Value::Null => None,
            other => {
                debug!(value = %other, "oracle proposed non-string field, ignoring");
                None
            }
        };
        mapping.insert(header, field);
    }
    Ok(mapping)
}

fn extract_completion_json(content: &str) -> Result<Value, OracleError> {
    let slice = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &content[start..=end],
        _ => match (content.find('['), content.rfind(']')) {
            (Some(start), Some(end)) if start <= end => &content[start..=end],
            _ => {
                return Err(OracleError::BadResponse(
                    "no JSON payload in completion".to_string(),
                ));
            }
        },
    };
    serde_json::from_str(slice).map_err(|e| OracleError::BadResponse(e.to_string()))
}

#[async_trait]
impl MappingOracle for HttpMappingOracle {
    async fn suggest_mapping(
        &self,
        headers: &[String],
    ) -> Result<BTreeMap<String, Option<CanonicalField>>, OracleError> {
        let prompt = Self::build_prompt(headers);
        let attempts = self.config.max_retries.max(1);

        for attempt in 1..=attempts {
            match self.request_once(&prompt).await {
                Ok(mapping) => return Ok(mapping),
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "oracle request failed, retrying");
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "oracle request failed, giving up");
                    return Err(e);
                }
            }
        }
        Err(OracleError::RetriesExhausted(attempts))
    }
}
