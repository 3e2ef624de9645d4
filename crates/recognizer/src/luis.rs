//! Recognizer backed by a hosted LUIS (v2) application.

use std::env;

use bot_core::{async_trait, Entity, IntentResult, Recognizer, RecognizerError};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Intent name LUIS uses when nothing matched.
const NONE_INTENT: &str = "None";

/// Configuration for [`LuisRecognizer`].
#[derive(Debug, Clone)]
pub struct LuisConfig {
    /// Full endpoint URL of the published model, including the subscription key.
    pub endpoint: String,
    /// Intents scoring below this are treated as "no intent".
    pub min_score: f32,
}

impl LuisConfig {
    /// Create a configuration for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            min_score: 0.3,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `LUIS_MODEL` | Endpoint URL of the published model | (required) |
    /// | `LUIS_MIN_SCORE` | Minimum intent score | `0.3` |
    pub fn from_env() -> Result<Self, RecognizerError> {
        let endpoint = env::var("LUIS_MODEL")
            .map_err(|_| RecognizerError::Configuration("LUIS_MODEL not set".to_string()))?;

        let min_score = env::var("LUIS_MIN_SCORE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.3);

        Ok(Self {
            endpoint,
            min_score,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisResponse {
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

#[derive(Debug, Deserialize)]
struct LuisIntent {
    intent: String,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisEntity {
    entity: String,
    #[serde(rename = "type")]
    kind: String,
    start_index: Option<usize>,
    end_index: Option<usize>,
}

/// A recognizer that queries a LUIS endpoint.
pub struct LuisRecognizer {
    client: Client,
    config: LuisConfig,
}

impl LuisRecognizer {
    /// Create a new recognizer.
    pub fn new(config: LuisConfig) -> Result<Self, RecognizerError> {
        let client = Client::builder().build().map_err(|e| {
            RecognizerError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    /// Create a recognizer from environment variables.
    pub fn from_env() -> Result<Self, RecognizerError> {
        Self::new(LuisConfig::from_env()?)
    }

    fn convert(&self, response: LuisResponse) -> Option<IntentResult> {
        let top = response.top_scoring_intent?;
        if top.intent == NONE_INTENT || top.score.unwrap_or(1.0) < self.config.min_score {
            return None;
        }

        let entities = response
            .entities
            .into_iter()
            .map(|e| {
                let entity = Entity::new(e.kind, e.entity);
                match (e.start_index, e.end_index) {
                    // LUIS reports an inclusive end index.
                    (Some(start), Some(end)) => entity.with_span(start, end + 1),
                    _ => entity,
                }
            })
            .collect();

        Some(IntentResult {
            intent: top.intent,
            score: top.score,
            entities,
        })
    }
}

#[async_trait]
impl Recognizer for LuisRecognizer {
    async fn recognize(&self, text: &str) -> Result<Option<IntentResult>, RecognizerError> {
        debug!("Recognizing via LUIS: {}", text);

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", text)])
            .send()
            .await
            .map_err(|e| RecognizerError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LUIS returned {}: {}", status.as_u16(), body);
            return Err(RecognizerError::InvalidResponse(format!(
                "LUIS error ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: LuisResponse = response.json().await.map_err(|e| {
            RecognizerError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        Ok(self.convert(parsed))
    }

    fn name(&self) -> &str {
        "LuisRecognizer"
    }
}
