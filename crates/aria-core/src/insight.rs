use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const KPI_CALL_STARTED: &str = "call_started";
pub const SEARCH_RESULTS_PLACEHOLDER: &str = "Waiting for an interaction...";
pub const PROMPT_PLACEHOLDER: &str = "Waiting for the next action...";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsightDecodeError {
    #[error("insight payload is not utf-8: {0}")]
    Utf8(String),
    #[error("insight payload is not a json envelope: {0}")]
    Json(String),
    #[error("unsupported insight type: {0}")]
    UnsupportedType(String),
    #[error("invalid {kind} data: {message}")]
    InvalidData { kind: &'static str, message: String },
}

/// Latest reasoning trace. Unknown fields are kept so a wholesale
/// replacement never loses what the agent sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reasoning {
    #[serde(
        default,
        alias = "searchResults",
        deserialize_with = "deserialize_loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub search_results: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct KpiUpdatePayload {
    kpi: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsightUpdate {
    Kpi { kpi: String, value: f64 },
    Reasoning(Reasoning),
}

impl InsightUpdate {
    pub fn parse(kind: &str, data: Value) -> Result<Self, InsightDecodeError> {
        match kind {
            "kpi_update" => serde_json::from_value::<KpiUpdatePayload>(data)
                .map(|payload| Self::Kpi {
                    kpi: payload.kpi,
                    value: payload.value,
                })
                .map_err(|err| InsightDecodeError::InvalidData {
                    kind: "kpi_update",
                    message: err.to_string(),
                }),
            "agent_reasoning" => {
                if !data.is_object() {
                    return Err(InsightDecodeError::InvalidData {
                        kind: "agent_reasoning",
                        message: "data must be an object".to_string(),
                    });
                }
                serde_json::from_value(data)
                    .map(Self::Reasoning)
                    .map_err(|err| InsightDecodeError::InvalidData {
                        kind: "agent_reasoning",
                        message: err.to_string(),
                    })
            }
            other => Err(InsightDecodeError::UnsupportedType(other.to_string())),
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<InsightUpdate, InsightDecodeError> {
    let text =
        std::str::from_utf8(bytes).map_err(|err| InsightDecodeError::Utf8(err.to_string()))?;
    let envelope: RawEnvelope =
        serde_json::from_str(text).map_err(|err| InsightDecodeError::Json(err.to_string()))?;
    InsightUpdate::parse(&envelope.kind, envelope.data)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InsightState {
    #[serde(default)]
    pub kpis: BTreeMap<String, f64>,
    #[serde(default)]
    pub reasoning: Reasoning,
}

impl InsightState {
    pub fn apply(&mut self, update: InsightUpdate) {
        match update {
            InsightUpdate::Kpi { kpi, value } => {
                self.kpis.insert(kpi, value);
            }
            InsightUpdate::Reasoning(reasoning) => self.reasoning = reasoning,
        }
    }

    /// Decodes one insight-channel message and applies it. Anything that
    /// does not decode is logged and dropped.
    pub fn receive(&mut self, bytes: &[u8]) -> bool {
        match decode(bytes) {
            Ok(update) => {
                debug!(event = "insight_applied", update = ?update);
                self.apply(update);
                true
            }
            Err(err @ InsightDecodeError::UnsupportedType(_)) => {
                debug!(event = "insight_dropped", error = %err);
                false
            }
            Err(err) => {
                warn!(event = "insight_dropped", error = %err, len = bytes.len());
                false
            }
        }
    }

    pub fn kpi(&self, name: &str) -> f64 {
        self.kpis.get(name).copied().unwrap_or(0.0)
    }

    pub fn connected_calls(&self) -> f64 {
        self.kpi(KPI_CALL_STARTED)
    }

    pub fn search_results_text(&self) -> &str {
        self.reasoning
            .search_results
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(SEARCH_RESULTS_PLACEHOLDER)
    }

    pub fn prompt_text(&self) -> &str {
        self.reasoning
            .prompt
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(PROMPT_PLACEHOLDER)
    }
}

fn deserialize_loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    Ok(match val {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}
