use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod command;
pub mod insight;
pub mod interpreter;
pub mod session;
pub mod state;
pub mod tap;
pub mod transcript;

pub use command::{ClaimDraft, Command, CommandError, DraftField, LookupForm};
pub use insight::{InsightDecodeError, InsightState, InsightUpdate, Reasoning};
pub use interpreter::{interpret, ClaimOutcome, Extraction};
pub use session::{CommandSink, ConnectionState, SendError, SessionConfig, TokenRequest};
pub use state::{ConsoleEvent, ConsoleSnapshot, ConsoleState};
pub use tap::{TapEnvelope, TapMsg};
pub use transcript::{ConversationLog, Segment, Speaker, TranscriptMerger, Utterance};

/// Identity of the caller resolved by a lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub first_name: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub last_name: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub phone: String,
}

impl CustomerRecord {
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contract {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub number: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub status: String,
    #[serde(default, rename = "type", deserialize_with = "deserialize_text")]
    pub contract_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub id: String,
    #[serde(default, rename = "type", deserialize_with = "deserialize_text")]
    pub claim_type: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub date: String,
}

/// Deserialize an ID that can be either a string or a number into a String
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected string or number for id")),
    }
}

/// Scalars become text, null and structured values become an empty string.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    Ok(value_text(&val).unwrap_or_default())
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
