use std::fmt::{self, Debug, Display};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// The deliberation depths the backend accepts.
pub const MAX_ROUNDS_RANGE: RangeInclusive<u32> = 1..=5;

/// The longest question the backend accepts, in characters.
pub const MAX_QUESTION_LEN: usize = 5000;

/// A backend-issued conversation identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates an identifier from its string form.
    #[inline]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Per-provider credentials forwarded to the backend when a deliberation
/// starts. Every provider is optional; the backend falls back to a local
/// model for the ones that are absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiKeys {
    /// OpenAI API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    /// Gemini API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
    /// DeepSeek API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deepseek: Option<String>,
}

impl Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_deref().map(|_| "<redacted>"))
            .field("gemini", &self.gemini.as_deref().map(|_| "<redacted>"))
            .field(
                "deepseek",
                &self.deepseek.as_deref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// The body posted to start a deliberation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartRequest {
    /// The user's question.
    pub question: String,
    /// Credentials for the model providers the backend may use.
    pub api_keys: ApiKeys,
    /// How many deliberation rounds to run before arbitration.
    pub max_rounds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_wire_shape() {
        let req = StartRequest {
            question: "Is it?".to_owned(),
            api_keys: ApiKeys {
                gemini: Some("g-key".to_owned()),
                ..Default::default()
            },
            max_rounds: 3,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "question": "Is it?",
                "api_keys": { "gemini": "g-key" },
                "max_rounds": 3,
            })
        );
    }

    #[test]
    fn test_api_keys_are_redacted_in_debug() {
        let keys = ApiKeys {
            openai: Some("sk-secret".to_owned()),
            ..Default::default()
        };
        let debug = format!("{keys:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
