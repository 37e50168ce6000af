use serde::{Deserialize, Serialize};

/// The reserved participant name for the user's initial question.
pub const USER_PARTICIPANT: &str = "user";

/// The participant whose message is the synthesized final answer.
pub const ARBITER_PARTICIPANT: &str = "arbiter";

/// Returns `true` when `name` is the user sentinel.
///
/// Participant names compare case-insensitively: the backend stores them
/// lowercased but streams them with display casing.
#[inline]
pub fn is_user_participant(name: &str) -> bool {
    name.eq_ignore_ascii_case(USER_PARTICIPANT)
}

/// Returns `true` when `name` is the arbiter.
#[inline]
pub fn is_arbiter_participant(name: &str) -> bool {
    name.eq_ignore_ascii_case(ARBITER_PARTICIPANT)
}

/// One utterance by a participant in one deliberation round.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// The participant that produced this message.
    pub participant: String,
    /// The accumulated text of the message.
    pub content: String,
    /// The deliberation round; `0` is reserved for the user's question.
    pub round: u32,
    /// Whether this message is intermediate reasoning rather than an
    /// answer.
    pub internal_thought: bool,
}

impl TranscriptMessage {
    /// Returns `true` when this message is the user's question.
    #[inline]
    pub fn is_user(&self) -> bool {
        is_user_participant(&self.participant)
    }

    /// Returns `true` when this message is the arbiter's final answer.
    #[inline]
    pub fn is_arbiter(&self) -> bool {
        is_arbiter_participant(&self.participant)
    }
}

/// An authoritative history record, as served by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    /// The participant that produced the message.
    pub agent_name: String,
    /// The complete message text.
    pub content: String,
    /// The deliberation round the message belongs to.
    #[serde(default)]
    pub round_number: u32,
    /// Server-side creation time, when recorded.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Whether the backend flagged the message as internal reasoning.
    #[serde(default)]
    pub is_internal_thought: bool,
}

impl From<HistoryMessage> for TranscriptMessage {
    fn from(msg: HistoryMessage) -> Self {
        Self {
            participant: msg.agent_name,
            content: msg.content,
            round: msg.round_number,
            internal_thought: msg.is_internal_thought,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_matching_ignores_case() {
        assert!(is_user_participant("User"));
        assert!(is_arbiter_participant("Arbiter"));
        assert!(!is_arbiter_participant("Gemini"));
    }

    #[test]
    fn test_history_record_deserialization() {
        let msg: HistoryMessage = serde_json::from_str(
            r#"{
                "id": 7,
                "agent_name": "gemini",
                "content": "Hello",
                "round_number": 1,
                "timestamp": "2025-11-02T10:00:00Z",
                "is_internal_thought": false
            }"#,
        )
        .unwrap();
        let msg = TranscriptMessage::from(msg);
        assert_eq!(msg.participant, "gemini");
        assert_eq!(msg.round, 1);
        assert!(!msg.internal_thought);
    }

    #[test]
    fn test_history_record_defaults() {
        let msg: HistoryMessage = serde_json::from_str(
            r#"{"agent_name": "user", "content": "Why?"}"#,
        )
        .unwrap();
        assert_eq!(msg.round_number, 0);
        assert_eq!(msg.timestamp, None);
        assert!(!msg.is_internal_thought);
    }
}
