use std::error::Error as StdError;
use std::fmt::{self, Display};

use serde::Deserialize;

/// An event from the live conversation stream.
///
/// The wire payload is a JSON object with a `type` discriminator. Two
/// quirks of the backend are part of the grammar: a payload without a
/// `type` field is an old-style complete message, and a missing `round`
/// always defaults to `0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamEvent {
    /// An incremental text chunk for an in-progress message.
    Token {
        /// The participant the chunk belongs to.
        agent: String,
        /// The chunk text.
        content: String,
        /// The round the message belongs to.
        round: u32,
    },
    /// A complete message from one participant in one round.
    Message {
        /// The participant that produced the message.
        agent: String,
        /// The full message text.
        content: String,
        /// The round the message belongs to.
        round: u32,
    },
    /// The deliberation advanced to a new round.
    RoundUpdate {
        /// The round that is now in progress.
        round: u32,
    },
    /// Terminal: the deliberation has produced its final answer.
    Final {
        /// The synthesized answer, when the backend includes it.
        result: Option<String>,
    },
    /// Terminal: the backend reported an error.
    Error {
        /// A human-readable description of what went wrong.
        message: Option<String>,
    },
}

/// The raw shape of a stream payload, before the grammar rules are
/// applied.
#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    agent: Option<String>,
    content: Option<String>,
    round: Option<u32>,
    message: Option<String>,
    result: Option<String>,
}

impl StreamEvent {
    /// Parses one stream payload.
    ///
    /// Callers are expected to log and skip payloads that fail to parse;
    /// a single bad payload must not abort the stream.
    pub fn from_json(payload: &str) -> Result<Self, EventParseError> {
        let raw: RawEvent =
            serde_json::from_str(payload).map_err(EventParseError::Json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEvent) -> Result<Self, EventParseError> {
        let round = raw.round.unwrap_or(0);
        match raw.kind.as_deref() {
            Some("token") => Ok(StreamEvent::Token {
                agent: raw
                    .agent
                    .ok_or(EventParseError::MissingField("agent"))?,
                content: raw
                    .content
                    .ok_or(EventParseError::MissingField("content"))?,
                round,
            }),
            // A payload without a discriminator is a legacy complete
            // message.
            Some("message") | None => Ok(StreamEvent::Message {
                agent: raw
                    .agent
                    .ok_or(EventParseError::MissingField("agent"))?,
                content: raw
                    .content
                    .ok_or(EventParseError::MissingField("content"))?,
                round,
            }),
            Some("round_update") => Ok(StreamEvent::RoundUpdate { round }),
            Some("final") => Ok(StreamEvent::Final { result: raw.result }),
            Some("error") => Ok(StreamEvent::Error {
                message: raw.message,
            }),
            Some(other) => {
                Err(EventParseError::UnknownKind(other.to_owned()))
            }
        }
    }
}

/// Error produced when a stream payload cannot be interpreted.
#[derive(Debug)]
pub enum EventParseError {
    /// The payload is not valid JSON.
    Json(serde_json::Error),
    /// The payload carries a `type` discriminator this client does not
    /// know.
    UnknownKind(String),
    /// The payload is missing a field its kind requires.
    MissingField(&'static str),
}

impl Display for EventParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventParseError::Json(err) => {
                write!(f, "invalid payload: {err}")
            }
            EventParseError::UnknownKind(kind) => {
                write!(f, "unknown event type `{kind}`")
            }
            EventParseError::MissingField(field) => {
                write!(f, "missing field `{field}`")
            }
        }
    }
}

impl StdError for EventParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token() {
        let event = StreamEvent::from_json(
            r#"{"type": "token", "agent": "Gemini", "content": "Hel", "round": 1}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::Token {
                agent: "Gemini".to_owned(),
                content: "Hel".to_owned(),
                round: 1,
            }
        );
    }

    #[test]
    fn test_missing_round_defaults_to_zero() {
        let event = StreamEvent::from_json(
            r#"{"type": "token", "agent": "Gemini", "content": "Hi"}"#,
        )
        .unwrap();
        assert!(matches!(event, StreamEvent::Token { round: 0, .. }));
    }

    #[test]
    fn test_untyped_payload_is_a_legacy_message() {
        let event = StreamEvent::from_json(
            r#"{"agent": "DeepSeek", "content": "Done.", "round": 2}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::Message {
                agent: "DeepSeek".to_owned(),
                content: "Done.".to_owned(),
                round: 2,
            }
        );
    }

    #[test]
    fn test_parse_round_update() {
        let event =
            StreamEvent::from_json(r#"{"type": "round_update", "round": 3}"#)
                .unwrap();
        assert_eq!(event, StreamEvent::RoundUpdate { round: 3 });
    }

    #[test]
    fn test_parse_terminal_events() {
        let event = StreamEvent::from_json(
            r#"{"type": "final", "result": "The answer."}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::Final {
                result: Some("The answer.".to_owned()),
            }
        );

        let event = StreamEvent::from_json(
            r#"{"type": "error", "message": "provider quota exhausted"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                message: Some("provider quota exhausted".to_owned()),
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = StreamEvent::from_json(r#"{"type": "telemetry"}"#)
            .unwrap_err();
        assert!(matches!(err, EventParseError::UnknownKind(kind) if kind == "telemetry"));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let err = StreamEvent::from_json(
            r#"{"type": "token", "content": "Hi", "round": 1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, EventParseError::MissingField("agent")));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let err = StreamEvent::from_json("connected").unwrap_err();
        assert!(matches!(err, EventParseError::Json(_)));
    }
}
