//! The transcript and its reconciliation rules.

use parley_model::{
    HistoryMessage, StreamEvent, TranscriptMessage, USER_PARTICIPANT,
};

/// An ordered, round-aware view of one deliberation.
///
/// Insertion order is the rendered order. A logical message is identified
/// by its `(participant, round)` key, not by index: token events
/// accumulate into the entry with the matching key, and complete-message
/// events are checked against it for duplicate delivery. The backend does
/// not assign stable ids to in-progress messages, so the key is all there
/// is to match on; in exchange, a participant can hold at most one
/// actively accumulating message per round.
#[derive(Clone, Default, Debug)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    /// Returns the messages in render order.
    #[inline]
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    /// Returns `true` when the transcript holds no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends the user's question as the round-0 entry.
    pub(crate) fn push_user(&mut self, question: &str) {
        self.messages.push(TranscriptMessage {
            participant: USER_PARTICIPANT.to_owned(),
            content: question.to_owned(),
            round: 0,
            internal_thought: false,
        });
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }

    /// Folds one stream event into the transcript and returns whether the
    /// transcript changed.
    ///
    /// Only `token` and `message` events touch the transcript; the round
    /// counter and the terminal conditions are the session's business.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Token {
                agent,
                content,
                round,
            } => {
                self.append_chunk(agent, *round, content);
                true
            }
            StreamEvent::Message {
                agent,
                content,
                round,
            } => self.confirm(agent, *round, content),
            _ => false,
        }
    }

    /// Appends an incremental chunk to the entry for
    /// `(participant, round)`, creating the entry on first sight. No
    /// pre-declaration of participants is needed.
    fn append_chunk(&mut self, participant: &str, round: u32, chunk: &str) {
        if let Some(msg) = self.entry_mut(participant, round) {
            msg.content.push_str(chunk);
            return;
        }
        self.messages.push(TranscriptMessage {
            participant: participant.to_owned(),
            content: chunk.to_owned(),
            round,
            internal_thought: false,
        });
    }

    /// Applies a complete message for `(participant, round)`.
    ///
    /// When an entry with the same key has already accumulated at least
    /// as much content, the event duplicates what the token stream
    /// already produced and is discarded. Note the length check is a
    /// heuristic carried over from the backend contract: a genuinely
    /// shorter second message from the same key would be dropped too.
    fn confirm(
        &mut self,
        participant: &str,
        round: u32,
        content: &str,
    ) -> bool {
        let already_applied = self.messages.iter().any(|m| {
            m.participant == participant
                && m.round == round
                && m.content.len() >= content.len()
        });
        if already_applied {
            return false;
        }
        self.messages.push(TranscriptMessage {
            participant: participant.to_owned(),
            content: content.to_owned(),
            round,
            internal_thought: false,
        });
        true
    }

    fn entry_mut(
        &mut self,
        participant: &str,
        round: u32,
    ) -> Option<&mut TranscriptMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.participant == participant && m.round == round)
    }

    /// Replaces the whole transcript with the authoritative history.
    pub fn replace_all(&mut self, history: Vec<HistoryMessage>) {
        self.messages = history.into_iter().map(Into::into).collect();
    }

    /// The rendered view of the transcript.
    ///
    /// With reasoning hidden, only the user's question and the arbiter's
    /// answer are yielded. This is a projection: toggling it never
    /// mutates the underlying transcript, so no re-fetch is needed to
    /// restore the full view.
    pub fn visible(
        &self,
        show_reasoning: bool,
    ) -> impl Iterator<Item = &TranscriptMessage> {
        self.messages
            .iter()
            .filter(move |m| show_reasoning || m.is_user() || m.is_arbiter())
    }
}
