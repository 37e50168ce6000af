use std::error::Error;

use crate::error::ErrorKind;
use crate::message::HistoryMessage;
use crate::request::{ConversationId, StartRequest};
use crate::stream::EventStream;

/// The error type for a deliberation backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents the deliberation backend, which runs the agent
/// rounds and the arbitration server-side. The client only consumes it.
///
/// Once the backend handle is created, it should behave like a stateless
/// object. It can still have internal state, but callers should not rely
/// on it, and the backend should be prepared for being dropped anytime.
pub trait DeliberationBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// The live event stream type for this backend.
    type Stream: EventStream<Error = Self::Error>;

    /// Starts a new deliberation and returns the backend-issued
    /// conversation identifier.
    fn start(
        &self,
        req: &StartRequest,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static;

    /// Fetches the canonical, complete message list for a conversation.
    ///
    /// This is the single source of truth at terminal points; the session
    /// uses it to correct whatever the incremental merge produced.
    fn history(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Self::Error>> + Send + 'static;

    /// Opens the live event stream for a conversation.
    fn open_stream(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static;
}
