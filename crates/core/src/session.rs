
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::Pin;
use std::time::Duration;

use backoff::ExponentialBackoff;
use parley_model::{
    ApiKeys, BackendError, ConversationId, DeliberationBackend, EventStream,
    MAX_QUESTION_LEN, MAX_ROUNDS_RANGE, StartRequest, StreamEvent,
};
use tokio::select;
use tokio::sync::watch;

use crate::transcript::Transcript;

/// Errors surfaced by session operations.
#[derive(Debug)]
pub enum SessionError {
    /// The question was empty after trimming whitespace.
    EmptyQuestion,
    /// The question exceeds the length the backend accepts.
    QuestionTooLong,
    /// The backend rejected or failed a request.
    Backend(Box<dyn BackendError>),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EmptyQuestion => {
                "the question is empty".fmt(f)
            }
            SessionError::QuestionTooLong => write!(
                f,
                "the question exceeds {MAX_QUESTION_LEN} characters"
            ),
            SessionError::Backend(err) => err.fmt(f),
        }
    }
}

impl StdError for SessionError {}

type EventCallback = Box<dyn Fn(&StreamEvent, &SessionState) + Send + Sync>;

/// [`Session`] builder.
pub struct SessionBuilder<B> {
    backend: B,
    api_keys: ApiKeys,
    max_rounds: u32,
    show_reasoning: bool,
    on_event: Option<EventCallback>,
}

impl<B: DeliberationBackend> SessionBuilder<B> {
    /// Creates a builder with the specified backend.
    #[inline]
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            api_keys: ApiKeys::default(),
            max_rounds: 3,
            show_reasoning: true,
            on_event: None,
        }
    }

    /// Sets the provider credentials forwarded when a deliberation
    /// starts.
    #[inline]
    pub fn with_api_keys(mut self, api_keys: ApiKeys) -> Self {
        self.api_keys = api_keys;
        self
    }

    /// Sets the deliberation depth, clamped to the range the backend
    /// accepts.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds
            .clamp(*MAX_ROUNDS_RANGE.start(), *MAX_ROUNDS_RANGE.end());
        self
    }

    /// Sets the initial reasoning-visibility toggle.
    #[inline]
    pub fn with_show_reasoning(mut self, show: bool) -> Self {
        self.show_reasoning = show;
        self
    }

    /// Attaches a callback to be invoked after every applied stream
    /// event.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&StreamEvent, &SessionState) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Box::new(on_event));
        self
    }

    /// Builds the session.
    #[inline]
    pub fn build(self) -> Session<B> {
        Session::from_builder(self)
    }
}

/// The observable state of a session.
///
/// This is the single mutable structure every stream event funnels into;
/// the owning [`Session`] is its only writer.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    conversation_id: Option<ConversationId>,
    transcript: Transcript,
    current_round: u32,
    loading: bool,
    last_error: Option<String>,
    show_reasoning: bool,
}

impl SessionState {
    /// The backend-issued conversation identifier, once known.
    #[inline]
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// The live transcript.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The round currently shown as in progress.
    #[inline]
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Whether a deliberation is still in flight.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The last backend-reported error, if any.
    #[inline]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the display filter shows intermediate reasoning.
    #[inline]
    pub fn show_reasoning(&self) -> bool {
        self.show_reasoning
    }
}

/// A clonable handle that cancels the live stream of a session.
///
/// Closing is idempotent: the signal can be fired any number of times,
/// from any task, and once it is observed no further stream event can
/// mutate the session state. A handle is tied to the submission that was
/// live when it was issued; `reset` and a new `submit` re-arm the signal.
#[derive(Clone)]
pub struct CloseHandle {
    tx: watch::Sender<bool>,
}

impl CloseHandle {
    /// Signals the session to stop consuming the live stream.
    #[inline]
    pub fn close(&self) {
        self.tx.send(true).ok();
    }
}

/// One end-to-end deliberation session, from submission to completion.
///
/// The session owns the conversation lifecycle: it validates and submits
/// the question, opens the live event stream, folds incoming events into
/// the transcript, and reconciles against the authoritative history on
/// terminal conditions. All state mutations happen through `&mut self`
/// on the caller's task; there are no concurrent writers to guard
/// against.
pub struct Session<B: DeliberationBackend> {
    backend: B,
    api_keys: Option<ApiKeys>,
    max_rounds: u32,
    state: SessionState,
    stream: Option<Pin<Box<B::Stream>>>,
    close_tx: watch::Sender<bool>,
    close_rx: watch::Receiver<bool>,
    on_event: Option<EventCallback>,
}

impl<B: DeliberationBackend> Session<B> {
    fn from_builder(builder: SessionBuilder<B>) -> Self {
        let (close_tx, close_rx) = watch::channel(false);
        let state = SessionState {
            show_reasoning: builder.show_reasoning,
            ..Default::default()
        };
        Self {
            backend: builder.backend,
            api_keys: Some(builder.api_keys),
            max_rounds: builder.max_rounds,
            state,
            stream: None,
            close_tx,
            close_rx,
            on_event: builder.on_event,
        }
    }

    /// Returns the current session state.
    #[inline]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns a handle that can cancel the live stream from another
    /// task.
    #[inline]
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: self.close_tx.clone(),
        }
    }

    /// Toggles the reasoning-visibility filter.
    ///
    /// Projection only: the underlying transcript is never altered, so
    /// toggling back restores the full view without a re-fetch.
    #[inline]
    pub fn set_show_reasoning(&mut self, show: bool) {
        self.state.show_reasoning = show;
    }

    /// Submits a question and opens the live event stream.
    ///
    /// An empty (after trimming) or over-long question is rejected
    /// without any state change and without any backend call. A previous
    /// live stream, if any, is cancelled before the new submission
    /// begins. The user's message is appended optimistically, before the
    /// start call completes; if the call fails it stays in the
    /// transcript and the session simply stops loading.
    pub async fn submit(
        &mut self,
        question: &str,
    ) -> Result<(), SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if question.chars().count() > MAX_QUESTION_LEN {
            return Err(SessionError::QuestionTooLong);
        }

        // Cancel whatever was live before discarding the previous view,
        // so a late event cannot touch the new conversation.
        self.close_stream();
        self.rearm();
        self.state.transcript.clear();
        self.state.conversation_id = None;
        self.state.last_error = None;

        self.state.transcript.push_user(question);
        self.state.loading = true;
        // Deliberation begins at round 1; round 0 is the question.
        self.state.current_round = 1;

        let req = StartRequest {
            question: question.to_owned(),
            api_keys: self.api_keys.clone().unwrap_or_default(),
            max_rounds: self.max_rounds,
        };
        let id = match self.backend.start(&req).await {
            Ok(id) => id,
            Err(err) => {
                self.state.loading = false;
                return Err(SessionError::Backend(Box::new(err)));
            }
        };
        debug!("deliberation started: {id}");
        self.state.conversation_id = Some(id.clone());

        match self.backend.open_stream(&id).await {
            Ok(stream) => {
                self.stream = Some(Box::pin(stream));
                Ok(())
            }
            Err(err) => {
                // The deliberation is already running server-side; fall
                // back to the authoritative history rather than hanging
                // in a loading state.
                warn!("failed to open the event stream: {err}");
                self.finish(None).await;
                Err(SessionError::Backend(Box::new(err)))
            }
        }
    }

    /// Consumes the live stream until a terminal condition.
    ///
    /// Terminal conditions are a `final` or `error` event, the stream
    /// ending, a transport failure, and the close signal. All but the
    /// close signal reconcile the transcript against the authoritative
    /// history; the close signal only stops consumption, leaving the
    /// transcript as it was.
    pub async fn run(&mut self) {
        loop {
            if *self.close_rx.borrow() {
                self.stream = None;
                self.state.loading = false;
                return;
            }
            let Some(stream) = self.stream.as_mut() else {
                return;
            };

            let next = select! {
                biased;

                _ = self.close_rx.changed() => None,
                event = poll_fn(|cx| stream.as_mut().poll_next_event(cx)) => {
                    Some(event)
                }
            };
            match next {
                None => {
                    self.stream = None;
                    self.state.loading = false;
                    return;
                }
                Some(Ok(Some(event))) => self.dispatch(event).await,
                Some(Ok(None)) => {
                    // The server closed the stream without a terminal
                    // event.
                    debug!("event stream ended");
                    self.finish(None).await;
                }
                Some(Err(err)) => {
                    warn!("event stream failed: {err}");
                    self.finish(None).await;
                }
            }
        }
    }

    /// Discards credentials and session state, returning the session to
    /// its initial configuration.
    ///
    /// Any live stream is cancelled first so a late event cannot
    /// resurrect the discarded state. The reasoning-visibility toggle
    /// survives the reset.
    pub fn reset(&mut self) {
        self.close_stream();
        self.rearm();
        self.api_keys = None;
        self.state = SessionState {
            show_reasoning: self.state.show_reasoning,
            ..Default::default()
        };
    }

    async fn dispatch(&mut self, event: StreamEvent) {
        trace!("got a stream event: {event:?}");
        match &event {
            StreamEvent::Token { .. } | StreamEvent::Message { .. } => {
                self.state.transcript.apply(&event);
            }
            StreamEvent::RoundUpdate { round } => {
                self.state.current_round = *round;
            }
            StreamEvent::Final { .. } => self.finish(None).await,
            StreamEvent::Error { message } => {
                let message = message
                    .clone()
                    .unwrap_or_else(|| "unspecified backend error".to_owned());
                self.finish(Some(message)).await;
            }
        }
        if let Some(on_event) = &self.on_event {
            on_event(&event, &self.state);
        }
    }

    /// Terminal handling: surface any backend-reported error, reconcile
    /// the transcript against the authoritative history, stop loading,
    /// and close the stream.
    async fn finish(&mut self, error: Option<String>) {
        if let Some(message) = error {
            error!("backend reported an error: {message}");
            self.state.last_error = Some(message);
        }
        if let Some(id) = self.state.conversation_id.clone() {
            self.sync_history(&id).await;
        }
        self.state.loading = false;
        self.close_stream();
    }

    /// Replaces the transcript with the backend's canonical message
    /// list, when it is non-empty.
    ///
    /// The fetch is retried briefly; on failure the locally merged
    /// transcript is kept rather than lost.
    async fn sync_history(&mut self, id: &ConversationId) {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let backend = &self.backend;
        let fetched = backoff::future::retry(policy, || async move {
            backend
                .history(id)
                .await
                .map_err(backoff::Error::transient)
        })
        .await;
        match fetched {
            Ok(history) if history.is_empty() => {
                debug!("authoritative history is empty, keeping local view");
            }
            Ok(history) => self.state.transcript.replace_all(history),
            Err(err) => warn!("failed to sync history: {err}"),
        }
    }

    /// Drops the live stream and fires the close signal. Safe to call
    /// any number of times.
    fn close_stream(&mut self) {
        self.stream = None;
        self.close_tx.send(true).ok();
    }

    /// Installs a fresh close signal for the next submission.
    fn rearm(&mut self) {
        let (close_tx, close_rx) = watch::channel(false);
        self.close_tx = close_tx;
        self.close_rx = close_rx;
    }
}
